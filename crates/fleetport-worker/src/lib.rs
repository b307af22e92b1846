//! Fleetport Worker – job queue bridge and worker pool.
//!
//! Producers call [`JobQueue::enqueue`]; the pool claims jobs from a
//! [`JobTransport`] and hands each decoded job to a [`JobHandlerContext`],
//! which the application implements to run the matching pipeline.

mod context;
mod queue;
mod transport;

pub use context::JobHandlerContext;
pub use queue::{JobFinishedSender, JobQueue, JobQueueConfig};
pub use transport::{JobTransport, MemoryJobTransport, PgJobTransport};
