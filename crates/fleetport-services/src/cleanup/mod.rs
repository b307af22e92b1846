//! Retention of transient upload and export files.

mod sweeper;

pub use sweeper::{RetentionSweeper, SweepReport};
