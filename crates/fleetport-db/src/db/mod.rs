pub mod job;
pub mod memory;
pub mod vehicle;

pub use job::JobRepository;
pub use memory::MemoryVehicleStore;
pub use vehicle::{PgVehicleStore, StoreError, StoreResult, VehicleStore};
