//! Fleetport Database Layer
//!
//! The vehicle store boundary (`VehicleStore`) with its Postgres and
//! in-memory implementations, and the Postgres job table that backs the
//! durable queue transport.

pub mod db;

pub use db::{
    JobRepository, MemoryVehicleStore, PgVehicleStore, StoreError, StoreResult, VehicleStore,
};
