//! Fleetport API Library
//!
//! HTTP handlers, application state and setup for the vehicle import/export
//! service.

mod api_doc;
pub mod constants;
mod handlers;
pub mod setup;

pub mod error;
pub mod state;

pub use error::ErrorResponse;
pub use state::AppState;
