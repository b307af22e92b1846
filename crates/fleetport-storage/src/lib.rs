//! Fleetport transfer storage
//!
//! Two flat directories on local disk: one receives uploaded spreadsheets,
//! the other holds generated exports until the retention sweeper removes
//! them. File names are opaque; there is no index beyond the directory
//! listing.

mod local;
mod traits;

pub use local::{sanitize_file_name, ReservedFile, TransferStore};
pub use traits::{ByteStream, StorageError, StorageResult};
