pub mod export_download;
pub mod jobs;
pub mod vehicle_export;
pub mod vehicle_import;
pub mod vehicles;
