pub mod job;
pub mod outcome;
pub mod vehicle;

pub use job::{
    ExportPayload, ImportPayload, Job, JobDispatchError, JobEnvelope, JobHandle, JobKind,
    JobPayload, JobStatus,
};
pub use outcome::{ExportOutcome, ImportOutcome};
pub use vehicle::{age_cutoff, calendar_age, NewVehicle, Page, Vehicle, VehicleUpdate};
