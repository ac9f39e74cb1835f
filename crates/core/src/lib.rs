pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::{AppConfig, LockConfig, SchedulerConfig};
pub use errors::{ReplicatorError, ReplicatorResult};
pub use models::{InFlightEntry, JobHandle, LockToken, ResourceKey, RunSummary, StopReason};
