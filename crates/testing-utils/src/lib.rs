//! Shared test doubles for the replicator workspace
//!
//! In-memory mock implementations of the scheduler's collaborator traits,
//! plus small helpers for building test data. No real Redis or job queue
//! is required to exercise the scheduling loop.

pub mod builders;
pub mod mocks;

pub use builders::{job_handle_for, resource_keys, typed_resource_keys};
pub use mocks::{MockDistributedLock, MockGate, MockJobStatusOracle, MockResourceProvider};
