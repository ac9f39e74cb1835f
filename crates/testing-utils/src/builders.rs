//! Helpers for building test data

use replicator_core::models::{JobHandle, ResourceKey};

/// Build plain resource keys from numeric ids
pub fn resource_keys(ids: &[i64]) -> Vec<ResourceKey> {
    ids.iter().map(|id| ResourceKey::new(*id)).collect()
}

/// Build typed resource keys from numeric ids
pub fn typed_resource_keys(resource_type: &str, ids: &[i64]) -> Vec<ResourceKey> {
    ids.iter()
        .map(|id| ResourceKey::with_type(*id, resource_type))
        .collect()
}

/// The job handle `MockResourceProvider` produces for a given key
pub fn job_handle_for(key: &ResourceKey) -> JobHandle {
    JobHandle::new(format!("job-{key}"))
}
