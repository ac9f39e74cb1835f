//! Mock implementations of the scheduler collaborator traits
//!
//! All mocks are `Arc<Mutex<..>>` based so tests can inspect recorded
//! interactions after a scheduling run has finished.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use replicator_core::{
    models::{JobHandle, LockToken, ResourceKey},
    traits::{DistributedLock, JobStatusOracle, ReplicationGate, ResourceProvider},
    ReplicatorError, ReplicatorResult,
};

use crate::builders::job_handle_for;

/// Mock ResourceProvider with scripted refill batches
///
/// Each call to `load_pending_resources` pops the next scripted batch; once
/// the script is exhausted the repeat batch (empty by default) is returned.
/// Dispatch produces a deterministic handle per key (see `job_handle_for`)
/// unless the key is in the skip set.
#[derive(Default)]
pub struct MockResourceProvider {
    batches: Mutex<VecDeque<Vec<ResourceKey>>>,
    repeat: Mutex<Vec<ResourceKey>>,
    skip_keys: Mutex<HashSet<ResourceKey>>,
    load_error: Mutex<Option<String>>,
    dispatched: Mutex<Vec<ResourceKey>>,
    load_calls: AtomicUsize,
}

impl MockResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripted batches, returned one per refill in order
    pub fn with_batches(batches: Vec<Vec<ResourceKey>>) -> Self {
        let provider = Self::new();
        *provider.batches.lock().unwrap() = batches.into();
        provider
    }

    /// After scripted batches run out, keep returning this batch
    pub fn repeat_batch(&self, batch: Vec<ResourceKey>) {
        *self.repeat.lock().unwrap() = batch;
    }

    /// Append another scripted batch, e.g. between two runs
    pub fn push_batch(&self, batch: Vec<ResourceKey>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    /// Make `dispatch` return None for this key
    pub fn skip_key(&self, key: ResourceKey) {
        self.skip_keys.lock().unwrap().insert(key);
    }

    /// Make the next `load_pending_resources` call fail
    pub fn fail_loads(&self, message: &str) {
        *self.load_error.lock().unwrap() = Some(message.to_string());
    }

    /// Keys dispatched so far, in dispatch order
    pub fn dispatched(&self) -> Vec<ResourceKey> {
        self.dispatched.lock().unwrap().clone()
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceProvider for MockResourceProvider {
    async fn load_pending_resources(
        &self,
        batch_size: usize,
    ) -> ReplicatorResult<Vec<ResourceKey>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.load_error.lock().unwrap().clone() {
            return Err(ReplicatorError::provider_error(message));
        }

        let mut batch = match self.batches.lock().unwrap().pop_front() {
            Some(batch) => batch,
            None => self.repeat.lock().unwrap().clone(),
        };
        batch.truncate(batch_size);
        Ok(batch)
    }

    async fn dispatch(&self, key: &ResourceKey) -> ReplicatorResult<Option<JobHandle>> {
        if self.skip_keys.lock().unwrap().contains(key) {
            return Ok(None);
        }
        self.dispatched.lock().unwrap().push(key.clone());
        Ok(Some(job_handle_for(key)))
    }
}

/// In-process mock of the distributed lock
///
/// Provides real mutual exclusion between loops sharing the same instance:
/// acquiring a held key returns None. Renewals can be scripted to fail.
#[derive(Default)]
pub struct MockDistributedLock {
    held: Mutex<HashMap<String, String>>,
    renew_results: Mutex<VecDeque<bool>>,
    acquire_attempts: AtomicUsize,
    releases: AtomicUsize,
    next_token: AtomicUsize,
}

impl MockDistributedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue scripted renew outcomes; once drained renewals succeed while
    /// the token is still valid
    pub fn script_renew_results(&self, results: Vec<bool>) {
        *self.renew_results.lock().unwrap() = results.into();
    }

    /// Acquire the key out of band, simulating another running instance
    pub fn seize(&self, key: &str) -> LockToken {
        let token = format!("seized-{}", self.next_token.fetch_add(1, Ordering::SeqCst));
        self.held
            .lock()
            .unwrap()
            .insert(key.to_string(), token.clone());
        LockToken::new(token)
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.lock().unwrap().contains_key(key)
    }

    pub fn acquire_attempts(&self) -> usize {
        self.acquire_attempts.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistributedLock for MockDistributedLock {
    async fn try_acquire(
        &self,
        key: &str,
        _timeout: Duration,
    ) -> ReplicatorResult<Option<LockToken>> {
        self.acquire_attempts.fetch_add(1, Ordering::SeqCst);
        let mut held = self.held.lock().unwrap();
        if held.contains_key(key) {
            return Ok(None);
        }
        let token = format!("token-{}", self.next_token.fetch_add(1, Ordering::SeqCst));
        held.insert(key.to_string(), token.clone());
        Ok(Some(LockToken::new(token)))
    }

    async fn renew(&self, key: &str, token: &LockToken) -> ReplicatorResult<bool> {
        if let Some(result) = self.renew_results.lock().unwrap().pop_front() {
            if !result {
                // 模拟锁过期被接管
                self.held.lock().unwrap().remove(key);
            }
            return Ok(result);
        }
        let held = self.held.lock().unwrap();
        Ok(held.get(key).map(String::as_str) == Some(token.as_str()))
    }

    async fn release(&self, key: &str, token: &LockToken) -> ReplicatorResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        let mut held = self.held.lock().unwrap();
        if held.get(key).map(String::as_str) == Some(token.as_str()) {
            held.remove(key);
        }
        Ok(())
    }
}

/// Mock JobStatusOracle with per-handle completion scripting
#[derive(Default)]
pub struct MockJobStatusOracle {
    completed: Mutex<HashSet<JobHandle>>,
    complete_after: Mutex<HashMap<JobHandle, usize>>,
    complete_everything: AtomicBool,
    poll_sizes: Mutex<Vec<usize>>,
}

impl MockJobStatusOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a handle as already finished
    pub fn mark_completed(&self, handle: JobHandle) {
        self.completed.lock().unwrap().insert(handle);
    }

    /// Report the handle as finished on the n-th poll that includes it
    pub fn complete_after(&self, handle: JobHandle, polls: usize) {
        assert!(polls > 0, "polls must be at least 1");
        self.complete_after.lock().unwrap().insert(handle, polls);
    }

    /// Report every handle as finished on its first poll
    pub fn complete_everything(&self) {
        self.complete_everything.store(true, Ordering::SeqCst);
    }

    pub fn polls(&self) -> usize {
        self.poll_sizes.lock().unwrap().len()
    }

    /// Largest in-flight set ever observed, i.e. the peak concurrency the
    /// scheduler actually reached
    pub fn max_poll_size(&self) -> usize {
        self.poll_sizes.lock().unwrap().iter().copied().max().unwrap_or(0)
    }
}

#[async_trait]
impl JobStatusOracle for MockJobStatusOracle {
    async fn completed(&self, handles: &[JobHandle]) -> ReplicatorResult<Vec<bool>> {
        self.poll_sizes.lock().unwrap().push(handles.len());
        if self.complete_everything.load(Ordering::SeqCst) {
            return Ok(vec![true; handles.len()]);
        }
        let mut completed = self.completed.lock().unwrap();
        let mut complete_after = self.complete_after.lock().unwrap();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            if completed.contains(handle) {
                results.push(true);
                continue;
            }
            if let Some(remaining) = complete_after.get_mut(handle) {
                *remaining -= 1;
                if *remaining == 0 {
                    complete_after.remove(handle);
                    completed.insert(handle.clone());
                    results.push(true);
                    continue;
                }
            }
            results.push(false);
        }
        Ok(results)
    }
}

/// Mock node gate with an optional disable threshold
#[derive(Default)]
pub struct MockGate {
    disable_after: Mutex<Option<usize>>,
    checks: AtomicUsize,
    disabled: Mutex<bool>,
}

impl MockGate {
    pub fn always_enabled() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn always_disabled() -> Arc<Self> {
        let gate = Self::default();
        *gate.disabled.lock().unwrap() = true;
        Arc::new(gate)
    }

    /// Return false starting from the n-th check (1-based)
    pub fn disable_after(&self, checks: usize) {
        *self.disable_after.lock().unwrap() = Some(checks);
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplicationGate for MockGate {
    async fn enabled(&self) -> ReplicatorResult<bool> {
        let count = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.disabled.lock().unwrap() {
            return Ok(false);
        }
        if let Some(threshold) = *self.disable_after.lock().unwrap() {
            if count >= threshold {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
