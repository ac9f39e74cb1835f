use std::sync::Arc;
use std::time::{Duration, Instant};

use replicator_core::{
    models::{ResourceKey, StopReason},
    ReplicatorError, SchedulerConfig,
};
use replicator_dispatcher::{CachedGate, SchedulerLoop};
use replicator_testing_utils::{
    job_handle_for, resource_keys, MockDistributedLock, MockGate, MockJobStatusOracle,
    MockResourceProvider,
};

const LOCK_KEY: &str = "replication_scheduler";
const LEASE: Duration = Duration::from_secs(60);

fn test_config(max_capacity: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_capacity,
        batch_size: 10,
        run_time_seconds: 1,
        poll_interval_ms: 10,
        gate_ttl_seconds: 60,
        lock_key: LOCK_KEY.to_string(),
    }
}

fn make_loop(
    provider: Arc<MockResourceProvider>,
    lock: Arc<MockDistributedLock>,
    oracle: Arc<MockJobStatusOracle>,
    config: SchedulerConfig,
) -> SchedulerLoop {
    let gate = CachedGate::new(MockGate::always_enabled(), config.gate_ttl());
    SchedulerLoop::new(provider, lock, oracle, gate, config, LEASE)
}

#[tokio::test]
async fn test_lock_unavailable_skips_run() {
    let provider = Arc::new(MockResourceProvider::new());
    let lock = Arc::new(MockDistributedLock::new());
    let oracle = Arc::new(MockJobStatusOracle::new());

    // 另一个实例已经持有调度锁
    lock.seize(LOCK_KEY);

    let scheduler = make_loop(provider.clone(), lock.clone(), oracle, test_config(2));
    let summary = scheduler.run().await.unwrap();

    assert!(!summary.lock_acquired);
    assert_eq!(summary.stop_reason, StopReason::LockUnavailable);
    assert_eq!(summary.dispatched, 0);
    assert_eq!(provider.load_calls(), 0);
    assert!(lock.is_held(LOCK_KEY));
}

#[tokio::test]
async fn test_mutual_exclusion_between_concurrent_runs() {
    let lock = Arc::new(MockDistributedLock::new());

    let provider_a = Arc::new(MockResourceProvider::new());
    provider_a.repeat_batch(resource_keys(&[1, 2, 3, 4, 5]));
    let provider_b = Arc::new(MockResourceProvider::new());
    provider_b.repeat_batch(resource_keys(&[1, 2, 3, 4, 5]));

    let loop_a = make_loop(
        provider_a.clone(),
        lock.clone(),
        Arc::new(MockJobStatusOracle::new()),
        test_config(2),
    );
    let loop_b = make_loop(
        provider_b.clone(),
        lock.clone(),
        Arc::new(MockJobStatusOracle::new()),
        test_config(2),
    );

    let (summary_a, summary_b) = tokio::join!(loop_a.run(), loop_b.run());
    let summary_a = summary_a.unwrap();
    let summary_b = summary_b.unwrap();

    // 同一把锁下最多只有一个实例真正执行分发
    assert!(!(summary_a.lock_acquired && summary_b.lock_acquired));
    if !summary_a.lock_acquired {
        assert!(provider_a.dispatched().is_empty());
    }
    if !summary_b.lock_acquired {
        assert!(provider_b.dispatched().is_empty());
    }
    assert!(summary_a.lock_acquired || summary_b.lock_acquired);
    assert!(!lock.is_held(LOCK_KEY));
}

#[tokio::test]
async fn test_end_to_end_capacity_two_trace() {
    let provider = Arc::new(MockResourceProvider::with_batches(vec![resource_keys(&[
        1, 2, 3,
    ])]));
    let lock = Arc::new(MockDistributedLock::new());
    let oracle = Arc::new(MockJobStatusOracle::new());

    // r1在第一次被轮询到时就已完成，r2/r3在预算内永不完成
    oracle.complete_after(job_handle_for(&ResourceKey::new(1)), 1);

    let scheduler = make_loop(provider.clone(), lock.clone(), oracle.clone(), test_config(2));
    let summary = scheduler.run().await.unwrap();

    assert!(summary.lock_acquired);
    assert_eq!(summary.stop_reason, StopReason::TimeBudget);
    // 第一轮分发r1、r2，第二轮清理r1后补发r3，之后再无分发
    assert_eq!(provider.dispatched(), resource_keys(&[1, 2, 3]));
    assert_eq!(summary.dispatched, 3);
    // 任意时刻在执行中的作业数不超过容量
    assert!(oracle.max_poll_size() <= 2);
    assert!(!lock.is_held(LOCK_KEY));
}

#[tokio::test]
async fn test_capacity_invariant() {
    let provider = Arc::new(MockResourceProvider::new());
    provider.repeat_batch(resource_keys(&[1, 2, 3, 4, 5]));
    let lock = Arc::new(MockDistributedLock::new());
    let oracle = Arc::new(MockJobStatusOracle::new());

    let scheduler = make_loop(provider.clone(), lock, oracle.clone(), test_config(2));
    let summary = scheduler.run().await.unwrap();

    // 作业永不完成，分发在容量占满后停止
    assert_eq!(summary.dispatched, 2);
    assert_eq!(provider.dispatched(), resource_keys(&[1, 2]));
    assert!(oracle.max_poll_size() <= 2);
    assert_eq!(summary.stop_reason, StopReason::TimeBudget);
}

#[tokio::test]
async fn test_exhaustion_terminates_within_one_iteration() {
    let provider = Arc::new(MockResourceProvider::new());
    let lock = Arc::new(MockDistributedLock::new());
    let oracle = Arc::new(MockJobStatusOracle::new());

    let scheduler = make_loop(provider.clone(), lock.clone(), oracle, test_config(2));
    let summary = scheduler.run().await.unwrap();

    assert!(summary.lock_acquired);
    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.iterations, 1);
    assert_eq!(summary.dispatched, 0);
    assert!(!lock.is_held(LOCK_KEY));
}

#[tokio::test]
async fn test_skipped_dispatch_ends_last_batch() {
    let provider = Arc::new(MockResourceProvider::with_batches(vec![resource_keys(&[
        1,
    ])]));
    provider.skip_key(ResourceKey::new(1));
    let lock = Arc::new(MockDistributedLock::new());
    let oracle = Arc::new(MockJobStatusOracle::new());

    let scheduler = make_loop(provider.clone(), lock, oracle, test_config(2));
    let summary = scheduler.run().await.unwrap();

    // 提供者跳过不算错误也不占容量，本轮不再重试该资源
    assert_eq!(summary.dispatched, 0);
    assert!(provider.dispatched().is_empty());
    assert_eq!(summary.stop_reason, StopReason::LastBatch);
    assert_eq!(summary.iterations, 1);
}

#[tokio::test]
async fn test_renew_failure_is_hard_stop() {
    let provider = Arc::new(MockResourceProvider::new());
    provider.repeat_batch(resource_keys(&[1, 2, 3]));
    let lock = Arc::new(MockDistributedLock::new());
    lock.script_renew_results(vec![false]);
    let oracle = Arc::new(MockJobStatusOracle::new());

    let scheduler = make_loop(provider.clone(), lock.clone(), oracle, test_config(1));
    let result = scheduler.run().await;

    assert!(matches!(result, Err(ReplicatorError::LockLost { .. })));
    // 第一轮的分发已经发生，续约失败后立即停止
    assert_eq!(provider.dispatched(), resource_keys(&[1]));
    // 锁已被接管，不会再对旧令牌做释放
    assert_eq!(lock.releases(), 0);
}

#[tokio::test]
async fn test_provider_failure_releases_lock() {
    let provider = Arc::new(MockResourceProvider::new());
    provider.fail_loads("数据库连接失败");
    let lock = Arc::new(MockDistributedLock::new());
    let oracle = Arc::new(MockJobStatusOracle::new());

    let scheduler = make_loop(provider, lock.clone(), oracle, test_config(2));
    let result = scheduler.run().await;

    assert!(matches!(result, Err(ReplicatorError::Provider(_))));
    // 错误向上传播之前锁必须先释放
    assert_eq!(lock.releases(), 1);
    assert!(!lock.is_held(LOCK_KEY));
}

#[tokio::test]
async fn test_no_deduplication_across_runs() {
    let provider = Arc::new(MockResourceProvider::with_batches(vec![resource_keys(&[
        1,
    ])]));
    let lock = Arc::new(MockDistributedLock::new());
    let oracle = Arc::new(MockJobStatusOracle::new());
    oracle.complete_everything();

    let scheduler = make_loop(provider.clone(), lock.clone(), oracle, test_config(2));

    let first = scheduler.run().await.unwrap();
    assert_eq!(first.dispatched, 1);

    // 模拟进程重启后的下一次运行：提供者再次给出同一个资源
    provider.push_batch(resource_keys(&[1]));
    let second = scheduler.run().await.unwrap();

    // 跨运行的去重只能由提供者负责，核心不做任何记忆
    assert_eq!(second.dispatched, 1);
    assert_eq!(provider.dispatched(), resource_keys(&[1, 1]));
    assert!(!lock.is_held(LOCK_KEY));
}

#[tokio::test]
async fn test_termination_bound() {
    let provider = Arc::new(MockResourceProvider::new());
    provider.repeat_batch(resource_keys(&[1, 2, 3, 4, 5]));
    let lock = Arc::new(MockDistributedLock::new());
    let oracle = Arc::new(MockJobStatusOracle::new());
    oracle.complete_everything();

    let config = test_config(1);
    let budget = config.run_time();
    let scheduler = make_loop(provider, lock, oracle, config);

    let started = Instant::now();
    let summary = scheduler.run().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.stop_reason, StopReason::TimeBudget);
    assert!(elapsed >= budget);
    // 预算用完后不再开启新的分发轮次
    assert!(elapsed < budget + Duration::from_secs(2));
    assert!(summary.finished_at >= summary.started_at);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let provider = Arc::new(MockResourceProvider::new());
    let lock = Arc::new(MockDistributedLock::new());
    let oracle = Arc::new(MockJobStatusOracle::new());

    let mut config = test_config(2);
    config.max_capacity = 0;
    let scheduler = make_loop(provider, lock.clone(), oracle, config);

    let result = scheduler.run().await;
    assert!(matches!(result, Err(ReplicatorError::Configuration(_))));
    assert_eq!(lock.acquire_attempts(), 0);
}

/// 两来源提供者：按规范把"从未同步"和"已过期"两个列表交替合并。
/// 加载即消费，模拟真实提供者会在查询中排除已分发资源的行为。
struct TwoSourceProvider {
    never_synced: std::sync::Mutex<Vec<ResourceKey>>,
    stale: std::sync::Mutex<Vec<ResourceKey>>,
    inner: MockResourceProvider,
}

#[async_trait::async_trait]
impl replicator_core::traits::ResourceProvider for TwoSourceProvider {
    async fn load_pending_resources(
        &self,
        batch_size: usize,
    ) -> replicator_core::ReplicatorResult<Vec<ResourceKey>> {
        let never_synced = std::mem::take(&mut *self.never_synced.lock().unwrap());
        let stale = std::mem::take(&mut *self.stale.lock().unwrap());
        Ok(replicator_dispatcher::take_batch(
            &never_synced,
            &stale,
            batch_size,
        ))
    }

    async fn dispatch(
        &self,
        key: &ResourceKey,
    ) -> replicator_core::ReplicatorResult<Option<replicator_core::models::JobHandle>> {
        self.inner.dispatch(key).await
    }
}

#[tokio::test]
async fn test_dispatch_order_follows_interleaved_sources() {
    let provider = Arc::new(TwoSourceProvider {
        never_synced: std::sync::Mutex::new(resource_keys(&[1, 2, 3])),
        stale: std::sync::Mutex::new(resource_keys(&[10, 20])),
        inner: MockResourceProvider::new(),
    });
    let lock = Arc::new(MockDistributedLock::new());
    let oracle = Arc::new(MockJobStatusOracle::new());
    oracle.complete_everything();

    let config = test_config(5);
    let gate = CachedGate::new(MockGate::always_enabled(), config.gate_ttl());
    let scheduler = SchedulerLoop::new(provider.clone(), lock, oracle, gate, config, LEASE);
    let summary = scheduler.run().await.unwrap();

    // 分发顺序遵循交替合并后的FIFO顺序：较长的一侧先出
    assert_eq!(
        provider.inner.dispatched(),
        resource_keys(&[1, 10, 2, 20, 3])
    );
    assert_eq!(summary.dispatched, 5);
    assert_eq!(summary.stop_reason, StopReason::Exhausted);
}
