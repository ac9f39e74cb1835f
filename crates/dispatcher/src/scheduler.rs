use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use replicator_core::{
    models::{InFlightEntry, LockToken, RunSummary, StopReason},
    traits::{DistributedLock, JobStatusOracle, ResourceProvider},
    ReplicatorError, ReplicatorResult, SchedulerConfig,
};

use crate::gate::CachedGate;
use crate::in_flight::InFlightTable;
use crate::pending_queue::PendingQueue;

/// 复制调度循环
///
/// 在分布式锁保护下运行的单实例控制循环。每次迭代依次执行：
/// 节点开关检查、完成清理、队列补充、终止判断、按空闲容量分发、
/// 锁续约、短暂休眠。待处理队列和执行登记表都是循环私有状态，
/// 随一次运行创建和丢弃。
pub struct SchedulerLoop {
    provider: Arc<dyn ResourceProvider>,
    lock: Arc<dyn DistributedLock>,
    oracle: Arc<dyn JobStatusOracle>,
    gate: CachedGate,
    config: SchedulerConfig,
    lease_timeout: Duration,
}

impl SchedulerLoop {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        lock: Arc<dyn DistributedLock>,
        oracle: Arc<dyn JobStatusOracle>,
        gate: CachedGate,
        config: SchedulerConfig,
        lease_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            lock,
            oracle,
            gate,
            config,
            lease_timeout,
        }
    }

    /// 执行一次调度运行
    ///
    /// 锁被其他实例持有时直接返回，不算错误。提供者或状态查询出错
    /// 时先释放锁再向上传播；续约失败视为锁已丢失，立即停止且不再
    /// 尝试释放。
    pub async fn run(&self) -> ReplicatorResult<RunSummary> {
        self.config.validate()?;

        if !self.gate.enabled().await? {
            info!("节点复制开关关闭，跳过本次调度");
            return Ok(RunSummary::skipped(StopReason::NodeDisabled));
        }

        let lock_key = &self.config.lock_key;
        let token = match self.lock.try_acquire(lock_key, self.lease_timeout).await? {
            Some(token) => token,
            None => {
                info!("调度锁 {} 已被其他实例持有，跳过本次调度", lock_key);
                return Ok(RunSummary::skipped(StopReason::LockUnavailable));
            }
        };

        info!("已获取调度锁 {}，开始调度循环", lock_key);
        let result = self.run_locked(&token).await;

        // 续约失败说明锁已被接管，此时不再对旧令牌做释放
        if !matches!(&result, Err(ReplicatorError::LockLost { .. })) {
            if let Err(e) = self.lock.release(lock_key, &token).await {
                warn!("释放调度锁 {} 失败: {}", lock_key, e);
            }
        }

        if let Ok(summary) = &result {
            info!(
                "调度循环结束: 共 {} 次迭代，分发 {} 个资源，原因 {:?}",
                summary.iterations, summary.dispatched, summary.stop_reason
            );
        }
        result
    }

    async fn run_locked(&self, token: &LockToken) -> ReplicatorResult<RunSummary> {
        let started = Instant::now();
        let started_at = Utc::now();
        let mut pending = PendingQueue::new(self.config.batch_size);
        let mut in_flight = InFlightTable::new();
        let mut iterations = 0u32;
        let mut dispatched = 0u32;
        // 某次补充的返回量不足一个完整批量，说明已经到了可用工作的尾部
        let mut last_batch = false;

        let stop_reason = loop {
            iterations += 1;

            if !self.gate.enabled().await? {
                info!("节点复制开关已关闭，停止调度");
                break StopReason::NodeDisabled;
            }

            self.prune_completed(&mut in_flight).await?;

            let mut refill_exhausted = false;
            if pending.len() < self.config.max_capacity {
                let batch = self
                    .provider
                    .load_pending_resources(self.config.batch_size)
                    .await?;
                refill_exhausted = batch.is_empty();
                if batch.len() < self.config.batch_size {
                    last_batch = true;
                }
                let added = pending.refill(batch, &in_flight);
                debug!(
                    "补充待处理队列: 新入队 {} 个，队列长度 {}",
                    added,
                    pending.len()
                );
            }

            if started.elapsed() >= self.config.run_time() {
                info!("运行时间预算用完，停止调度");
                break StopReason::TimeBudget;
            }

            if pending.is_empty() && in_flight.is_empty() && refill_exhausted {
                debug!("提供者已无待处理资源，停止调度");
                break StopReason::Exhausted;
            }

            dispatched += self.dispatch_batch(&mut pending, &mut in_flight).await?;

            if last_batch && pending.is_empty() && in_flight.is_empty() {
                debug!("最后一批资源已全部处理完毕，停止调度");
                break StopReason::LastBatch;
            }

            if !self.lock.renew(&self.config.lock_key, token).await? {
                warn!("调度锁 {} 续约失败，锁可能已被接管", self.config.lock_key);
                return Err(ReplicatorError::lock_lost(&self.config.lock_key));
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        };

        Ok(RunSummary {
            lock_acquired: true,
            iterations,
            dispatched,
            stop_reason,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// 轮询作业状态并移除已完成的条目，这是释放容量的唯一途径
    async fn prune_completed(&self, in_flight: &mut InFlightTable) -> ReplicatorResult<()> {
        if in_flight.is_empty() {
            return Ok(());
        }

        let handles = in_flight.handles();
        let completed = self.oracle.completed(&handles).await?;
        if completed.len() != handles.len() {
            return Err(ReplicatorError::oracle_error(format!(
                "状态查询返回了 {} 个结果，预期 {} 个",
                completed.len(),
                handles.len()
            )));
        }

        let removed = in_flight.prune(&completed);
        if removed > 0 {
            debug!(
                "清理 {} 个已完成作业，仍在执行 {} 个",
                removed,
                in_flight.len()
            );
        }
        Ok(())
    }

    /// 按空闲容量分发资源，返回实际分发的数量
    async fn dispatch_batch(
        &self,
        pending: &mut PendingQueue,
        in_flight: &mut InFlightTable,
    ) -> ReplicatorResult<u32> {
        let free_slots = self.config.max_capacity.saturating_sub(in_flight.len());
        if free_slots == 0 || pending.is_empty() {
            return Ok(0);
        }

        let mut count = 0u32;
        for key in pending.pop_batch(free_slots) {
            match self.provider.dispatch(&key).await? {
                Some(handle) => {
                    debug!("资源 {} 已分发，作业句柄 {}", key, handle);
                    in_flight.insert(InFlightEntry::new(key, handle));
                    count += 1;
                }
                None => {
                    // 提供者跳过不算错误，资源留待下次重新加载时再考虑
                    debug!("提供者跳过了资源 {}", key);
                }
            }
        }
        Ok(count)
    }
}
