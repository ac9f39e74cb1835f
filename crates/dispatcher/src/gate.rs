use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use replicator_core::{traits::ReplicationGate, ReplicatorResult};

/// 带TTL缓存的节点开关
///
/// 底层检查可能涉及存储往返，这里把结果缓存一段时间，调度循环
/// 每次迭代都可以询问而不会频繁打到后端。底层检查出错时错误
/// 原样向上传播。
pub struct CachedGate {
    inner: Arc<dyn ReplicationGate>,
    ttl: Duration,
    memo: Mutex<Option<(Instant, bool)>>,
}

impl CachedGate {
    pub fn new(inner: Arc<dyn ReplicationGate>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            memo: Mutex::new(None),
        }
    }

    pub async fn enabled(&self) -> ReplicatorResult<bool> {
        let mut memo = self.memo.lock().await;
        if let Some((checked_at, value)) = *memo {
            if checked_at.elapsed() < self.ttl {
                return Ok(value);
            }
        }

        let value = self.inner.enabled().await?;
        debug!("节点复制开关检查结果: {}", value);
        *memo = Some((Instant::now(), value));
        Ok(value)
    }
}
