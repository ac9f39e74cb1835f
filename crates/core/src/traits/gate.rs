use async_trait::async_trait;

use crate::ReplicatorResult;

/// 节点复制开关
///
/// 外部谓词，决定当前节点是否允许继续复制。检查可能涉及存储
/// 往返，调度循环通过带TTL的缓存包装来消费它，而不是每次迭代
/// 都直接查询。
#[async_trait]
pub trait ReplicationGate: Send + Sync {
    async fn enabled(&self) -> ReplicatorResult<bool>;
}
