use async_trait::async_trait;

use crate::{
    models::{JobHandle, ResourceKey},
    ReplicatorResult,
};

/// 待复制资源的提供者接口
///
/// 具体实现决定哪些资源算作待处理工作（例如"从未同步的项目"和
/// "近期更新但已过期的项目"两类来源），以及如何把一个资源交给
/// 执行底座。调度核心只通过这两个操作与领域逻辑交互。
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// 加载一批待处理资源，最多batch_size个
    ///
    /// 返回数量少于batch_size表示来源接近耗尽，返回空表示已经耗尽。
    /// 实现方负责排除已经在执行中的资源；调度循环会对"仍在执行"
    /// 的键做兜底过滤。
    async fn load_pending_resources(
        &self,
        batch_size: usize,
    ) -> ReplicatorResult<Vec<ResourceKey>>;

    /// 把一个资源分发给执行底座
    ///
    /// 返回None表示提供者主动跳过了这次分发，不算错误，也不占用容量；
    /// 该资源在本轮不会重试，下次重新加载时如仍待处理会再次出现。
    async fn dispatch(&self, key: &ResourceKey) -> ReplicatorResult<Option<JobHandle>>;
}
