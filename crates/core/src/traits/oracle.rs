use async_trait::async_trait;

use crate::{models::JobHandle, ReplicatorResult};

/// 作业完成状态查询接口
///
/// 执行底座不提供完成回调，调度循环只能轮询。返回结果与输入同长
/// 同序，true表示对应作业已经结束（成功或失败都算结束，调度核心
/// 不区分）。
#[async_trait]
pub trait JobStatusOracle: Send + Sync {
    async fn completed(&self, handles: &[JobHandle]) -> ReplicatorResult<Vec<bool>>;
}
