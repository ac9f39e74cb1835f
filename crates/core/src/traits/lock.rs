use std::time::Duration;

use async_trait::async_trait;

use crate::{models::LockToken, ReplicatorResult};

/// 跨进程互斥锁接口
///
/// 同一个key在全局任意时刻最多只有一个有效令牌。调度循环每次运行
/// 获取一次锁，退出时释放一次；获取失败说明已有其他实例在运行，
/// 属于正常情况而不是错误。
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// 尝试获取锁，成功返回令牌，已被占用返回None
    async fn try_acquire(
        &self,
        key: &str,
        timeout: Duration,
    ) -> ReplicatorResult<Option<LockToken>>;

    /// 续约，延长锁的超时时间；锁已过期或被接管时返回false
    async fn renew(&self, key: &str, token: &LockToken) -> ReplicatorResult<bool>;

    /// 释放锁；只对仍然持有的令牌生效
    async fn release(&self, key: &str, token: &LockToken) -> ReplicatorResult<()>;
}
