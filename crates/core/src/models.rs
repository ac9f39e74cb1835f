use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一个待复制资源的标识
///
/// id加上可选的资源类型即可在提供者侧唯一定位一个资源，
/// 相等性按 (id, resource_type) 判断。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub id: i64,
    pub resource_type: Option<String>,
}

impl ResourceKey {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            resource_type: None,
        }
    }
    pub fn with_type<S: Into<String>>(id: i64, resource_type: S) -> Self {
        Self {
            id,
            resource_type: Some(resource_type.into()),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource_type {
            Some(t) => write!(f, "{}/{}", t, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// 执行底座接受一个工作单元后返回的作业句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 已分发但尚未确认完成的作业记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlightEntry {
    pub resource_key: ResourceKey,
    pub job_handle: JobHandle,
}

impl InFlightEntry {
    pub fn new(resource_key: ResourceKey, job_handle: JobHandle) -> Self {
        Self {
            resource_key,
            job_handle,
        }
    }
}

/// 成功获取锁后返回的令牌，续约和释放都需要出示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken(String);

impl LockToken {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一次调度结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// 锁被其他实例持有，本轮直接跳过
    LockUnavailable,
    /// 节点复制开关关闭
    NodeDisabled,
    /// 待处理队列与提供者均已耗尽
    Exhausted,
    /// 最后一批资源已全部分发
    LastBatch,
    /// 运行时间预算用完
    TimeBudget,
}

/// 一次调度运行的结果摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub lock_acquired: bool,
    pub iterations: u32,
    pub dispatched: u32,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn skipped(reason: StopReason) -> Self {
        let now = Utc::now();
        Self {
            lock_acquired: false,
            iterations: 0,
            dispatched: 0,
            stop_reason: reason,
            started_at: now,
            finished_at: now,
        }
    }
}
