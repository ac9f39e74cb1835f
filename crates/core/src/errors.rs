use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplicatorError {
    #[error("复制锁已丢失: {key}")]
    LockLost { key: String },
    #[error("锁后端错误: {0}")]
    LockBackend(String),
    #[error("资源提供者错误: {0}")]
    Provider(String),
    #[error("任务状态查询错误: {0}")]
    Oracle(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type ReplicatorResult<T> = Result<T, ReplicatorError>;

impl ReplicatorError {
    pub fn lock_lost<S: Into<String>>(key: S) -> Self {
        Self::LockLost { key: key.into() }
    }
    pub fn lock_backend<S: Into<String>>(msg: S) -> Self {
        Self::LockBackend(msg.into())
    }
    pub fn provider_error<S: Into<String>>(msg: S) -> Self {
        Self::Provider(msg.into())
    }
    pub fn oracle_error<S: Into<String>>(msg: S) -> Self {
        Self::Oracle(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 锁丢失后不能继续分发，属于必须立刻停止的错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReplicatorError::LockLost { .. } | ReplicatorError::Configuration(_)
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReplicatorError::LockBackend(_)
                | ReplicatorError::Provider(_)
                | ReplicatorError::Oracle(_)
        )
    }
}

impl From<serde_json::Error> for ReplicatorError {
    fn from(err: serde_json::Error) -> Self {
        ReplicatorError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ReplicatorError {
    fn from(err: anyhow::Error) -> Self {
        ReplicatorError::Internal(err.to_string())
    }
}
