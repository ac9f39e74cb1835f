use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{ReplicatorError, ReplicatorResult};

/// 调度循环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 同时在执行中的作业数上限
    pub max_capacity: usize,
    /// 每次从提供者加载的资源批量上限
    pub batch_size: usize,
    /// 单次运行的墙钟时间预算（秒）
    pub run_time_seconds: u64,
    /// 迭代之间的休眠间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 节点开关检查结果的缓存时间（秒）
    pub gate_ttl_seconds: u64,
    /// 调度锁的key
    pub lock_key: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_capacity: 25,
            batch_size: 1000,
            run_time_seconds: 3600,
            poll_interval_ms: 1000,
            gate_ttl_seconds: 60,
            lock_key: "replication_scheduler".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn run_time(&self) -> Duration {
        Duration::from_secs(self.run_time_seconds)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn gate_ttl(&self) -> Duration {
        Duration::from_secs(self.gate_ttl_seconds)
    }

    pub fn validate(&self) -> ReplicatorResult<()> {
        if self.max_capacity == 0 {
            return Err(ReplicatorError::config_error("max_capacity必须大于0"));
        }
        if self.batch_size == 0 {
            return Err(ReplicatorError::config_error("batch_size必须大于0"));
        }
        if self.run_time_seconds == 0 {
            return Err(ReplicatorError::config_error("run_time_seconds必须大于0"));
        }
        if self.lock_key.is_empty() {
            return Err(ReplicatorError::config_error("lock_key不能为空"));
        }
        Ok(())
    }
}

/// 分布式锁后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    pub redis_url: String,
    /// 锁key的命名空间前缀
    pub key_prefix: String,
    /// 锁的租约超时（秒），续约在每次迭代中进行
    pub lease_timeout_seconds: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "replicator".to_string(),
            lease_timeout_seconds: 60,
        }
    }
}

impl LockConfig {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_seconds)
    }

    pub fn validate(&self) -> ReplicatorResult<()> {
        if self.redis_url.is_empty() {
            return Err(ReplicatorError::config_error("redis_url不能为空"));
        }
        if self.lease_timeout_seconds == 0 {
            return Err(ReplicatorError::config_error(
                "lease_timeout_seconds必须大于0",
            ));
        }
        Ok(())
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

impl AppConfig {
    /// 从TOML文件加载配置，环境变量（REPLICATOR_前缀）可以覆盖文件内容
    pub fn load(config_path: Option<&str>) -> ReplicatorResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(ReplicatorError::config_error(format!(
                    "配置文件不存在: {path}"
                )));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("REPLICATOR")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ReplicatorError::config_error(format!("配置加载失败: {e}")))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| ReplicatorError::config_error(format!("配置解析失败: {e}")))?;

        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> ReplicatorResult<()> {
        self.scheduler.validate()?;
        self.lock.validate()?;
        Ok(())
    }
}
