use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info};
use uuid::Uuid;

use replicator_core::{
    models::LockToken, traits::DistributedLock, LockConfig, ReplicatorError, ReplicatorResult,
};

const RENEW_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
else
    return 0
end
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

/// 基于Redis的分布式锁
///
/// 获取使用 SET NX PX，令牌为UUID；续约和释放通过Lua脚本先校验
/// 令牌再操作，保证过期后被其他实例接管的锁不会被旧持有者误续
/// 或误删。
pub struct RedisDistributedLock {
    conn: ConnectionManager,
    key_prefix: String,
    lease_timeout: Duration,
}

impl RedisDistributedLock {
    pub async fn new(config: &LockConfig) -> ReplicatorResult<Self> {
        info!("连接Redis锁后端: {}", config.redis_url);

        let client = redis::Client::open(config.redis_url.clone())
            .map_err(|e| ReplicatorError::lock_backend(e.to_string()))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| ReplicatorError::lock_backend(e.to_string()))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ReplicatorError::lock_backend(e.to_string()))?;

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
            lease_timeout: config.lease_timeout(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        lock_key(&self.key_prefix, key)
    }
}

fn lock_key(prefix: &str, key: &str) -> String {
    format!("{prefix}:lock:{key}")
}

#[async_trait]
impl DistributedLock for RedisDistributedLock {
    async fn try_acquire(
        &self,
        key: &str,
        timeout: Duration,
    ) -> ReplicatorResult<Option<LockToken>> {
        let token = Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();

        let result: Option<String> = redis::cmd("SET")
            .arg(self.namespaced(key))
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(timeout.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| ReplicatorError::lock_backend(e.to_string()))?;

        match result {
            Some(_) => {
                debug!("获取锁 {} 成功", key);
                Ok(Some(LockToken::new(token)))
            }
            None => Ok(None),
        }
    }

    async fn renew(&self, key: &str, token: &LockToken) -> ReplicatorResult<bool> {
        let mut conn = self.conn.clone();
        let extended: i64 = redis::Script::new(RENEW_SCRIPT)
            .key(self.namespaced(key))
            .arg(token.as_str())
            .arg(self.lease_timeout.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| ReplicatorError::lock_backend(e.to_string()))?;

        Ok(extended == 1)
    }

    async fn release(&self, key: &str, token: &LockToken) -> ReplicatorResult<()> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(self.namespaced(key))
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| ReplicatorError::lock_backend(e.to_string()))?;

        if deleted == 1 {
            debug!("释放锁 {} 成功", key);
        } else {
            debug!("释放锁 {} 时令牌已失效", key);
        }
        Ok(())
    }
}
