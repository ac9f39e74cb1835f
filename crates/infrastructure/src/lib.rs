pub mod observability;
pub mod redis_lock;

pub use observability::init_logging;
pub use redis_lock::RedisDistributedLock;
