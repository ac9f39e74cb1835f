//! 复制调度核心
//!
//! 本crate实现单实例运行的调度循环：在分布式锁的保护下，从资源
//! 提供者分批拉取待复制资源，按容量上限分发异步作业，并通过轮询
//! 跟踪作业完成情况。

pub mod gate;
pub mod in_flight;
pub mod pending_queue;
pub mod scheduler;

pub use gate::CachedGate;
pub use in_flight::InFlightTable;
pub use pending_queue::{take_batch, PendingQueue};
pub use scheduler::SchedulerLoop;
