use replicator_core::models::{InFlightEntry, JobHandle, ResourceKey};

/// 在执行中作业的登记表
///
/// 记录已分发但尚未确认完成的作业。容量释放只通过prune发生，
/// 调度核心不关心作业是成功还是失败。
#[derive(Debug, Default)]
pub struct InFlightTable {
    entries: Vec<InFlightEntry>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, entry: InFlightEntry) {
        self.entries.push(entry);
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.iter().any(|e| &e.resource_key == key)
    }

    /// 当前所有在执行中的作业句柄，顺序与内部登记顺序一致
    pub fn handles(&self) -> Vec<JobHandle> {
        self.entries.iter().map(|e| e.job_handle.clone()).collect()
    }

    /// 根据查询结果移除已完成的条目，返回移除数量
    ///
    /// completed与handles()的返回按位置一一对应。
    pub fn prune(&mut self, completed: &[bool]) -> usize {
        debug_assert_eq!(completed.len(), self.entries.len());
        let before = self.entries.len();
        let mut done = completed.iter();
        self.entries
            .retain(|_| !done.next().copied().unwrap_or(false));
        before - self.entries.len()
    }
}
