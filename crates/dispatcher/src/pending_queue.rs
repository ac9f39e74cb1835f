use std::collections::{HashSet, VecDeque};

use tracing::debug;

use replicator_core::models::ResourceKey;

use crate::in_flight::InFlightTable;

/// 交替合并两个有序来源并截断到批量上限
///
/// 较长的一侧先出，两侧交替取元素，剩余部分整体拼接；合并结果
/// 按首次出现去重，最后截断到cap。两个来源都非空时谁也不会把
/// 对方饿死，一侧为空时自然退化为单来源。
pub fn take_batch(
    primary: &[ResourceKey],
    secondary: &[ResourceKey],
    cap: usize,
) -> Vec<ResourceKey> {
    let (longer, shorter) = if secondary.len() > primary.len() {
        (secondary, primary)
    } else {
        (primary, secondary)
    };

    let mut merged = Vec::with_capacity(longer.len() + shorter.len());
    for i in 0..shorter.len() {
        merged.push(longer[i].clone());
        merged.push(shorter[i].clone());
    }
    merged.extend_from_slice(&longer[shorter.len()..]);

    // 先去重再截断
    let mut seen = HashSet::new();
    let mut batch = Vec::new();
    for key in merged {
        if seen.insert(key.clone()) {
            batch.push(key);
            if batch.len() == cap {
                break;
            }
        }
    }
    batch
}

/// 等待分发的资源队列
///
/// 有序、去重、容量受batch_size限制。生命周期与一次调度运行相同，
/// 不做任何跨运行的持久化。
#[derive(Debug)]
pub struct PendingQueue {
    queue: VecDeque<ResourceKey>,
    batch_size: usize,
}

impl PendingQueue {
    pub fn new(batch_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            batch_size,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 把一批新加载的资源并入队列，返回实际入队的数量
    ///
    /// 已经在队列中或仍在执行中的键视为无效输入直接丢弃；
    /// 入队后整体截断到batch_size。
    pub fn refill(&mut self, batch: Vec<ResourceKey>, in_flight: &InFlightTable) -> usize {
        let mut added = 0;
        for key in batch {
            if self.queue.len() >= self.batch_size {
                break;
            }
            if self.queue.contains(&key) {
                continue;
            }
            if in_flight.contains(&key) {
                debug!("资源 {} 仍在执行中，丢弃本次加载结果", key);
                continue;
            }
            self.queue.push_back(key);
            added += 1;
        }
        added
    }

    /// 按FIFO顺序弹出最多n个资源
    pub fn pop_batch(&mut self, n: usize) -> Vec<ResourceKey> {
        let count = n.min(self.queue.len());
        self.queue.drain(..count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replicator_core::models::{InFlightEntry, JobHandle};

    fn keys(ids: &[i64]) -> Vec<ResourceKey> {
        ids.iter().map(|id| ResourceKey::new(*id)).collect()
    }

    #[test]
    fn test_take_batch_longer_list_leads() {
        let a = keys(&[1, 2, 3]);
        let b = keys(&[10, 20]);
        assert_eq!(take_batch(&a, &b, 4), keys(&[1, 10, 2, 20]));
        // 次要来源更长时由它先出
        assert_eq!(take_batch(&b, &a, 4), keys(&[1, 10, 2, 20]));
    }

    #[test]
    fn test_take_batch_concatenates_tail() {
        let a = keys(&[1, 2, 3, 4]);
        let b = keys(&[10]);
        assert_eq!(take_batch(&a, &b, 10), keys(&[1, 10, 2, 3, 4]));
    }

    #[test]
    fn test_take_batch_dedupes_before_truncating() {
        // 两个来源中重复的键只保留最早出现的位置
        let a = keys(&[1, 2, 3]);
        let b = keys(&[2, 4]);
        assert_eq!(take_batch(&a, &b, 4), keys(&[1, 2, 4, 3]));
    }

    #[test]
    fn test_take_batch_degrades_to_single_source() {
        let a = keys(&[1, 2, 3]);
        assert_eq!(take_batch(&a, &[], 2), keys(&[1, 2]));
        assert_eq!(take_batch(&[], &a, 2), keys(&[1, 2]));
        assert!(take_batch(&[], &[], 5).is_empty());
    }

    #[test]
    fn test_refill_drops_in_flight_and_duplicates() {
        let mut queue = PendingQueue::new(10);
        let mut in_flight = InFlightTable::new();
        in_flight.insert(InFlightEntry::new(
            ResourceKey::new(2),
            JobHandle::new("job-2"),
        ));

        let added = queue.refill(keys(&[1, 2, 3]), &in_flight);
        assert_eq!(added, 2);
        assert_eq!(queue.len(), 2);

        // 已在队列中的键不会重复入队
        let added = queue.refill(keys(&[1, 3, 4]), &in_flight);
        assert_eq!(added, 1);
        assert_eq!(queue.pop_batch(10), keys(&[1, 3, 4]));
    }

    #[test]
    fn test_refill_respects_batch_size() {
        let mut queue = PendingQueue::new(3);
        let in_flight = InFlightTable::new();
        let added = queue.refill(keys(&[1, 2, 3, 4, 5]), &in_flight);
        assert_eq!(added, 3);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_pop_batch_is_fifo() {
        let mut queue = PendingQueue::new(10);
        let in_flight = InFlightTable::new();
        queue.refill(keys(&[1, 2, 3]), &in_flight);

        assert_eq!(queue.pop_batch(2), keys(&[1, 2]));
        assert_eq!(queue.pop_batch(5), keys(&[3]));
        assert!(queue.pop_batch(1).is_empty());
    }
}
