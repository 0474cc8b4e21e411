use std::collections::{HashMap, VecDeque};

use bytes::Bytes;

/// Bounded map from chunk index to chunk bytes, evicted in insertion order.
///
/// Eviction is batched: once the cache grows past `capacity` chunks, the
/// oldest half is dropped in one pass, which keeps workloads that oscillate
/// around the capacity from evicting on every read.
pub(crate) struct ChunkCache {
    chunks: HashMap<u64, Bytes>,
    insertion_log: VecDeque<u64>,
    capacity: usize,
}

impl ChunkCache {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chunks: HashMap::new(),
            insertion_log: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn contains(&self, index: u64) -> bool {
        self.chunks.contains_key(&index)
    }

    pub(crate) fn get(&self, index: u64) -> Option<&Bytes> {
        self.chunks.get(&index)
    }

    pub(crate) fn insert(&mut self, index: u64, bytes: Bytes) {
        self.chunks.insert(index, bytes);
        self.insertion_log.push_back(index);
    }

    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Drop the oldest entries if the cache has grown past capacity.
    ///
    /// Removes at least half the capacity per pass, and always enough to get
    /// back under the limit even after a wide prefetch. Returns how many
    /// entries were evicted.
    pub(crate) fn evict(&mut self) -> usize {
        if self.insertion_log.len() <= self.capacity {
            return 0;
        }
        let excess = self.insertion_log.len() - self.capacity;
        let count = excess.max(self.capacity / 2);
        for _ in 0..count {
            if let Some(index) = self.insertion_log.pop_front() {
                self.chunks.remove(&index);
            }
        }
        count
    }
}
