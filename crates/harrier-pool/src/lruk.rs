//! LRU-K cache over byte keys and values.
//!
//! Classic LRU evicts on the single most recent access; LRU-K tracks up
//! to K access ticks per key and evicts by the oldest K-th-most-recent
//! access. Keys with fewer than K recorded accesses have no K-th access
//! at all and are the first victims (oldest first-access among them), so
//! one burst of single-hit newcomers cannot flush the established
//! working set.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use tracing::trace;

/// Cache construction parameters. A `max_size`/`max_memory` of 0 means
/// unbounded in that dimension.
#[derive(Debug, Clone)]
pub struct LrukConfig {
    /// Access-history depth. Must be at least 1.
    pub k: usize,
    /// Entry-count bound.
    pub max_size: usize,
    /// Bound on the sum of `|key| + |value|` bytes.
    pub max_memory: usize,
}

impl Default for LrukConfig {
    fn default() -> Self {
        Self {
            k: 2,
            max_size: 0,
            max_memory: 0,
        }
    }
}

/// Hit/miss/eviction counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub sets: u64,
    pub deletes: u64,
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    /// Logical ticks of the last <= K accesses, oldest first.
    history: VecDeque<u64>,
}

/// Recency order book: MRU at the back.
#[derive(Debug, Default)]
struct Order {
    queue: VecDeque<Vec<u8>>,
    members: HashSet<Vec<u8>>,
}

impl Order {
    fn push_back(&mut self, key: &[u8]) {
        if self.members.insert(key.to_vec()) {
            self.queue.push_back(key.to_vec());
        }
    }

    fn remove(&mut self, key: &[u8]) {
        if self.members.remove(key) {
            self.queue.retain(|candidate| candidate != key);
        }
    }

    fn move_to_back(&mut self, key: &[u8]) {
        self.remove(key);
        self.push_back(key);
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.members.clear();
    }
}

/// Key/value cache with K-th-access eviction.
#[derive(Debug)]
pub struct LrukCache {
    k: usize,
    max_size: usize,
    max_memory: usize,
    clock: u64,
    map: HashMap<Vec<u8>, Entry>,
    order: Order,
    current_memory: usize,
    stats: CacheStats,
}

impl LrukCache {
    #[must_use]
    pub fn new(config: LrukConfig) -> Self {
        Self {
            k: config.k.max(1),
            max_size: config.max_size,
            max_memory: config.max_memory,
            clock: 0,
            map: HashMap::new(),
            order: Order::default(),
            current_memory: 0,
            stats: CacheStats::default(),
        }
    }

    /// A count-bounded cache with the default K of 2.
    #[must_use]
    pub fn with_max_size(max_size: usize) -> Self {
        Self::new(LrukConfig {
            max_size,
            ..LrukConfig::default()
        })
    }

    /// Look up a value, recording the access on hit.
    pub fn get(&mut self, key: &[u8]) -> Option<&[u8]> {
        if !self.map.contains_key(key) {
            self.stats.misses += 1;
            return None;
        }
        self.tick_access(key);
        self.order.move_to_back(key);
        self.stats.hits += 1;
        self.map.get(key).map(|entry| entry.value.as_slice())
    }

    /// Upsert a value. Insertion counts as an access. When `evict` is set
    /// and a bound is exceeded, entries are evicted until the bounds hold
    /// again; the last evicted pair is returned.
    pub fn set(&mut self, key: &[u8], value: Vec<u8>, evict: bool) -> Option<(Vec<u8>, Vec<u8>)> {
        let entry_memory = key.len() + value.len();
        if let Some(existing) = self.map.get_mut(key) {
            self.current_memory -= key.len() + existing.value.len();
            existing.value = value;
        } else {
            self.map.insert(
                key.to_vec(),
                Entry {
                    value,
                    history: VecDeque::with_capacity(self.k),
                },
            );
        }
        self.current_memory += entry_memory;
        self.tick_access(key);
        self.order.move_to_back(key);
        self.stats.sets += 1;

        let mut evicted = None;
        if evict {
            while self.over_limit() {
                match self.evict() {
                    Some(pair) => evicted = Some(pair),
                    None => break,
                }
            }
        }
        evicted
    }

    /// Remove and return the current victim, or `None` when empty.
    ///
    /// Victim order: entries with fewer than K recorded accesses first
    /// (oldest first access wins), then entries with full history by the
    /// oldest tick in their K-window.
    pub fn evict(&mut self) -> Option<(Vec<u8>, Vec<u8>)> {
        let victim = self
            .order
            .queue
            .iter()
            .min_by_key(|key| {
                let history = &self.map[key.as_slice()].history;
                let full = history.len() >= self.k;
                (full, history.front().copied().unwrap_or(0))
            })?
            .clone();

        let entry = self.map.remove(&victim)?;
        self.order.remove(&victim);
        self.current_memory -= victim.len() + entry.value.len();
        self.stats.evictions += 1;
        trace!(key_len = victim.len(), "lru-k eviction");
        Some((victim, entry.value))
    }

    /// Explicit removal with eviction bookkeeping.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        let Some(entry) = self.map.remove(key) else {
            return false;
        };
        self.order.remove(key);
        self.current_memory -= key.len() + entry.value.len();
        self.stats.deletes += 1;
        true
    }

    /// Drop every entry; optionally reset the counters too.
    pub fn clear(&mut self, reset_stats: bool) {
        self.map.clear();
        self.order.clear();
        self.current_memory = 0;
        if reset_stats {
            self.stats = CacheStats::default();
        }
    }

    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bytes held, counting keys and values.
    #[must_use]
    pub fn current_memory(&self) -> usize {
        self.current_memory
    }

    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Keys from most to least recently used.
    #[must_use]
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.order.queue.iter().rev().cloned().collect()
    }

    fn over_limit(&self) -> bool {
        (self.max_size > 0 && self.map.len() > self.max_size)
            || (self.max_memory > 0 && self.current_memory > self.max_memory)
    }

    fn tick_access(&mut self, key: &[u8]) {
        self.clock += 1;
        let k = self.k;
        if let Some(entry) = self.map.get_mut(key) {
            entry.history.push_back(self.clock);
            while entry.history.len() > k {
                entry.history.pop_front();
            }
        }
    }
}
