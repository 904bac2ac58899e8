//! Segmented memory pool with commit/read/release, latching, and
//! two-level compaction.
//!
//! The pool owns one contiguous byte region partitioned into free and
//! used segments, sorted by start offset. Committed payloads are named by
//! opaque monotonically increasing ref ids. Allocation is best-fit; on
//! failure the pool first merges adjacent free segments (L1), then slides
//! unlatched used segments toward the start (L2), then optionally doubles
//! its capacity before reporting failure to the caller.
//!
//! All public operations serialize on the pool's lock. A segment with a
//! non-zero latch count keeps its start offset across every operation
//! until it is unlatched or released.

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::debug;

use harrier_error::{HarrierError, Result};

/// Opaque handle naming one used segment of one pool instance.
pub type RefId = u64;

/// Pool construction parameters.
#[derive(Debug, Clone)]
pub struct MemoryPoolConfig {
    /// Initial capacity in bytes.
    pub size: usize,
    /// Power-of-two allocation alignment. 1 means no padding.
    pub alignment: usize,
    /// Permit capacity doubling when an allocation cannot be satisfied.
    pub auto_resize: bool,
}

impl Default for MemoryPoolConfig {
    fn default() -> Self {
        Self {
            size: 8 * 1024 * 1024,
            alignment: 1,
            auto_resize: false,
        }
    }
}

/// Monotonic operation counters plus a capacity snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub commits: u64,
    pub failed_commits: u64,
    pub reads: u64,
    pub releases: u64,
    pub l1_compactions: u64,
    pub l2_compactions: u64,
    pub resizes: u64,
    pub capacity: usize,
    pub bytes_in_use: usize,
    pub free_bytes: usize,
    pub used_segments: usize,
    pub free_segments: usize,
}

#[derive(Debug, Clone)]
struct Segment {
    start: usize,
    len: usize,
    free: bool,
    latches: u32,
    ref_id: Option<RefId>,
    /// Caller-visible length; `len` includes alignment padding.
    used_len: usize,
    /// Set between `reserve_for_write` and `finalize_commit`.
    reserved: bool,
}

impl Segment {
    fn free_at(start: usize, len: usize) -> Self {
        Self {
            start,
            len,
            free: true,
            latches: 0,
            ref_id: None,
            used_len: 0,
            reserved: false,
        }
    }
}

#[derive(Debug)]
struct PoolInner {
    data: Vec<u8>,
    /// Sorted by `start`; free and used segments partition `[0, data.len())`.
    segments: Vec<Segment>,
    /// Ref id -> segment start offset.
    by_ref: HashMap<RefId, usize>,
    next_ref: RefId,
    alignment: usize,
    auto_resize: bool,
    stats: PoolStats,
}

/// Segmented memory pool. Cloneable handles are not provided; share the
/// pool behind an `Arc` when multiple queries stage through it.
#[derive(Debug)]
pub struct MemoryPool {
    inner: Mutex<PoolInner>,
}

impl MemoryPool {
    /// Create a pool from its configuration.
    #[must_use]
    pub fn new(config: MemoryPoolConfig) -> Self {
        debug_assert!(
            config.alignment.is_power_of_two(),
            "alignment must be a power of two"
        );
        let size = config.size;
        Self {
            inner: Mutex::new(PoolInner {
                data: vec![0; size],
                segments: vec![Segment::free_at(0, size)],
                by_ref: HashMap::new(),
                next_ref: 0,
                alignment: config.alignment.max(1),
                auto_resize: config.auto_resize,
                stats: PoolStats::default(),
            }),
        }
    }

    /// Create a pool of `size` bytes with default alignment and no resize.
    #[must_use]
    pub fn with_size(size: usize) -> Self {
        Self::new(MemoryPoolConfig {
            size,
            ..MemoryPoolConfig::default()
        })
    }

    /// Copy `bytes` into the pool and return its handle, or `None` when
    /// the request cannot be satisfied even after both compaction levels
    /// and (if enabled) a resize.
    pub fn commit(&self, bytes: &[u8]) -> Option<RefId> {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.allocate(bytes.len()) else {
            inner.stats.failed_commits += 1;
            debug!(requested = bytes.len(), "pool commit failed");
            return None;
        };
        let (start, _capacity) = slot;
        inner.data[start..start + bytes.len()].copy_from_slice(bytes);
        let ref_id = inner.assign_ref(start, bytes.len(), false);
        inner.stats.commits += 1;
        Some(ref_id)
    }

    /// Allocate a writable segment of at least `size` bytes, latch it,
    /// and return `(ref_id, capacity)`. The segment cannot move until
    /// [`MemoryPool::finalize_commit`] runs.
    pub fn reserve_for_write(&self, size: usize) -> Result<(RefId, usize)> {
        let mut inner = self.inner.lock();
        let Some((start, capacity)) = inner.allocate(size) else {
            inner.stats.failed_commits += 1;
            let available = inner.free_total();
            return Err(HarrierError::CapacityExceeded {
                requested: size,
                available,
            });
        };
        let ref_id = inner.assign_ref(start, 0, true);
        let idx = inner
            .segment_index(ref_id)
            .ok_or_else(|| HarrierError::internal("freshly assigned ref must resolve"))?;
        inner.segments[idx].latches = 1;
        Ok((ref_id, capacity))
    }

    /// Write into a reserved segment at `offset`.
    pub fn write_reserved(&self, ref_id: RefId, offset: usize, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        let idx = inner
            .segment_index(ref_id)
            .ok_or(HarrierError::InvalidRef { ref_id })?;
        let segment = &inner.segments[idx];
        if !segment.reserved {
            return Err(HarrierError::internal(format!(
                "ref {ref_id} is not an open reservation"
            )));
        }
        if offset + bytes.len() > segment.len {
            return Err(HarrierError::out_of_range(
                "reserved write range",
                offset + bytes.len(),
            ));
        }
        let start = segment.start;
        inner.data[start + offset..start + offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Record the final length of a reserved segment and unlatch it.
    pub fn finalize_commit(&self, ref_id: RefId, actual_len: usize) -> Result<()> {
        let mut inner = self.inner.lock();
        let idx = inner
            .segment_index(ref_id)
            .ok_or(HarrierError::InvalidRef { ref_id })?;
        let segment = &mut inner.segments[idx];
        if !segment.reserved {
            return Err(HarrierError::internal(format!(
                "ref {ref_id} is not an open reservation"
            )));
        }
        if actual_len > segment.len {
            return Err(HarrierError::out_of_range("finalized length", actual_len));
        }
        segment.used_len = actual_len;
        segment.reserved = false;
        segment.latches = segment.latches.saturating_sub(1);
        inner.stats.commits += 1;
        Ok(())
    }

    /// Copy out the stored bytes for a handle.
    pub fn read(&self, ref_id: RefId) -> Result<Vec<u8>> {
        self.read_with(ref_id, <[u8]>::to_vec)
    }

    /// Zero-copy read: the slice is valid only inside the closure, which
    /// runs under the pool lock (the Rust rendering of "view valid until
    /// the next mutating call").
    pub fn read_with<R>(&self, ref_id: RefId, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let mut inner = self.inner.lock();
        let idx = inner
            .segment_index(ref_id)
            .ok_or(HarrierError::InvalidRef { ref_id })?;
        let segment = &inner.segments[idx];
        let (start, used_len) = (segment.start, segment.used_len);
        inner.stats.reads += 1;
        Ok(f(&inner.data[start..start + used_len]))
    }

    /// Increment the latch count, pinning the segment in place across
    /// calls until a matching [`MemoryPool::unlatch`].
    pub fn latch(&self, ref_id: RefId) -> Result<()> {
        let mut inner = self.inner.lock();
        let idx = inner
            .segment_index(ref_id)
            .ok_or(HarrierError::InvalidRef { ref_id })?;
        inner.segments[idx].latches += 1;
        Ok(())
    }

    /// Decrement the latch count.
    pub fn unlatch(&self, ref_id: RefId) -> Result<()> {
        let mut inner = self.inner.lock();
        let Some(idx) = inner.segment_index(ref_id) else {
            // Releases clear latches; a later unlatch is NotLatched, not
            // InvalidRef.
            return Err(HarrierError::NotLatched { ref_id });
        };
        let segment = &mut inner.segments[idx];
        if segment.latches == 0 {
            return Err(HarrierError::NotLatched { ref_id });
        }
        segment.latches -= 1;
        Ok(())
    }

    /// Free a segment, clearing any latches, and merge adjacent frees.
    pub fn release(&self, ref_id: RefId) -> Result<()> {
        let mut inner = self.inner.lock();
        let idx = inner
            .segment_index(ref_id)
            .ok_or(HarrierError::InvalidRef { ref_id })?;
        let segment = &mut inner.segments[idx];
        segment.free = true;
        segment.latches = 0;
        segment.ref_id = None;
        segment.used_len = 0;
        segment.reserved = false;
        inner.by_ref.remove(&ref_id);
        inner.merge_adjacent_free();
        inner.stats.releases += 1;
        Ok(())
    }

    /// Total free bytes.
    #[must_use]
    pub fn available_space(&self) -> usize {
        self.inner.lock().free_total()
    }

    /// Fragmentation in `[0, 1]`: zero when all free space is one block.
    #[must_use]
    pub fn get_fragmentation(&self) -> f64 {
        let inner = self.inner.lock();
        let total = inner.free_total();
        if total == 0 {
            return 0.0;
        }
        let largest = inner
            .segments
            .iter()
            .filter(|s| s.free)
            .map(|s| s.len)
            .max()
            .unwrap_or(0);
        1.0 - (largest as f64 / total as f64)
    }

    /// Counter and capacity snapshot.
    #[must_use]
    pub fn get_stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.capacity = inner.data.len();
        stats.free_bytes = inner.free_total();
        stats.bytes_in_use = inner.data.len() - stats.free_bytes;
        stats.used_segments = inner.segments.iter().filter(|s| !s.free).count();
        stats.free_segments = inner.segments.iter().filter(|s| s.free).count();
        stats
    }

    #[cfg(test)]
    fn segment_start(&self, ref_id: RefId) -> Option<usize> {
        self.inner.lock().by_ref.get(&ref_id).copied()
    }

    #[cfg(test)]
    fn check_partition(&self) {
        let inner = self.inner.lock();
        let mut cursor = 0;
        for segment in &inner.segments {
            assert_eq!(segment.start, cursor, "segments must be contiguous");
            cursor += segment.len;
        }
        assert_eq!(cursor, inner.data.len(), "segments must cover the pool");
        let used_by_map: std::collections::BTreeSet<usize> =
            inner.by_ref.values().copied().collect();
        let used_by_scan: std::collections::BTreeSet<usize> = inner
            .segments
            .iter()
            .filter(|s| !s.free)
            .map(|s| s.start)
            .collect();
        assert_eq!(used_by_map, used_by_scan, "ref map must mirror used segments");
    }
}

impl PoolInner {
    fn align_up(&self, len: usize) -> usize {
        let unit = self.alignment;
        // A zero-length commit still occupies one alignment unit so the
        // segment map stays a strict partition.
        let len = len.max(1);
        (len + unit - 1) & !(unit - 1)
    }

    fn free_total(&self) -> usize {
        self.segments.iter().filter(|s| s.free).map(|s| s.len).sum()
    }

    fn segment_index(&self, ref_id: RefId) -> Option<usize> {
        let start = *self.by_ref.get(&ref_id)?;
        self.segments
            .binary_search_by_key(&start, |s| s.start)
            .ok()
            .filter(|&idx| !self.segments[idx].free)
    }

    /// Best-fit allocation with L1, then L2, then resize retries.
    /// Returns `(start, capacity)` of a carved used slot, not yet
    /// assigned a ref id.
    fn allocate(&mut self, requested: usize) -> Option<(usize, usize)> {
        let aligned = self.align_up(requested);

        if let Some(slot) = self.try_carve(aligned) {
            return Some(slot);
        }
        if self.merge_adjacent_free() {
            self.stats.l1_compactions += 1;
            debug!(requested, "pool L1 compaction");
            if let Some(slot) = self.try_carve(aligned) {
                return Some(slot);
            }
        }
        if self.defragment() {
            self.stats.l2_compactions += 1;
            debug!(requested, "pool L2 compaction");
            if let Some(slot) = self.try_carve(aligned) {
                return Some(slot);
            }
        }
        if self.auto_resize {
            self.grow(aligned);
            if let Some(slot) = self.try_carve(aligned) {
                return Some(slot);
            }
        }
        None
    }

    /// Carve `aligned` bytes out of the best-fitting free segment.
    fn try_carve(&mut self, aligned: usize) -> Option<(usize, usize)> {
        let best = self
            .segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.free && s.len >= aligned)
            .min_by_key(|(_, s)| s.len)?
            .0;

        let excess = self.segments[best].len - aligned;
        let start = self.segments[best].start;
        if excess > 0 {
            let tail = Segment::free_at(start + aligned, excess);
            self.segments[best].len = aligned;
            self.segments.insert(best + 1, tail);
        }
        let segment = &mut self.segments[best];
        segment.free = false;
        Some((start, segment.len))
    }

    fn assign_ref(&mut self, start: usize, used_len: usize, reserved: bool) -> RefId {
        let ref_id = self.next_ref;
        self.next_ref += 1;
        if let Ok(idx) = self.segments.binary_search_by_key(&start, |s| s.start) {
            let segment = &mut self.segments[idx];
            segment.ref_id = Some(ref_id);
            segment.used_len = used_len;
            segment.reserved = reserved;
        }
        self.by_ref.insert(ref_id, start);
        ref_id
    }

    /// L1 compaction: merge adjacent free segments in one pass.
    fn merge_adjacent_free(&mut self) -> bool {
        let mut merged = false;
        let mut idx = 0;
        while idx + 1 < self.segments.len() {
            if self.segments[idx].free && self.segments[idx + 1].free {
                let extra = self.segments[idx + 1].len;
                self.segments[idx].len += extra;
                self.segments.remove(idx + 1);
                merged = true;
            } else {
                idx += 1;
            }
        }
        merged
    }

    /// L2 compaction: slide unlatched used segments toward the start,
    /// preserving their relative order. Latched segments are pinned; the
    /// gap in front of one is skipped and stays free.
    fn defragment(&mut self) -> bool {
        let size = self.data.len();
        let old = std::mem::take(&mut self.segments);
        let mut rebuilt: Vec<Segment> = Vec::with_capacity(old.len());
        let mut cursor = 0;
        let mut moved = false;

        for mut segment in old {
            if segment.free {
                continue;
            }
            if segment.latches > 0 {
                if cursor < segment.start {
                    rebuilt.push(Segment::free_at(cursor, segment.start - cursor));
                }
                cursor = segment.start + segment.len;
                rebuilt.push(segment);
                continue;
            }
            if segment.start != cursor {
                self.data.copy_within(segment.start..segment.start + segment.len, cursor);
                if let Some(ref_id) = segment.ref_id {
                    self.by_ref.insert(ref_id, cursor);
                }
                segment.start = cursor;
                moved = true;
            }
            cursor += segment.len;
            rebuilt.push(segment);
        }
        if cursor < size {
            rebuilt.push(Segment::free_at(cursor, size - cursor));
        }
        rebuilt.sort_by_key(|s| s.start);
        self.segments = rebuilt;
        moved
    }

    /// Double capacity, or grow enough to fit `needed`, whichever is
    /// larger. The new space is appended as one free segment.
    fn grow(&mut self, needed: usize) {
        let old_size = self.data.len();
        let new_size = (old_size * 2).max(old_size + needed);
        self.data.resize(new_size, 0);
        self.segments
            .push(Segment::free_at(old_size, new_size - old_size));
        self.merge_adjacent_free();
        self.stats.resizes += 1;
        debug!(old_size, new_size, "pool resized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pool_1k() -> MemoryPool {
        MemoryPool::with_size(1024)
    }

    #[test]
    fn commit_read_release_accounting() {
        let pool = pool_1k();
        let r1 = pool.commit(b"ABCDEF").expect("commit r1");
        let r2 = pool.commit(b"XYZ").expect("commit r2");

        assert_eq!(pool.read(r1).unwrap(), b"ABCDEF");
        assert_eq!(pool.read(r2).unwrap(), b"XYZ");
        assert_eq!(pool.available_space(), 1024 - 9);

        pool.release(r1).unwrap();
        let err = pool.read(r1).unwrap_err();
        assert!(matches!(err, HarrierError::InvalidRef { ref_id } if ref_id == r1));
        assert_eq!(pool.available_space(), 1024 - 3);
        pool.check_partition();
    }

    #[test]
    fn ref_ids_are_strictly_increasing() {
        let pool = pool_1k();
        let mut last = None;
        for _ in 0..10 {
            let id = pool.commit(b"x").unwrap();
            if let Some(prev) = last {
                assert!(id > prev);
            }
            last = Some(id);
        }
    }

    #[test]
    fn zero_length_commit_round_trips() {
        let pool = pool_1k();
        let ref_id = pool.commit(b"").expect("zero-length commit is valid");
        assert_eq!(pool.read(ref_id).unwrap(), Vec::<u8>::new());
        pool.release(ref_id).unwrap();
        assert!(matches!(
            pool.read(ref_id),
            Err(HarrierError::InvalidRef { .. })
        ));
    }

    #[test]
    fn double_release_is_invalid_ref() {
        let pool = pool_1k();
        let ref_id = pool.commit(b"abc").unwrap();
        pool.release(ref_id).unwrap();
        assert!(matches!(
            pool.release(ref_id),
            Err(HarrierError::InvalidRef { .. })
        ));
    }

    #[test]
    fn commit_failure_returns_sentinel_and_counts() {
        let pool = MemoryPool::with_size(16);
        assert!(pool.commit(&[0_u8; 32]).is_none());
        let stats = pool.get_stats();
        assert_eq!(stats.failed_commits, 1);
        assert_eq!(stats.commits, 0);
    }

    #[test]
    fn l1_merge_reclaims_released_neighbors() {
        let pool = MemoryPool::with_size(32);
        let a = pool.commit(&[1_u8; 8]).unwrap();
        let b = pool.commit(&[2_u8; 8]).unwrap();
        let c = pool.commit(&[3_u8; 8]).unwrap();
        pool.release(a).unwrap();
        pool.release(b).unwrap();
        // The two released neighbors merge into one 16-byte hole.
        let d = pool.commit(&[4_u8; 16]).unwrap();
        assert_eq!(pool.read(d).unwrap(), vec![4_u8; 16]);
        assert_eq!(pool.read(c).unwrap(), vec![3_u8; 8]);
        pool.check_partition();
    }

    #[test]
    fn l2_defragment_moves_unlatched_segments() {
        let pool = MemoryPool::with_size(32);
        let a = pool.commit(&[1_u8; 8]).unwrap();
        let b = pool.commit(&[2_u8; 8]).unwrap();
        let c = pool.commit(&[3_u8; 8]).unwrap();
        pool.release(b).unwrap();
        // Free space is split 8 + 8 around c; only L2 can produce a
        // 12-byte slot.
        let d = pool.commit(&[4_u8; 12]).expect("L2 packs c leftward");
        assert_eq!(pool.read(a).unwrap(), vec![1_u8; 8]);
        assert_eq!(pool.read(c).unwrap(), vec![3_u8; 8]);
        assert_eq!(pool.read(d).unwrap(), vec![4_u8; 12]);
        assert!(pool.get_stats().l2_compactions >= 1);
        pool.check_partition();
    }

    #[test]
    fn latched_segment_never_moves() {
        let pool = MemoryPool::with_size(64);
        let a = pool.commit(&[1_u8; 8]).unwrap();
        let b = pool.commit(&[2_u8; 8]).unwrap();
        pool.latch(b).unwrap();
        let b_start = pool.segment_start(b).unwrap();
        pool.release(a).unwrap();
        // Force L2: free space is 8 (front) + 48 (back); ask for 52.
        assert!(pool.commit(&[3_u8; 52]).is_none());
        assert_eq!(pool.segment_start(b), Some(b_start), "latched segment moved");
        assert_eq!(pool.read(b).unwrap(), vec![2_u8; 8]);

        pool.unlatch(b).unwrap();
        let c = pool.commit(&[3_u8; 52]).expect("unlatched segment may move");
        assert_eq!(pool.read(c).unwrap(), vec![3_u8; 52]);
        assert_eq!(pool.read(b).unwrap(), vec![2_u8; 8]);
        pool.check_partition();
    }

    #[test]
    fn unlatch_without_latch_fails() {
        let pool = pool_1k();
        let a = pool.commit(b"abc").unwrap();
        assert!(matches!(
            pool.unlatch(a),
            Err(HarrierError::NotLatched { .. })
        ));
        pool.latch(a).unwrap();
        pool.release(a).unwrap();
        // Release cleared the latch.
        assert!(matches!(
            pool.unlatch(a),
            Err(HarrierError::NotLatched { .. })
        ));
    }

    #[test]
    fn reserve_write_finalize_round_trip() {
        let pool = pool_1k();
        let (ref_id, capacity) = pool.reserve_for_write(16).unwrap();
        assert!(capacity >= 16);
        pool.write_reserved(ref_id, 0, b"hello ").unwrap();
        pool.write_reserved(ref_id, 6, b"world").unwrap();
        pool.finalize_commit(ref_id, 11).unwrap();
        assert_eq!(pool.read(ref_id).unwrap(), b"hello world");
        // Finalize released the write latch.
        assert!(matches!(
            pool.unlatch(ref_id),
            Err(HarrierError::NotLatched { .. })
        ));
    }

    #[test]
    fn reserved_segment_is_pinned_until_finalize() {
        let pool = MemoryPool::with_size(64);
        let a = pool.commit(&[1_u8; 8]).unwrap();
        let (r, _) = pool.reserve_for_write(8).unwrap();
        let r_start = pool.segment_start(r).unwrap();
        pool.release(a).unwrap();
        let _ = pool.commit(&[2_u8; 52]);
        assert_eq!(pool.segment_start(r), Some(r_start));
        pool.write_reserved(r, 0, &[9_u8; 8]).unwrap();
        pool.finalize_commit(r, 8).unwrap();
        assert_eq!(pool.read(r).unwrap(), vec![9_u8; 8]);
    }

    #[test]
    fn auto_resize_doubles_capacity() {
        let pool = MemoryPool::new(MemoryPoolConfig {
            size: 16,
            alignment: 1,
            auto_resize: true,
        });
        let a = pool.commit(&[7_u8; 24]).expect("resize admits the commit");
        assert_eq!(pool.read(a).unwrap(), vec![7_u8; 24]);
        let stats = pool.get_stats();
        assert!(stats.resizes >= 1);
        assert!(stats.capacity >= 32);
        pool.check_partition();
    }

    #[test]
    fn alignment_pads_segment_lengths() {
        let pool = MemoryPool::new(MemoryPoolConfig {
            size: 64,
            alignment: 8,
            auto_resize: false,
        });
        let a = pool.commit(b"abc").unwrap();
        assert_eq!(pool.read(a).unwrap(), b"abc");
        // 3 bytes occupy one 8-byte unit.
        assert_eq!(pool.available_space(), 56);
    }

    #[test]
    fn fragmentation_reflects_free_split() {
        let pool = MemoryPool::with_size(32);
        assert!(pool.get_fragmentation().abs() < f64::EPSILON);
        let a = pool.commit(&[1_u8; 8]).unwrap();
        let _b = pool.commit(&[2_u8; 8]).unwrap();
        pool.release(a).unwrap();
        // Free: 8 front + 16 back.
        let frag = pool.get_fragmentation();
        assert!(frag > 0.0 && frag < 1.0);
    }

    proptest! {
        /// Partition invariant: after any commit/release interleaving the
        /// segments remain contiguous, sorted, and mirrored by the ref map.
        #[test]
        fn partition_holds_under_random_traffic(ops in proptest::collection::vec(0_u8..4, 1..64)) {
            let pool = MemoryPool::with_size(256);
            let mut live: Vec<RefId> = Vec::new();
            for op in ops {
                match op {
                    0 | 1 => {
                        if let Some(id) = pool.commit(&[op; 24]) {
                            live.push(id);
                        }
                    }
                    2 => {
                        if !live.is_empty() {
                            let id = live.remove(live.len() / 2);
                            pool.release(id).unwrap();
                        }
                    }
                    _ => {
                        if let Some(&id) = live.first() {
                            prop_assert_eq!(pool.read(id).unwrap().len(), 24);
                        }
                    }
                }
                pool.check_partition();
            }
        }

        /// Latched segments keep their start across arbitrary traffic.
        #[test]
        fn latched_start_is_stable(ops in proptest::collection::vec(0_u8..3, 1..48)) {
            let pool = MemoryPool::with_size(256);
            let _pad = pool.commit(&[0_u8; 16]).unwrap();
            let pinned = pool.commit(&[9_u8; 16]).unwrap();
            pool.latch(pinned).unwrap();
            let pinned_start = pool.segment_start(pinned).unwrap();

            let mut live: Vec<RefId> = Vec::new();
            for op in ops {
                match op {
                    0 => {
                        if let Some(id) = pool.commit(&[op; 20]) {
                            live.push(id);
                        }
                    }
                    1 => {
                        if !live.is_empty() {
                            let id = live.remove(0);
                            pool.release(id).unwrap();
                        }
                    }
                    _ => {
                        let _ = pool.commit(&[1_u8; 200]);
                    }
                }
                prop_assert_eq!(pool.segment_start(pinned), Some(pinned_start));
            }
            prop_assert_eq!(pool.read(pinned).unwrap(), vec![9_u8; 16]);
        }
    }
}
