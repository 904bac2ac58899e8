//! Memory infrastructure: a segmented byte pool with latching and
//! compaction, growable typed integer buffers, and an LRU-K cache.
//!
//! The pool stages intermediate query artifacts; the cache keeps hot
//! artifacts resident; the buffers are the write side of the columnar
//! decoder and the join paths.

pub mod intbuf;
pub mod lruk;
pub mod pool;

pub use intbuf::{Int32Buffer, IntBuffer};
pub use lruk::{CacheStats, LrukCache, LrukConfig};
pub use pool::{MemoryPool, MemoryPoolConfig, PoolStats, RefId};
