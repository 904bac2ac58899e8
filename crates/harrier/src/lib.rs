//! HarrierDB: the execution-critical core of an embedded analytical SQL
//! query engine.
//!
//! Four subsystems, composed bottom-up:
//!
//! - **Memory infrastructure** ([`pool`]): a segmented byte pool with
//!   latching and two-level compaction, growable typed integer buffers,
//!   and an LRU-K cache.
//! - **Join and distinct primitives** ([`hash`]): null-aware row
//!   hashing over columnar batches, insertion-ordered hash tables, hash
//!   sets, and tiered bloom filters.
//! - **Columnar decoding** ([`jsonl`]): a schema-inferring,
//!   projection-aware JSONL decoder producing typed columnar batches.
//! - **Plan optimization** ([`plan`], [`planner`]): a logical plan
//!   model with stable node identity and a fixed-order rule pipeline
//!   over it.

pub use harrier_error::{HarrierError, Result};
pub use harrier_types::{
    encode_ordered, Batch, Column, ColumnData, ColumnSpec, ColumnType, ScalarValue,
    ValidityBitmap, NO_VALUE_SENTINEL,
};

pub mod pool {
    pub use harrier_pool::{
        CacheStats, Int32Buffer, IntBuffer, LrukCache, LrukConfig, MemoryPool, MemoryPoolConfig,
        PoolStats, RefId,
    };
}

pub mod hash {
    pub use harrier_hash::{
        hash_rows, non_null_indices, BloomFilter, HashSet64, HashTable, NULL_HASH_SENTINEL,
    };
}

pub mod jsonl {
    pub use harrier_jsonl::{decode, DecodeBatches, Decoded, Decoder, DecoderConfig, JsonType};
}

pub mod plan {
    pub use harrier_plan::{expr, AttrValue, ColumnRef, CompareOp, NodeId, NodeType, PlanNode};
}

pub mod planner {
    pub use harrier_planner::{
        run_strategy, OptimizeContext, Optimizer, OptimizerStrategy, QueryStatistics,
        RelationStatistics,
    };
}
