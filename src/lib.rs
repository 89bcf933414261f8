//! safe-hashmap: a single-threaded chained hash map that resists hash
//! flooding by escalating overlong buckets to red-black trees.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep `get`/`put`/`remove` close to O(1) on ordinary input and
//!   bounded by O(log n) per bucket when many keys collide.
//! - Layers:
//!   - `mixer`: folds the `BuildHasher` output to 32 bits and spreads high
//!     bits into low bits before indexing.
//!   - `chain`: `Box`-linked buckets, appended at the tail so order is
//!     stable across splits.
//!   - `tree`: red-black tree buckets whose nodes live in one `SlotMap`
//!     arena per map, threaded in insertion order.
//!   - `table`: the power-of-two bucket array and the resize engine that
//!     splits every bucket by one hash bit.
//!   - `SafeHashMap<K, V, S>`: public API; owns the table, the tree arena
//!     and the size/threshold bookkeeping.
//!
//! Constraints
//! - Single-threaded: no locks, no atomics. Mutation takes `&mut self`.
//! - Table length is always a power of two, or zero before the first insert.
//! - `threshold == floor(capacity * load_factor)` until capacity reaches
//!   `MAXIMUM_CAPACITY`; then growth stops and the threshold saturates.
//! - A bucket is a tree only while it holds more than `UNTREEIFY_THRESHOLD`
//!   entries, and only ever became one in a table of at least
//!   `MIN_TREEIFY_CAPACITY` buckets.
//!
//! Escalation
//! - A chain reaching `TREEIFY_THRESHOLD` entries is converted to a tree,
//!   or the table doubles instead while it is shorter than
//!   `MIN_TREEIFY_CAPACITY`.
//! - Trees go back to chains when removal leaves them with six or fewer
//!   entries, and when a resize split leaves a half that small. A split
//!   that sends every node to one half keeps the tree as it is.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its mixed 32-bit hash. Resizing and tree ordering
//!   use the stored hash; `K: Hash` is never invoked after insertion.
//! - Inside a tree, keys are ordered by `(hash, KeyOrder)`. Maps built with
//!   `K: Ord` use the natural order. `KeyOrder::insertion()` supports keys
//!   without a total order at the cost of equality scans among keys that
//!   share a mixed hash.
//!
//! Notes and non-goals
//! - No concurrent access, persistence, or lookups by borrowed forms of `K`.
//! - Absent-style keys are modelled by the caller as `Option<K>`.
//! - `validate()` walks the whole structure; use it in tests, not hot paths.
//! - With the `tracing` feature, table growth, escalation and
//!   de-escalation emit `tracing::debug!` events.

mod chain;
mod config;
mod error;
mod map;
mod mixer;
mod safe_hash_map_proptest;
mod table;
mod tree;

// Public surface
pub use config::{
    MapConfig, DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR, MAXIMUM_CAPACITY, MIN_TREEIFY_CAPACITY,
    TREEIFY_THRESHOLD, UNTREEIFY_THRESHOLD,
};
pub use error::{ConfigError, InvariantViolation};
pub use map::{BucketKind, Iter, SafeHashMap};
pub use mixer::{fold, mix};
pub use tree::KeyOrder;
