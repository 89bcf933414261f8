//! SafeHashMap: chained hash map whose overlong buckets escalate to trees.

use crate::chain::{self, ChainPut, Entry};
use crate::config::{self, MapConfig, MIN_TREEIFY_CAPACITY, TREEIFY_THRESHOLD, UNTREEIFY_THRESHOLD};
use crate::error::{ConfigError, InvariantViolation};
use crate::mixer::{fold, mix, table_size_for};
use crate::table::{Bucket, Table};
use crate::tree::{KeyOrder, NodeId, Trees};
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::mem;
use std::collections::hash_map::RandomState;

/// Representation of the bucket a key maps to, as reported by
/// [`SafeHashMap::bucket_kind`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BucketKind {
    Empty,
    Chain { len: usize },
    Tree { len: usize },
}

/// Hash map with separate chaining and red-black tree buckets.
///
/// Keys are hashed with `S`, folded to 32 bits and mixed before indexing.
/// A bucket whose chain reaches [`TREEIFY_THRESHOLD`](Self::TREEIFY_THRESHOLD)
/// entries becomes a tree once the table holds at least
/// [`MIN_TREEIFY_CAPACITY`](Self::MIN_TREEIFY_CAPACITY) buckets, so lookups in
/// a flooded bucket stay logarithmic when a key order is available.
pub struct SafeHashMap<K, V, S = RandomState> {
    table: Table<K, V>,
    trees: Trees<K, V>,
    len: usize,
    // Zero until the table is allocated.
    threshold: usize,
    initial_capacity: usize,
    config: MapConfig,
    hasher: S,
}

impl<K, V> SafeHashMap<K, V>
where
    K: Hash + Ord,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    /// Map whose first table holds `capacity` rounded up to a power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_parts(
            MapConfig::default().with_initial_capacity(capacity),
            RandomState::new(),
            KeyOrder::natural(),
        )
    }

    pub fn with_config(config: MapConfig) -> Result<Self, ConfigError> {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K, V, S> SafeHashMap<K, V, S>
where
    K: Hash + Ord,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_parts(MapConfig::default(), hasher, KeyOrder::natural())
    }

    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> Result<Self, ConfigError> {
        Self::with_key_order(config, hasher, KeyOrder::natural())
    }
}

impl<K, V, S> SafeHashMap<K, V, S> {
    pub const DEFAULT_INITIAL_CAPACITY: usize = config::DEFAULT_INITIAL_CAPACITY;
    pub const MAXIMUM_CAPACITY: usize = config::MAXIMUM_CAPACITY;
    pub const DEFAULT_LOAD_FACTOR: f32 = config::DEFAULT_LOAD_FACTOR;
    pub const TREEIFY_THRESHOLD: usize = config::TREEIFY_THRESHOLD;
    pub const UNTREEIFY_THRESHOLD: usize = config::UNTREEIFY_THRESHOLD;
    pub const MIN_TREEIFY_CAPACITY: usize = config::MIN_TREEIFY_CAPACITY;

    /// Map for keys with or without a total order.
    ///
    /// `order` breaks ties between keys that share a mixed hash inside tree
    /// buckets. With [`KeyOrder::insertion`] such keys are found by equality
    /// alone, which is linear in the number of keys sharing that hash.
    pub fn with_key_order(config: MapConfig, hasher: S, order: KeyOrder<K>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config, hasher, order))
    }

    fn from_parts(config: MapConfig, hasher: S, order: KeyOrder<K>) -> Self {
        Self {
            table: Table::unallocated(),
            trees: Trees::new(order),
            len: 0,
            threshold: 0,
            initial_capacity: table_size_for(config.initial_capacity),
            config,
            hasher,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets; zero until the first insert.
    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// Size above which the next insert grows the table.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn load_factor(&self) -> f32 {
        self.config.load_factor
    }

    pub fn key_order(&self) -> KeyOrder<K> {
        self.trees.order()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Number of buckets currently stored as trees.
    pub fn tree_bucket_count(&self) -> usize {
        self.table
            .buckets()
            .iter()
            .filter(|b| matches!(b, Bucket::Tree(_)))
            .count()
    }

    /// Entries in table order: by bucket index, then chain order or the
    /// tree's insertion order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.table.buckets().iter(),
            trees: &self.trees,
            cursor: Cursor::Idle,
            remaining: self.len,
        }
    }

    /// Drop every entry. The table keeps its capacity and threshold.
    pub fn clear(&mut self) {
        self.table.clear();
        self.trees.clear();
        self.len = 0;
    }

    /// Walk the whole structure and check every invariant.
    ///
    /// Cost is linear in the number of entries; meant for tests and debugging.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let (live, tree_nodes) = self.table.check(&self.trees)?;
        let expected = if self.table.is_allocated() {
            self.config.threshold_for(self.table.len())
        } else {
            0
        };
        if self.threshold != expected {
            return Err(InvariantViolation::ThresholdMismatch {
                expected,
                found: self.threshold,
            });
        }
        if live != self.len {
            return Err(InvariantViolation::SizeMismatch {
                expected: self.len,
                found: live,
            });
        }
        if tree_nodes != self.trees.allocated() {
            return Err(InvariantViolation::OrphanedTreeNodes {
                reachable: tree_nodes,
                allocated: self.trees.allocated(),
            });
        }
        Ok(())
    }

    /// Allocate the first table, or double the current one.
    fn resize(&mut self) {
        let old_len = self.table.len();
        if old_len >= config::MAXIMUM_CAPACITY {
            #[cfg(feature = "tracing")]
            tracing::debug!(capacity = old_len, "table at maximum capacity");
            self.threshold = usize::MAX;
            return;
        }
        if old_len == 0 {
            self.table.allocate(self.initial_capacity);
        } else {
            self.table.double(&mut self.trees);
        }
        self.threshold = self.config.threshold_for(self.table.len());
        #[cfg(feature = "tracing")]
        tracing::debug!(
            from = old_len,
            to = self.table.len(),
            threshold = self.threshold,
            len = self.len,
            "table resized"
        );
    }

    /// Escalate the chain at `index`, or grow instead while the table is small.
    fn treeify_bin(&mut self, index: usize) {
        if self.table.len() < MIN_TREEIFY_CAPACITY {
            self.resize();
            return;
        }
        let slot = self.table.bucket_mut(index);
        match mem::take(slot) {
            Bucket::Chain(head) => {
                let bin = self.trees.treeify(head);
                #[cfg(feature = "tracing")]
                tracing::debug!(bucket = index, len = bin.len, "treeify bucket");
                *slot = Bucket::Tree(bin);
            }
            other => *slot = other,
        }
    }
}

impl<K, V, S> SafeHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn hash_of(&self, key: &K) -> u32 {
        mix(fold(self.hasher.hash_one(key)))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_key_value(key).map(|(_, v)| v)
    }

    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        if !self.table.is_allocated() {
            return None;
        }
        let hash = self.hash_of(key);
        match self.table.bucket(self.table.index_for(hash)) {
            Bucket::Empty => None,
            Bucket::Chain(head) => chain::find(head, hash, key).map(|e| (&e.key, &e.value)),
            Bucket::Tree(bin) => self.trees.find(bin, hash, key).map(|id| {
                let n = self.trees.node(id);
                (&n.key, &n.value)
            }),
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if !self.table.is_allocated() {
            return None;
        }
        let hash = self.hash_of(key);
        let index = self.table.index_for(hash);
        match self.table.bucket_mut(index) {
            Bucket::Empty => None,
            Bucket::Chain(head) => chain::find_mut(head, hash, key).map(|e| &mut e.value),
            Bucket::Tree(bin) => {
                let id = self.trees.find(bin, hash, key)?;
                Some(&mut self.trees.node_mut(id).value)
            }
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get_key_value(key).is_some()
    }

    /// Shape of the bucket `key` maps to, whether or not `key` is present.
    pub fn bucket_kind(&self, key: &K) -> BucketKind {
        if !self.table.is_allocated() {
            return BucketKind::Empty;
        }
        let hash = self.hash_of(key);
        match self.table.bucket(self.table.index_for(hash)) {
            Bucket::Empty => BucketKind::Empty,
            Bucket::Chain(head) => BucketKind::Chain {
                len: chain::len(head),
            },
            Bucket::Tree(bin) => BucketKind::Tree { len: bin.len },
        }
    }

    /// Insert or overwrite. Returns the previous value for `key`, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_of(&key);
        if !self.table.is_allocated() {
            self.resize();
        }
        let index = self.table.index_for(hash);
        let slot = self.table.bucket_mut(index);
        match slot {
            Bucket::Empty => *slot = Bucket::Chain(Box::new(Entry::new(hash, key, value))),
            Bucket::Chain(head) => match chain::put(head, hash, key, value) {
                ChainPut::Replaced(old) => return Some(old),
                ChainPut::Appended(len) => {
                    if len >= TREEIFY_THRESHOLD {
                        self.treeify_bin(index);
                    }
                }
            },
            Bucket::Tree(bin) => {
                if let Some(id) = self.trees.find(bin, hash, &key) {
                    return Some(mem::replace(&mut self.trees.node_mut(id).value, value));
                }
                self.trees.insert(bin, hash, key, value);
            }
        }
        self.len += 1;
        if self.len > self.threshold {
            self.resize();
        }
        debug_assert!(self.table.len().is_power_of_two());
        None
    }

    /// Insert only when `key` is absent.
    ///
    /// Returns the value already stored for `key`, untouched, or `None`
    /// after inserting `value`.
    pub fn put_if_absent(&mut self, key: K, value: V) -> Option<&V> {
        if self.contains_key(&key) {
            return self.get(&key);
        }
        self.put(key, value);
        None
    }

    /// Remove `key`, returning its value.
    ///
    /// A tree bucket left with `UNTREEIFY_THRESHOLD` or fewer entries is
    /// turned back into a chain in insertion order.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        if !self.table.is_allocated() {
            return None;
        }
        let hash = self.hash_of(key);
        let index = self.table.index_for(hash);
        let slot = self.table.bucket_mut(index);
        let (bucket, removed) = match mem::take(slot) {
            Bucket::Empty => (Bucket::Empty, None),
            Bucket::Chain(head) => {
                let mut link = Some(head);
                let removed = chain::remove(&mut link, hash, key);
                (link.map_or(Bucket::Empty, Bucket::Chain), removed)
            }
            Bucket::Tree(mut bin) => match self.trees.find(&bin, hash, key) {
                None => (Bucket::Tree(bin), None),
                Some(id) => {
                    let removed = self.trees.remove(&mut bin, id);
                    let bucket = if bin.len <= UNTREEIFY_THRESHOLD {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(bucket = index, len = bin.len, "untreeify bucket");
                        self.trees.untreeify(bin).map_or(Bucket::Empty, Bucket::Chain)
                    } else {
                        Bucket::Tree(bin)
                    };
                    (bucket, Some(removed))
                }
            },
        };
        *slot = bucket;
        let (_, value) = removed?;
        self.len -= 1;
        Some(value)
    }
}

impl<K, V, S> Default for SafeHashMap<K, V, S>
where
    K: Hash + Ord,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> fmt::Debug for SafeHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Extend<(K, V)> for SafeHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.put(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for SafeHashMap<K, V, S>
where
    K: Hash + Ord,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a SafeHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

enum Cursor<'a, K, V> {
    Idle,
    Chain(&'a Entry<K, V>),
    Tree(NodeId),
}

/// Iterator over the entries of a `SafeHashMap` in table order.
pub struct Iter<'a, K, V> {
    buckets: core::slice::Iter<'a, Bucket<K, V>>,
    trees: &'a Trees<K, V>,
    cursor: Cursor<'a, K, V>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.cursor {
                Cursor::Chain(e) => {
                    self.cursor = e.next.as_deref().map_or(Cursor::Idle, Cursor::Chain);
                    self.remaining -= 1;
                    return Some((&e.key, &e.value));
                }
                Cursor::Tree(id) => {
                    let trees = self.trees;
                    let n = trees.node(id);
                    self.cursor = trees.thread_next(id).map_or(Cursor::Idle, Cursor::Tree);
                    self.remaining -= 1;
                    return Some((&n.key, &n.value));
                }
                Cursor::Idle => {
                    self.cursor = match self.buckets.next()? {
                        Bucket::Empty => Cursor::Idle,
                        Bucket::Chain(head) => Cursor::Chain(&**head),
                        Bucket::Tree(bin) => bin.first.map_or(Cursor::Idle, Cursor::Tree),
                    };
                }
            }
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}
