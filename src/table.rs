//! Bucket table and resize engine.

use crate::chain::{self, Entry};
use crate::config::UNTREEIFY_THRESHOLD;
use crate::error::InvariantViolation;
use crate::tree::{TreeBin, Trees};
use core::mem;

/// One table slot, tagged by representation.
#[derive(Debug)]
pub(crate) enum Bucket<K, V> {
    Empty,
    Chain(Box<Entry<K, V>>),
    Tree(TreeBin),
}

impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Bucket::Empty
    }
}

/// Power-of-two array of buckets. Zero length means not yet allocated.
#[derive(Debug)]
pub(crate) struct Table<K, V> {
    buckets: Vec<Bucket<K, V>>,
}

impl<K, V> Table<K, V> {
    pub(crate) const fn unallocated() -> Self {
        Self {
            buckets: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    /// Bucket index of `hash`. The table must be allocated.
    #[inline]
    pub(crate) fn index_for(&self, hash: u32) -> usize {
        debug_assert!(self.len().is_power_of_two());
        hash as usize & (self.len() - 1)
    }

    #[inline]
    pub(crate) fn bucket(&self, index: usize) -> &Bucket<K, V> {
        &self.buckets[index]
    }

    #[inline]
    pub(crate) fn bucket_mut(&mut self, index: usize) -> &mut Bucket<K, V> {
        &mut self.buckets[index]
    }

    pub(crate) fn buckets(&self) -> &[Bucket<K, V>] {
        &self.buckets
    }

    /// Empty every bucket, keeping the allocation.
    pub(crate) fn clear(&mut self) {
        for b in &mut self.buckets {
            *b = Bucket::Empty;
        }
    }

    /// First allocation of an empty table of `len` slots.
    pub(crate) fn allocate(&mut self, len: usize) {
        debug_assert!(!self.is_allocated());
        debug_assert!(len.is_power_of_two());
        self.buckets = empty_buckets(len);
    }

    /// Double the table, moving every bucket `j` to `j` or `j + old_len`.
    ///
    /// The split bit is `old_len` itself: entries with `hash & old_len == 0`
    /// stay low. Chains and trees are relinked in place, keeping relative
    /// order, and tree halves small enough are turned back into chains.
    pub(crate) fn double(&mut self, trees: &mut Trees<K, V>) {
        let old_len = self.len();
        debug_assert!(old_len.is_power_of_two());
        let new_len = old_len << 1;
        let old = mem::replace(&mut self.buckets, empty_buckets(new_len));
        let bit = old_len as u32;

        for (j, bucket) in old.into_iter().enumerate() {
            match bucket {
                Bucket::Empty => {}
                Bucket::Chain(head) if head.next.is_none() => {
                    let i = head.hash as usize & (new_len - 1);
                    self.buckets[i] = Bucket::Chain(head);
                }
                Bucket::Chain(head) => {
                    let (lo, hi) = chain::split(head, bit);
                    if let Some(lo) = lo {
                        self.buckets[j] = Bucket::Chain(lo);
                    }
                    if let Some(hi) = hi {
                        self.buckets[j + old_len] = Bucket::Chain(hi);
                    }
                }
                Bucket::Tree(bin) => {
                    let (lo, hi) = trees.split(bin, bit);
                    self.buckets[j] = lo;
                    self.buckets[j + old_len] = hi;
                }
            }
        }
    }

    /// Check placement and per-bucket shape.
    ///
    /// Returns `(live entries, tree nodes)` counted across all buckets.
    pub(crate) fn check(&self, trees: &Trees<K, V>) -> Result<(usize, usize), InvariantViolation> {
        let len = self.len();
        if len != 0 && !len.is_power_of_two() {
            return Err(InvariantViolation::TableLengthNotPowerOfTwo(len));
        }
        let mask = len.saturating_sub(1) as u32;
        let mut live = 0;
        let mut tree_nodes = 0;
        for (i, bucket) in self.buckets.iter().enumerate() {
            match bucket {
                Bucket::Empty => {}
                Bucket::Chain(head) => {
                    for e in chain::iter(head) {
                        if e.hash & mask != i as u32 {
                            return Err(InvariantViolation::MisplacedEntry {
                                bucket: i,
                                hash: e.hash,
                            });
                        }
                        live += 1;
                    }
                }
                Bucket::Tree(bin) => {
                    if bin.len <= UNTREEIFY_THRESHOLD {
                        return Err(InvariantViolation::TreeTooSmall {
                            bucket: i,
                            len: bin.len,
                        });
                    }
                    trees.check(bin, i, mask)?;
                    live += bin.len;
                    tree_nodes += bin.len;
                }
            }
        }
        Ok((live, tree_nodes))
    }
}

fn empty_buckets<K, V>(len: usize) -> Vec<Bucket<K, V>> {
    let mut v = Vec::with_capacity(len);
    v.resize_with(len, Bucket::default);
    v
}
