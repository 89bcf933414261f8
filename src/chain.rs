//! Chain buckets: singly linked, insertion-ordered lists of entries.
//!
//! The head `Box` is owned by its bucket and every entry owns its
//! successor. New keys are appended at the tail so that chains, and the
//! low/high halves produced by a resize split, keep insertion order.

use core::mem;

pub(crate) type Link<K, V> = Option<Box<Entry<K, V>>>;

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Link<K, V>,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(hash: u32, key: K, value: V) -> Self {
        Self {
            hash,
            key,
            value,
            next: None,
        }
    }

    #[inline]
    fn matches(&self, hash: u32, key: &K) -> bool
    where
        K: Eq,
    {
        self.hash == hash && self.key == *key
    }
}

/// Outcome of `put` on a non-empty chain.
#[derive(Debug, PartialEq)]
pub(crate) enum ChainPut<V> {
    /// Key was present; holds the value it replaced.
    Replaced(V),
    /// Key was appended; holds the chain length afterwards.
    Appended(usize),
}

pub(crate) fn find<'a, K: Eq, V>(head: &'a Entry<K, V>, hash: u32, key: &K) -> Option<&'a Entry<K, V>> {
    let mut cur = Some(head);
    while let Some(e) = cur {
        if e.matches(hash, key) {
            return Some(e);
        }
        cur = e.next.as_deref();
    }
    None
}

pub(crate) fn find_mut<'a, K: Eq, V>(
    head: &'a mut Entry<K, V>,
    hash: u32,
    key: &K,
) -> Option<&'a mut Entry<K, V>> {
    let mut cur = Some(head);
    while let Some(e) = cur {
        if e.matches(hash, key) {
            return Some(e);
        }
        cur = e.next.as_deref_mut();
    }
    None
}

/// Overwrite the value of a matching entry, or append a new entry at the tail.
pub(crate) fn put<K: Eq, V>(head: &mut Entry<K, V>, hash: u32, key: K, value: V) -> ChainPut<V> {
    if head.matches(hash, &key) {
        return ChainPut::Replaced(mem::replace(&mut head.value, value));
    }
    let mut len = 1;
    let mut cur = &mut head.next;
    while let Some(e) = cur {
        if e.matches(hash, &key) {
            return ChainPut::Replaced(mem::replace(&mut e.value, value));
        }
        len += 1;
        cur = &mut e.next;
    }
    *cur = Some(Box::new(Entry::new(hash, key, value)));
    ChainPut::Appended(len + 1)
}

/// Unlink the matching entry, returning its key and value.
pub(crate) fn remove<K: Eq, V>(link: &mut Link<K, V>, hash: u32, key: &K) -> Option<(K, V)> {
    let mut cur = link;
    while cur.as_ref().is_some_and(|e| !e.matches(hash, key)) {
        cur = &mut cur.as_mut()?.next;
    }
    let mut removed = cur.take()?;
    *cur = removed.next.take();
    Some((removed.key, removed.value))
}

/// Partition a chain by `hash & bit` into (low, high), both in original order.
///
/// Entries are relinked, never reallocated.
pub(crate) fn split<K, V>(head: Box<Entry<K, V>>, bit: u32) -> (Link<K, V>, Link<K, V>) {
    let mut lo: Link<K, V> = None;
    let mut hi: Link<K, V> = None;
    let mut lo_tail = &mut lo;
    let mut hi_tail = &mut hi;
    let mut rest = Some(head);
    while let Some(mut e) = rest {
        rest = e.next.take();
        if e.hash & bit == 0 {
            lo_tail = &mut lo_tail.insert(e).next;
        } else {
            hi_tail = &mut hi_tail.insert(e).next;
        }
    }
    (lo, hi)
}

pub(crate) fn len<K, V>(head: &Entry<K, V>) -> usize {
    iter(head).count()
}

pub(crate) fn iter<K, V>(head: &Entry<K, V>) -> impl Iterator<Item = &Entry<K, V>> {
    core::iter::successors(Some(head), |e| e.next.as_deref())
}

/// Build a chain from `(hash, key, value)` triples, preserving their order.
pub(crate) fn from_entries<K, V, I>(entries: I) -> Link<K, V>
where
    I: IntoIterator<Item = (u32, K, V)>,
{
    let mut head: Link<K, V> = None;
    let mut tail = &mut head;
    for (hash, key, value) in entries {
        tail = &mut tail.insert(Box::new(Entry::new(hash, key, value))).next;
    }
    head
}
