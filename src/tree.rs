//! Tree buckets: red-black trees over a map-wide `SlotMap` arena.
//!
//! A bucket that collected too many colliding entries is escalated to a
//! red-black tree ordered by `(hash, key order)`. Nodes live in a single
//! arena owned by the map and link to each other through generational
//! `NodeId`s, so `parent` is a plain non-owning key instead of a raw
//! pointer. Besides the tree links every node is threaded on a doubly
//! linked list in insertion order (`prev`/`next`); the thread drives
//! untreeify and resize splitting so both keep relative order.
//!
//! Without a configured key order the tree still orders by hash, and keys
//! that share a hash stay in insertion order. Lookups among those keys fall
//! back to equality and may visit all of them.

use crate::chain::{self, Entry, Link};
use crate::config::UNTREEIFY_THRESHOLD;
use crate::error::InvariantViolation;
use crate::table::Bucket;
use core::cmp::Ordering;
use core::fmt;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Arena key of a tree node.
    pub(crate) struct NodeId;
}

/// Secondary order used inside tree buckets for keys that share a hash.
///
/// The comparison must be a total order consistent with `Eq`.
pub struct KeyOrder<K> {
    cmp: Option<fn(&K, &K) -> Ordering>,
}

impl<K> KeyOrder<K> {
    /// Use the key type's `Ord` implementation.
    pub fn natural() -> Self
    where
        K: Ord,
    {
        let cmp: fn(&K, &K) -> Ordering = <K as Ord>::cmp;
        Self { cmp: Some(cmp) }
    }

    /// Use a caller-supplied total order.
    pub const fn by(cmp: fn(&K, &K) -> Ordering) -> Self {
        Self { cmp: Some(cmp) }
    }

    /// No key order: colliding keys are kept in insertion order and found
    /// by equality alone.
    pub const fn insertion() -> Self {
        Self { cmp: None }
    }

    pub fn is_total(&self) -> bool {
        self.cmp.is_some()
    }

    #[inline]
    fn compare(&self, a: &K, b: &K) -> Option<Ordering> {
        self.cmp.map(|f| f(a, b))
    }
}

impl<K> Clone for KeyOrder<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for KeyOrder<K> {}

impl<K> fmt::Debug for KeyOrder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_total() {
            "KeyOrder::Total"
        } else {
            "KeyOrder::Insertion"
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Color {
    Red,
    Black,
}

#[derive(Debug)]
pub(crate) struct TreeNode<K, V> {
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    color: Color,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl<K, V> TreeNode<K, V> {
    fn new(hash: u32, key: K, value: V) -> Self {
        Self {
            hash,
            key,
            value,
            parent: None,
            left: None,
            right: None,
            color: Color::Red,
            prev: None,
            next: None,
        }
    }
}

/// Descriptor of one tree bucket: its root, the ends of its insertion
/// thread, and its live node count.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct TreeBin {
    pub(crate) root: Option<NodeId>,
    pub(crate) first: Option<NodeId>,
    pub(crate) last: Option<NodeId>,
    pub(crate) len: usize,
}

/// Arena holding the nodes of every tree bucket of one map.
pub(crate) struct Trees<K, V> {
    nodes: SlotMap<NodeId, TreeNode<K, V>>,
    order: KeyOrder<K>,
}

impl<K, V> Trees<K, V> {
    pub(crate) fn new(order: KeyOrder<K>) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            order,
        }
    }

    pub(crate) fn order(&self) -> KeyOrder<K> {
        self.order
    }

    /// Number of nodes allocated across all trees.
    pub(crate) fn allocated(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }

    pub(crate) fn node(&self, id: NodeId) -> &TreeNode<K, V> {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TreeNode<K, V> {
        &mut self.nodes[id]
    }

    /// Next node on the insertion thread.
    #[inline]
    pub(crate) fn thread_next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].next
    }

    /// True when `(hash, key)` sorts strictly before `n`.
    #[inline]
    fn goes_left(&self, hash: u32, key: &K, n: &TreeNode<K, V>) -> bool {
        match hash.cmp(&n.hash) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.order.compare(key, &n.key) == Some(Ordering::Less),
        }
    }

    pub(crate) fn find(&self, bin: &TreeBin, hash: u32, key: &K) -> Option<NodeId>
    where
        K: Eq,
    {
        self.find_from(bin.root, hash, key)
    }

    fn find_from(&self, mut cur: Option<NodeId>, hash: u32, key: &K) -> Option<NodeId>
    where
        K: Eq,
    {
        while let Some(id) = cur {
            let n = &self.nodes[id];
            match hash.cmp(&n.hash) {
                Ordering::Less => cur = n.left,
                Ordering::Greater => cur = n.right,
                Ordering::Equal => {
                    if n.key == *key {
                        return Some(id);
                    }
                    match self.order.compare(key, &n.key) {
                        Some(Ordering::Less) => cur = n.left,
                        Some(Ordering::Greater) => cur = n.right,
                        // Same hash and no usable order: the key may sit on either side.
                        _ => {
                            if let Some(found) = self.find_from(n.right, hash, key) {
                                return Some(found);
                            }
                            cur = n.left;
                        }
                    }
                }
            }
        }
        None
    }

    /// Insert a key known to be absent from `bin`.
    pub(crate) fn insert(&mut self, bin: &mut TreeBin, hash: u32, key: K, value: V) -> NodeId {
        let id = self.nodes.insert(TreeNode::new(hash, key, value));
        self.push_back(bin, id);
        self.attach(bin, id);
        id
    }

    /// Unlink `z` from `bin` and free it.
    pub(crate) fn remove(&mut self, bin: &mut TreeBin, z: NodeId) -> (K, V) {
        self.unthread(bin, z);

        let z_left = self.nodes[z].left;
        let z_right = self.nodes[z].right;
        let mut removed_color = self.nodes[z].color;
        let x;
        let x_parent;
        match (z_left, z_right) {
            (None, _) => {
                x = z_right;
                x_parent = self.nodes[z].parent;
                self.transplant(bin, z, z_right);
            }
            (Some(_), None) => {
                x = z_left;
                x_parent = self.nodes[z].parent;
                self.transplant(bin, z, z_left);
            }
            (Some(zl), Some(zr)) => {
                let y = self.minimum(zr);
                removed_color = self.nodes[y].color;
                x = self.nodes[y].right;
                if self.nodes[y].parent == Some(z) {
                    x_parent = Some(y);
                } else {
                    x_parent = self.nodes[y].parent;
                    self.transplant(bin, y, x);
                    self.nodes[y].right = Some(zr);
                    self.nodes[zr].parent = Some(y);
                }
                self.transplant(bin, z, Some(y));
                self.nodes[y].left = Some(zl);
                self.nodes[zl].parent = Some(y);
                self.nodes[y].color = self.nodes[z].color;
            }
        }
        if removed_color == Color::Black {
            self.remove_fixup(bin, x, x_parent);
        }

        let node = self
            .nodes
            .remove(z)
            .expect("removed tree node must be live in the arena");
        (node.key, node.value)
    }

    /// Move a chain's entries into a new tree, keeping their order on the thread.
    pub(crate) fn treeify(&mut self, head: Box<Entry<K, V>>) -> TreeBin {
        let mut bin = TreeBin::default();
        let mut rest = Some(head);
        while let Some(mut e) = rest {
            rest = e.next.take();
            let Entry {
                hash, key, value, ..
            } = *e;
            self.insert(&mut bin, hash, key, value);
        }
        bin
    }

    /// Free every node of `bin` and return its entries as a chain, in
    /// thread order. Only the thread is read, so tree links may be stale.
    pub(crate) fn untreeify(&mut self, bin: TreeBin) -> Link<K, V> {
        let nodes = &mut self.nodes;
        let mut cur = bin.first;
        chain::from_entries(core::iter::from_fn(|| {
            let id = cur?;
            let n = nodes
                .remove(id)
                .expect("threaded tree node must be live in the arena");
            cur = n.next;
            Some((n.hash, n.key, n.value))
        }))
    }

    /// Partition `bin` by `hash & bit` into the buckets for the low and
    /// high halves of a doubled table.
    ///
    /// A half that takes every node keeps the tree untouched. Otherwise a
    /// half of at most `UNTREEIFY_THRESHOLD` nodes becomes a chain and a
    /// larger half is rebuilt from the same nodes.
    pub(crate) fn split(&mut self, bin: TreeBin, bit: u32) -> (Bucket<K, V>, Bucket<K, V>) {
        let mut lo = TreeBin::default();
        let mut hi = TreeBin::default();
        let mut cur = bin.first;
        while let Some(id) = cur {
            cur = self.nodes[id].next;
            if self.nodes[id].hash & bit == 0 {
                self.push_back(&mut lo, id);
            } else {
                self.push_back(&mut hi, id);
            }
        }

        if hi.len == 0 {
            lo.root = bin.root;
            return (Bucket::Tree(lo), Bucket::Empty);
        }
        if lo.len == 0 {
            hi.root = bin.root;
            return (Bucket::Empty, Bucket::Tree(hi));
        }
        (self.settle(lo), self.settle(hi))
    }

    /// Turn a threaded but unbalanced half into its final bucket form.
    fn settle(&mut self, mut half: TreeBin) -> Bucket<K, V> {
        if half.len <= UNTREEIFY_THRESHOLD {
            #[cfg(feature = "tracing")]
            tracing::debug!(len = half.len, "untreeify split half");
            return match self.untreeify(half) {
                Some(head) => Bucket::Chain(head),
                None => Bucket::Empty,
            };
        }
        half.root = None;
        let mut cur = half.first;
        while let Some(id) = cur {
            cur = self.nodes[id].next;
            self.attach(&mut half, id);
        }
        Bucket::Tree(half)
    }

    fn push_back(&mut self, bin: &mut TreeBin, id: NodeId) {
        self.nodes[id].prev = bin.last;
        self.nodes[id].next = None;
        match bin.last {
            Some(last) => self.nodes[last].next = Some(id),
            None => bin.first = Some(id),
        }
        bin.last = Some(id);
        bin.len += 1;
    }

    fn unthread(&mut self, bin: &mut TreeBin, id: NodeId) {
        let prev = self.nodes[id].prev;
        let next = self.nodes[id].next;
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => bin.first = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => bin.last = prev,
        }
        bin.len -= 1;
    }

    /// Reset `id`'s tree links, hang it under the right leaf, and rebalance.
    fn attach(&mut self, bin: &mut TreeBin, id: NodeId) {
        let mut parent = None;
        let mut left = false;
        let mut cur = bin.root;
        while let Some(c) = cur {
            parent = Some(c);
            let n = &self.nodes[id];
            left = self.goes_left(n.hash, &n.key, &self.nodes[c]);
            cur = if left {
                self.nodes[c].left
            } else {
                self.nodes[c].right
            };
        }
        {
            let n = &mut self.nodes[id];
            n.parent = parent;
            n.left = None;
            n.right = None;
            n.color = Color::Red;
        }
        match parent {
            None => bin.root = Some(id),
            Some(p) if left => self.nodes[p].left = Some(id),
            Some(p) => self.nodes[p].right = Some(id),
        }
        self.insert_fixup(bin, id);
    }

    #[inline]
    fn is_red(&self, id: Option<NodeId>) -> bool {
        id.is_some_and(|id| self.nodes[id].color == Color::Red)
    }

    #[inline]
    fn set_color(&mut self, id: NodeId, color: Color) {
        self.nodes[id].color = color;
    }

    fn minimum(&self, mut id: NodeId) -> NodeId {
        while let Some(l) = self.nodes[id].left {
            id = l;
        }
        id
    }

    /// Point `parent`'s link to `old` (or the root) at `new`.
    fn replace_child(&mut self, bin: &mut TreeBin, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => bin.root = new,
            Some(p) if self.nodes[p].left == Some(old) => self.nodes[p].left = new,
            Some(p) => self.nodes[p].right = new,
        }
    }

    fn transplant(&mut self, bin: &mut TreeBin, u: NodeId, v: Option<NodeId>) {
        let up = self.nodes[u].parent;
        self.replace_child(bin, up, u, v);
        if let Some(v) = v {
            self.nodes[v].parent = up;
        }
    }

    fn rotate_left(&mut self, bin: &mut TreeBin, x: NodeId) {
        let y = self.nodes[x]
            .right
            .expect("rotate_left requires a right child");
        let inner = self.nodes[y].left;
        self.nodes[x].right = inner;
        if let Some(b) = inner {
            self.nodes[b].parent = Some(x);
        }
        let xp = self.nodes[x].parent;
        self.nodes[y].parent = xp;
        self.replace_child(bin, xp, x, Some(y));
        self.nodes[y].left = Some(x);
        self.nodes[x].parent = Some(y);
    }

    fn rotate_right(&mut self, bin: &mut TreeBin, x: NodeId) {
        let y = self.nodes[x]
            .left
            .expect("rotate_right requires a left child");
        let inner = self.nodes[y].right;
        self.nodes[x].left = inner;
        if let Some(b) = inner {
            self.nodes[b].parent = Some(x);
        }
        let xp = self.nodes[x].parent;
        self.nodes[y].parent = xp;
        self.replace_child(bin, xp, x, Some(y));
        self.nodes[y].right = Some(x);
        self.nodes[x].parent = Some(y);
    }

    fn insert_fixup(&mut self, bin: &mut TreeBin, mut z: NodeId) {
        while let Some(mut p) = self.nodes[z].parent.filter(|&p| self.is_red(Some(p))) {
            let g = self.nodes[p]
                .parent
                .expect("a red node is never the root");
            if self.nodes[g].left == Some(p) {
                let uncle = self.nodes[g].right;
                if let Some(u) = uncle.filter(|&u| self.is_red(Some(u))) {
                    self.set_color(p, Color::Black);
                    self.set_color(u, Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                } else {
                    if self.nodes[p].right == Some(z) {
                        z = p;
                        self.rotate_left(bin, z);
                        p = self.nodes[z].parent.expect("rotated node has a parent");
                    }
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate_right(bin, g);
                }
            } else {
                let uncle = self.nodes[g].left;
                if let Some(u) = uncle.filter(|&u| self.is_red(Some(u))) {
                    self.set_color(p, Color::Black);
                    self.set_color(u, Color::Black);
                    self.set_color(g, Color::Red);
                    z = g;
                } else {
                    if self.nodes[p].left == Some(z) {
                        z = p;
                        self.rotate_right(bin, z);
                        p = self.nodes[z].parent.expect("rotated node has a parent");
                    }
                    self.set_color(p, Color::Black);
                    self.set_color(g, Color::Red);
                    self.rotate_left(bin, g);
                }
            }
        }
        if let Some(root) = bin.root {
            self.set_color(root, Color::Black);
        }
    }

    fn remove_fixup(&mut self, bin: &mut TreeBin, mut x: Option<NodeId>, mut x_parent: Option<NodeId>) {
        while x != bin.root && !self.is_red(x) {
            let Some(p) = x_parent else { break };
            if self.nodes[p].left == x {
                let mut w = self.nodes[p]
                    .right
                    .expect("doubly black node has a sibling");
                if self.is_red(Some(w)) {
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_left(bin, p);
                    w = self.nodes[p].right.expect("sibling survives rotation");
                }
                if !self.is_red(self.nodes[w].left) && !self.is_red(self.nodes[w].right) {
                    self.set_color(w, Color::Red);
                    x = Some(p);
                    x_parent = self.nodes[p].parent;
                } else {
                    if !self.is_red(self.nodes[w].right) {
                        if let Some(wl) = self.nodes[w].left {
                            self.set_color(wl, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_right(bin, w);
                        w = self.nodes[p].right.expect("sibling survives rotation");
                    }
                    let pc = self.nodes[p].color;
                    self.set_color(w, pc);
                    self.set_color(p, Color::Black);
                    if let Some(wr) = self.nodes[w].right {
                        self.set_color(wr, Color::Black);
                    }
                    self.rotate_left(bin, p);
                    x = bin.root;
                    x_parent = None;
                }
            } else {
                let mut w = self.nodes[p]
                    .left
                    .expect("doubly black node has a sibling");
                if self.is_red(Some(w)) {
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_right(bin, p);
                    w = self.nodes[p].left.expect("sibling survives rotation");
                }
                if !self.is_red(self.nodes[w].left) && !self.is_red(self.nodes[w].right) {
                    self.set_color(w, Color::Red);
                    x = Some(p);
                    x_parent = self.nodes[p].parent;
                } else {
                    if !self.is_red(self.nodes[w].left) {
                        if let Some(wr) = self.nodes[w].right {
                            self.set_color(wr, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_left(bin, w);
                        w = self.nodes[p].left.expect("sibling survives rotation");
                    }
                    let pc = self.nodes[p].color;
                    self.set_color(w, pc);
                    self.set_color(p, Color::Black);
                    if let Some(wl) = self.nodes[w].left {
                        self.set_color(wl, Color::Black);
                    }
                    self.rotate_right(bin, p);
                    x = bin.root;
                    x_parent = None;
                }
            }
        }
        if let Some(x) = x {
            self.set_color(x, Color::Black);
        }
    }

    /// Verify red-black shape, parent links, order, placement under `mask`,
    /// and the insertion thread of one tree bucket.
    pub(crate) fn check(&self, bin: &TreeBin, bucket: usize, mask: u32) -> Result<(), InvariantViolation> {
        let root = bin.root.ok_or(shape(bucket, "missing root"))?;
        let r = self.nodes.get(root).ok_or(shape(bucket, "root outside the arena"))?;
        if r.parent.is_some() {
            return Err(shape(bucket, "root has a parent"));
        }
        if r.color == Color::Red {
            return Err(shape(bucket, "root is red"));
        }

        let mut in_order = Vec::with_capacity(bin.len);
        self.check_subtree(Some(root), None, bucket, mask, &mut in_order)?;
        if in_order.len() != bin.len {
            return Err(shape(bucket, "tree size differs from recorded length"));
        }
        for pair in in_order.windows(2) {
            let (a, b) = (&self.nodes[pair[0]], &self.nodes[pair[1]]);
            if self.goes_left(b.hash, &b.key, a) {
                return Err(shape(bucket, "nodes out of order"));
            }
        }

        let mut threaded = 0;
        let mut prev = None;
        let mut cur = bin.first;
        while let Some(id) = cur {
            let n = self.nodes.get(id).ok_or(shape(bucket, "thread leaves the arena"))?;
            if n.prev != prev {
                return Err(shape(bucket, "thread back link mismatch"));
            }
            threaded += 1;
            if threaded > bin.len {
                return Err(shape(bucket, "thread longer than recorded length"));
            }
            prev = Some(id);
            cur = n.next;
        }
        if threaded != bin.len || bin.last != prev {
            return Err(shape(bucket, "thread does not match recorded length"));
        }
        Ok(())
    }

    /// Returns the black height of the subtree at `node`.
    fn check_subtree(
        &self,
        node: Option<NodeId>,
        parent: Option<NodeId>,
        bucket: usize,
        mask: u32,
        in_order: &mut Vec<NodeId>,
    ) -> Result<usize, InvariantViolation> {
        let Some(id) = node else { return Ok(1) };
        let n = self.nodes.get(id).ok_or(shape(bucket, "dangling child link"))?;
        if n.parent != parent {
            return Err(shape(bucket, "parent link mismatch"));
        }
        if n.hash & mask != bucket as u32 {
            return Err(InvariantViolation::MisplacedEntry {
                bucket,
                hash: n.hash,
            });
        }
        if n.color == Color::Red && (self.is_red(n.left) || self.is_red(n.right)) {
            return Err(shape(bucket, "red node with a red child"));
        }
        let lh = self.check_subtree(n.left, Some(id), bucket, mask, in_order)?;
        in_order.push(id);
        let rh = self.check_subtree(n.right, Some(id), bucket, mask, in_order)?;
        if lh != rh {
            return Err(shape(bucket, "unequal black heights"));
        }
        Ok(lh + usize::from(n.color == Color::Black))
    }
}

fn shape(bucket: usize, reason: &'static str) -> InvariantViolation {
    InvariantViolation::TreeShape { bucket, reason }
}
