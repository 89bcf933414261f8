// SafeHashMap integration suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Latest put wins; overwrite and remove hand back the stored value.
// - Table length is a power of two and threshold follows the load factor.
// - Resizing preserves every live key.
// - Colliding keys escalate to a tree only in tables of >= 64 buckets.
// - Trees shrink back to chains at <= 6 entries, both on removal and
//   when a resize split leaves a small half.
use safe_hashmap::{
    fold, mix, BucketKind, ConfigError, KeyOrder, MapConfig, SafeHashMap, MAXIMUM_CAPACITY,
};
use std::hash::{BuildHasher, Hasher};
use std::time::{Duration, Instant};

// Every key hashes to zero, so every key shares one mixed hash.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Passes a `u64` key through unchanged, letting tests pick raw hashes.
#[derive(Clone, Default)]
struct IdentityBuildHasher;
#[derive(Default)]
struct IdentityHasher(u64);
impl BuildHasher for IdentityBuildHasher {
    type Hasher = IdentityHasher;
    fn build_hasher(&self) -> Self::Hasher {
        IdentityHasher::default()
    }
}
impl Hasher for IdentityHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 << 8) | u64::from(b);
        }
    }
    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

// Test: scenario A, growth at the load-factor threshold.
// Assumes: default config (16, 0.75) gives threshold 12.
// Verifies: 12 keys fit in 16 buckets; the 13th doubles to 32.
#[test]
fn grows_past_threshold() {
    let mut m = SafeHashMap::with_config(MapConfig::new(16, 0.75)).expect("valid config");
    for k in 0..12u32 {
        assert_eq!(m.put(k, k * 10), None);
    }
    assert_eq!(m.len(), 12);
    assert_eq!(m.capacity(), 16);
    assert_eq!(m.threshold(), 12);

    m.put(12, 120);
    assert_eq!(m.len(), 13);
    assert_eq!(m.capacity(), 32);
    assert_eq!(m.threshold(), 24);
    for k in 0..13u32 {
        assert_eq!(m.get(&k), Some(&(k * 10)));
    }
    m.validate().unwrap();
}

// Test: scenario B, hash flooding.
// Assumes: a constant hasher gives 10,000 keys one mixed hash.
// Verifies: the bucket escalates to a tree and all inserts and lookups
// finish well inside a quadratic budget.
#[test]
fn flood_of_colliding_keys_stays_fast() {
    let config = MapConfig::new(65_536, 0.75);
    let mut m = SafeHashMap::with_config_and_hasher(config, ConstBuildHasher).expect("valid config");
    let start = Instant::now();
    for k in 0..10_000u64 {
        m.put(k, k);
    }
    for k in 0..10_000u64 {
        assert_eq!(m.get(&k), Some(&k));
    }
    let elapsed = start.elapsed();

    assert_eq!(m.len(), 10_000);
    assert_eq!(m.capacity(), 65_536);
    assert_eq!(m.tree_bucket_count(), 1);
    assert_eq!(m.bucket_kind(&0), BucketKind::Tree { len: 10_000 });
    assert!(
        elapsed < Duration::from_secs(5),
        "10k colliding puts and gets took {elapsed:?}"
    );
    m.validate().unwrap();
}

// Test: scenario C, de-escalation on removal.
// Assumes: 8 colliding keys in a 64-bucket table form a tree.
// Verifies: removing down to 6 entries yields a chain and every
// remaining key stays reachable.
#[test]
fn tree_shrinks_back_to_chain() {
    let config = MapConfig::new(64, 0.75);
    let mut m = SafeHashMap::with_config_and_hasher(config, ConstBuildHasher).expect("valid config");
    for k in 0..8u32 {
        m.put(k, k);
    }
    assert_eq!(m.bucket_kind(&0), BucketKind::Tree { len: 8 });

    assert_eq!(m.remove(&3), Some(3));
    assert_eq!(m.bucket_kind(&0), BucketKind::Tree { len: 7 });
    assert_eq!(m.remove(&5), Some(5));
    assert_eq!(m.bucket_kind(&0), BucketKind::Chain { len: 6 });
    assert_eq!(m.tree_bucket_count(), 0);
    for k in [0, 1, 2, 4, 6, 7] {
        assert_eq!(m.get(&k), Some(&k));
    }
    let order: Vec<u32> = m.iter().map(|(k, _)| *k).collect();
    assert_eq!(order, vec![0, 1, 2, 4, 6, 7]);
    m.validate().unwrap();
}

// Test: the optional key.
// Assumes: absent-style keys are modelled as `Option<K>`.
// Verifies: `None` is stored, overwritten and removed like any key and
// never matches `Some(_)`.
#[test]
fn none_key_is_a_regular_key() {
    let mut m: SafeHashMap<Option<String>, i32> = SafeHashMap::new();
    assert_eq!(m.put(None, 1), None);
    assert_eq!(m.put(Some(String::new()), 2), None);
    assert_eq!(m.put(None, 3), Some(1));
    assert_eq!(m.get(&None), Some(&3));
    assert_eq!(m.get(&Some(String::new())), Some(&2));
    assert_eq!(m.len(), 2);
    assert_eq!(m.remove(&None), Some(3));
    assert_eq!(m.get(&None), None);
    assert_eq!(m.len(), 1);
}

// Test: escalation needs a large enough table.
// Assumes: a table of 16 buckets, load factor high enough that size
// never triggers growth.
// Verifies: reaching 8 entries in one chain doubles the table instead of
// escalating, until 64 buckets are reached.
#[test]
fn small_table_grows_instead_of_treeifying() {
    let config = MapConfig::new(16, 100.0);
    let mut m = SafeHashMap::with_config_and_hasher(config, ConstBuildHasher).expect("valid config");
    for k in 0..7u32 {
        m.put(k, k);
    }
    assert_eq!((m.capacity(), m.tree_bucket_count()), (16, 0));
    m.put(7, 7);
    assert_eq!((m.capacity(), m.tree_bucket_count()), (32, 0));
    m.put(8, 8);
    assert_eq!((m.capacity(), m.tree_bucket_count()), (64, 0));
    m.put(9, 9);
    assert_eq!((m.capacity(), m.tree_bucket_count()), (64, 1));
    m.validate().unwrap();
}

// Test: de-escalation on a resize split, a deliberate design choice.
// Assumes: keys whose mixed hashes agree on the low six bits share a
// bucket of a 64-bucket table; bit six separates them after doubling.
// Verifies: a 10-entry tree split 7/3 keeps a tree for the larger half
// and turns the 3-entry half into a chain.
#[test]
fn resize_split_untreeifies_small_half() {
    // Mixed hashes index the table: pick raw keys whose mixed hashes fall
    // in bucket 0 of 64 and differ on bit six.
    let keys_with = |bit6: u32| -> Vec<u64> {
        (1u64..)
            .filter(move |&k| mix(fold(k)) & 127 == bit6)
            .take(if bit6 == 0 { 7 } else { 3 })
            .collect()
    };
    let lo = keys_with(0);
    let hi = keys_with(64);

    let config = MapConfig::new(64, 0.75);
    let mut m = SafeHashMap::with_config_and_hasher(config, IdentityBuildHasher).expect("valid config");
    for &k in lo.iter().chain(&hi) {
        m.put(k, k);
    }
    assert_eq!(m.capacity(), 64);
    assert_eq!(m.bucket_kind(&lo[0]), BucketKind::Tree { len: 10 });

    // Fill other buckets until the table doubles.
    let mut filler = 1u64 << 40;
    while m.capacity() == 64 {
        if mix(fold(filler)) & 63 != 0 {
            m.put(filler, filler);
        }
        filler += 1;
    }
    assert_eq!(m.capacity(), 128);
    assert_eq!(m.bucket_kind(&lo[0]), BucketKind::Tree { len: 7 });
    assert_eq!(m.bucket_kind(&hi[0]), BucketKind::Chain { len: 3 });
    for &k in lo.iter().chain(&hi) {
        assert_eq!(m.get(&k), Some(&k));
    }
    m.validate().unwrap();
}

// Test: resize keeps every key.
// Verifies: thousands of ordinary keys survive repeated doubling and
// the table length stays a power of two.
#[test]
fn resize_preserves_all_keys() {
    let mut m: SafeHashMap<String, usize> = SafeHashMap::new();
    for i in 0..5_000 {
        m.put(format!("key-{i}"), i);
        assert!(m.capacity().is_power_of_two());
    }
    assert_eq!(m.len(), 5_000);
    assert_eq!(m.capacity(), 8_192);
    for i in 0..5_000 {
        assert_eq!(m.get(&format!("key-{i}")), Some(&i));
    }
    for i in (0..5_000).step_by(2) {
        assert_eq!(m.remove(&format!("key-{i}")), Some(i));
    }
    assert_eq!(m.len(), 2_500);
    assert_eq!(m.iter().count(), 2_500);
    m.validate().unwrap();
}

// Test: keys without a total order.
// Assumes: `KeyOrder::insertion()` and a constant hasher.
// Verifies: escalation still happens and lookups fall back to equality.
#[test]
fn insertion_key_order_resolves_by_equality() {
    #[derive(Debug, Hash, PartialEq, Eq)]
    struct Opaque(u32);

    let mut m = SafeHashMap::with_key_order(MapConfig::new(64, 0.75), ConstBuildHasher, KeyOrder::insertion())
        .expect("valid config");
    for k in 0..50 {
        m.put(Opaque(k), k);
    }
    assert_eq!(m.bucket_kind(&Opaque(0)), BucketKind::Tree { len: 50 });
    for k in 0..50 {
        assert_eq!(m.get(&Opaque(k)), Some(&k));
    }
    assert_eq!(m.get(&Opaque(99)), None);
    for k in (0..50).rev().step_by(3) {
        assert_eq!(m.remove(&Opaque(k)), Some(k));
    }
    assert_eq!(m.len(), 33);
    m.validate().unwrap();
}

// Test: custom key order.
// Verifies: a reversed order still finds every key in a tree bucket.
#[test]
fn custom_key_order() {
    let order = KeyOrder::by(|a: &u32, b: &u32| b.cmp(a));
    let mut m = SafeHashMap::with_key_order(MapConfig::new(64, 0.75), ConstBuildHasher, order)
        .expect("valid config");
    for k in 0..30u32 {
        m.put(k, k + 1);
    }
    assert!(m.key_order().is_total());
    for k in 0..30u32 {
        assert_eq!(m.get(&k), Some(&(k + 1)));
    }
    m.validate().unwrap();
}

// Test: construction-time validation.
// Verifies: bad load factors fail; oversized capacities clamp silently.
#[test]
fn construction_arguments() {
    for lf in [0.0, -1.0, f32::NAN, f32::INFINITY] {
        assert!(matches!(
            SafeHashMap::<u32, u32>::with_config(MapConfig::new(16, lf)),
            Err(ConfigError::InvalidLoadFactor(_))
        ));
    }
    let mut m = SafeHashMap::with_config(MapConfig::new(0, 0.75)).expect("valid config");
    // One bucket with threshold 0: the first put already doubles it.
    m.put(1u8, 1u8);
    assert_eq!((m.capacity(), m.threshold()), (2, 1));
    m.put(2, 2);
    assert_eq!((m.capacity(), m.threshold()), (4, 3));
    m.validate().unwrap();

    let m: SafeHashMap<u8, u8> = SafeHashMap::with_capacity(usize::MAX);
    assert_eq!(m.capacity(), 0);
    assert_eq!(SafeHashMap::<u8, u8>::MAXIMUM_CAPACITY, MAXIMUM_CAPACITY);
    assert_eq!(m.load_factor(), 0.75);
}
