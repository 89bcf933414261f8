#![cfg(test)]

// Property tests for SafeHashMap kept inside the crate so `validate()` can
// be checked after every step against private structure.

use crate::{KeyOrder, MapConfig, SafeHashMap};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hasher};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Put(usize, i32),
    PutIfAbsent(usize, i32),
    Remove(usize),
    Get(usize),
    Mutate(usize, i32),
    Iterate,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=48).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            8 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Put(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::PutIfAbsent(i, v)),
            4 => idx.clone().prop_map(OpI::Remove),
            3 => idx.clone().prop_map(OpI::Get),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Every key gets the same mixed hash: one bucket, escalated once the table
// reaches 64 buckets.
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

// Hash is the number of bytes written, so keys collide by length. A few
// heavy buckets get escalated and later split by resizes.
#[derive(Clone, Default)]
struct LenBuildHasher;
#[derive(Default)]
struct LenHasher(u64);
impl BuildHasher for LenBuildHasher {
    type Hasher = LenHasher;
    fn build_hasher(&self) -> Self::Hasher {
        LenHasher::default()
    }
}
impl Hasher for LenHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0 = self.0.wrapping_add(bytes.len() as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - `put` returns the previous value and the latest value wins.
// - `put_if_absent` never overwrites and reports the stored value.
// - `remove` returns the model's value; removing an absent key is a no-op.
// - `get`/`contains_key`/`get_mut` parity with the model.
// - `iter` yields each live entry exactly once.
// - `len`/`is_empty` parity and `validate()` hold after every op.
fn run<S: BuildHasher>(
    mut sut: SafeHashMap<String, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();
    for op in ops {
        match op {
            OpI::Put(i, v) => {
                let k = pool[i].clone();
                prop_assert_eq!(sut.put(k.clone(), v), model.insert(k, v));
            }
            OpI::PutIfAbsent(i, v) => {
                let k = pool[i].clone();
                let expected = model.get(&k).copied();
                prop_assert_eq!(sut.put_if_absent(k.clone(), v).copied(), expected);
                model.entry(k).or_insert(v);
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.remove(k), model.remove(k));
                prop_assert!(!sut.contains_key(k));
            }
            OpI::Get(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.get(k), model.get(k));
                prop_assert_eq!(sut.contains_key(k), model.contains_key(k));
                if let Some((sk, _)) = sut.get_key_value(k) {
                    prop_assert_eq!(sk, k);
                }
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                match (sut.get_mut(k), model.get_mut(k)) {
                    (Some(sv), Some(mv)) => {
                        *sv = sv.saturating_add(d);
                        *mv = mv.saturating_add(d);
                    }
                    (None, None) => {}
                    (s, m) => prop_assert!(false, "get_mut parity: {:?} vs {:?}", s, m),
                }
            }
            OpI::Iterate => {
                let it = sut.iter();
                prop_assert_eq!(it.len(), model.len());
                let s_entries: BTreeMap<_, _> = it.map(|(k, v)| (k.clone(), *v)).collect();
                let m_entries: BTreeMap<_, _> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(s_entries, m_entries);
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
            }
        }

        // Post-conditions after each op
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        if let Err(e) = sut.validate() {
            prop_assert!(false, "invariant broken: {}", e);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run(SafeHashMap::<String, i32, RandomState>::with_hasher(RandomState::new()), &pool, ops)?;
    }

    // Small initial table and load factor force frequent growth.
    #[test]
    fn prop_state_machine_small_table((pool, ops) in arb_scenario()) {
        let config = MapConfig::new(1, 0.5);
        let sut = SafeHashMap::with_config_and_hasher(config, RandomState::new()).expect("valid config");
        run(sut, &pool, ops)?;
    }
}

// Property: same state-machine invariants under worst-case collision
// behavior. Buckets escalate to trees, shrink back to chains, and trees
// are split by resizes.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run(SafeHashMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_insertion_order((pool, ops) in arb_scenario()) {
        let sut = SafeHashMap::with_key_order(MapConfig::default(), ConstBuildHasher, KeyOrder::insertion())
            .expect("valid config");
        run(sut, &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_length_buckets((pool, ops) in arb_scenario()) {
        let config = MapConfig::new(64, 0.75);
        let sut = SafeHashMap::with_config_and_hasher(config, LenBuildHasher).expect("valid config");
        run(sut, &pool, ops)?;
    }
}
