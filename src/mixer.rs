//! Hash mixer: spreads raw key hashes before they index the table.
//!
//! The mixer folds high bits into low bits so keys whose raw hashes differ
//! only in the upper half still land in different buckets of a small table.
//! It is not a keyed or cryptographic hash; an attacker who controls raw
//! hashes can still search for mixed collisions. Tree escalation bounds the
//! damage in that case.

use crate::config::MAXIMUM_CAPACITY;

/// Mix a 32-bit raw hash into the value used for indexing and tree order.
#[inline]
pub fn mix(raw: i32) -> u32 {
    let mut h = raw as u32;
    h ^= (h >> 16) ^ (h >> 8);
    h ^= (h << 16) ^ (h << 8);
    h ^ (h >> 4)
}

/// Fold a `BuildHasher` output down to the 32-bit raw hash fed to `mix`.
#[inline]
pub fn fold(full: u64) -> i32 {
    (full ^ (full >> 32)) as u32 as i32
}

/// Smallest power of two `>= cap`, clamped to `[1, MAXIMUM_CAPACITY]`.
pub(crate) fn table_size_for(cap: usize) -> usize {
    if cap >= MAXIMUM_CAPACITY {
        MAXIMUM_CAPACITY
    } else {
        cap.max(1).next_power_of_two()
    }
}
