// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// d independent candidate-slot hash functions, derived from a single
// strong hash (SipHash, via `DefaultHasher`) with distinct per-function
// seeds mixed into the hash input.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Number of candidate slots per key. Four gives a high load factor before
/// displacement chains get long, while keeping per-insert probe cost low.
pub const D_HASHES: usize = 4;

/// Arbitrary, fixed odd seeds — one per hash function. Any distinct set
/// works; these are not tuned, just stable across runs so tests are
/// deterministic.
const SEEDS: [u64; D_HASHES] = [
    0x9E3779B97F4A7C15,
    0xC2B2AE3D27D4EB4F,
    0x165667B19E3779F9,
    0x27D4EB2F165667C5,
];

fn seeded_hash(seed: u64, key: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    key.hash(&mut hasher);
    hasher.finish()
}

/// Compute the candidate slot set for `key` against a table of `capacity`
/// slots. `capacity` must be a power of two; indices are derived by masking
/// rather than modulo.
pub fn candidates(key: &[u8], capacity: usize) -> [usize; D_HASHES] {
    debug_assert!(capacity.is_power_of_two());
    let mask = (capacity - 1) as u64;
    let mut out = [0usize; D_HASHES];
    for (slot, seed) in out.iter_mut().zip(SEEDS.iter()) {
        *slot = (seeded_hash(*seed, key) & mask) as usize;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = candidates(b"hello", 1024);
        let b = candidates(b"hello", 1024);
        assert_eq!(a, b);
    }

    #[test]
    fn indices_within_capacity() {
        let capacity = 256;
        for key in [&b"a"[..], b"some-longer-key", b""] {
            for idx in candidates(key, capacity) {
                assert!(idx < capacity);
            }
        }
    }

    #[test]
    fn distinct_keys_usually_diverge() {
        let a = candidates(b"key-one", 4096);
        let b = candidates(b"key-two", 4096);
        assert_ne!(a, b);
    }
}
