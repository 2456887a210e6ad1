// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The cuckoo hash table: fixed capacity, d candidate slots per key,
// bounded displacement chains, lazy expiration, and CAS.
//
// A single table-wide `RwSpinLock` serializes mutators against each other
// and against readers — concurrent `get`s proceed together, while a
// displacement chain runs to completion inside one writer critical
// section so it is never observed half-applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::config::{Config, DisplacementPolicy};
use crate::error::FatalError;
use crate::stats::Stats;
use crate::storage::hash::{candidates, D_HASHES};
use crate::storage::slot::{ItemSnapshot, Slot, HEADER_LEN, MAX_KEY_LEN, NEVER_EXPIRES};
use crate::sync::RwSpinLock;
use crate::time::CoarseClock;

/// Sentinel meaning "no flush has ever been requested".
const NO_FLUSH: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutResult {
    Stored,
    NotStored,
    Exists,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteResult {
    Deleted,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchResult {
    Touched,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrDecrResult {
    Value(u64),
    NotFound,
    NotANumber,
}

pub struct CuckooTable {
    inner: RwSpinLock<Vec<Slot>>,
    capacity: usize,
    max_val_len: usize,
    displacement_max: u8,
    policy: DisplacementPolicy,
    cas_enabled: bool,
    cas_counter: AtomicU64,
    flush_horizon: AtomicU64,
    clock: Arc<CoarseClock>,
    stats: Arc<Stats>,
}

impl CuckooTable {
    pub fn new(
        config: &Config,
        clock: Arc<CoarseClock>,
        stats: Arc<Stats>,
    ) -> Result<Self, FatalError> {
        let max_val_len = config
            .cuckoo_item_size
            .checked_sub(HEADER_LEN + MAX_KEY_LEN)
            .ok_or_else(|| {
                FatalError::TableAllocation(
                    "cuckoo_item_size too small for header + max key".to_string(),
                )
            })?;
        let capacity = config.cuckoo_nitem;
        let slots = (0..capacity).map(|_| Slot::empty(max_val_len)).collect();
        Ok(Self {
            inner: RwSpinLock::new(slots),
            capacity,
            max_val_len,
            displacement_max: config.displacement_max,
            policy: config.cuckoo_policy,
            cas_enabled: config.cuckoo_item_cas,
            cas_counter: AtomicU64::new(0),
            flush_horizon: AtomicU64::new(NO_FLUSH),
            clock,
            stats,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_val_len(&self) -> usize {
        self.max_val_len
    }

    pub fn cas_enabled(&self) -> bool {
        self.cas_enabled
    }

    fn now(&self) -> u64 {
        self.clock.now()
    }

    fn next_cas(&self) -> u64 {
        self.cas_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// A nonzero `exptime` is always relative seconds-from-now against this
    /// table's coarse monotonic clock; `0` is the "never" sentinel. There is
    /// no persistent wall-clock epoch in this design, so the large-value
    /// "absolute unix timestamp" convention some memcached servers accept
    /// does not apply here.
    fn resolve_expiry(exptime: u64, now: u64) -> u64 {
        if exptime == 0 {
            NEVER_EXPIRES
        } else {
            now + exptime
        }
    }

    fn is_flushed(&self, slot: &Slot) -> bool {
        let horizon = self.flush_horizon.load(Ordering::Relaxed);
        horizon != NO_FLUSH && slot.write_stamp() <= horizon
    }

    fn slot_is_free(&self, slot: &Slot, now: u64) -> bool {
        slot.is_free(now) || self.is_flushed(slot)
    }

    fn slot_is_visible(&self, slot: &Slot, now: u64) -> bool {
        slot.is_occupied() && !slot.is_expired(now) && !self.is_flushed(slot)
    }

    fn find_visible(&self, slots: &[Slot], key: &[u8], now: u64) -> Option<usize> {
        for idx in candidates(key, self.capacity) {
            if self.slot_is_visible(&slots[idx], now) && slots[idx].key_matches(key) {
                return Some(idx);
            }
        }
        None
    }

    /// Pick a displacement victim among `cands`, skipping `exclude` (the
    /// slot the item being placed was just displaced from). When a table
    /// has fewer candidate slots than hash functions (e.g. `cuckoo_nitem`
    /// smaller than `D_HASHES`), excluding `exclude` can leave no other
    /// candidate at all — in that case there is nowhere else to go, so the
    /// excluded slot itself is the victim.
    fn choose_victim(
        &self,
        slots: &[Slot],
        cands: &[usize; D_HASHES],
        exclude: Option<usize>,
    ) -> usize {
        match self.policy {
            DisplacementPolicy::Random => {
                let pool: Vec<usize> = cands
                    .iter()
                    .copied()
                    .filter(|&i| Some(i) != exclude)
                    .collect();
                match exclude {
                    Some(fallback) if pool.is_empty() => fallback,
                    _ => pool[rand::thread_rng().gen_range(0..pool.len())],
                }
            }
            DisplacementPolicy::ExpireFirst => {
                let mut best: Option<(u64, usize)> = None;
                for &idx in cands.iter() {
                    if Some(idx) == exclude {
                        continue;
                    }
                    let expiry = slots[idx].expiry();
                    let rank = if expiry == NEVER_EXPIRES {
                        u64::MAX
                    } else {
                        expiry
                    };
                    best = match best {
                        None => Some((rank, idx)),
                        Some((best_rank, _)) if rank < best_rank => Some((rank, idx)),
                        Some(prev) => Some(prev),
                    };
                }
                match best {
                    Some((_, idx)) => idx,
                    None => exclude.expect("candidate set is only empty when excluding a slot"),
                }
            }
        }
    }

    /// Insert `key`/`value` into the table, displacing or evicting as
    /// needed. `exclude` is the slot this item was just displaced out of
    /// (so the chain doesn't immediately bounce it back); `depth` counts
    /// displacement hops so far.
    #[allow(clippy::too_many_arguments)]
    fn try_insert(
        &self,
        slots: &mut [Slot],
        key: &[u8],
        value: &[u8],
        flags: u32,
        expiry: u64,
        cas: u64,
        now: u64,
        depth: u8,
        exclude: Option<usize>,
    ) {
        let cands = candidates(key, self.capacity);
        for &idx in cands.iter() {
            if Some(idx) == exclude {
                continue;
            }
            let slot = &slots[idx];
            if self.slot_is_free(slot, now) || slot.key_matches(key) {
                if slot.is_occupied() && !slot.key_matches(key) {
                    self.stats.expired_reclaimed.fetch_add(1, Ordering::Relaxed);
                }
                slots[idx].fill(key, value, flags, expiry, cas, now);
                return;
            }
        }

        let victim_idx = self.choose_victim(slots, &cands, exclude);
        if depth >= self.displacement_max {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            slots[victim_idx].fill(key, value, flags, expiry, cas, now);
            return;
        }

        let victim = slots[victim_idx].snapshot();
        slots[victim_idx].fill(key, value, flags, expiry, cas, now);
        self.try_insert(
            slots,
            &victim.key,
            &victim.value,
            victim.flags,
            victim.expiry,
            victim.cas,
            now,
            depth + 1,
            Some(victim_idx),
        );
    }

    pub fn get(&self, key: &[u8]) -> Option<ItemSnapshot> {
        let now = self.now();
        let guard = self.inner.read();
        let idx = self.find_visible(&guard, key, now)?;
        Some(guard[idx].snapshot())
    }

    pub fn set(&self, key: &[u8], value: &[u8], flags: u32, exptime: u64) -> PutResult {
        let now = self.now();
        let expiry = Self::resolve_expiry(exptime, now);
        let mut guard = self.inner.write();
        let cas = self.next_cas();
        self.try_insert(&mut guard, key, value, flags, expiry, cas, now, 0, None);
        PutResult::Stored
    }

    pub fn add(&self, key: &[u8], value: &[u8], flags: u32, exptime: u64) -> PutResult {
        let now = self.now();
        let mut guard = self.inner.write();
        if self.find_visible(&guard, key, now).is_some() {
            return PutResult::NotStored;
        }
        let expiry = Self::resolve_expiry(exptime, now);
        let cas = self.next_cas();
        self.try_insert(&mut guard, key, value, flags, expiry, cas, now, 0, None);
        PutResult::Stored
    }

    pub fn replace(&self, key: &[u8], value: &[u8], flags: u32, exptime: u64) -> PutResult {
        let now = self.now();
        let mut guard = self.inner.write();
        if self.find_visible(&guard, key, now).is_none() {
            return PutResult::NotStored;
        }
        let expiry = Self::resolve_expiry(exptime, now);
        let cas = self.next_cas();
        self.try_insert(&mut guard, key, value, flags, expiry, cas, now, 0, None);
        PutResult::Stored
    }

    #[allow(clippy::too_many_arguments)]
    pub fn cas(
        &self,
        key: &[u8],
        value: &[u8],
        flags: u32,
        exptime: u64,
        token: u64,
    ) -> PutResult {
        let now = self.now();
        let mut guard = self.inner.write();
        let idx = match self.find_visible(&guard, key, now) {
            None => return PutResult::NotFound,
            Some(idx) => idx,
        };
        if guard[idx].cas() != token {
            return PutResult::Exists;
        }
        let expiry = Self::resolve_expiry(exptime, now);
        let cas = self.next_cas();
        self.try_insert(&mut guard, key, value, flags, expiry, cas, now, 0, None);
        PutResult::Stored
    }

    pub fn delete(&self, key: &[u8]) -> DeleteResult {
        let now = self.now();
        let mut guard = self.inner.write();
        match self.find_visible(&guard, key, now) {
            None => DeleteResult::NotFound,
            Some(idx) => {
                guard[idx].clear();
                DeleteResult::Deleted
            }
        }
    }

    pub fn touch(&self, key: &[u8], exptime: u64) -> TouchResult {
        let now = self.now();
        let mut guard = self.inner.write();
        match self.find_visible(&guard, key, now) {
            None => TouchResult::NotFound,
            Some(idx) => {
                guard[idx].set_expiry(Self::resolve_expiry(exptime, now));
                TouchResult::Touched
            }
        }
    }

    pub fn incr(&self, key: &[u8], delta: u64) -> IncrDecrResult {
        self.incr_decr(key, delta, true)
    }

    pub fn decr(&self, key: &[u8], delta: u64) -> IncrDecrResult {
        self.incr_decr(key, delta, false)
    }

    fn incr_decr(&self, key: &[u8], delta: u64, is_incr: bool) -> IncrDecrResult {
        let now = self.now();
        let mut guard = self.inner.write();
        let idx = match self.find_visible(&guard, key, now) {
            None => return IncrDecrResult::NotFound,
            Some(idx) => idx,
        };
        let current = match parse_ascii_u64(guard[idx].value()) {
            Some(v) => v,
            None => return IncrDecrResult::NotANumber,
        };
        let new_value = if is_incr {
            current.wrapping_add(delta)
        } else {
            current.saturating_sub(delta)
        };
        let rendered = new_value.to_string();
        let expiry = guard[idx].expiry();
        let cas = self.next_cas();
        guard[idx].update_value(rendered.as_bytes(), expiry, cas, now);
        IncrDecrResult::Value(new_value)
    }

    /// Set the flush horizon to `now + after`. Any item last written at or
    /// before the horizon is treated as absent from that point on.
    pub fn flush(&self, after: u64) {
        let now = self.now();
        self.flush_horizon.store(now + after, Ordering::Relaxed);
        self.stats.flush_invocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of currently occupied, unexpired, unflushed slots. O(N); used
    /// only for diagnostics/tests, never on the request hot path.
    pub fn live_count(&self) -> usize {
        let now = self.now();
        let guard = self.inner.read();
        guard.iter().filter(|s| self.slot_is_visible(s, now)).count()
    }
}

fn parse_ascii_u64(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(capacity: usize) -> CuckooTable {
        let mut cfg = Config::default();
        cfg.cuckoo_nitem = capacity;
        cfg.cuckoo_item_size = 512;
        CuckooTable::new(&cfg, Arc::new(CoarseClock::new()), Arc::new(Stats::new())).unwrap()
    }

    #[test]
    fn set_then_get_round_trips() {
        let t = table(1024);
        assert_eq!(t.set(b"foo", b"bar", 0, 0), PutResult::Stored);
        let item = t.get(b"foo").unwrap();
        assert_eq!(item.value, b"bar");
    }

    #[test]
    fn add_fails_when_present() {
        let t = table(1024);
        t.set(b"foo", b"bar", 0, 0);
        assert_eq!(t.add(b"foo", b"baz", 0, 0), PutResult::NotStored);
        assert_eq!(t.get(b"foo").unwrap().value, b"bar");
    }

    #[test]
    fn add_succeeds_when_absent() {
        let t = table(1024);
        assert_eq!(t.add(b"foo", b"bar", 0, 0), PutResult::Stored);
    }

    #[test]
    fn replace_fails_when_absent() {
        let t = table(1024);
        assert_eq!(t.replace(b"foo", b"bar", 0, 0), PutResult::NotStored);
    }

    #[test]
    fn cas_round_trip() {
        let t = table(1024);
        t.set(b"foo", b"bar", 0, 0);
        let tok = t.get(b"foo").unwrap().cas;
        assert_eq!(t.cas(b"foo", b"qux", 0, 0, tok), PutResult::Stored);
        assert_eq!(t.cas(b"foo", b"zap", 0, 0, tok), PutResult::Exists);
        assert_eq!(t.cas(b"missing", b"v", 0, 0, 1), PutResult::NotFound);
    }

    #[test]
    fn incr_and_decr() {
        let t = table(1024);
        t.set(b"n", b"41", 0, 0);
        assert_eq!(t.incr(b"n", 1), IncrDecrResult::Value(42));
        assert_eq!(t.decr(b"n", 100), IncrDecrResult::Value(0));
    }

    #[test]
    fn incr_rejects_non_numeric() {
        let t = table(1024);
        t.set(b"n", b"not-a-number", 0, 0);
        assert_eq!(t.incr(b"n", 1), IncrDecrResult::NotANumber);
    }

    #[test]
    fn delete_then_miss_then_not_found() {
        let t = table(1024);
        t.set(b"foo", b"bar", 0, 0);
        assert_eq!(t.delete(b"foo"), DeleteResult::Deleted);
        assert!(t.get(b"foo").is_none());
        assert_eq!(t.delete(b"foo"), DeleteResult::NotFound);
    }

    #[test]
    fn expired_item_is_a_miss() {
        let t = table(1024);
        t.set(b"t", b"x", 0, 1);
        assert!(t.get(b"t").is_some());
        // advance the coarse clock manually past the expiry.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        t.clock.tick();
        assert!(t.get(b"t").is_none());
    }

    #[test]
    fn flush_hides_previously_stored_items() {
        let t = table(1024);
        t.set(b"a", b"1", 0, 0);
        t.flush(0);
        assert!(t.get(b"a").is_none());
    }

    #[test]
    fn touch_updates_expiry_without_changing_value() {
        let t = table(1024);
        t.set(b"a", b"1", 0, 0);
        assert_eq!(t.touch(b"a", 100), TouchResult::Touched);
        assert_eq!(t.get(b"a").unwrap().value, b"1");
    }

    #[test]
    fn cas_is_monotonic_non_decreasing() {
        let t = table(1024);
        t.set(b"a", b"1", 0, 0);
        let c1 = t.get(b"a").unwrap().cas;
        t.set(b"a", b"2", 0, 0);
        let c2 = t.get(b"a").unwrap().cas;
        assert!(c2 > c1);
    }

    #[test]
    fn single_slot_table_evicts_instead_of_panicking() {
        // cuckoo_nitem smaller than D_HASHES degenerates `candidates()` to
        // repeats of slot 0 — the second set must displace the first
        // rather than finding an empty victim pool once that slot is
        // excluded from its own displacement.
        let t = table(1);
        assert_eq!(t.set(b"a", b"1", 0, 0), PutResult::Stored);
        t.set(b"b", b"2", 0, 0);
        assert!(t.live_count() <= 1);
    }

    #[test]
    fn overfilling_table_evicts_but_never_panics() {
        let t = table(64);
        for i in 0..5000u32 {
            let key = format!("key-{i}");
            t.set(key.as_bytes(), b"v", 0, 0);
        }
        assert!(t.live_count() <= 64);
    }

    #[test]
    fn get_returns_at_most_one_value_per_key() {
        let t = table(1024);
        for i in 0..200u32 {
            let key = format!("key-{i}");
            t.set(key.as_bytes(), b"v", 0, 0);
        }
        for i in 0..200u32 {
            let key = format!("key-{i}");
            let hits: Vec<_> = (0..1).filter_map(|_| t.get(key.as_bytes())).collect();
            assert!(hits.len() <= 1);
        }
    }
}
