// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Fixed-footprint item slot. The key lives in an inline array (never
// heap-allocated); the value lives in a `Vec<u8>` whose capacity is
// reserved once, at table-construction time, to `max_val_len` and never
// grown past it — so no slot ever triggers an allocation on the hot path,
// matching the "items never cross slots" invariant without resorting to
// raw byte-offset packing of a single shared memory blob.

/// Maximum key length accepted by the protocol (memcached convention).
pub const MAX_KEY_LEN: usize = 250;

/// Bytes of fixed per-slot metadata, excluding the embedded key and value.
/// `occupied(1) + key_len(1) + val_len(4) + flags(4) + expiry(8) + cas(8)`,
/// rounded up for alignment headroom.
pub const HEADER_LEN: usize = 32;

/// Smallest `cuckoo_item_size` that can hold the header plus a maximum-length
/// key with a zero-length value. Anything smaller is rejected at startup.
pub const MIN_ITEM_HEADER: usize = HEADER_LEN + MAX_KEY_LEN;

/// Sentinel expiry meaning "never expires".
pub const NEVER_EXPIRES: u64 = 0;

/// One fixed-capacity slot in the cuckoo table.
///
/// A slot with `occupied == false` is free. An occupied slot whose `expiry`
/// is in the past is a *logical* miss but remains physically occupied until
/// overwritten — the spec's lazy-reclamation rule.
#[derive(Clone)]
pub struct Slot {
    occupied: bool,
    key_len: u8,
    key: [u8; MAX_KEY_LEN],
    value: Vec<u8>,
    flags: u32,
    expiry: u64,
    cas: u64,
    /// Coarse-clock seconds at last write. Used as the flush-horizon
    /// comparison point (a time, unlike `cas` which is an operation
    /// counter and not comparable to the flush horizon's time scale).
    write_stamp: u64,
}

impl Slot {
    /// Construct a free slot with `max_val_len` bytes of value capacity
    /// reserved up front.
    pub fn empty(max_val_len: usize) -> Self {
        Self {
            occupied: false,
            key_len: 0,
            key: [0u8; MAX_KEY_LEN],
            value: Vec::with_capacity(max_val_len),
            flags: 0,
            expiry: NEVER_EXPIRES,
            cas: 0,
            write_stamp: 0,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub fn key(&self) -> &[u8] {
        &self.key[..self.key_len as usize]
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn expiry(&self) -> u64 {
        self.expiry
    }

    pub fn cas(&self) -> u64 {
        self.cas
    }

    pub fn write_stamp(&self) -> u64 {
        self.write_stamp
    }

    pub fn key_matches(&self, key: &[u8]) -> bool {
        self.occupied && self.key() == key
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry != NEVER_EXPIRES && self.expiry <= now
    }

    /// Whether this slot is logically free: either never occupied, or
    /// occupied by an item that has since expired.
    pub fn is_free(&self, now: u64) -> bool {
        !self.occupied || self.is_expired(now)
    }

    /// Overwrite this slot's contents in place, reusing the value buffer's
    /// reserved capacity. `key` and `value` must already have been checked
    /// against the table's length limits.
    pub fn fill(&mut self, key: &[u8], value: &[u8], flags: u32, expiry: u64, cas: u64, now: u64) {
        self.occupied = true;
        self.key_len = key.len() as u8;
        self.key[..key.len()].copy_from_slice(key);
        self.value.clear();
        self.value.extend_from_slice(value);
        self.flags = flags;
        self.expiry = expiry;
        self.cas = cas;
        self.write_stamp = now;
    }

    /// Replace only the value, flags, expiry, and cas — key is unchanged.
    /// Used by `incr`/`decr`/`touch` where the resident key already matches.
    pub fn update_value(&mut self, value: &[u8], expiry: u64, cas: u64, now: u64) {
        self.value.clear();
        self.value.extend_from_slice(value);
        self.expiry = expiry;
        self.cas = cas;
        self.write_stamp = now;
    }

    pub fn set_expiry(&mut self, expiry: u64) {
        self.expiry = expiry;
    }

    pub fn clear(&mut self) {
        self.occupied = false;
        self.key_len = 0;
        self.value.clear();
    }

    /// Extract an owned snapshot, used for `get`/`gets` responses and for
    /// carrying a victim item through a displacement chain.
    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            key: self.key().to_vec(),
            value: self.value.clone(),
            flags: self.flags,
            expiry: self.expiry,
            cas: self.cas,
            write_stamp: self.write_stamp,
        }
    }
}

/// An owned copy of an item, detached from the table. Used for displacement
/// chains (the victim must be copied out before its slot can be reused) and
/// for returning `get` results to callers without holding the table lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub flags: u32,
    pub expiry: u64,
    pub cas: u64,
    pub write_stamp: u64,
}
