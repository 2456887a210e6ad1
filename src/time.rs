// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Coarse monotonic clock. Updated once per reactor poll iteration rather
// than read via a syscall on every storage operation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Seconds-granularity monotonic clock shared by every worker.
///
/// `now()` is a relaxed atomic load — cheap enough to call from the hot
/// expiry-check path. `tick()` is called once per poll-loop iteration by
/// each worker; whichever worker ticks most often keeps the clock fresh,
/// which is harmless since all workers agree on "coarse" granularity.
pub struct CoarseClock {
    epoch: Instant,
    secs: AtomicU64,
}

impl CoarseClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            secs: AtomicU64::new(0),
        }
    }

    /// Re-sample the wall clock and publish the new coarse second count.
    pub fn tick(&self) {
        let elapsed = self.epoch.elapsed().as_secs();
        self.secs.store(elapsed, Ordering::Relaxed);
    }

    /// Current coarse time, in seconds since this clock was created.
    pub fn now(&self) -> u64 {
        self.secs.load(Ordering::Relaxed)
    }
}

impl Default for CoarseClock {
    fn default() -> Self {
        Self::new()
    }
}
