// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Ambient bookkeeping counters, reported via the ASCII `stats` command.
// Updated with relaxed atomics on every request path; the snapshot taken
// for `stats` is a best-effort read, not a transaction.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! counters {
    ($($field:ident),+ $(,)?) => {
        #[derive(Default)]
        pub struct Stats {
            $(pub $field: AtomicU64,)+
        }

        #[derive(Debug, Default, Clone, Copy)]
        pub struct StatsSnapshot {
            $(pub $field: u64,)+
        }

        impl Stats {
            pub fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)+
                }
            }
        }
    };
}

counters! {
    connections_total,
    connections_current,
    cmd_get,
    cmd_set,
    get_hits,
    get_misses,
    delete_hits,
    delete_misses,
    incr_hits,
    incr_misses,
    decr_hits,
    decr_misses,
    touch_hits,
    touch_misses,
    cas_hits,
    cas_misses,
    cas_badval,
    stored,
    not_stored,
    evictions,
    expired_reclaimed,
    flush_invocations,
    bytes_read,
    bytes_written,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

impl StatsSnapshot {
    /// Render as `STAT <name> <value>\r\n` rows, without the trailing `END`.
    pub fn to_rows(self) -> Vec<(&'static str, u64)> {
        vec![
            ("connections_total", self.connections_total),
            ("connections_current", self.connections_current),
            ("cmd_get", self.cmd_get),
            ("cmd_set", self.cmd_set),
            ("get_hits", self.get_hits),
            ("get_misses", self.get_misses),
            ("delete_hits", self.delete_hits),
            ("delete_misses", self.delete_misses),
            ("incr_hits", self.incr_hits),
            ("incr_misses", self.incr_misses),
            ("decr_hits", self.decr_hits),
            ("decr_misses", self.decr_misses),
            ("touch_hits", self.touch_hits),
            ("touch_misses", self.touch_misses),
            ("cas_hits", self.cas_hits),
            ("cas_misses", self.cas_misses),
            ("cas_badval", self.cas_badval),
            ("stored", self.stored),
            ("not_stored", self.not_stored),
            ("evictions", self.evictions),
            ("expired_reclaimed", self.expired_reclaimed),
            ("flush_invocations", self.flush_invocations),
            ("bytes_read", self.bytes_read),
            ("bytes_written", self.bytes_written),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let stats = Stats::new();
        Stats::inc(&stats.cmd_get);
        Stats::inc(&stats.cmd_get);
        Stats::inc(&stats.get_hits);
        let snap = stats.snapshot();
        assert_eq!(snap.cmd_get, 2);
        assert_eq!(snap.get_hits, 1);
        assert_eq!(snap.get_misses, 0);
    }
}
