// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The reactor: a single accept loop feeding a fixed pool of worker
// threads, each running its own `mio::Poll` over its share of
// connections. Modeled on the single-accept, multi-worker split the
// pooled-allocator and ring-buffer primitives elsewhere in this crate
// were originally built to support across process boundaries — here
// the boundary is just a thread, so the hand-off is a bounded channel
// instead of a shared-memory ring (see `ring`).

pub mod connection;
pub mod listener;
pub mod pool;
pub mod ring;
pub mod worker;

use std::sync::Arc;

use crate::config::Config;
use crate::error::FatalError;
use crate::stats::Stats;
use crate::storage::CuckooTable;
use crate::time::CoarseClock;

pub use connection::{ConnState, Connection};
pub use pool::BufferPool;

/// Owns the shared state every worker and the accept loop need a handle
/// to, and drives the whole reactor to completion.
pub struct Server {
    config: Arc<Config>,
    table: Arc<CuckooTable>,
    stats: Arc<Stats>,
    clock: Arc<CoarseClock>,
}

impl Server {
    pub fn new(config: Config, table: Arc<CuckooTable>, stats: Arc<Stats>, clock: Arc<CoarseClock>) -> Self {
        Self { config: Arc::new(config), table, stats, clock }
    }

    /// Spawn the worker reactors and run the accept loop on the calling
    /// thread. Blocks until the accept loop exits, which normally only
    /// happens on an unrecoverable listener error.
    pub fn run(self) -> Result<(), FatalError> {
        let (producer, consumers) = ring::new_ring(self.config.num_workers, self.config.ring_array_cap);

        let mut handles = Vec::with_capacity(self.config.num_workers);
        for (id, consumer) in consumers.into_iter().enumerate() {
            let config = Arc::clone(&self.config);
            let table = Arc::clone(&self.table);
            let stats = Arc::clone(&self.stats);
            let clock = Arc::clone(&self.clock);
            handles.push(
                std::thread::Builder::new()
                    .name(format!("cuckoo-cached-worker-{id}"))
                    .spawn(move || {
                        if let Err(err) = worker::run_worker(id, config, table, stats, clock, consumer) {
                            tracing::error!(worker = id, error = %err, "worker reactor exited");
                        }
                    })
                    .expect("failed to spawn worker thread"),
            );
        }

        let result = listener::run_listener(&self.config, producer);
        for handle in handles {
            let _ = handle.join();
        }
        result
    }
}
