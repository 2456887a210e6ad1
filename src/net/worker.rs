// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// One reactor per worker thread: owns a `mio::Poll`, a slab of
// connections keyed by `mio::Token`, and a buffer pool. Ticks the shared
// coarse clock once per wakeup rather than on every request.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use mio::{Events, Interest, Poll, Token};
use slab::Slab;

use crate::config::Config;
use crate::error::ConnectionError;
use crate::net::connection::Connection;
use crate::net::pool::BufferPool;
use crate::net::ring::AcceptConsumer;
use crate::stats::Stats;
use crate::storage::CuckooTable;
use crate::time::CoarseClock;

/// Upper bound on how long a single `poll` call blocks before the worker
/// re-ticks the clock and scans for idle connections, even with nothing
/// to do.
const POLL_TICK: Duration = Duration::from_millis(250);

pub fn run_worker(
    id: usize,
    config: Arc<Config>,
    table: Arc<CuckooTable>,
    stats: Arc<Stats>,
    clock: Arc<CoarseClock>,
    consumer: AcceptConsumer,
) -> io::Result<()> {
    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(1024);
    let mut connections: Slab<Connection> = Slab::with_capacity(config.tcp_poolsize);
    let mut pool = BufferPool::new(config.buf_init_size, config.buf_sock_poolsize);

    loop {
        #[cfg(unix)]
        if crate::signals::shutdown_requested() {
            tracing::info!(worker = id, "shutdown requested, exiting reactor");
            return Ok(());
        }

        match poll.poll(&mut events, Some(POLL_TICK)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
        clock.tick();
        let now = clock.now();

        while connections.len() < config.tcp_poolsize {
            let Some((mut stream, _addr)) = consumer.try_recv() else { break };
            let read_buf = pool.acquire();
            let write_buf = pool.acquire();
            let entry = connections.vacant_entry();
            let token = Token(entry.key());
            if let Err(e) = poll.registry().register(&mut stream, token, Interest::READABLE) {
                tracing::warn!(worker = id, error = %e, "failed to register accepted connection");
                continue;
            }
            stats.connections_total.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            stats.connections_current.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            entry.insert(Connection::new(stream, token, read_buf, write_buf, now));
        }

        for event in events.iter() {
            let key = event.token().0;
            if !connections.contains(key) {
                continue;
            }

            if event.is_readable() {
                if let Err(e) = connections[key].on_readable(&table, &stats, now) {
                    close_connection(id, &mut poll, &mut connections, &mut pool, &stats, key, ConnectionError::Io(e));
                    continue;
                }
            }
            if connections.contains(key) && event.is_writable() {
                if let Err(e) = connections[key].on_writable() {
                    close_connection(id, &mut poll, &mut connections, &mut pool, &stats, key, ConnectionError::Io(e));
                    continue;
                }
            }

            if !connections.contains(key) {
                continue;
            }
            if connections[key].is_closing() {
                close_connection(id, &mut poll, &mut connections, &mut pool, &stats, key, ConnectionError::PeerClosed);
            } else {
                let interest = connections[key].interest();
                let _ = poll.registry().reregister(connections[key].stream_mut(), Token(key), interest);
            }
        }

        if config.idle_timeout_secs != 0 {
            let idle: Vec<usize> = connections
                .iter()
                .filter(|(_, c)| c.is_idle(now, config.idle_timeout_secs))
                .map(|(key, _)| key)
                .collect();
            for key in idle {
                close_connection(id, &mut poll, &mut connections, &mut pool, &stats, key, ConnectionError::IdleTimeout);
            }
        }
    }
}

fn close_connection(
    worker_id: usize,
    poll: &mut Poll,
    connections: &mut Slab<Connection>,
    pool: &mut BufferPool,
    stats: &Stats,
    key: usize,
    reason: ConnectionError,
) {
    if !connections.contains(key) {
        return;
    }
    let mut conn = connections.remove(key);
    let _ = poll.registry().deregister(conn.stream_mut());
    stats.connections_current.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    tracing::debug!(worker = worker_id, key, reason = %reason, "closing connection");
    let (read_buf, write_buf) = conn.into_buffers();
    pool.release(read_buf);
    pool.release(write_buf);
}
