// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Single accept loop: one thread owns the listening socket and hands
// every accepted connection off to a worker reactor. Keeping accept on
// one thread avoids the thundering-herd wakeups multiple threads polling
// the same listener would otherwise see.

use std::io;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use crate::config::Config;
use crate::error::FatalError;
use crate::net::ring::AcceptProducer;

const LISTENER_TOKEN: Token = Token(usize::MAX);

/// Upper bound on how long a single `poll` call blocks before the
/// listener re-checks the shutdown flag, even with nothing to accept.
const POLL_TICK: Duration = Duration::from_millis(250);

pub fn run_listener(config: &Config, mut producer: AcceptProducer) -> Result<(), FatalError> {
    let addr_str = format!("{}:{}", config.server_host, config.server_port);
    let addr = addr_str.parse().map_err(|_| FatalError::ConfigInvalid(format!(
        "server_host/server_port do not form a valid socket address: {addr_str}"
    )))?;

    let mut listener = TcpListener::bind(addr).map_err(|source| FatalError::Bind {
        addr: addr_str.clone(),
        source,
    })?;

    let mut poll = Poll::new().map_err(|source| FatalError::Bind { addr: addr_str.clone(), source })?;
    poll.registry()
        .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
        .map_err(|source| FatalError::Bind { addr: addr_str.clone(), source })?;

    tracing::info!(addr = %addr_str, backlog = config.tcp_backlog, "listening");

    let mut events = Events::with_capacity(128);
    loop {
        #[cfg(unix)]
        if crate::signals::shutdown_requested() {
            tracing::info!("shutdown requested, closing listener");
            return Ok(());
        }

        if let Err(source) = poll.poll(&mut events, Some(POLL_TICK)) {
            if source.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(FatalError::Bind { addr: addr_str.clone(), source });
        }

        for event in events.iter() {
            if event.token() != LISTENER_TOKEN {
                continue;
            }
            loop {
                match listener.accept() {
                    Ok(accepted) => {
                        if !producer.dispatch(accepted) {
                            tracing::warn!("all worker rings full or closed, dropping connection");
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(source) => {
                        return Err(FatalError::Bind { addr: addr_str.clone(), source });
                    }
                }
            }
        }
    }
}
