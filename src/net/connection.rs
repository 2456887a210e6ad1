// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Per-connection state machine: Reading -> Processing -> Writing, looping
// back to Reading once the response buffer drains, or Closing once the
// peer disconnects, a fatal I/O error occurs, or a `quit` is dispatched.

use std::io::{self, Read, Write};
use std::sync::atomic::Ordering;

use mio::net::TcpStream;
use mio::{Interest, Token};

use crate::protocol::{dispatch, parse_request, protocol_error_response, ParseOutcome, Request, Response};
use crate::stats::Stats;
use crate::storage::CuckooTable;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Reading,
    Processing,
    Writing,
    Closing,
}

pub struct Connection {
    stream: TcpStream,
    token: Token,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    write_pos: usize,
    state: ConnState,
    last_active: u64,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        token: Token,
        read_buf: Vec<u8>,
        write_buf: Vec<u8>,
        now: u64,
    ) -> Self {
        Self { stream, token, read_buf, write_buf, write_pos: 0, state: ConnState::Reading, last_active: now }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn is_closing(&self) -> bool {
        matches!(self.state, ConnState::Closing)
    }

    pub fn is_idle(&self, now: u64, idle_timeout_secs: u64) -> bool {
        idle_timeout_secs != 0 && now.saturating_sub(self.last_active) >= idle_timeout_secs
    }

    pub fn interest(&self) -> Interest {
        match self.state {
            ConnState::Reading | ConnState::Processing => Interest::READABLE,
            ConnState::Writing => Interest::WRITABLE,
            ConnState::Closing => Interest::READABLE,
        }
    }

    /// Drain the socket into `read_buf`, dispatch every complete request
    /// buffered so far, and transition to `Writing` if any response bytes
    /// are now queued.
    pub fn on_readable(&mut self, table: &CuckooTable, stats: &Stats, now: u64) -> io::Result<()> {
        self.last_active = now;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.state = ConnState::Closing;
                    break;
                }
                Ok(n) => {
                    stats.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
                    self.read_buf.extend_from_slice(&chunk[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if !matches!(self.state, ConnState::Closing) {
            self.state = ConnState::Processing;
            self.process_buffered(table, stats);
        }

        if !self.write_buf.is_empty() {
            self.state = ConnState::Writing;
        } else if matches!(self.state, ConnState::Processing) {
            self.state = ConnState::Reading;
        }
        Ok(())
    }

    fn process_buffered(&mut self, table: &CuckooTable, stats: &Stats) {
        loop {
            match parse_request(&self.read_buf, table.max_val_len()) {
                ParseOutcome::Incomplete => break,
                ParseOutcome::Parsed { request, consumed } => {
                    let wants_close = matches!(request, Request::Quit);
                    let response = dispatch(request, table, stats);
                    let is_quit = matches!(response, Response::Quit);
                    let written = response.encode(&mut self.write_buf);
                    stats.bytes_written.fetch_add(written as u64, Ordering::Relaxed);
                    self.read_buf.drain(..consumed);
                    if wants_close || is_quit {
                        self.state = ConnState::Closing;
                        break;
                    }
                }
                ParseOutcome::Error { error, consumed } => {
                    let response = protocol_error_response(&error);
                    let written = response.encode(&mut self.write_buf);
                    stats.bytes_written.fetch_add(written as u64, Ordering::Relaxed);
                    self.read_buf.drain(..consumed);
                }
            }
        }
    }

    /// Flush as much of `write_buf` as the socket will take without
    /// blocking. Transitions back to `Reading` once fully drained, unless
    /// a `quit` already marked this connection for close.
    pub fn on_writable(&mut self) -> io::Result<()> {
        while self.write_pos < self.write_buf.len() {
            match self.stream.write(&self.write_buf[self.write_pos..]) {
                Ok(0) => {
                    self.state = ConnState::Closing;
                    return Ok(());
                }
                Ok(n) => self.write_pos += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.write_buf.clear();
        self.write_pos = 0;
        if !matches!(self.state, ConnState::Closing) {
            self.state = ConnState::Reading;
        }
        Ok(())
    }

    /// Reclaim this connection's buffers for the pool once it's closed.
    pub fn into_buffers(self) -> (Vec<u8>, Vec<u8>) {
        (self.read_buf, self.write_buf)
    }
}
