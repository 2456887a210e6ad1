// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// End-to-end scenarios driving raw ASCII protocol bytes through the
// parser, dispatcher, and response encoder without a socket in the
// loop — the same pure pipeline `net::connection::Connection` drives
// per byte range read off the wire.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cuckoo_cache::config::Config;
use cuckoo_cache::protocol::{dispatch, parse_request, protocol_error_response, ParseOutcome};
use cuckoo_cache::stats::Stats;
use cuckoo_cache::storage::CuckooTable;
use cuckoo_cache::time::CoarseClock;

struct Harness {
    table: CuckooTable,
    stats: Arc<Stats>,
}

impl Harness {
    fn new() -> Self {
        let mut cfg = Config::default();
        cfg.cuckoo_item_size = 512;
        cfg.cuckoo_nitem = 64;
        let clock = Arc::new(CoarseClock::new());
        let stats = Arc::new(Stats::new());
        let table = CuckooTable::new(&cfg, clock, Arc::clone(&stats)).unwrap();
        Self { table, stats }
    }

    /// Feed a full request buffer through the incremental parser, dispatch
    /// every frame it yields, and return the concatenated wire response.
    fn drive(&self, mut buf: Vec<u8>) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            match parse_request(&buf, self.table.max_val_len()) {
                ParseOutcome::Incomplete => break,
                ParseOutcome::Parsed { request, consumed } => {
                    let resp = dispatch(request, &self.table, &self.stats);
                    resp.encode(&mut out);
                    buf.drain(..consumed);
                }
                ParseOutcome::Error { error, consumed } => {
                    protocol_error_response(&error).encode(&mut out);
                    buf.drain(..consumed);
                }
            }
            if buf.is_empty() {
                break;
            }
        }
        out
    }
}

#[test]
fn scenario_1_set_then_get() {
    let h = Harness::new();
    let out = h.drive(b"set foo 0 0 3\r\nbar\r\n".to_vec());
    assert_eq!(out, b"STORED\r\n");

    let out = h.drive(b"get foo\r\n".to_vec());
    assert_eq!(out, b"VALUE foo 0 3\r\nbar\r\nEND\r\n");
}

#[test]
fn scenario_2_add_existing_key_not_stored() {
    let h = Harness::new();
    h.drive(b"set foo 0 0 3\r\nbar\r\n".to_vec());

    let out = h.drive(b"add foo 0 0 3\r\nbaz\r\n".to_vec());
    assert_eq!(out, b"NOT_STORED\r\n");
}

#[test]
fn scenario_3_gets_then_cas_then_stale_cas_exists() {
    let h = Harness::new();
    h.drive(b"set foo 0 0 3\r\nbar\r\n".to_vec());

    let out = h.drive(b"gets foo\r\n".to_vec());
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("VALUE foo 0 3 "));
    assert!(text.ends_with("\r\nbar\r\nEND\r\n"));

    let cas_token: u64 = text
        .lines()
        .next()
        .unwrap()
        .rsplit(' ')
        .next()
        .unwrap()
        .parse()
        .unwrap();

    let cmd = format!("cas foo 0 0 3 {cas_token}\r\nqux\r\n");
    let out = h.drive(cmd.into_bytes());
    assert_eq!(out, b"STORED\r\n");

    // Replaying the same (now stale) cas token must be rejected.
    let cmd = format!("cas foo 0 0 3 {cas_token}\r\nzzz\r\n");
    let out = h.drive(cmd.into_bytes());
    assert_eq!(out, b"EXISTS\r\n");
}

#[test]
fn scenario_4_incr_and_decr() {
    let h = Harness::new();
    h.drive(b"set n 0 0 2\r\n41\r\n".to_vec());

    let out = h.drive(b"incr n 1\r\n".to_vec());
    assert_eq!(out, b"42\r\n");

    let out = h.drive(b"decr n 100\r\n".to_vec());
    assert_eq!(out, b"0\r\n");
}

#[test]
fn scenario_5_expiry_then_miss() {
    let mut cfg = Config::default();
    cfg.cuckoo_item_size = 512;
    cfg.cuckoo_nitem = 64;
    let clock = Arc::new(CoarseClock::new());
    let stats = Arc::new(Stats::new());
    let table = CuckooTable::new(&cfg, Arc::clone(&clock), Arc::clone(&stats)).unwrap();

    let mut out = Vec::new();
    let req = match parse_request(b"set t 0 1 1\r\nx\r\n", table.max_val_len()) {
        ParseOutcome::Parsed { request, .. } => request,
        _ => panic!("expected a fully parsed set request"),
    };
    dispatch(req, &table, &stats).encode(&mut out);
    assert_eq!(out, b"STORED\r\n");

    thread::sleep(Duration::from_millis(1100));
    clock.tick();

    let mut out = Vec::new();
    let req = match parse_request(b"get t\r\n", table.max_val_len()) {
        ParseOutcome::Parsed { request, .. } => request,
        _ => panic!("expected a fully parsed get request"),
    };
    dispatch(req, &table, &stats).encode(&mut out);
    assert_eq!(out, b"END\r\n");
}

#[test]
fn scenario_6_pipelined_sets_then_multiget() {
    let h = Harness::new();
    let out = h.drive(b"set a 0 0 1\r\n1\r\nset b 0 0 1\r\n2\r\n".to_vec());
    assert_eq!(out, b"STORED\r\nSTORED\r\n");

    let out = h.drive(b"get a b\r\n".to_vec());
    assert_eq!(out, b"VALUE a 0 1\r\n1\r\nVALUE b 0 1\r\n2\r\nEND\r\n");
}
