// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Turns a parsed `Request` into a `Response` by driving the storage
// engine and updating the command counters. Pure function of
// (request, table, stats) — no I/O, so it's exercised directly in tests
// without a socket.

use crate::error::ProtocolError;
use crate::protocol::codec::Request;
use crate::protocol::response::{Response, ValueLine};
use crate::stats::Stats;
use crate::storage::{CuckooTable, DeleteResult, IncrDecrResult, PutResult, TouchResult};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn protocol_error_response(err: &ProtocolError) -> Response {
    match err {
        // Memcached's own bare `ERROR` is reserved for "no idea what this
        // line is" — an unrecognized command, or a line with no command
        // token at all. Every other protocol error names what was wrong
        // with otherwise-recognized input, so it gets `CLIENT_ERROR <msg>`.
        ProtocolError::UnknownCommand => Response::Error,
        ProtocolError::NotSupported(which) => {
            Response::ClientError(format!("{which} is not supported"))
        }
        ProtocolError::NotANumber => {
            Response::ClientError("cannot increment or decrement non-numeric value".to_string())
        }
        other => Response::ClientError(other.to_string()),
    }
}

pub fn dispatch(req: Request, table: &CuckooTable, stats: &Stats) -> Response {
    match req {
        Request::Get { keys, with_cas } => {
            Stats::add(&stats.cmd_get, keys.len() as u64);
            let mut lines = Vec::with_capacity(keys.len());
            for key in keys {
                match table.get(&key) {
                    Some(item) => {
                        Stats::inc(&stats.get_hits);
                        lines.push(ValueLine { key, item });
                    }
                    None => Stats::inc(&stats.get_misses),
                }
            }
            Response::Values { lines, with_cas }
        }

        Request::Set { key, flags, exptime, data, noreply } => {
            Stats::inc(&stats.cmd_set);
            if data.len() > table.max_val_len() {
                return reply(noreply, Response::ClientError("value too large".to_string()));
            }
            table.set(&key, &data, flags, exptime);
            Stats::inc(&stats.stored);
            reply(noreply, Response::Stored)
        }

        Request::Add { key, flags, exptime, data, noreply } => {
            if data.len() > table.max_val_len() {
                return reply(noreply, Response::ClientError("value too large".to_string()));
            }
            let resp = match table.add(&key, &data, flags, exptime) {
                PutResult::Stored => { Stats::inc(&stats.stored); Response::Stored }
                _ => { Stats::inc(&stats.not_stored); Response::NotStored }
            };
            reply(noreply, resp)
        }

        Request::Replace { key, flags, exptime, data, noreply } => {
            if data.len() > table.max_val_len() {
                return reply(noreply, Response::ClientError("value too large".to_string()));
            }
            let resp = match table.replace(&key, &data, flags, exptime) {
                PutResult::Stored => { Stats::inc(&stats.stored); Response::Stored }
                _ => { Stats::inc(&stats.not_stored); Response::NotStored }
            };
            reply(noreply, resp)
        }

        Request::Cas { key, flags, exptime, data, cas_unique, noreply } => {
            if !table.cas_enabled() {
                return reply(noreply, Response::ClientError("cas is disabled".to_string()));
            }
            if data.len() > table.max_val_len() {
                return reply(noreply, Response::ClientError("value too large".to_string()));
            }
            let resp = match table.cas(&key, &data, flags, exptime, cas_unique) {
                PutResult::Stored => { Stats::inc(&stats.cas_hits); Response::Stored }
                PutResult::Exists => { Stats::inc(&stats.cas_badval); Response::Exists }
                PutResult::NotFound => { Stats::inc(&stats.cas_misses); Response::NotFound }
                PutResult::NotStored => unreachable!("cas never returns NotStored"),
            };
            reply(noreply, resp)
        }

        Request::Delete { key, noreply } => {
            let resp = match table.delete(&key) {
                DeleteResult::Deleted => { Stats::inc(&stats.delete_hits); Response::Deleted }
                DeleteResult::NotFound => { Stats::inc(&stats.delete_misses); Response::NotFound }
            };
            reply(noreply, resp)
        }

        Request::Incr { key, delta, noreply } => {
            let resp = match table.incr(&key, delta) {
                IncrDecrResult::Value(v) => { Stats::inc(&stats.incr_hits); Response::Number(v) }
                IncrDecrResult::NotFound => { Stats::inc(&stats.incr_misses); Response::NotFound }
                IncrDecrResult::NotANumber => {
                    Response::ClientError("cannot increment or decrement non-numeric value".to_string())
                }
            };
            reply(noreply, resp)
        }

        Request::Decr { key, delta, noreply } => {
            let resp = match table.decr(&key, delta) {
                IncrDecrResult::Value(v) => { Stats::inc(&stats.decr_hits); Response::Number(v) }
                IncrDecrResult::NotFound => { Stats::inc(&stats.decr_misses); Response::NotFound }
                IncrDecrResult::NotANumber => {
                    Response::ClientError("cannot increment or decrement non-numeric value".to_string())
                }
            };
            reply(noreply, resp)
        }

        Request::Touch { key, exptime, noreply } => {
            let resp = match table.touch(&key, exptime) {
                TouchResult::Touched => { Stats::inc(&stats.touch_hits); Response::Touched }
                TouchResult::NotFound => { Stats::inc(&stats.touch_misses); Response::NotFound }
            };
            reply(noreply, resp)
        }

        Request::FlushAll { delay, noreply } => {
            table.flush(delay);
            reply(noreply, Response::Ok)
        }

        Request::Stats => Response::Stats(stats.snapshot().to_rows()),
        Request::Version => Response::Version(VERSION),
        Request::Quit => Response::Quit,
    }
}

fn reply(noreply: bool, resp: Response) -> Response {
    if noreply {
        Response::Suppressed
    } else {
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::time::CoarseClock;
    use std::sync::Arc;

    fn env() -> (CuckooTable, Stats) {
        let mut cfg = Config::default();
        cfg.cuckoo_item_size = 512;
        cfg.cuckoo_nitem = 1024;
        let table = CuckooTable::new(&cfg, Arc::new(CoarseClock::new()), Arc::new(Stats::new())).unwrap();
        (table, Stats::new())
    }

    #[test]
    fn set_then_get_reports_stored_and_value() {
        let (table, stats) = env();
        let resp = dispatch(
            Request::Set { key: b"k".to_vec(), flags: 0, exptime: 0, data: b"v".to_vec(), noreply: false },
            &table, &stats,
        );
        assert!(matches!(resp, Response::Stored));

        let resp = dispatch(Request::Get { keys: vec![b"k".to_vec()], with_cas: false }, &table, &stats);
        match resp {
            Response::Values { lines, .. } => {
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0].item.value, b"v");
            }
            _ => panic!("expected Response::Values"),
        }
    }

    #[test]
    fn noreply_suppresses_response() {
        let (table, stats) = env();
        let resp = dispatch(
            Request::Set { key: b"k".to_vec(), flags: 0, exptime: 0, data: b"v".to_vec(), noreply: true },
            &table, &stats,
        );
        assert!(matches!(resp, Response::Suppressed));
    }

    #[test]
    fn oversized_value_is_client_error() {
        let (table, stats) = env();
        let big = vec![0u8; table.max_val_len() + 1];
        let resp = dispatch(
            Request::Set { key: b"k".to_vec(), flags: 0, exptime: 0, data: big, noreply: false },
            &table, &stats,
        );
        assert!(matches!(resp, Response::ClientError(_)));
    }

    #[test]
    fn unknown_command_reports_bare_error() {
        use crate::protocol::{parse_request, protocol_error_response, ParseOutcome};
        match parse_request(b"bogus\r\n", 512) {
            ParseOutcome::Error { error, .. } => {
                assert!(matches!(protocol_error_response(&error), Response::Error));
            }
            other => panic!("expected a parse error, got {}", matches!(other, ParseOutcome::Incomplete)),
        }
    }

    #[test]
    fn delete_miss_reports_not_found() {
        let (table, stats) = env();
        let resp = dispatch(Request::Delete { key: b"missing".to_vec(), noreply: false }, &table, &stats);
        assert!(matches!(resp, Response::NotFound));
    }

    #[test]
    fn version_and_stats_respond_without_touching_table() {
        let (table, stats) = env();
        assert!(matches!(dispatch(Request::Version, &table, &stats), Response::Version(_)));
        assert!(matches!(dispatch(Request::Stats, &table, &stats), Response::Stats(_)));
    }

    #[test]
    fn quit_returns_quit_response() {
        let (table, stats) = env();
        assert!(matches!(dispatch(Request::Quit, &table, &stats), Response::Quit));
    }
}
