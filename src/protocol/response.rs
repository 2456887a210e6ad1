// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Response framing: turns the outcome of dispatching a `Request` against
// the storage engine into the exact bytes memcached clients expect.

use crate::storage::ItemSnapshot;

pub struct ValueLine {
    pub key: Vec<u8>,
    pub item: ItemSnapshot,
}

pub enum Response {
    /// `VALUE <key> <flags> <bytes> [<cas>]\r\n<data>\r\n` per line, then
    /// `END\r\n`. `with_cas` controls whether the cas field is emitted
    /// (set by `gets`, never by plain `get`).
    Values { lines: Vec<ValueLine>, with_cas: bool },
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    Touched,
    Number(u64),
    Ok,
    /// Bare `ERROR\r\n` — unrecognized command or a garbage line that
    /// couldn't be assigned any more specific error, matching memcached's
    /// own distinction between this and `CLIENT_ERROR <msg>`.
    Error,
    ClientError(String),
    ServerError(String),
    Stats(Vec<(&'static str, u64)>),
    Version(&'static str),
    /// Request was satisfied but the client asked for `noreply` — write
    /// nothing back.
    Suppressed,
    /// Connection should close after flushing whatever has been written.
    Quit,
}

impl Response {
    /// Serialize onto `out`. Returns the number of bytes appended, for
    /// stats bookkeeping.
    pub fn encode(&self, out: &mut Vec<u8>) -> usize {
        let start = out.len();
        match self {
            Response::Values { lines, with_cas } => {
                for line in lines {
                    out.extend_from_slice(b"VALUE ");
                    out.extend_from_slice(&line.key);
                    out.extend_from_slice(format!(" {} {}", line.item.flags, line.item.value.len()).as_bytes());
                    if *with_cas {
                        out.extend_from_slice(format!(" {}", line.item.cas).as_bytes());
                    }
                    out.extend_from_slice(b"\r\n");
                    out.extend_from_slice(&line.item.value);
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(b"END\r\n");
            }
            Response::Stored => out.extend_from_slice(b"STORED\r\n"),
            Response::NotStored => out.extend_from_slice(b"NOT_STORED\r\n"),
            Response::Exists => out.extend_from_slice(b"EXISTS\r\n"),
            Response::NotFound => out.extend_from_slice(b"NOT_FOUND\r\n"),
            Response::Deleted => out.extend_from_slice(b"DELETED\r\n"),
            Response::Touched => out.extend_from_slice(b"TOUCHED\r\n"),
            Response::Number(n) => out.extend_from_slice(format!("{n}\r\n").as_bytes()),
            Response::Ok => out.extend_from_slice(b"OK\r\n"),
            Response::Error => out.extend_from_slice(b"ERROR\r\n"),
            Response::ClientError(msg) => {
                out.extend_from_slice(b"CLIENT_ERROR ");
                out.extend_from_slice(msg.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Response::ServerError(msg) => {
                out.extend_from_slice(b"SERVER_ERROR ");
                out.extend_from_slice(msg.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Response::Stats(rows) => {
                for (name, value) in rows {
                    out.extend_from_slice(format!("STAT {name} {value}\r\n").as_bytes());
                }
                out.extend_from_slice(b"END\r\n");
            }
            Response::Version(v) => {
                out.extend_from_slice(b"VERSION ");
                out.extend_from_slice(v.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Response::Suppressed | Response::Quit => {}
        }
        out.len() - start
    }
}
