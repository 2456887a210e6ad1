// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Incremental ASCII request parser. Operates directly on a connection's
// read buffer; never copies until a complete frame is known to be present.
// A malformed command line is reported together with how many bytes to
// skip to resynchronize on the next line — the caller never has to guess.

use crate::error::ProtocolError;
use crate::storage::slot::MAX_KEY_LEN;

/// Lines longer than this with no terminating CRLF are themselves treated
/// as malformed rather than buffered forever.
const MAX_LINE_LEN: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get { keys: Vec<Vec<u8>>, with_cas: bool },
    Set { key: Vec<u8>, flags: u32, exptime: u64, data: Vec<u8>, noreply: bool },
    Add { key: Vec<u8>, flags: u32, exptime: u64, data: Vec<u8>, noreply: bool },
    Replace { key: Vec<u8>, flags: u32, exptime: u64, data: Vec<u8>, noreply: bool },
    Cas { key: Vec<u8>, flags: u32, exptime: u64, data: Vec<u8>, cas_unique: u64, noreply: bool },
    Delete { key: Vec<u8>, noreply: bool },
    Incr { key: Vec<u8>, delta: u64, noreply: bool },
    Decr { key: Vec<u8>, delta: u64, noreply: bool },
    Touch { key: Vec<u8>, exptime: u64, noreply: bool },
    FlushAll { delay: u64, noreply: bool },
    Stats,
    Version,
    Quit,
}

/// Result of attempting to parse one request out of a buffer.
pub enum ParseOutcome {
    /// Not enough bytes buffered yet; try again once more data arrives.
    Incomplete,
    /// A full request was parsed; advance the buffer by `consumed` bytes.
    Parsed { request: Request, consumed: usize },
    /// The buffer held a malformed frame; advance by `consumed` bytes (past
    /// the offending line or data block) before parsing again.
    Error { error: ProtocolError, consumed: usize },
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn split_tokens(line: &[u8]) -> Vec<&[u8]> {
    line.split(|&b| b == b' ').filter(|s| !s.is_empty()).collect()
}

fn parse_u64(tok: &[u8]) -> Option<u64> {
    std::str::from_utf8(tok).ok()?.parse().ok()
}

fn parse_u32(tok: &[u8]) -> Option<u32> {
    std::str::from_utf8(tok).ok()?.parse().ok()
}

fn validate_key(key: &[u8]) -> Result<(), ProtocolError> {
    if key.is_empty() {
        Err(ProtocolError::KeyEmpty)
    } else if key.len() > MAX_KEY_LEN {
        Err(ProtocolError::KeyTooLong)
    } else {
        Ok(())
    }
}

fn is_noreply(tokens: &[&[u8]], idx: usize) -> bool {
    tokens.get(idx).map(|t| *t == b"noreply").unwrap_or(false)
}

/// Parse a storage command (`set`/`add`/`replace`/`cas`/`append`/`prepend`)
/// whose header line has already been split into `tokens`, given the full
/// remaining buffer starting at `body_start` (right after the header's
/// CRLF). Returns `None` if the data block hasn't fully arrived yet.
struct StorageHeader {
    key: Vec<u8>,
    flags: u32,
    exptime: u64,
    bytes: usize,
    cas_unique: Option<u64>,
    noreply: bool,
}

fn parse_storage_header(tokens: &[&[u8]], expect_cas: bool) -> Result<StorageHeader, ProtocolError> {
    // cmd key flags exptime bytes [cas unique] [noreply]
    let min_len = if expect_cas { 6 } else { 5 };
    if tokens.len() < min_len {
        return Err(ProtocolError::BadFormat);
    }
    let key = tokens[1].to_vec();
    validate_key(&key)?;
    let flags = parse_u32(tokens[2]).ok_or(ProtocolError::BadFormat)?;
    let exptime = parse_u64(tokens[3]).ok_or(ProtocolError::BadFormat)?;
    let bytes = parse_u64(tokens[4]).ok_or(ProtocolError::BadFormat)? as usize;
    let (cas_unique, next_idx) = if expect_cas {
        let cas = parse_u64(tokens[5]).ok_or(ProtocolError::BadFormat)?;
        (Some(cas), 6)
    } else {
        (None, 5)
    };
    let noreply = is_noreply(tokens, next_idx);
    Ok(StorageHeader { key, flags, exptime, bytes, cas_unique, noreply })
}

pub fn parse_request(buf: &[u8], max_val_len: usize) -> ParseOutcome {
    let line_end = match find_crlf(buf) {
        Some(i) => i,
        None => {
            if buf.len() > MAX_LINE_LEN {
                return ParseOutcome::Error { error: ProtocolError::BadFormat, consumed: buf.len() };
            }
            return ParseOutcome::Incomplete;
        }
    };
    let line = &buf[..line_end];
    let consumed_line = line_end + 2;
    let tokens = split_tokens(line);
    let cmd = match tokens.first() {
        Some(c) => *c,
        // A blank line has no command at all; treat it the same as an
        // unrecognized one rather than a malformed-arguments error.
        None => return ParseOutcome::Error { error: ProtocolError::UnknownCommand, consumed: consumed_line },
    };

    match cmd {
        b"get" | b"gets" => {
            let keys: Vec<Vec<u8>> = tokens[1..].iter().map(|k| k.to_vec()).collect();
            if keys.is_empty() {
                return ParseOutcome::Error { error: ProtocolError::BadFormat, consumed: consumed_line };
            }
            for key in &keys {
                if let Err(e) = validate_key(key) {
                    return ParseOutcome::Error { error: e, consumed: consumed_line };
                }
            }
            ParseOutcome::Parsed {
                request: Request::Get { keys, with_cas: cmd == b"gets" },
                consumed: consumed_line,
            }
        }
        b"set" | b"add" | b"replace" | b"cas" | b"append" | b"prepend" => {
            let expect_cas = cmd == b"cas";
            let header = match parse_storage_header(&tokens, expect_cas) {
                Ok(h) => h,
                Err(e) => return ParseOutcome::Error { error: e, consumed: consumed_line },
            };
            // Reject an oversize declared body as soon as the header names
            // it, rather than buffering up to an attacker-declared length
            // first and only rejecting once the whole thing has arrived.
            if header.bytes > max_val_len {
                return ParseOutcome::Error { error: ProtocolError::ValueTooLarge, consumed: consumed_line };
            }
            let body_start = consumed_line;
            let body_end = body_start + header.bytes + 2;
            if buf.len() < body_end {
                return ParseOutcome::Incomplete;
            }
            let data = buf[body_start..body_start + header.bytes].to_vec();
            let trailer = &buf[body_start + header.bytes..body_end];
            if trailer != b"\r\n" {
                return ParseOutcome::Error { error: ProtocolError::BadFormat, consumed: body_end };
            }
            if cmd == b"append" || cmd == b"prepend" {
                let which = if cmd == b"append" { "append" } else { "prepend" };
                return ParseOutcome::Error {
                    error: ProtocolError::NotSupported(which),
                    consumed: body_end,
                };
            }
            let request = match cmd {
                b"set" => Request::Set {
                    key: header.key, flags: header.flags, exptime: header.exptime,
                    data, noreply: header.noreply,
                },
                b"add" => Request::Add {
                    key: header.key, flags: header.flags, exptime: header.exptime,
                    data, noreply: header.noreply,
                },
                b"replace" => Request::Replace {
                    key: header.key, flags: header.flags, exptime: header.exptime,
                    data, noreply: header.noreply,
                },
                b"cas" => Request::Cas {
                    key: header.key, flags: header.flags, exptime: header.exptime,
                    data, cas_unique: header.cas_unique.unwrap_or(0), noreply: header.noreply,
                },
                _ => unreachable!(),
            };
            ParseOutcome::Parsed { request, consumed: body_end }
        }
        b"delete" => {
            if tokens.len() < 2 {
                return ParseOutcome::Error { error: ProtocolError::BadFormat, consumed: consumed_line };
            }
            let key = tokens[1].to_vec();
            if let Err(e) = validate_key(&key) {
                return ParseOutcome::Error { error: e, consumed: consumed_line };
            }
            let noreply = is_noreply(&tokens, 2);
            ParseOutcome::Parsed { request: Request::Delete { key, noreply }, consumed: consumed_line }
        }
        b"incr" | b"decr" => {
            if tokens.len() < 3 {
                return ParseOutcome::Error { error: ProtocolError::BadFormat, consumed: consumed_line };
            }
            let key = tokens[1].to_vec();
            if let Err(e) = validate_key(&key) {
                return ParseOutcome::Error { error: e, consumed: consumed_line };
            }
            let delta = match parse_u64(tokens[2]) {
                Some(d) => d,
                None => return ParseOutcome::Error { error: ProtocolError::NotANumber, consumed: consumed_line },
            };
            let noreply = is_noreply(&tokens, 3);
            let request = if cmd == b"incr" {
                Request::Incr { key, delta, noreply }
            } else {
                Request::Decr { key, delta, noreply }
            };
            ParseOutcome::Parsed { request, consumed: consumed_line }
        }
        b"touch" => {
            if tokens.len() < 3 {
                return ParseOutcome::Error { error: ProtocolError::BadFormat, consumed: consumed_line };
            }
            let key = tokens[1].to_vec();
            if let Err(e) = validate_key(&key) {
                return ParseOutcome::Error { error: e, consumed: consumed_line };
            }
            let exptime = match parse_u64(tokens[2]) {
                Some(e) => e,
                None => return ParseOutcome::Error { error: ProtocolError::BadFormat, consumed: consumed_line },
            };
            let noreply = is_noreply(&tokens, 3);
            ParseOutcome::Parsed { request: Request::Touch { key, exptime, noreply }, consumed: consumed_line }
        }
        b"flush_all" => {
            let (delay, noreply_idx) = match tokens.get(1) {
                Some(tok) if *tok != b"noreply" => {
                    match parse_u64(tok) {
                        Some(d) => (d, 2),
                        None => return ParseOutcome::Error { error: ProtocolError::BadFormat, consumed: consumed_line },
                    }
                }
                _ => (0, 1),
            };
            let noreply = is_noreply(&tokens, noreply_idx);
            ParseOutcome::Parsed { request: Request::FlushAll { delay, noreply }, consumed: consumed_line }
        }
        b"stats" => ParseOutcome::Parsed { request: Request::Stats, consumed: consumed_line },
        b"version" => ParseOutcome::Parsed { request: Request::Version, consumed: consumed_line },
        b"quit" => ParseOutcome::Parsed { request: Request::Quit, consumed: consumed_line },
        _ => ParseOutcome::Error { error: ProtocolError::UnknownCommand, consumed: consumed_line },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: usize = 1024;

    fn parsed(buf: &[u8]) -> (Request, usize) {
        match parse_request(buf, CAP) {
            ParseOutcome::Parsed { request, consumed } => (request, consumed),
            ParseOutcome::Incomplete => panic!("expected a parsed request, got Incomplete"),
            ParseOutcome::Error { error, .. } => panic!("expected a parsed request, got error {error:?}"),
        }
    }

    #[test]
    fn parses_get_with_multiple_keys() {
        let (req, consumed) = parsed(b"get foo bar\r\n");
        assert_eq!(consumed, b"get foo bar\r\n".len());
        assert_eq!(
            req,
            Request::Get { keys: vec![b"foo".to_vec(), b"bar".to_vec()], with_cas: false }
        );
    }

    #[test]
    fn gets_sets_with_cas_flag() {
        let (req, _) = parsed(b"gets foo\r\n");
        match req {
            Request::Get { with_cas, .. } => assert!(with_cas),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_set_with_full_data_block() {
        let buf = b"set foo 0 0 3\r\nbar\r\n";
        let (req, consumed) = parsed(buf);
        assert_eq!(consumed, buf.len());
        assert_eq!(
            req,
            Request::Set { key: b"foo".to_vec(), flags: 0, exptime: 0, data: b"bar".to_vec(), noreply: false }
        );
    }

    #[test]
    fn set_waits_for_full_data_block() {
        let buf = b"set foo 0 0 10\r\npartial";
        assert!(matches!(parse_request(buf, CAP), ParseOutcome::Incomplete));
    }

    #[test]
    fn set_noreply_is_recognized() {
        let buf = b"set foo 0 0 3 noreply\r\nbar\r\n";
        let (req, _) = parsed(buf);
        match req {
            Request::Set { noreply, .. } => assert!(noreply),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cas_parses_cas_unique_token() {
        let buf = b"cas foo 0 0 3 42\r\nbar\r\n";
        let (req, _) = parsed(buf);
        match req {
            Request::Cas { cas_unique, .. } => assert_eq!(cas_unique, 42),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn append_and_prepend_are_rejected_but_consume_the_frame() {
        let buf = b"append foo 0 0 3\r\nbar\r\n";
        match parse_request(buf, CAP) {
            ParseOutcome::Error { error: ProtocolError::NotSupported(which), consumed } => {
                assert_eq!(which, "append");
                assert_eq!(consumed, buf.len());
            }
            other => panic!("expected NotSupported error, got different outcome: {}", matches!(other, ParseOutcome::Incomplete)),
        }
    }

    #[test]
    fn malformed_line_reports_resync_point() {
        let buf = b"bogus line here\r\nget foo\r\n";
        match parse_request(buf, CAP) {
            ParseOutcome::Error { error: ProtocolError::UnknownCommand, consumed } => {
                assert_eq!(consumed, b"bogus line here\r\n".len());
                let (req, _) = parsed(&buf[consumed..]);
                assert_eq!(req, Request::Get { keys: vec![b"foo".to_vec()], with_cas: false });
            }
            other => panic!("expected UnknownCommand error, got {}", matches!(other, ParseOutcome::Incomplete)),
        }
    }

    #[test]
    fn empty_key_is_rejected() {
        let buf = b"delete \r\n";
        assert!(matches!(
            parse_request(buf, CAP),
            ParseOutcome::Error { error: ProtocolError::BadFormat, .. }
        ));
    }

    #[test]
    fn oversized_key_is_rejected() {
        let long_key = vec![b'k'; 300];
        let mut buf = b"delete ".to_vec();
        buf.extend_from_slice(&long_key);
        buf.extend_from_slice(b"\r\n");
        assert!(matches!(
            parse_request(&buf, CAP),
            ParseOutcome::Error { error: ProtocolError::KeyTooLong, .. }
        ));
    }

    #[test]
    fn oversize_declared_body_is_rejected_before_it_arrives() {
        // The header names a body far bigger than the cap and far bigger
        // than what's actually buffered — rejection must not wait for the
        // (possibly never-arriving) rest of the body.
        let buf = b"set foo 0 0 999999\r\nshort";
        match parse_request(buf, CAP) {
            ParseOutcome::Error { error: ProtocolError::ValueTooLarge, consumed } => {
                assert_eq!(consumed, b"set foo 0 0 999999\r\n".len());
            }
            other => panic!("expected ValueTooLarge, got {}", matches!(other, ParseOutcome::Incomplete)),
        }
    }

    #[test]
    fn blank_line_reports_bare_unknown_command() {
        let buf = b"\r\nget foo\r\n";
        match parse_request(buf, CAP) {
            ParseOutcome::Error { error: ProtocolError::UnknownCommand, consumed } => {
                assert_eq!(consumed, 2);
            }
            other => panic!("expected UnknownCommand, got {}", matches!(other, ParseOutcome::Incomplete)),
        }
    }

    #[test]
    fn incomplete_line_without_crlf_waits() {
        assert!(matches!(parse_request(b"get foo", CAP), ParseOutcome::Incomplete));
    }

    #[test]
    fn incr_with_non_numeric_delta_is_rejected() {
        let buf = b"incr foo bar\r\n";
        assert!(matches!(
            parse_request(buf, CAP),
            ParseOutcome::Error { error: ProtocolError::NotANumber, .. }
        ));
    }

    #[test]
    fn flush_all_with_delay_and_noreply() {
        let (req, _) = parsed(b"flush_all 30 noreply\r\n");
        assert_eq!(req, Request::FlushAll { delay: 30, noreply: true });
    }

    #[test]
    fn flush_all_bare() {
        let (req, _) = parsed(b"flush_all\r\n");
        assert_eq!(req, Request::FlushAll { delay: 0, noreply: false });
    }

    #[test]
    fn quit_and_version_and_stats() {
        assert_eq!(parsed(b"quit\r\n").0, Request::Quit);
        assert_eq!(parsed(b"version\r\n").0, Request::Version);
        assert_eq!(parsed(b"stats\r\n").0, Request::Stats);
    }
}
