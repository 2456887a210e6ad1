// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy for the cache server: protocol errors stay on the
// connection, connection errors close it, fatal errors terminate the
// process.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while evaluating a single request against the
/// storage engine or the codec. Never escapes the connection that produced
/// it — the caller turns it into a `Response` and keeps going.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("bad command line format")]
    BadFormat,
    #[error("key too long")]
    KeyTooLong,
    #[error("key is empty")]
    KeyEmpty,
    #[error("value too large")]
    ValueTooLarge,
    #[error("{0} not supported")]
    NotSupported(&'static str),
    #[error("invalid numeric delta")]
    NotANumber,
    #[error("unknown command")]
    UnknownCommand,
}

/// Reason a connection was torn down, carried only as far as the worker
/// reactor's own logging — the peer never sees it, since by the time one
/// of these fires there's nowhere left to write a response.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("idle timeout")]
    IdleTimeout,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Setup failure. Only these terminate the process; `main` maps them onto
/// the exit codes from the configuration surface.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to allocate cuckoo table: {0}")]
    TableAllocation(String),
    #[error("daemonization failed: {0}")]
    Daemonize(std::io::Error),
}

/// Process exit codes, matching the BSD `sysexits.h` convention the spec
/// references (`EX_USAGE`, `EX_DATAERR`, `EX_CONFIG`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Ok = 0,
    Usage = 64,
    DataErr = 65,
    Config = 78,
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as i32)
    }
}

impl FatalError {
    /// The process exit code this error should produce.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            FatalError::ConfigRead { .. } | FatalError::ConfigParse { .. } => ExitCode::DataErr,
            FatalError::ConfigInvalid(_)
            | FatalError::Bind { .. }
            | FatalError::TableAllocation(_)
            | FatalError::Daemonize(_) => ExitCode::Config,
        }
    }
}
