// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Log sink setup: stderr when `log_name` is unset, otherwise an append
// mode file that `LogHandle::reopen` swaps out in place, so a SIGTTIN
// (logrotate's `postrotate` hook) picks up a renamed-away log file
// without restarting the process.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::FatalError;

#[derive(Clone)]
struct ReopenableFile(Arc<Mutex<File>>);

impl Write for ReopenableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

impl<'a> MakeWriter<'a> for ReopenableFile {
    type Writer = ReopenableFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Handle back to the active log file, if any, so a SIGTTIN can reopen
/// it in place. A `None` path means logs go to stderr, which never needs
/// reopening.
pub struct LogHandle {
    path: Option<String>,
    file: Option<Arc<Mutex<File>>>,
}

impl LogHandle {
    /// Reopen the configured log file at its path, replacing the held
    /// `File` so subsequent writes land in the fresh inode left behind
    /// after a rotation. A no-op when logging goes to stderr.
    pub fn reopen(&self) {
        let (Some(path), Some(file)) = (&self.path, &self.file) else { return };
        match open_append(path) {
            Ok(fresh) => {
                *file.lock().unwrap() = fresh;
                tracing::info!(path = %path, "reopened log file");
            }
            Err(error) => {
                tracing::error!(path = %path, %error, "failed to reopen log file");
            }
        }
    }
}

fn open_append(path: &str) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global `tracing` subscriber, writing to `log_name` if
/// configured or stderr otherwise, filtered by `log_level`.
pub fn init(config: &Config) -> Result<LogHandle, FatalError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_name {
        Some(path) => {
            let file = open_append(path).map_err(|source| {
                FatalError::ConfigInvalid(format!("failed to open log file {path}: {source}"))
            })?;
            let file = Arc::new(Mutex::new(file));
            let writer = ReopenableFile(Arc::clone(&file));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(LogHandle { path: Some(path.clone()), file: Some(file) })
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(LogHandle { path: None, file: None })
        }
    }
}
