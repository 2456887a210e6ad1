// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Entry point: parse arguments, load configuration, stand up logging,
// build the storage engine, and hand off to the reactor. Every setup
// failure is a `FatalError`, mapped onto the process's exit code on the
// way out.

use std::sync::Arc;

use clap::Parser;

use cuckoo_cache::config::Config;
use cuckoo_cache::error::{ExitCode, FatalError};
use cuckoo_cache::logging;
use cuckoo_cache::net::Server;
use cuckoo_cache::stats::Stats;
use cuckoo_cache::storage::CuckooTable;
use cuckoo_cache::time::CoarseClock;

#[cfg(unix)]
use cuckoo_cache::{daemon, signals};

#[derive(Parser)]
#[command(
    name = "cuckoo-cached",
    version,
    about = "A memcached ASCII-protocol cache server backed by a fixed-capacity cuckoo hash table"
)]
struct Cli {
    /// Path to a TOML configuration file. Missing fields fall back to
    /// their defaults, so an empty file is valid.
    config: String,
}

fn main() {
    let code = match run() {
        Ok(()) => ExitCode::Ok,
        Err(err) => {
            eprintln!("cuckoo-cached: {err:#}");
            err.downcast_ref::<FatalError>()
                .map(FatalError::exit_code)
                .unwrap_or(ExitCode::Config)
        }
    };
    std::process::exit(code as i32);
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;

    let log_handle = logging::init(&config)?;

    #[cfg(unix)]
    signals::install()?;

    // Daemonizing forks, and fork() only carries the calling thread into
    // the child — the log-reopen watcher must start after, not before.
    #[cfg(unix)]
    if config.daemonize {
        daemon::daemonize()?;
    }

    #[cfg(unix)]
    let _pid_guard = match &config.pid_filename {
        Some(path) => Some(daemon::PidFile::create(path)?),
        None => None,
    };

    #[cfg(unix)]
    spawn_log_reopen_watcher(log_handle);
    #[cfg(not(unix))]
    drop(log_handle);

    let clock = Arc::new(CoarseClock::new());
    let stats = Arc::new(Stats::new());
    let table = Arc::new(CuckooTable::new(&config, Arc::clone(&clock), Arc::clone(&stats))?);

    tracing::info!(
        host = %config.server_host,
        port = config.server_port,
        workers = config.num_workers,
        capacity = config.cuckoo_nitem,
        "starting cuckoo-cached"
    );

    let server = Server::new(config, table, stats, clock);
    server.run()?;
    Ok(())
}

/// Poll for SIGTTIN on a dedicated thread and reopen the log file each
/// time it fires, so a logrotate `postrotate` hook never has to restart
/// the process to pick up a renamed-away file.
#[cfg(unix)]
fn spawn_log_reopen_watcher(log_handle: logging::LogHandle) {
    std::thread::Builder::new()
        .name("cuckoo-cached-logwatch".to_string())
        .spawn(move || loop {
            std::thread::sleep(std::time::Duration::from_millis(250));
            if signals::take_log_reopen_requested() {
                log_handle.reopen();
            }
        })
        .expect("failed to spawn log-reopen watcher thread");
}
