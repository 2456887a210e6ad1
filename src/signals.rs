// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Signal handling: ignore SIGPIPE (a write to a peer that already closed
// its socket should surface as an `EPIPE` `io::Error`, not kill the
// process), poll a shutdown flag on SIGTERM/SIGINT from the listener and
// worker loops instead of handling the signal inline, reopen the log
// file on SIGTTIN (the signal logrotate's `postrotate` hook sends), and
// dump a backtrace before aborting on SIGSEGV.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::FatalError;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);
static LOG_REOPEN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install the signal handlers the server needs before opening its listener.
pub fn install() -> Result<(), FatalError> {
    ignore_sigpipe()?;
    install_handler(libc::SIGTERM, mark_shutdown_requested)?;
    install_handler(libc::SIGINT, mark_shutdown_requested)?;
    install_handler(libc::SIGTTIN, mark_log_reopen_requested)?;
    install_handler(libc::SIGSEGV, handle_sigsegv)?;
    Ok(())
}

/// Whether a shutdown signal has been received since process start. Polled
/// by the listener and worker reactor loops rather than acted on inline.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

/// Whether SIGTTIN has requested a log-file reopen since the last time
/// this was called. Clears the flag, so only the caller servicing it
/// observes a given signal.
pub fn take_log_reopen_requested() -> bool {
    LOG_REOPEN_REQUESTED.swap(false, Ordering::Relaxed)
}

fn ignore_sigpipe() -> Result<(), FatalError> {
    let rc = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };
    if rc == libc::SIG_ERR {
        return Err(FatalError::ConfigInvalid(
            "failed to install SIGPIPE handler".to_string(),
        ));
    }
    Ok(())
}

extern "C" fn mark_shutdown_requested(_signum: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

extern "C" fn mark_log_reopen_requested(_signum: libc::c_int) {
    LOG_REOPEN_REQUESTED.store(true, Ordering::Relaxed);
}

/// Best-effort crash diagnostic. Capturing a backtrace isn't
/// async-signal-safe, but the process is already on its way down from a
/// segfault, so a diagnosable message wins over strict handler hygiene.
extern "C" fn handle_sigsegv(_signum: libc::c_int) {
    let backtrace = std::backtrace::Backtrace::force_capture();
    eprintln!("cuckoo-cached: caught SIGSEGV, aborting\n{backtrace}");
    unsafe { libc::abort() };
}

fn install_handler(signum: libc::c_int, handler: extern "C" fn(libc::c_int)) -> Result<(), FatalError> {
    let rc = unsafe { libc::signal(signum, handler as libc::sighandler_t) };
    if rc == libc::SIG_ERR {
        return Err(FatalError::ConfigInvalid(format!(
            "failed to install handler for signal {signum}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_shutdown_requested_sets_the_flag() {
        mark_shutdown_requested(libc::SIGTERM);
        assert!(shutdown_requested());
    }

    #[test]
    fn log_reopen_flag_is_cleared_once_taken() {
        mark_log_reopen_requested(libc::SIGTTIN);
        assert!(take_log_reopen_requested());
        assert!(!take_log_reopen_requested());
    }
}
