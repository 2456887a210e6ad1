// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Daemonization: the classic double-fork, new session, redirect-standard-
// streams-to-/dev/null sequence, plus an RAII PID-file guard so the file
// is removed on the way out regardless of which exit path is taken.

use std::fs;
use std::io;
use std::os::unix::io::RawFd;
use std::path::Path;

use crate::error::FatalError;

/// Fork into the background, detach from the controlling terminal, and
/// redirect stdio to `/dev/null`. Must be called before any threads are
/// spawned — `fork()` only carries the calling thread into the child.
pub fn daemonize() -> Result<(), FatalError> {
    unsafe {
        match libc::fork() {
            -1 => return Err(FatalError::Daemonize(io::Error::last_os_error())),
            0 => {}                 // child continues below
            _ => libc::_exit(0),    // parent exits immediately
        }

        if libc::setsid() == -1 {
            return Err(FatalError::Daemonize(io::Error::last_os_error()));
        }

        match libc::fork() {
            -1 => return Err(FatalError::Daemonize(io::Error::last_os_error())),
            0 => {}
            _ => libc::_exit(0),
        }

        redirect_stdio_to_devnull()?;
    }
    Ok(())
}

unsafe fn redirect_stdio_to_devnull() -> Result<(), FatalError> {
    const DEV_NULL: &[u8] = b"/dev/null\0";
    let path = std::ffi::CStr::from_bytes_with_nul(DEV_NULL)
        .expect("constant path is a valid C string");
    let fd = libc::open(path.as_ptr(), libc::O_RDWR);
    if fd == -1 {
        return Err(FatalError::Daemonize(io::Error::last_os_error()));
    }
    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        if libc::dup2(fd, target) == -1 {
            return Err(FatalError::Daemonize(io::Error::last_os_error()));
        }
    }
    if fd > libc::STDERR_FILENO {
        libc::close(fd as RawFd);
    }
    Ok(())
}

/// Writes the current PID to `path` on construction and removes the file
/// on drop, however the process exits — an early return, a panic unwind,
/// or the normal shutdown path all go through the same `Drop` impl.
pub struct PidFile {
    path: String,
}

impl PidFile {
    pub fn create(path: &str) -> Result<Self, FatalError> {
        let pid = unsafe { libc::getpid() };
        fs::write(path, format!("{pid}\n")).map_err(FatalError::Daemonize)?;
        Ok(Self { path: path.to_string() })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(Path::new(&self.path));
    }
}
