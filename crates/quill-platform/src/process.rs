//! Signal delivery and FIFO creation.
//!
//! Both are Unix-only; other targets get [`PlatformError::Unsupported`].

use std::path::Path;

use crate::error::PlatformError;

/// Send `SIGINT` to `pid`, asking it to pause.
///
/// PID 0 is refused: `kill(0, ..)` would signal our own process group.
pub fn interrupt_process(pid: u32) -> Result<(), PlatformError> {
    if pid == 0 {
        return Err(PlatformError::Signal {
            pid,
            reason: "refusing to signal the process group".into(),
        });
    }
    send_interrupt(pid)
}

#[cfg(unix)]
fn send_interrupt(pid: u32) -> Result<(), PlatformError> {
    let raw = libc::pid_t::try_from(pid).map_err(|_| PlatformError::Signal {
        pid,
        reason: "out of range".into(),
    })?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    let result = unsafe { libc::kill(raw, libc::SIGINT) };
    if result == 0 {
        tracing::debug!(pid, "sent SIGINT");
        Ok(())
    } else {
        Err(PlatformError::Signal {
            pid,
            reason: std::io::Error::last_os_error().to_string(),
        })
    }
}

#[cfg(not(unix))]
fn send_interrupt(_pid: u32) -> Result<(), PlatformError> {
    Err(PlatformError::Unsupported {
        operation: "process interrupt",
    })
}

/// Create a named pipe at `path` readable and writable by the owner only.
#[cfg(unix)]
pub fn make_fifo(path: &Path) -> Result<(), PlatformError> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| PlatformError::InvalidPath {
            path: path.to_path_buf(),
            reason: "contains a NUL byte",
        })?;
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    let result = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if result == 0 {
        Ok(())
    } else {
        Err(PlatformError::Fifo {
            path: path.to_path_buf(),
            source: std::io::Error::last_os_error(),
        })
    }
}

#[cfg(not(unix))]
pub fn make_fifo(_path: &Path) -> Result<(), PlatformError> {
    Err(PlatformError::Unsupported { operation: "mkfifo" })
}
