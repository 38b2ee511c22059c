use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// No home directory, so per-user locations cannot be resolved.
    #[error("cannot locate the home directory")]
    NoHome,

    #[error("{} cannot be passed to the OS: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: &'static str },

    #[error("cannot create named pipe {}", path.display())]
    Fifo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot interrupt pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("{operation} is not available on {}", std::env::consts::OS)]
    Unsupported { operation: &'static str },
}
