//! Supervisor error types.

use thiserror::Error;

/// Errors from starting, feeding or signalling the debugger process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The side-channel for the debuggee's output could not be set up.
    #[error("{0}")]
    SideChannel(String),

    /// The debugger binary could not be spawned.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A command was written while no process is attached.
    #[error("debugger process is not running")]
    NotRunning,

    /// The command could not be framed for the wire.
    #[error(transparent)]
    Encode(#[from] quill_mi::MiError),

    /// Signal delivery to the inferior failed.
    #[error(transparent)]
    Interrupt(#[from] quill_platform::PlatformError),
}
