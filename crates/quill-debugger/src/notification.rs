//! Events the adapter reports to its engine.

use serde::Serialize;

use crate::state::AdapterState;

/// One notification on the adapter's outbound stream.
///
/// Failure variants carry the user-facing message; nothing fails silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum AdapterNotification {
    AdapterStarted,
    AdapterStartFailed(String),
    InferiorPrepared,
    InferiorPreparationFailed(String),
    InferiorStarted,
    InferiorStartFailed(String),
    /// `*stopped` with a reason other than an exit.
    InferiorStopped { reason: String },
    /// The inferior exited on its own; `None` when it was killed by a signal.
    InferiorExited { exit_code: Option<i32> },
    InferiorShutDown,
    InferiorShutdownFailed(String),
    AdapterShutDown,
    AdapterShutdownFailed(String),
    AdapterCrashed(String),
    StateChanged { from: AdapterState, to: AdapterState },
    /// Bytes the inferior wrote to its terminal.
    DebuggeeOutput(Vec<u8>),
    /// Console and target stream text from gdb.
    ConsoleOutput(String),
    StatusMessage(String),
}

impl AdapterNotification {
    /// Whether this notification reports a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AdapterNotification::AdapterStartFailed(_)
                | AdapterNotification::InferiorPreparationFailed(_)
                | AdapterNotification::InferiorStartFailed(_)
                | AdapterNotification::InferiorShutdownFailed(_)
                | AdapterNotification::AdapterShutdownFailed(_)
                | AdapterNotification::AdapterCrashed(_)
        )
    }
}
