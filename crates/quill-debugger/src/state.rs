//! Adapter lifecycle states.

use serde::Serialize;

/// Where the adapter and its inferior are in their lifecycle.
///
/// Debugger-level states bracket the inferior-level ones: the adapter is
/// `Starting` until gdb is up, walks through the inferior states while a
/// program is loaded, and ends in `AdapterShutDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterState {
    /// gdb has not been spawned yet, or spawning failed.
    Starting,
    /// gdb is running and idle.
    Started,
    InferiorPreparing,
    InferiorPrepared,
    InferiorPreparationFailed,
    InferiorStarting,
    /// The run command is in flight.
    InferiorRunningRequested,
    InferiorRunning,
    InferiorStartFailed,
    /// An interrupt was delivered; waiting for the stop record.
    InferiorStopping,
    InferiorStopped,
    /// `kill` is in flight.
    InferiorShuttingDown,
    InferiorShutDown,
    InferiorShutdownFailed,
    /// `-gdb-exit` is in flight.
    AdapterShuttingDown,
    /// The gdb process is gone. Terminal.
    AdapterShutDown,
}

impl AdapterState {
    /// States in which a live inferior must be killed before gdb exits.
    pub fn has_live_inferior(self) -> bool {
        matches!(
            self,
            AdapterState::InferiorRunningRequested
                | AdapterState::InferiorRunning
                | AdapterState::InferiorStopping
                | AdapterState::InferiorStopped
        )
    }

    /// States from which `-gdb-exit` may be sent directly.
    pub fn can_exit_debugger(self) -> bool {
        matches!(
            self,
            AdapterState::Started
                | AdapterState::InferiorPrepared
                | AdapterState::InferiorPreparationFailed
                | AdapterState::InferiorStarting
                | AdapterState::InferiorStartFailed
                | AdapterState::InferiorShutDown
                | AdapterState::InferiorShutdownFailed
        )
    }
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_and_exitable_states_are_disjoint() {
        use AdapterState::*;
        let all = [
            Starting,
            Started,
            InferiorPreparing,
            InferiorPrepared,
            InferiorPreparationFailed,
            InferiorStarting,
            InferiorRunningRequested,
            InferiorRunning,
            InferiorStartFailed,
            InferiorStopping,
            InferiorStopped,
            InferiorShuttingDown,
            InferiorShutDown,
            InferiorShutdownFailed,
            AdapterShuttingDown,
            AdapterShutDown,
        ];
        for state in all {
            assert!(
                !(state.has_live_inferior() && state.can_exit_debugger()),
                "{state} is both"
            );
        }
    }

    #[test]
    fn in_flight_states_accept_neither_shutdown_path() {
        for state in [
            AdapterState::Starting,
            AdapterState::InferiorPreparing,
            AdapterState::InferiorShuttingDown,
            AdapterState::AdapterShuttingDown,
            AdapterState::AdapterShutDown,
        ] {
            assert!(!state.has_live_inferior());
            assert!(!state.can_exit_debugger());
        }
    }

    #[test]
    fn display_uses_variant_name() {
        assert_eq!(AdapterState::InferiorStopped.to_string(), "InferiorStopped");
    }

    #[test]
    fn serializes_kebab_case() {
        let json = serde_json::to_string(&AdapterState::InferiorRunningRequested).unwrap();
        assert_eq!(json, "\"inferior-running-requested\"");
    }
}
