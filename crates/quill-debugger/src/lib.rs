//! quill-debugger: supervision and lifecycle control of an external
//! GDB process driven over the machine interface.
//!
//! The [`GdbAdapter`] state machine owns a [`Supervisor`] (the gdb process
//! and the debuggee's output FIFO) and a [`CommandChannel`] correlating MI
//! commands with their replies. [`runner::spawn_gdb_adapter`] runs one
//! adapter on its own tokio task and hands the engine an
//! [`AdapterHandle`] plus a stream of [`AdapterNotification`]s.

pub mod adapter;
pub mod channel;
pub mod error;
pub mod messages;
pub mod mock;
pub mod notification;
pub mod params;
pub mod runner;
mod side_channel;
pub mod state;
pub mod supervisor;

pub use adapter::{DebuggerAdapter, GdbAdapter};
pub use channel::{CommandChannel, CommandKind, Dispatch, MiCommand};
pub use error::SupervisorError;
pub use mock::MockSupervisor;
pub use notification::AdapterNotification;
pub use params::{AdapterKind, StartParameters};
pub use runner::{run_adapter, spawn_gdb_adapter, AdapterHandle, AdapterRequest};
pub use state::AdapterState;
pub use supervisor::{
    GdbSupervisor, ProcessEvent, ProcessFailure, ProcessLaunch, Supervisor, SupervisorConfig,
};
