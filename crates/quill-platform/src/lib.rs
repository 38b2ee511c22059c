//! quill-platform: OS-facing helpers shared by the Quill crates.
//!
//! Directory resolution, log-file housekeeping and the small amount of
//! signal/FIFO plumbing the debugger supervisor needs.

pub mod error;
pub mod logging;
pub mod paths;
pub mod process;

pub use error::PlatformError;
pub use paths::{DefaultPaths, PlatformPaths};
pub use process::{interrupt_process, make_fifo};
