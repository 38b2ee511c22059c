//! quill-config: layered TOML settings for the debugger and logging.

pub mod config;
pub mod error;
pub mod load;
pub mod merge;
pub mod validate;

pub use config::{Config, DebuggerConfig, LogConfig, LogLevel};
pub use error::{ConfigError, Violation};
pub use load::{load_config, load_from_str, load_user_config};
pub use merge::Layers;
