use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The lowercase name used in config files and filter directives.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// How the external debugger is located and supervised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebuggerConfig {
    /// Debugger executable, resolved through `PATH` when not absolute.
    #[serde(default = "default_gdb_path")]
    pub gdb_path: String,
    /// Extra arguments placed before the interpreter selection.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Seconds an MI command may go unanswered before the debugger is
    /// considered hung. `0` disables the check.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Directory the debuggee's output FIFO is created in.
    #[serde(default)]
    pub tty_dir: Option<PathBuf>,
}

fn default_gdb_path() -> String {
    "gdb".to_string()
}

fn default_command_timeout() -> u64 {
    20
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            gdb_path: default_gdb_path(),
            extra_args: Vec::new(),
            command_timeout_secs: default_command_timeout(),
            tty_dir: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Optional path to a log file; the platform default is used otherwise.
    pub file: Option<PathBuf>,
}

/// Top-level Quill configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debugger: DebuggerConfig,
    #[serde(default)]
    pub log: LogConfig,
}
