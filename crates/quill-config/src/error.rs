use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a configuration could not be produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot write default config to {}", path.display())]
    CreateDefault {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `origin` is the file (or layer) the bad TOML came from.
    #[error("{origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("{}", join_violations(.0))]
    Invalid(Vec<Violation>),
}

/// One offending setting, by dotted path (`debugger.gdb_path`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.message)
    }
}

fn join_violations(all: &[Violation]) -> String {
    all.iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
