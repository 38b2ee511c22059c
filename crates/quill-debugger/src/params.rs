//! What to debug and how to reach it.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Launch description of the inferior, supplied by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartParameters {
    /// Path of the program to debug. Relative paths resolve against the
    /// current directory.
    pub executable: PathBuf,
    /// Arguments passed to the inferior.
    pub process_args: Vec<String>,
    /// Working directory for gdb (and so for the inferior).
    pub working_dir: Option<PathBuf>,
    /// Variables set in gdb's environment on top of the inherited one.
    pub environment: BTreeMap<String, String>,
}

impl StartParameters {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    /// The executable as an absolute path.
    pub fn absolute_executable(&self) -> PathBuf {
        if self.executable.is_absolute() {
            return self.executable.clone();
        }
        match std::env::current_dir() {
            Ok(dir) => dir.join(&self.executable),
            Err(_) => self.executable.clone(),
        }
    }
}

/// How the inferior is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterKind {
    /// gdb launches the program locally; its terminal output goes through a FIFO.
    Plain,
    /// gdb attaches to a gdbserver at `target` (`host:port`) and resumes it.
    Remote { target: String },
}

impl AdapterKind {
    /// Whether the debuggee's terminal is redirected through a local side channel.
    pub fn uses_side_channel(&self) -> bool {
        matches!(self, AdapterKind::Plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_executable_keeps_absolute_paths() {
        let params = StartParameters::new("/usr/bin/true");
        assert_eq!(params.absolute_executable(), PathBuf::from("/usr/bin/true"));
    }

    #[test]
    fn absolute_executable_resolves_relative_paths() {
        let params = StartParameters::new("target/debug/app");
        let resolved = params.absolute_executable();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("target/debug/app"));
    }

    #[test]
    fn only_plain_uses_side_channel() {
        assert!(AdapterKind::Plain.uses_side_channel());
        assert!(!AdapterKind::Remote {
            target: "localhost:3333".into()
        }
        .uses_side_channel());
    }
}
