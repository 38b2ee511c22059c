//! Where Quill keeps its files.

use std::path::PathBuf;

use crate::error::PlatformError;

/// Directory lookup, abstracted so configuration loading can be tested
/// against a temporary home.
pub trait PlatformPaths: Send + Sync {
    /// `~/.config/quill`, holding `config.toml`.
    fn config_dir(&self) -> PathBuf;
    /// Per-user directory for short-lived sockets and FIFOs.
    fn runtime_dir(&self) -> PathBuf;
}

/// Paths derived from the user's home directory.
#[derive(Debug, Clone)]
pub struct DefaultPaths {
    home: PathBuf,
}

impl DefaultPaths {
    /// # Errors
    ///
    /// [`PlatformError::NoHome`] when no home directory can be found.
    pub fn new() -> Result<Self, PlatformError> {
        let home = dirs::home_dir()
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
            .ok_or(PlatformError::NoHome)?;
        Ok(Self::with_home(home))
    }

    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }
}

impl PlatformPaths for DefaultPaths {
    fn config_dir(&self) -> PathBuf {
        self.home.join(".config").join("quill")
    }

    // XDG_RUNTIME_DIR is private to the user; the temp dir is shared.
    fn runtime_dir(&self) -> PathBuf {
        dirs::runtime_dir().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_is_under_home() {
        let paths = DefaultPaths::with_home("/home/dev");
        assert_eq!(paths.config_dir(), PathBuf::from("/home/dev/.config/quill"));
    }

    #[test]
    fn new_resolves_some_home() {
        let paths = DefaultPaths::new().expect("home directory");
        assert!(paths.config_dir().ends_with(".config/quill"));
    }

    #[test]
    fn runtime_dir_is_absolute() {
        let paths = DefaultPaths::with_home("/home/dev");
        assert!(paths.runtime_dir().is_absolute());
    }
}
