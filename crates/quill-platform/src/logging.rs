//! Where the log file lives and how it is kept bounded.
//!
//! The `tracing-subscriber` setup itself lives in the `quill` binary.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Default log location: the per-user state directory, falling back to
/// local data and then the temp dir.
pub fn default_log_file_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("quill")
        .join("quill.log")
}

/// Size-based rotation: `quill.log` → `quill.log.1` → … → `quill.log.<keep>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub max_bytes: u64,
    pub keep: u32,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            keep: 3,
        }
    }
}

impl Rotation {
    /// Shift the numbered backups of `active` up by one if it has reached
    /// `max_bytes`. With `keep == 0` the oversized file is simply removed.
    pub fn apply(&self, active: &Path) -> io::Result<()> {
        let size = match fs::metadata(active) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if size < self.max_bytes {
            return Ok(());
        }
        if self.keep == 0 {
            return fs::remove_file(active);
        }
        for n in (1..self.keep).rev() {
            let from = backup_name(active, n);
            if from.exists() {
                // rename(2) replaces the older backup in one step.
                fs::rename(&from, backup_name(active, n + 1))?;
            }
        }
        fs::rename(active, backup_name(active, 1))
    }

    /// Rotate if needed, then open `path` for appending, creating parents.
    pub fn open(&self, path: &Path) -> io::Result<File> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        self.apply(path)?;
        OpenOptions::new().create(true).append(true).open(path)
    }
}

fn backup_name(active: &Path, n: u32) -> PathBuf {
    let mut name = active.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}
