use crate::config::{Config, DebuggerConfig};
use crate::error::Violation;

/// Upper bound for `debugger.command_timeout_secs`.
pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 3600;

/// gdb options the adapter passes itself.
const RESERVED_FLAGS: &[&str] = &["-i", "--interpreter", "-interpreter", "--tty", "-tty"];

/// Check `config`, collecting every problem rather than stopping at the
/// first.
pub fn validate(config: &Config) -> Result<(), Vec<Violation>> {
    let mut found = Vec::new();
    check_debugger(&config.debugger, &mut found);
    if found.is_empty() {
        Ok(())
    } else {
        Err(found)
    }
}

fn check_debugger(dbg: &DebuggerConfig, found: &mut Vec<Violation>) {
    let mut reject = |field: &'static str, message: String| {
        found.push(Violation { field, message });
    };

    if dbg.gdb_path.trim().is_empty() {
        reject("debugger.gdb_path", "must not be empty".into());
    }
    if dbg.command_timeout_secs > MAX_COMMAND_TIMEOUT_SECS {
        reject(
            "debugger.command_timeout_secs",
            format!(
                "{} exceeds the {MAX_COMMAND_TIMEOUT_SECS}s limit (0 disables the check)",
                dbg.command_timeout_secs
            ),
        );
    }
    for arg in &dbg.extra_args {
        let (flag, _) = arg.split_once('=').unwrap_or((arg.as_str(), ""));
        if RESERVED_FLAGS.contains(&flag) {
            reject(
                "debugger.extra_args",
                format!("'{arg}' is set by quill and cannot be overridden"),
            );
        }
    }
    if let Some(dir) = dbg.tty_dir.as_deref().filter(|d| !d.is_absolute()) {
        reject(
            "debugger.tty_dir",
            format!("'{}' is not an absolute path", dir.display()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fields(cfg: &Config) -> Vec<&'static str> {
        validate(cfg)
            .unwrap_err()
            .into_iter()
            .map(|v| v.field)
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate(&Config::default()), Ok(()));
    }

    #[test]
    fn blank_gdb_path_is_rejected() {
        let mut cfg = Config::default();
        cfg.debugger.gdb_path = " \t".into();
        assert_eq!(fields(&cfg), vec!["debugger.gdb_path"]);
    }

    #[test]
    fn timeout_bounds() {
        let mut cfg = Config::default();
        cfg.debugger.command_timeout_secs = 0;
        assert!(validate(&cfg).is_ok());
        cfg.debugger.command_timeout_secs = MAX_COMMAND_TIMEOUT_SECS;
        assert!(validate(&cfg).is_ok());
        cfg.debugger.command_timeout_secs = MAX_COMMAND_TIMEOUT_SECS + 1;
        assert_eq!(fields(&cfg), vec!["debugger.command_timeout_secs"]);
    }

    #[test]
    fn interpreter_and_tty_flags_are_reserved() {
        let mut cfg = Config::default();
        cfg.debugger.extra_args = vec![
            "-nx".into(),
            "--interpreter=mi2".into(),
            "-i".into(),
            "--tty=/dev/pts/3".into(),
            "-ex".into(),
        ];
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(errs.len(), 3);
        assert!(errs[0].message.contains("--interpreter=mi2"));
    }

    #[test]
    fn relative_tty_dir_is_rejected() {
        let mut cfg = Config::default();
        cfg.debugger.tty_dir = Some(PathBuf::from("run/quill"));
        assert_eq!(fields(&cfg), vec!["debugger.tty_dir"]);
    }

    #[test]
    fn all_problems_are_reported_together() {
        let mut cfg = Config::default();
        cfg.debugger.gdb_path = String::new();
        cfg.debugger.command_timeout_secs = 99_999;
        cfg.debugger.tty_dir = Some(PathBuf::from("tmp"));
        assert_eq!(
            fields(&cfg),
            vec![
                "debugger.gdb_path",
                "debugger.command_timeout_secs",
                "debugger.tty_dir"
            ]
        );
    }
}
