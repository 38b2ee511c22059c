use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use quill_platform::PlatformPaths;

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::Layers;
use crate::validate::validate;

const CONFIG_FILE: &str = "config.toml";
const PROJECT_DIR: &str = ".quill";

/// Written to `config.toml` the first time quill runs. Every line is a
/// comment, so it changes nothing until edited.
const STARTER_CONFIG: &str = r#"# quill settings. Uncomment a line to change it.

# [debugger]
# gdb_path = "gdb"
# extra_args = ["-nx"]
# command_timeout_secs = 20   # 0 waits forever
# tty_dir = "/run/user/1000"

# [log]
# level = "info"
# file = "/tmp/quill.log"
"#;

/// Build the effective [`Config`]: defaults, then `<config_dir>/config.toml`
/// (created from a commented template if absent), then the nearest
/// `.quill/config.toml` at or above `project_dir`. The result is validated.
///
/// # Errors
///
/// [`ConfigError`] for unreadable or malformed files, and
/// [`ConfigError::Invalid`] listing every bad setting.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let global = config_dir.join(CONFIG_FILE);
    ensure_starter(&global)?;

    let mut layers = Layers::new(&Config::default())?;
    layers.overlay(&global.display().to_string(), &read(&global)?)?;

    if let Some(project) = project_dir.and_then(find_project_config) {
        tracing::debug!(path = %project.display(), "applying project config");
        layers.overlay(&project.display().to_string(), &read(&project)?)?;
    }

    checked(layers.finish()?)
}

/// [`load_config`] with the per-user config directory from `paths`.
///
/// # Errors
///
/// As [`load_config`].
pub fn load_user_config(
    paths: &dyn PlatformPaths,
    project_dir: Option<&Path>,
) -> Result<Config, ConfigError> {
    load_config(&paths.config_dir(), project_dir)
}

/// Parse and validate a single TOML document, without layering.
///
/// # Errors
///
/// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
pub fn load_from_str(text: &str) -> Result<Config, ConfigError> {
    let config = toml::from_str(text).map_err(|e: toml::de::Error| ConfigError::Parse {
        origin: "<string>".into(),
        message: e.message().to_string(),
    })?;
    checked(config)
}

fn checked(config: Config) -> Result<Config, ConfigError> {
    validate(&config).map_err(|violations| {
        for v in &violations {
            tracing::warn!(field = v.field, "{}", v.message);
        }
        ConfigError::Invalid(violations)
    })?;
    Ok(config)
}

fn ensure_starter(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Ok(());
    }
    let create = |source: io::Error| ConfigError::CreateDefault {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(create)?;
    }
    fs::write(path, STARTER_CONFIG).map_err(create)?;
    tracing::info!(path = %path.display(), "wrote starter config");
    Ok(())
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// The nearest `.quill/config.toml` in `start` or one of its ancestors.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_DIR).join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn first_run_writes_starter_and_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("quill");

        assert_eq!(load_config(&dir, None).unwrap(), Config::default());
        let starter = fs::read_to_string(dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(starter, STARTER_CONFIG);
    }

    #[test]
    fn starter_template_parses_to_defaults() {
        assert_eq!(load_from_str(STARTER_CONFIG).unwrap(), Config::default());
    }

    #[test]
    fn global_file_overrides_defaults() {
        let tmp = TempDir::new().unwrap();
        write(
            &tmp.path().join(CONFIG_FILE),
            "[debugger]\ngdb_path = \"gdb-multiarch\"\n",
        );
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.debugger.gdb_path, "gdb-multiarch");
        assert_eq!(config.debugger.command_timeout_secs, 20);
    }

    #[test]
    fn project_file_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global");
        write(
            &global.join(CONFIG_FILE),
            "[debugger]\ncommand_timeout_secs = 30\ngdb_path = \"arm-none-eabi-gdb\"\n",
        );
        let project = tmp.path().join("fw");
        write(
            &project.join(PROJECT_DIR).join(CONFIG_FILE),
            "[debugger]\ncommand_timeout_secs = 5\n",
        );
        let nested = project.join("src").join("drivers");
        fs::create_dir_all(&nested).unwrap();

        let config = load_config(&global, Some(&nested)).unwrap();
        assert_eq!(config.debugger.command_timeout_secs, 5);
        assert_eq!(config.debugger.gdb_path, "arm-none-eabi-gdb");
    }

    #[test]
    fn merged_result_is_validated() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join(CONFIG_FILE), "[debugger]\ngdb_path = \"\"\n");
        match load_config(tmp.path(), None).unwrap_err() {
            ConfigError::Invalid(v) => assert_eq!(v[0].field, "debugger.gdb_path"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn malformed_global_names_the_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        write(&path, "[debugger\n");
        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(err.to_string().starts_with(&path.display().to_string()));
    }

    #[test]
    fn user_config_lives_under_home() {
        let tmp = TempDir::new().unwrap();
        let paths = quill_platform::DefaultPaths::with_home(tmp.path());
        assert_eq!(load_user_config(&paths, None).unwrap(), Config::default());
        assert!(tmp.path().join(".config/quill/config.toml").is_file());
    }

    #[test]
    fn from_str_rejects_reserved_flags() {
        let config = load_from_str("[log]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(config.log.level.as_str(), "debug");

        let err = load_from_str("[debugger]\nextra_args = [\"--tty=/dev/null\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(matches!(
            load_from_str("= nope").unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn project_lookup_stops_at_nearest() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join(".quill/config.toml"), "");
        write(&tmp.path().join("inner/.quill/config.toml"), "");
        let found = find_project_config(&tmp.path().join("inner")).unwrap();
        assert_eq!(found, tmp.path().join("inner/.quill/config.toml"));
    }
}
