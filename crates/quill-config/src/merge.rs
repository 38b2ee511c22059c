use toml::{Table, Value};

use crate::config::Config;
use crate::error::ConfigError;

/// A [`Config`] under construction, kept as a TOML table so later files
/// override earlier ones key by key.
#[derive(Debug, Clone)]
pub struct Layers {
    table: Table,
}

impl Layers {
    pub fn new(base: &Config) -> Result<Self, ConfigError> {
        match Value::try_from(base) {
            Ok(Value::Table(table)) => Ok(Self { table }),
            Ok(other) => Err(ConfigError::Parse {
                origin: "defaults".into(),
                message: format!("serialised to a {}, not a table", other.type_str()),
            }),
            Err(e) => Err(ConfigError::Parse {
                origin: "defaults".into(),
                message: e.to_string(),
            }),
        }
    }

    /// Lay the TOML document `text` over what is already there. `origin`
    /// names the document in errors.
    pub fn overlay(&mut self, origin: &str, text: &str) -> Result<(), ConfigError> {
        let upper: Table = toml::from_str(text).map_err(|e| ConfigError::Parse {
            origin: origin.to_string(),
            message: e.message().to_string(),
        })?;
        overlay_table(&mut self.table, upper);
        Ok(())
    }

    pub fn finish(self) -> Result<Config, ConfigError> {
        Value::Table(self.table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                origin: "merged config".into(),
                message: e.message().to_string(),
            })
    }
}

// Tables merge recursively; scalars and arrays are replaced.
fn overlay_table(lower: &mut Table, upper: Table) {
    for (key, value) in upper {
        match value {
            Value::Table(upper_inner) => match lower.get_mut(&key) {
                Some(Value::Table(inner)) => overlay_table(inner, upper_inner),
                _ => {
                    lower.insert(key, Value::Table(upper_inner));
                }
            },
            value => {
                lower.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn layered(docs: &[&str]) -> Result<Config, ConfigError> {
        let mut layers = Layers::new(&Config::default())?;
        for (i, doc) in docs.iter().enumerate() {
            layers.overlay(&format!("layer {i}"), doc)?;
        }
        layers.finish()
    }

    #[test]
    fn no_layers_yields_defaults() {
        assert_eq!(layered(&[]).unwrap(), Config::default());
        assert_eq!(layered(&[""]).unwrap(), Config::default());
    }

    #[test]
    fn later_layer_wins_per_key() {
        let cfg = layered(&[
            "[debugger]\ngdb_path = \"gdb-multiarch\"\ncommand_timeout_secs = 30\n",
            "[debugger]\ncommand_timeout_secs = 5\n",
        ])
        .unwrap();
        assert_eq!(cfg.debugger.gdb_path, "gdb-multiarch");
        assert_eq!(cfg.debugger.command_timeout_secs, 5);
    }

    #[test]
    fn optional_keys_can_be_added() {
        let cfg = layered(&["[debugger]\ntty_dir = \"/run/quill\"\n"]).unwrap();
        assert_eq!(cfg.debugger.tty_dir, Some(PathBuf::from("/run/quill")));
    }

    #[test]
    fn arrays_are_replaced_not_appended() {
        let cfg = layered(&[
            "[debugger]\nextra_args = [\"-nx\", \"-q\"]\n",
            "[debugger]\nextra_args = [\"-nh\"]\n",
        ])
        .unwrap();
        assert_eq!(cfg.debugger.extra_args, vec!["-nh".to_string()]);
    }

    #[test]
    fn log_section_leaves_debugger_untouched() {
        let cfg = layered(&["[log]\nlevel = \"warn\"\n"]).unwrap();
        assert_eq!(cfg.debugger, Config::default().debugger);
    }

    #[test]
    fn syntax_error_names_the_layer() {
        let err = layered(&["", "[debugger\n"]).unwrap_err();
        match err {
            ConfigError::Parse { origin, .. } => assert_eq!(origin, "layer 1"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn wrong_type_fails_at_finish() {
        let err = layered(&["[debugger]\ncommand_timeout_secs = \"soon\"\n"]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref origin, .. } if origin == "merged config"));
    }
}
