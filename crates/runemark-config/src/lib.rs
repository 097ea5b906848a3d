use runemark_engine::marks::MarkPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// User settings: where block files live and how marks behave at the edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub blocks_path: PathBuf,
    #[serde(default)]
    pub marks: MarkPolicy,
}

impl Config {
    pub fn new(blocks_path: impl Into<PathBuf>) -> Self {
        Self {
            blocks_path: blocks_path.into(),
            marks: MarkPolicy::default(),
        }
    }

    /// `Ok(None)` when there is no config file yet
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        config.blocks_path = Self::expand_path(&config.blocks_path).unwrap_or(config.blocks_path);

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        Self::load_from_path(Self::config_path())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(config_path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to_path(Self::config_path())
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/runemark");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Expand `~` and `$VARS`; `None` if a variable is undefined
    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        shellexpand::full(&path_str)
            .ok()
            .map(|expanded| PathBuf::from(expanded.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use runemark_engine::marks::{Tag, TagSet};
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/runemark/config.toml"));
    }

    #[test]
    fn test_marks_table_is_optional() {
        let config: Config = toml::from_str(r#"blocks_path = "/srv/blocks""#).unwrap();

        assert_eq!(config.blocks_path, PathBuf::from("/srv/blocks"));
        assert_eq!(config.marks, MarkPolicy::default());
    }

    #[test]
    fn test_marks_table_overrides_policy() {
        let config: Config = toml::from_str(
            r#"
blocks_path = "/srv/blocks"

[marks]
clear_guard = ["block-ref"]
empty_link_text = "link"
split_trailing_newlines = false
"#,
        )
        .unwrap();

        assert_eq!(config.marks.clear_guard, TagSet::single(Tag::BlockRef));
        assert_eq!(config.marks.empty_link_text, "link");
        assert!(!config.marks.split_trailing_newlines);
        assert_eq!(
            config.marks.end_inheritance_suppressed,
            MarkPolicy::default().end_inheritance_suppressed
        );
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = Config::expand_path(Path::new("~/blocks")).unwrap();

        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().ends_with("blocks"));
    }

    #[test]
    fn test_expand_path_with_env_var() {
        unsafe {
            env::set_var("RUNEMARK_TEST_ROOT", "/test/env/path");
        }

        let expanded = Config::expand_path(Path::new("$RUNEMARK_TEST_ROOT/blocks")).unwrap();
        assert_eq!(expanded, PathBuf::from("/test/env/path/blocks"));

        unsafe {
            env::remove_var("RUNEMARK_TEST_ROOT");
        }
    }

    #[test]
    fn test_expand_path_with_undefined_var() {
        assert_eq!(
            Config::expand_path(Path::new("$RUNEMARK_SURELY_UNSET_VAR/blocks")),
            None
        );
    }

    #[test]
    fn test_expand_path_keeps_plain_paths() {
        for path in ["/absolute/path", "relative/path"] {
            assert_eq!(Config::expand_path(Path::new(path)).unwrap(), PathBuf::from(path));
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();

        let result = Config::load_from_path(temp_dir.path().join("nonexistent.toml")).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "blocks_path = 3").unwrap();

        let error = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(error, ConfigError::ConfigParseError { .. }));
        assert!(error.to_string().contains("config.toml"));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let mut config = Config::new("/tmp/test-blocks");
        config.marks.empty_link_text = "#".to_string();

        config.save_to_path(&config_file).unwrap();
        let loaded = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_expands_blocks_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "blocks_path = \"~/notes/blocks\"\n").unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        let path = config.blocks_path.to_string_lossy();
        assert!(!path.starts_with('~'));
        assert!(path.ends_with("notes/blocks"));
    }
}
