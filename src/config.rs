// Configuration loading
//
// Priority (highest first): CLI flags, YAML config file, compiled defaults.
// A missing default config file is not an error; an explicit path that does
// not exist is.

use crate::models::Priority;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "jiffy";
const CONFIG_FILE: &str = "config.yml";

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the task document
    pub data_dir: PathBuf,
    /// Priority used by `add` when none is given
    pub default_priority: Priority,
    /// tracing level used when no `-v` flag is given
    pub log_level: String,
}

/// On-disk shape; every field optional for partial overrides
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    default_priority: Option<String>,
    log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_priority: Priority::Medium,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(eyre!("Config file not found: {}", path.display()));
            }
            debug!(path = ?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(&path).context(format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&content).context(format!("Failed to parse config file {}", path.display()))?;
        debug!(path = ?path, "Loaded config file");
        Ok(config)
    }

    /// Parse YAML text, filling unset fields with defaults
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: ConfigFile = if content.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(content)?
        };

        // Parsed strictly; the lenient serde path is only for stored tasks
        let default_priority = match file.default_priority {
            Some(raw) => Some(raw.parse::<Priority>()?),
            None => None,
        };

        let defaults = Self::default();
        Ok(Self {
            data_dir: file.data_dir.map(expand_home).unwrap_or(defaults.data_dir),
            default_priority: default_priority.unwrap_or(defaults.default_priority),
            log_level: file.log_level.unwrap_or(defaults.log_level),
        })
    }
}

/// `<config_dir>/jiffy/config.yml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

/// `<data_dir>/jiffy`, falling back to `./.jiffy`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".jiffy"))
}

fn expand_home(path: PathBuf) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let config = Config::from_yaml("default_priority: high\n").unwrap();
        assert_eq!(config.default_priority, Priority::High);
        assert_eq!(config.data_dir, default_data_dir());
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_full_yaml() {
        let config = Config::from_yaml("data_dir: /tmp/jiffy-data\ndefault_priority: low\nlog_level: debug\n").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/jiffy-data"));
        assert_eq!(config.default_priority, Priority::Low);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_misspelled_priority_is_error() {
        let err = Config::from_yaml("default_priority: hgih\n").unwrap_err();
        assert!(err.to_string().contains("unknown priority: hgih"));
    }

    #[test]
    fn test_unknown_field_is_error() {
        assert!(Config::from_yaml("colour: blue\n").is_err());
    }

    #[test]
    fn test_load_explicit_missing_path_is_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yml");
        assert!(Config::load(Some(missing.as_path())).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        fs::write(&path, "data_dir: tasks\n").unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("tasks"));
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        fs::write(&path, "data_dir: [unclosed\n").unwrap();

        let err = Config::load(Some(path.as_path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(PathBuf::from("~/tasks")), home.join("tasks"));
        }
        assert_eq!(expand_home(PathBuf::from("/abs")), PathBuf::from("/abs"));
    }
}
