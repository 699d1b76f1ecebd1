//! Configuration loading for the evaluator
//!
//! Loads `rebound.toml`, found by walking up from the working directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

pub const CONFIG_FILE_NAME: &str = "rebound.toml";

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub eval: EvalConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

/// Limits enforced by the trampoline
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EvalConfig {
    /// Maximum trampoline steps per run (unlimited when absent)
    #[serde(default)]
    pub max_steps: Option<u64>,

    /// Maximum number of live levels on the stack
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    100_000
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    #[default]
    Off,
    Steps,
    Trace,
}

/// Step tracing, emitted through the `log` facade
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct DebugConfig {
    #[serde(default)]
    pub level: DebugLevel,

    /// Dump the level stack on every traced step
    #[serde(default)]
    pub show_levels: bool,
}

impl DebugConfig {
    pub fn steps() -> Self {
        DebugConfig {
            level: DebugLevel::Steps,
            ..Default::default()
        }
    }

    pub fn trace() -> Self {
        DebugConfig {
            level: DebugLevel::Trace,
            show_levels: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.level != DebugLevel::Off
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, EvalError> {
        toml::from_str(content).map_err(|e| EvalError::config(e.to_string()))
    }
}

/// Find the config file starting from a path and walking up
pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
    let mut current = if start_path.is_file() {
        start_path.parent()?
    } else {
        start_path
    };

    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }

        current = current.parent()?;
    }
}

/// Load configuration. An explicit path must exist; otherwise the nearest
/// `rebound.toml` is used, falling back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, EvalError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let cwd = std::env::current_dir().map_err(|e| EvalError::config(e.to_string()))?;
            match find_config_file(&cwd) {
                Some(found) => found,
                None => return Ok(Config::default()),
            }
        }
    };

    let content = std::fs::read_to_string(&config_path)
        .map_err(|e| EvalError::config(format!("{}: {}", config_path.display(), e)))?;
    log::debug!("loaded configuration from {}", config_path.display());
    Config::from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.eval.max_depth, 100_000);
        assert!(!config.debug.is_enabled());
    }

    #[test]
    fn test_parse_sections() {
        let config = Config::from_toml_str(
            r#"
            [eval]
            max_steps = 5000
            max_depth = 64

            [debug]
            level = "trace"
            show_levels = true
            "#,
        )
        .unwrap();
        assert_eq!(config.eval.max_steps, Some(5000));
        assert_eq!(config.eval.max_depth, 64);
        assert_eq!(config.debug, DebugConfig::trace());
    }

    #[test]
    fn test_invalid_config_is_error() {
        let err = Config::from_toml_str("[eval]\nmax_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, EvalError::Config { .. }));
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[eval]\nmax_depth = 8\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE_NAME));

        let config = load_config(Some(&found)).unwrap();
        assert_eq!(config.eval.max_depth, 8);
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config(Some(&missing)).is_err());
    }
}
