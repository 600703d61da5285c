//! Configuration management (TOML)

use crate::cycles::DEFAULT_MAX_CYCLES;
use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "DEADLOCKD_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/deadlockd/deadlockd.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Upper bound on cycles enumerated per poll.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Poll results kept in memory.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Optional JSONL file every poll result is appended to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_cycles() -> usize {
    DEFAULT_MAX_CYCLES
}

fn default_log_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_cycles: default_max_cycles(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            log_path: None,
            pretty: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Explicit path, then `DEADLOCKD_CONFIG`, then the system default. Only
    /// a missing default file falls back to built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            Self::load_from(path)
        } else {
            info!("[config] no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.runtime.poll_interval_secs, 5);
        assert_eq!(config.runtime.max_cycles, 1000);
        assert_eq!(config.output.log_capacity, 1000);
        assert!(config.output.log_path.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[runtime]\npoll_interval_secs = 2\n").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.runtime.poll_interval_secs, 2);
        assert_eq!(config.runtime.max_cycles, 1000);
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn full_file() {
        let toml_content = r#"
[runtime]
poll_interval_secs = 10
max_cycles = 64

[output]
log_capacity = 20
log_path = "/tmp/deadlockd.jsonl"
pretty = true

[logging]
level = "debug"
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.runtime.max_cycles, 64);
        assert_eq!(config.output.log_capacity, 20);
        assert_eq!(
            config.output.log_path.as_deref(),
            Some(Path::new("/tmp/deadlockd.jsonl"))
        );
        assert!(config.output.pretty);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn invalid_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[runtime\nnot toml").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::resolve(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deadlockd.toml");
        let mut config = Config::default();
        config.runtime.poll_interval_secs = 30;
        config.save(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
