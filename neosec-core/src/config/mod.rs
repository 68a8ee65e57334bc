//! Configuration management
//!
//! Two configuration surfaces exist: the global TOML config (tool table,
//! pool size, data directory) loaded here, and per-run workflow YAML files
//! handled by [`workflow`].

pub mod workflow;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable that redirects the run output root.
pub const DATA_DIR_ENV: &str = "NEOSEC_DATA_DIR";

/// Per-tool configuration from the global config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Explicit binary path; wins over PATH lookup when set.
    pub binary_path: Option<PathBuf>,
    pub enabled: bool,
    /// Default task timeout for this tool, in seconds.
    pub timeout_secs: u64,
    /// Maximum concurrent instances of this tool.
    pub max_concurrent: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            enabled: true,
            timeout_secs: 300,
            max_concurrent: 1,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub log_level: String,
    /// Root for raw outputs and reports. `NEOSEC_DATA_DIR` overrides it.
    pub data_dir: PathBuf,
    /// Upper bound on concurrently running external processes.
    pub max_concurrent_tasks: usize,
    /// Per-stream capture cap in bytes.
    pub max_capture_bytes: usize,
    pub tools: BTreeMap<String, ToolConfig>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: PathBuf::from("data"),
            max_concurrent_tasks: 5,
            max_capture_bytes: 64 * 1024 * 1024,
            tools: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write a default configuration file with an example tool entry.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let mut config = Self::default();
        config.tools.insert(
            "nmap".to_string(),
            ToolConfig {
                timeout_secs: 600,
                max_concurrent: 2,
                ..Default::default()
            },
        );

        let content = toml::to_string_pretty(&config).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.max_capture_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_capture_bytes must be at least 1".to_string(),
            ));
        }
        for (name, tool) in &self.tools {
            if tool.timeout_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "tool '{}': timeout_secs must be at least 1",
                    name
                )));
            }
            if tool.max_concurrent == 0 {
                return Err(ConfigError::Invalid(format!(
                    "tool '{}': max_concurrent must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Effective data root, honoring the `NEOSEC_DATA_DIR` override.
    pub fn effective_data_dir(&self) -> PathBuf {
        std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir.clone())
    }

    pub fn tool(&self, name: &str) -> Option<&ToolConfig> {
        self.tools.get(name)
    }
}

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = GlobalConfig::default();
        assert_eq!(config.max_concurrent_tasks, 5);
        assert_eq!(config.max_capture_bytes, 64 * 1024 * 1024);
        assert!(config.tools.is_empty());
    }

    #[test]
    fn load_round_trip_via_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("neosec.toml");
        GlobalConfig::write_default(&path).unwrap();

        let config = GlobalConfig::load(&path).unwrap();
        let nmap = config.tool("nmap").unwrap();
        assert_eq!(nmap.timeout_secs, 600);
        assert_eq!(nmap.max_concurrent, 2);
        assert!(nmap.enabled);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("neosec.toml");
        std::fs::write(&path, "max_concurrent_tasks = 2\n").unwrap();

        let config = GlobalConfig::load(&path).unwrap();
        assert_eq!(config.max_concurrent_tasks, 2);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("neosec.toml");
        std::fs::write(&path, "max_concurrent_tasks = 0\n").unwrap();

        assert!(matches!(
            GlobalConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn zero_tool_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("neosec.toml");
        std::fs::write(&path, "[tools.nmap]\ntimeout_secs = 0\n").unwrap();

        assert!(matches!(
            GlobalConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
