//! Engine configuration.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use resound_core::{ConnectionDiff, DiffOptions, NodeType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Reconciliation settings
    #[serde(default)]
    pub engine: ReconcileConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// How child lists are compared between updates
    #[serde(default)]
    pub connection_diff: ConnectionDiff,
    /// Node type substituted for unknown types
    #[serde(default = "default_fallback")]
    pub fallback_node_type: NodeType,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { connection_diff: ConnectionDiff::default(), fallback_node_type: default_fallback() }
    }
}

fn default_fallback() -> NodeType {
    NodeType::Gain
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if !self.engine.fallback_node_type.is_builtin() {
            return Err(Error::Config(format!(
                "fallback_node_type must be a builtin node type, got {}",
                self.engine.fallback_node_type
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::Config("logging.level must not be empty".to_string()));
        }
        Ok(())
    }

    /// Diff options described by this configuration.
    #[must_use]
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions { connections: self.engine.connection_diff }
    }
}

/// Load configuration from `path`, or from the platform config path when
/// `None`. A missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        let config = EngineConfig::from_toml_str(&content)?;
        info!(?config_path, "Configuration loaded");
        Ok(config)
    } else {
        info!(?config_path, "Config file not found, using defaults");
        Ok(EngineConfig::default())
    }
}

/// Platform configuration file path.
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "resound", "Resound")
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
    Ok(dirs.config_dir().join("engine.toml"))
}
