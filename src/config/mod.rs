//! Configuration management for stagecheck
//!
//! These are the gate's own settings. The analyzer's scope document is a
//! separate file handled by [`crate::scope::loader`].

use crate::check::AnalyzerCommand;
use crate::scope::loader::DEFAULT_CONFIG_FILES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file looked up in the repository root
pub const WORKSPACE_CONFIG_FILE: &str = ".stagecheck.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub analyzer: AnalyzerConfig,
    pub scope: ScopeConfigFiles,
    pub conditions: ConditionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Name used in messages
    pub name: String,
    /// Executable path relative to the repository root
    pub binary: String,
    /// Extension of the staged files to check
    pub file_type: String,
    /// Seconds before the analyzer is killed (0 = wait forever)
    pub timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let command = AnalyzerCommand::default();
        Self {
            name: command.name,
            binary: command.binary,
            file_type: command.file_type,
            timeout_secs: 0,
        }
    }
}

impl AnalyzerConfig {
    pub fn command(&self) -> AnalyzerCommand {
        AnalyzerCommand {
            name: self.name.clone(),
            binary: self.binary.clone(),
            file_type: self.file_type.clone(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then_some(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScopeConfigFiles {
    /// Scope document names, first existing one wins
    pub config_files: Vec<String>,
}

impl Default for ScopeConfigFiles {
    fn default() -> Self {
        Self {
            config_files: DEFAULT_CONFIG_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConditionsConfig {
    /// Skip the check when the analyzer binary is not installed
    pub require_installed: bool,
}

impl Default for ConditionsConfig {
    fn default() -> Self {
        Self {
            require_installed: true,
        }
    }
}

impl Config {
    /// Load the settings that apply to a repository
    ///
    /// The repository's own settings file wins over the user-level one;
    /// without either the defaults apply.
    pub fn load_for_project(project_root: &Path) -> Result<Self> {
        let workspace_path = project_root.join(WORKSPACE_CONFIG_FILE);
        if workspace_path.is_file() {
            return Self::load_from(&workspace_path);
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.is_file() {
                return Self::load_from(&user_path);
            }
        }

        tracing::debug!("No settings file found, using defaults");
        Ok(Config::default())
    }

    /// Parse a settings file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid settings {}", path.display()))?;
        tracing::debug!("Loaded settings from {:?}", path);
        Ok(config)
    }

    /// User-level settings file, if the platform has a config directory
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "stagecheck")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
