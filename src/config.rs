use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to write config file")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize config")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub info: InfoConfig,

    #[serde(default)]
    pub glossary: GlossaryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoConfig {
    /// Directories searched, in order, for the `dir` file
    #[serde(default = "default_info_dirs")]
    pub dirs: Vec<PathBuf>,

    /// Program used to format individual nodes
    #[serde(default = "default_program")]
    pub program: String,

    /// Seconds between sweeps of finished hierarchy jobs
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlossaryConfig {
    /// Cached glossary XML
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            dirs: default_info_dirs(),
            program: default_program(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_info_dirs() -> Vec<PathBuf> {
    [
        "/usr/share/info/",
        "/usr/info/",
        "/usr/lib/info/",
        "/usr/local/info/",
        "/usr/local/lib/info/",
        "/usr/X11R6/info/",
        "/usr/X11R6/lib/info/",
        "/usr/X11R6/lib/xemacs/info/",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

fn default_program() -> String {
    "info".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    30
}

impl InfoConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Config {
    /// Get the platform-specific config file path
    /// - macOS: ~/Library/Application Support/helpnav/config.toml
    /// - Linux: ~/.config/helpnav/config.toml
    /// - Windows: %APPDATA%/helpnav/config.toml
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("helpnav").join("config.toml"))
    }

    /// Load config from file, or return default if file doesn't exist
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load config from `path`, falling back to defaults when it is missing or invalid
    pub fn load_from(path: &std::path::Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|contents| toml::from_str(&contents).ok())
            .unwrap_or_default()
    }

    /// Save config to the platform config file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }
}
