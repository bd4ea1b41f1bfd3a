//! Configuration module for threadwatch
//!
//! Loads and persists user preferences at ~/.threadwatch/config.toml. Theme
//! and refresh interval survive across runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Refresh intervals (seconds) the interval key cycles through.
pub const REFRESH_CHOICES: [u64; 6] = [1, 2, 3, 5, 10, 30];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Light
    }
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub theme: Theme,
    /// Poll interval in seconds
    pub refresh_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            refresh_secs: 3,
        }
    }
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".threadwatch")
            .join("config.toml")
    }

    /// Merge CLI overrides into config
    pub fn with_overrides(mut self, interval: Option<u64>, theme: Option<Theme>) -> Self {
        if let Some(secs) = interval {
            self.refresh_secs = secs.max(1);
        }
        if let Some(theme) = theme {
            self.theme = theme;
        }
        self
    }

    /// Persist the current preferences to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// The next preset refresh interval after the current one.
    pub fn next_refresh_interval(&self) -> u64 {
        let position = REFRESH_CHOICES
            .iter()
            .position(|&choice| choice >= self.refresh_secs);
        match position {
            Some(at) if REFRESH_CHOICES[at] == self.refresh_secs => {
                REFRESH_CHOICES[(at + 1) % REFRESH_CHOICES.len()]
            }
            Some(at) => REFRESH_CHOICES[at],
            None => REFRESH_CHOICES[0],
        }
    }
}
