//! Application settings

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ui24_session::SessionConfig;
use ui24_sim::VirtualConsoleConfig;

/// Address of a console on its own Wi-Fi hotspot
const DEFAULT_ADDRESS: &str = "10.10.1.1";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Console host name or IP
    pub address: String,
    /// Session tunables
    pub session: SessionConfig,
    /// Virtual console used by `simulate`
    pub simulator: VirtualConsoleConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            session: SessionConfig::default(),
            simulator: VirtualConsoleConfig::default(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for ui24ctl
    /// Uses $XDG_CONFIG_HOME/ui24ctl, falls back to ~/.config/ui24ctl
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("ui24ctl"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("ui24ctl"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a specific file; missing or unreadable files yield defaults
    pub fn load_from(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save settings to disk, returning the file written
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }
}
