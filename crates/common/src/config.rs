//! Machine-local application settings.
//!
//! These are preferences tied to the machine (GPU selection, notification
//! flags), not to a particular video. Per-video render settings live in
//! `smear-settings` and follow the resolution cascade there.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Machine-local preferences, resolved independently of any job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// GPU vendor to prefer for encoding ("nvidia", "amd", "intel", "cpu").
    pub gpu_type: String,

    /// Zero-based device index when multiple GPUs of the preferred type exist.
    pub gpu_device_index: u32,

    /// Notify when a render finishes successfully.
    pub notify_on_success: bool,

    /// Notify when a render fails.
    pub notify_on_failure: bool,

    /// When no local config exists next to a video, fall back to the global
    /// config instead of materializing defaults.
    pub prefer_global_config: bool,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "smear=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Append logs to this file instead of stderr. Long batch renders
    /// redraw the terminal with progress lines, so stderr logging and the
    /// progress display fight over the screen.
    pub file: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            gpu_type: "cpu".to_string(),
            gpu_device_index: 0,
            notify_on_success: true,
            notify_on_failure: true,
            prefer_global_config: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppSettings {
    /// Load settings from the standard location, falling back to defaults.
    ///
    /// A missing or malformed file is never fatal for app settings; the
    /// problem is logged and defaults are used.
    pub fn load() -> Self {
        Self::load_from(&settings_file_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(settings) => return settings,
                    Err(e) => {
                        tracing::warn!("Failed to parse app settings at {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read app settings at {:?}: {}", path, e);
                }
            }
        }
        Self::default()
    }

    /// Save settings to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&settings_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard app-settings file location.
pub fn settings_file_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Standard location of the global per-video config.
pub fn global_config_path() -> PathBuf {
    config_dir().join("global-config.json")
}

fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("smear")
}
