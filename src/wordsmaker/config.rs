//! # Configuration
//!
//! Two pieces of configuration:
//!
//! - [`UserSettings`], persisted as `User/settings.json` under the
//!   application root. Missing fields take their defaults and a missing file
//!   is created with defaults on first load.
//! - [`StoragePaths`], the two storage roots, resolved per platform with the
//!   `directories` crate and overridable from the command line or the
//!   environment (`WORDSMAKER_DATA_DIR`, `WORDSMAKER_BACKUP_DIR`).
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `font-zoom` | `16` | Editor font size |
//! | `save-interval` | `60000` | Autosave interval, ms |
//! | `backup-interval` | `3600000` | Minimum time between automatic backups, ms |
//! | `ai-suite` | `false` | Whether the proofreading tools are enabled |
//! | `theme` | `light` | UI theme name |

use crate::error::{Result, WordsError};
use crate::store::StorageBackend;
use chrono::Duration;
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

pub const BACKUP_DIR_NAME: &str = "WordsMaker3000Backups";

pub const SETTING_KEYS: &[&str] = &[
    "font-zoom",
    "save-interval",
    "backup-interval",
    "ai-suite",
    "theme",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default = "default_font_zoom")]
    pub default_font_zoom: u32,

    /// Milliseconds.
    #[serde(default = "default_save_interval")]
    pub default_save_interval: u64,

    /// Milliseconds.
    #[serde(default = "default_backup_interval")]
    pub default_backup_interval: u64,

    #[serde(default)]
    pub ai_suite_enabled: bool,

    #[serde(default = "default_theme")]
    pub theme: String,
}

fn default_font_zoom() -> u32 {
    16
}

fn default_save_interval() -> u64 {
    60_000
}

fn default_backup_interval() -> u64 {
    3_600_000
}

fn default_theme() -> String {
    "light".to_string()
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            default_font_zoom: default_font_zoom(),
            default_save_interval: default_save_interval(),
            default_backup_interval: default_backup_interval(),
            ai_suite_enabled: false,
            theme: default_theme(),
        }
    }
}

impl UserSettings {
    /// Loads the settings file, writing defaults first if there is none.
    pub fn load_or_init<B: StorageBackend>(backend: &B) -> Result<Self> {
        match backend.read_settings()? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                WordsError::Corrupt(format!("settings file is not valid: {}", e))
            }),
            None => {
                let settings = Self::default();
                settings.save(backend)?;
                debug!("default settings written");
                Ok(settings)
            }
        }
    }

    pub fn save<B: StorageBackend>(&self, backend: &B) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        backend.write_settings(&raw)
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::milliseconds(self.default_backup_interval as i64)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::milliseconds(self.default_save_interval as i64)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "font-zoom" => Some(self.default_font_zoom.to_string()),
            "save-interval" => Some(self.default_save_interval.to_string()),
            "backup-interval" => Some(self.default_backup_interval.to_string()),
            "ai-suite" => Some(self.ai_suite_enabled.to_string()),
            "theme" => Some(self.theme.clone()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |what: &str| {
            WordsError::InvalidInput(format!("{} expects {}, got '{}'", key, what, value))
        };
        match key {
            "font-zoom" => {
                let zoom: u32 = value.parse().map_err(|_| invalid("a number"))?;
                if zoom == 0 {
                    return Err(invalid("a positive number"));
                }
                self.default_font_zoom = zoom;
            }
            "save-interval" => {
                self.default_save_interval =
                    value.parse().map_err(|_| invalid("milliseconds"))?;
            }
            "backup-interval" => {
                self.default_backup_interval =
                    value.parse().map_err(|_| invalid("milliseconds"))?;
            }
            "ai-suite" => {
                self.ai_suite_enabled = match value {
                    "true" | "on" | "yes" => true,
                    "false" | "off" | "no" => false,
                    _ => return Err(invalid("true or false")),
                };
            }
            "theme" => {
                if value.trim().is_empty() {
                    return Err(invalid("a theme name"));
                }
                self.theme = value.trim().to_string();
            }
            _ => {
                return Err(WordsError::InvalidInput(format!(
                    "Unknown setting: {} (known: {})",
                    key,
                    SETTING_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }
}

/// The application-private root and the user-visible backup root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub app_root: PathBuf,
    pub backup_root: PathBuf,
}

impl StoragePaths {
    /// Platform defaults, with explicit overrides taking precedence.
    pub fn discover(app_root: Option<PathBuf>, backup_root: Option<PathBuf>) -> Result<Self> {
        let app_root = match app_root {
            Some(path) => path,
            None => ProjectDirs::from("com", "wordsmaker", "WordsMaker")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or_else(|| {
                    WordsError::Storage("Could not determine the data directory".to_string())
                })?,
        };
        let backup_root = match backup_root {
            Some(path) => path,
            None => default_backup_root()?,
        };
        Ok(Self {
            app_root,
            backup_root,
        })
    }
}

fn default_backup_root() -> Result<PathBuf> {
    let dirs = UserDirs::new()
        .ok_or_else(|| WordsError::Storage("Could not determine the home directory".to_string()))?;
    let documents = dirs
        .document_dir()
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| dirs.home_dir().join("Documents"));
    Ok(documents.join(BACKUP_DIR_NAME))
}
