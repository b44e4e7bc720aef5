use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::Priority;
use crate::storage::{read_json, write_atomic, StorageError};

pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (450, 500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown theme `{0}` (expected light or dark)")]
pub struct ParseThemeError(String);

impl FromStr for Theme {
    type Err = ParseThemeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(ParseThemeError(value.to_string())),
        }
    }
}

/// User preferences persisted in `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    pub theme: Theme,
    /// `None` means "center on screen" at next launch.
    pub window_position: Option<(i32, i32)>,
    pub window_size: (u32, u32),
    /// Pre-fills the priority of the next new task.
    pub last_priority: Priority,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            window_position: None,
            window_size: DEFAULT_WINDOW_SIZE,
            last_priority: Priority::Medium,
        }
    }
}

impl Config {
    /// Loads the config, falling back to defaults on any problem. A broken
    /// config file must never block startup.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(error) => {
                log::warn!(
                    "config unreadable, using defaults path={} error={error}",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Like [`Config::load`] but reports unreadable or malformed files.
    /// A missing file is not an error.
    pub fn try_load(path: &Path) -> Result<Self, StorageError> {
        match read_json::<Config>(path) {
            Ok(config) => Ok(config),
            Err(StorageError::Io(io)) if io.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(error) => Err(error),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        write_atomic(path, self)?;
        log::debug!("config saved path={}", path.display());
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    pub fn remember_priority(&mut self, priority: Priority) {
        self.last_priority = priority;
    }

    pub fn remember_geometry(&mut self, position: Option<(i32, i32)>, size: (u32, u32)) {
        self.window_position = position;
        self.window_size = size;
    }
}
