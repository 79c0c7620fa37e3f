use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::ConfigError;

/// Session lengths offered to the user, in seconds.
pub const PRESET_DURATIONS: [u32; 4] = [30, 45, 60, 120];

pub const DEFAULT_DURATION_SECS: u32 = 60;

pub fn validate_duration(secs: u32) -> Result<u32, ConfigError> {
    if PRESET_DURATIONS.contains(&secs) {
        Ok(secs)
    } else {
        Err(ConfigError::UnsupportedDuration { secs })
    }
}

/// Neighbouring preset, wrapping around; used by the duration picker.
pub fn cycle_duration(current: u32, forward: bool) -> u32 {
    let idx = PRESET_DURATIONS
        .iter()
        .position(|&d| d == current)
        .unwrap_or(0);
    let len = PRESET_DURATIONS.len();
    let next = if forward {
        (idx + 1) % len
    } else {
        (idx + len - 1) % len
    };
    PRESET_DURATIONS[next]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub duration_secs: u32,
    /// Name shown in result notifications
    pub username: Option<String>,
    pub webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_DURATION_SECS,
            username: None,
            webhook_url: None,
        }
    }
}

impl Config {
    /// Replace values a hand-edited file may have broken.
    pub fn sanitized(mut self) -> Self {
        if let Err(err) = validate_duration(self.duration_secs) {
            warn!(error = %err, "falling back to default duration");
            self.duration_secs = DEFAULT_DURATION_SECS;
        }
        if self
            .webhook_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            self.webhook_url = None;
        }
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "typepace") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("typepace_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => cfg.sanitized(),
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "ignoring unreadable config");
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(ConfigError::Serialize)?;
        fs::write(&self.path, data).map_err(write_err)
    }
}
