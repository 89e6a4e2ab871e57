use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{tlog_debug, Error, Result};

fn default_max_history_size() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How many archived plans to retain before evicting the oldest.
    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,
    /// Strict mode rejects updates that reference unknown plans or tasks
    /// instead of synthesizing placeholders.
    #[serde(default)]
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_history_size: default_max_history_size(),
            strict: false,
        }
    }
}

impl Config {
    pub fn trellis_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".trellis"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::trellis_dir()?.join("trellis.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            tlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        tlog_debug!(
            "Config loaded: max_history_size={}, strict={}",
            config.max_history_size,
            config.strict
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        Self::ensure_dirs()?;
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        tlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs() -> Result<()> {
        let dir = Self::trellis_dir()?;
        if !dir.exists() {
            tlog_debug!("Creating trellis directory: {}", dir.display());
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
