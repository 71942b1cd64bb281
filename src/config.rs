//! Optional TOML configuration.
//!
//! Values here sit between built-in defaults and command-line flags. The
//! file lives at `<config dir>/similar-images/config.toml` unless another
//! path is given.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::decision::{KeepPolicy, NamePolicy};

pub const APP_NAME: &str = "similar-images";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the perceptual hash cache.
    pub cache_dir: Option<PathBuf>,
    /// Worker threads for hashing. Defaults to the number of CPUs.
    pub threads: Option<usize>,
    /// Set to false to never draw progress bars.
    pub progress_bar: Option<bool>,
    pub keep_by: Option<KeepPolicy>,
    pub name_by: Option<NamePolicy>,
    /// One of "error", "warn", "info", "debug", "trace".
    pub log_level: Option<String>,
    /// File the values were read from, `None` for built-in defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Loads `path` if given, otherwise the default location. A missing
    /// default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: '{}'", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: '{}'", path.display()))?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            ..config
        })
    }

    /// The cache directory to use: an explicit flag wins over the config
    /// file, which wins over the platform default.
    pub fn resolve_cache_dir(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        flag.or_else(|| self.cache_dir.clone())
            .or_else(default_cache_dir)
            .context("Could not determine a cache directory, pass --app-cache-dir")
    }
}

/// Per-user cache directory for this application, if the platform has one.
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(APP_NAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.toml"))
}
