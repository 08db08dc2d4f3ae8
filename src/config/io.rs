//! Loading the configuration from disk.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use super::Config;

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: ConfigSource,
}

impl Config {
    /// Loads the user configuration, falling back to defaults when no
    /// file exists. A present-but-broken file is an error; callers
    /// typically log it and continue with defaults.
    pub fn load() -> Result<LoadedConfig> {
        let Some(path) = default_config_path() else {
            debug!("no config directory available, using defaults");
            return Ok(LoadedConfig {
                config: Config::default(),
                source: ConfigSource::Default,
            });
        };
        if !path.exists() {
            debug!("no config file at {}, using defaults", path.display());
            return Ok(LoadedConfig {
                config: Config::default(),
                source: ConfigSource::Default,
            });
        }
        Self::load_from(&path)
    }

    /// Loads and validates a specific file.
    pub fn load_from(path: &Path) -> Result<LoadedConfig> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate();
        info!("loaded configuration from {}", path.display());
        Ok(LoadedConfig {
            config,
            source: ConfigSource::File(path.to_path_buf()),
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    let base = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("wayterm").join("wayterm.toml"))
}
