use crate::model::DEFAULT_CATEGORY;
use crate::reminders::LEDGER_KEY;
use crate::storage::default_data_dir;
use crate::store::{StoreSettings, DEFAULT_STORAGE_KEY};
use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Settings read from `config.yml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub default_category: String,
    pub storage_key: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: None,
            default_category: DEFAULT_CATEGORY.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Loads `explicit` if given (it must exist), otherwise the per-user
    /// config file when present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("no config file, using defaults");
                    return Ok(Config::default());
                }
            },
        };
        let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        let config = Config::parse(&data).with_context(|| format!("parsing {:?}", path))?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        let mut config: Config = serde_yaml::from_str(data)?;
        if config.default_category.trim().is_empty() {
            config.default_category = DEFAULT_CATEGORY.to_string();
        }
        config.default_category = config.default_category.trim().to_string();
        config.storage_key = config.storage_key.trim().to_string();
        let key = config.storage_key.as_str();
        if key.is_empty() {
            bail!("storage_key must not be empty");
        }
        // These names belong to the reminder ledger and the unreadable-snapshot backup.
        if key == LEDGER_KEY || key.ends_with(".corrupt") {
            bail!("storage_key {:?} is reserved", key);
        }
        Ok(config)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            storage_key: self.storage_key.clone(),
            default_category: self.default_category.clone(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "descaos").map(|dirs| dirs.config_dir().join("config.yml"))
}
