use anyhow::{anyhow, Result};
use log::info;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::discussion::FinderOptions;
use crate::session::identifiers::DEFAULT_EXTERNAL_HOST_PREFIXES;

/// Settings shared by the finder and the invite service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Asked in order for platform info; the first one also carries the invites
    pub identity_servers: Vec<String>,
    pub external_host_prefixes: Vec<String>,
    pub include_invites: bool,
    pub auto_join: bool,
    pub include_left: bool,
    pub log_level: String,
}

impl Default for FinderConfig {
    fn default() -> Self {
        FinderConfig {
            user_id: None,
            identity_servers: vec![
                "https://matrix.agent.tchap.gouv.fr".to_string(),
                "https://matrix.tchap.gouv.fr".to_string(),
            ],
            external_host_prefixes: DEFAULT_EXTERNAL_HOST_PREFIXES.iter().map(|p| p.to_string()).collect(),
            include_invites: true,
            auto_join: true,
            include_left: true,
            log_level: "info".to_string(),
        }
    }
}

impl FinderConfig {
    pub fn options(&self) -> FinderOptions {
        FinderOptions {
            include_invites: self.include_invites,
            auto_join: self.auto_join,
            include_left: self.include_left,
        }
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

static CONFIG_PATH_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Use `path` instead of the default config location. Only the first call wins.
pub fn set_config_path_override(path: PathBuf) {
    let _ = CONFIG_PATH_OVERRIDE.set(path);
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("discussion-finder");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

fn get_config_path() -> Result<PathBuf> {
    if let Some(path) = CONFIG_PATH_OVERRIDE.get() {
        return Ok(path.clone());
    }
    Ok(get_config_dir()?.join("config.json"))
}

pub fn save_config(config: &FinderConfig) -> Result<()> {
    save_config_to(&get_config_path()?, config)
}

pub fn load_config() -> Result<Option<FinderConfig>> {
    load_config_from(&get_config_path()?)
}

pub fn save_config_to(path: &Path, config: &FinderConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, config)?;

    info!("Config saved to {}", path.display());
    Ok(())
}

pub fn load_config_from(path: &Path) -> Result<Option<FinderConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let config: FinderConfig = serde_json::from_str(&contents)?;
    info!("Loaded config from {}", path.display());

    Ok(Some(config))
}
