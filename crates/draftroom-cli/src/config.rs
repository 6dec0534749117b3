//! Command line configuration.
//!
//! Settings are read from `~/.config/draftroom/config.json` (or the file
//! passed with `--config`) and then overridden by `DRAFTROOM_*` environment
//! variables, which may also come from a `.env` file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use draftroom_core::{ClientConfig, CredentialsMode, InvalidationScope};
use serde::{Deserialize, Serialize};

/// Application name used for the config directory
const APP_NAME: &str = "draftroom";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_BASE_URL: &str = "DRAFTROOM_BASE_URL";
const ENV_TOKEN: &str = "DRAFTROOM_TOKEN";
const ENV_CREDENTIALS: &str = "DRAFTROOM_CREDENTIALS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub client: ClientConfig,
    /// Which drafts a pick marks stale
    pub invalidation_scope: InvalidationScope,
}

impl Config {
    /// Load from `path`, or the default location when `None`, then apply
    /// `DRAFTROOM_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };
        let mut config = Self::read_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// A missing file yields the defaults.
    fn read_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.client.base_url = base_url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.client.token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(mode) = lookup(ENV_CREDENTIALS) {
            self.client.credentials = mode
                .parse::<CredentialsMode>()
                .map_err(|e| anyhow::anyhow!("{ENV_CREDENTIALS}: {e}"))?;
        }
        Ok(())
    }
}
