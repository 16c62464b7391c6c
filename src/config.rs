//! JSON configuration for store credentials, backups and the converter.
//!
//! The file is resolved in priority order:
//! 1. `--config` CLI flag
//! 2. `SHOPIFY_IMG_CONVERT_CONFIG` environment variable
//! 3. `./shopify_img_convert.json`
//! 4. `<config dir>/shopify-img-convert/config.json`
//!
//! `SHOPIFY_STORE` and `SHOPIFY_PASSWORD` override the selected store section.
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "SHOPIFY_IMG_CONVERT_CONFIG";
pub const LOCAL_CONFIG_FILE: &str = "shopify_img_convert.json";
pub const DEFAULT_API_VERSION: &str = "2024-01";
pub const DEFAULT_BACKUP_DIR: &str = "backups";
pub const DEFAULT_CONVERTER: &str = "convert {input} -quality 85% {output}";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub auth: StoreSection,
    #[serde(default)]
    pub test: Option<StoreSection>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_converter")]
    pub converter: String,
}

/// Credentials for one store as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default)]
    pub store: String,
    /// Kept for reference; the password alone authenticates.
    #[serde(default)]
    #[allow(dead_code)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub password: String,
    /// Replaces `https://<store>` when set, e.g. for a local test server.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// A validated store selection ready for the API client.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub store: String,
    pub access_token: String,
    pub base_url: String,
    pub api_version: String,
    pub sandbox: bool,
}

impl StoreConfig {
    /// Root of the versioned Admin REST API, without a trailing slash.
    pub fn api_base(&self) -> String {
        format!(
            "{}/admin/api/{}",
            self.base_url.trim_end_matches('/'),
            self.api_version
        )
    }
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(DEFAULT_BACKUP_DIR)
}

fn default_converter() -> String {
    DEFAULT_CONVERTER.to_string()
}

/// Locate and parse the config file.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = resolve_config_path(explicit, env::var_os(CONFIG_ENV).map(PathBuf::from))?;
    tracing::debug!(path = %path.display(), "loading config");
    read_config(&path)
}

pub fn read_config(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
}

fn resolve_config_path(explicit: Option<&Path>, from_env: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = from_env {
        return Ok(path);
    }
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Ok(local);
    }
    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("shopify-img-convert").join("config.json");
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(anyhow!(
        "no config found: pass --config, set {CONFIG_ENV}, or create ./{LOCAL_CONFIG_FILE}"
    ))
}

impl Config {
    /// Select the production (`auth`) or sandbox (`test`) store.
    pub fn store(&self, sandbox: bool) -> Result<StoreConfig> {
        self.store_with_env(sandbox, |key| env::var(key).ok())
    }

    fn store_with_env<F>(&self, sandbox: bool, lookup: F) -> Result<StoreConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = if sandbox {
            self.test
                .clone()
                .ok_or_else(|| anyhow!("--sandbox requires a `test` section in the config"))?
        } else {
            self.auth.clone()
        };
        let name = if sandbox { "test" } else { "auth" };

        let store = lookup("SHOPIFY_STORE")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(section.store);
        let access_token = lookup("SHOPIFY_PASSWORD")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(section.password);

        let store = store.trim().to_string();
        if store.is_empty() {
            return Err(anyhow!("config `{name}.store` is empty"));
        }
        if access_token.trim().is_empty() {
            return Err(anyhow!("config `{name}.password` is empty"));
        }

        let base_url = section
            .base_url
            .unwrap_or_else(|| format!("https://{store}"));

        Ok(StoreConfig {
            store,
            access_token: access_token.trim().to_string(),
            base_url,
            api_version: self.api_version.clone(),
            sandbox,
        })
    }
}
