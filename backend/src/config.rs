//! Console configuration, kept as a single YAML file.
//!
//! A missing file is created with defaults on first start. The API base URL
//! can be pointed elsewhere with `DAYCARE_API_URL` without touching the file.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable that overrides `api_base_url`
pub const API_URL_ENV: &str = "DAYCARE_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Root of the remote API, without the `/api` suffix
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Children fetched for one dashboard render
    pub dashboard_batch_size: usize,
    pub attendance_refresh_interval_secs: u64,
    /// Default filter when `RUST_LOG` is not set
    pub log_level: String,
    /// Data format version for future migrations
    pub data_format_version: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 15,
            dashboard_batch_size: 20,
            attendance_refresh_interval_secs: 300,
            log_level: "info".to_string(),
            data_format_version: "1.0".to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Load the config at `path`, writing the defaults there if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let yaml_content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            let config: ConsoleConfig = serde_yaml::from_str(&yaml_content)
                .with_context(|| format!("Failed to parse config file {:?}", path))?;
            debug!("Loaded console config from {:?}", path);
            config
        } else {
            let config = ConsoleConfig::default();
            config.save(path)?;
            info!("Created default console config at {:?}", path);
            config
        };

        config.apply_api_url_override(std::env::var(API_URL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory {:?}", parent))?;
            }
        }

        let yaml_content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        // Write to a temp file, then rename over the real one
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, yaml_content)
            .with_context(|| format!("Failed to write config file {:?}", temp_path))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to move config file into place at {:?}", path))?;

        debug!("Saved console config to {:?}", path);
        Ok(())
    }

    /// Empty values leave the configured URL alone
    pub fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            info!("Using API base URL from {}: {}", API_URL_ENV, url);
            self.api_base_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            bail!("api_base_url must not be empty");
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            bail!("api_base_url must start with http:// or https://");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        if self.dashboard_batch_size == 0 {
            bail!("dashboard_batch_size must be greater than zero");
        }
        if self.attendance_refresh_interval_secs == 0 {
            bail!("attendance_refresh_interval_secs must be greater than zero");
        }
        Ok(())
    }
}
