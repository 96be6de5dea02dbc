use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::provider::Provider;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DEMO_DELAY_MS: u64 = 5000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

/// On-disk configuration, every field optional
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub provider: Option<String>,
    pub endpoint_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub demo_delay_ms: Option<u64>,
    pub tick_interval_ms: Option<u64>,
}

/// Values given on the command line; they win over everything else
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub endpoint_url: Option<String>,
    pub model: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// Fully resolved settings the backends and the UI run with
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Provider,
    pub endpoint_url: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub demo_delay: Duration,
    pub tick_interval: Duration,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&config_content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("cityhub").join("config.json"))
    }

    /// Merge command line overrides, the process environment and this file
    pub fn resolve(&self, overrides: &Overrides) -> Result<Settings, ConfigError> {
        self.resolve_with(overrides, |name| std::env::var(name).ok())
    }

    /// Precedence: overrides, then environment, then config file, then
    /// provider defaults. The provider itself has no default.
    pub fn resolve_with(
        &self,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Settings, ConfigError> {
        let provider_name = overrides
            .provider
            .clone()
            .or_else(|| self.provider.clone())
            .ok_or(ConfigError::NoProvider)?;
        let provider = Provider::from_str(&provider_name)
            .ok_or_else(|| ConfigError::UnknownProvider(provider_name.clone()))?;

        let endpoint_url = overrides
            .endpoint_url
            .clone()
            .or_else(|| env("CITYHUB_API_URL"))
            .or_else(|| self.endpoint_url.clone())
            .unwrap_or_else(|| provider.default_endpoint().to_string());

        let model = overrides
            .model
            .clone()
            .or_else(|| self.model.clone())
            .or_else(|| provider.default_model().map(str::to_string));

        let api_key = env("CITYHUB_API_KEY")
            .or_else(|| provider.api_key_env().and_then(&env))
            .or_else(|| self.api_key.clone());

        let timeout_secs = overrides
            .request_timeout_secs
            .or(self.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(Settings {
            provider,
            endpoint_url,
            model,
            api_key,
            request_timeout: Duration::from_secs(timeout_secs),
            demo_delay: Duration::from_millis(self.demo_delay_ms.unwrap_or(DEFAULT_DEMO_DELAY_MS)),
            tick_interval: Duration::from_millis(
                self.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS).max(1),
            ),
        })
    }
}
