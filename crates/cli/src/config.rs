//! Process configuration.
//!
//! Everything is read once at startup into an [`AppConfig`] and then passed
//! down explicitly; no other module reads the environment for relay settings.

use std::path::PathBuf;

use bunny::BunnyConfig;
use listener::{AckMode, DEFAULT_PORT};
use pipeline::{MarkerNaming, RelaySettings, StorageZone};
use thiserror::Error;
use unity::UnityConfig;

/// A configuration key that is missing or unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration value {key}")]
    Missing { key: &'static str },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Fully resolved process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub unity: UnityConfig,
    pub bunny: BunnyConfig,
    pub relay: RelaySettings,
    pub scratch_dir: PathBuf,
    pub port: u16,
    pub ack_mode: AckMode,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// `.env` should already have been loaded by the caller.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing { key });

        let unity_api_key = require("UNITY_API_KEY")?;
        let access_key = require("BUNNY_ACCESS_KEY")?;
        let zone_name = require("BUNNY_STORAGE_ZONE")?;
        let storage_zone = StorageZone::new(zone_name.clone()).ok_or(ConfigError::Missing {
            key: "BUNNY_STORAGE_ZONE",
        })?;

        let mut unity = UnityConfig::new(unity_api_key);
        if let Some(url) = get("UNITY_API_BASE_URL") {
            unity = unity.with_api_base_url(url);
        }

        let mut bunny = BunnyConfig::new(storage_zone, access_key);
        if let Some(key) = get("BUNNY_STORAGE_ACCESS_KEY") {
            bunny = bunny.with_storage_access_key(key);
        }
        if let Some(url) = get("BUNNY_STORAGE_ENDPOINT") {
            bunny = bunny.with_storage_endpoint(url);
        }
        if let Some(url) = get("BUNNY_API_ENDPOINT") {
            bunny = bunny.with_api_endpoint(url);
        }

        let pull_zone_url = get("BUNNY_PULL_ZONE_URL")
            .unwrap_or_else(|| format!("https://{zone_name}.b-cdn.net"));
        let purge_pattern = format!("{}/*", pull_zone_url.trim_end_matches('/'));

        let marker_naming = match get("RELAY_COMMIT_MARKER_NAMING") {
            Some(v) => v.parse::<MarkerNaming>().map_err(|message| ConfigError::Invalid {
                key: "RELAY_COMMIT_MARKER_NAMING",
                message,
            })?,
            None => MarkerNaming::default(),
        };

        let prefix = get("RELAY_CDN_PATH_PREFIX")
            .unwrap_or_else(|| RelaySettings::DEFAULT_CDN_PATH_PREFIX.to_string());
        let relay = RelaySettings::new(&prefix, marker_naming, purge_pattern).map_err(|e| {
            ConfigError::Invalid {
                key: "RELAY_CDN_PATH_PREFIX",
                message: e.to_string(),
            }
        })?;

        let port = match get("PORT") {
            Some(v) => v.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                message: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let ack_mode = match get("RELAY_ACK_MODE") {
            Some(v) => v.parse::<AckMode>().map_err(|message| ConfigError::Invalid {
                key: "RELAY_ACK_MODE",
                message,
            })?,
            None => AckMode::default(),
        };

        let scratch_dir = get("RELAY_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("build-relay"));

        Ok(Self {
            unity,
            bunny,
            relay,
            scratch_dir,
            port,
            ack_mode,
        })
    }
}
