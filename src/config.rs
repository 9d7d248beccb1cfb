//! Runtime configuration loaded from TOML.
//!
//! ## Loading order
//!
//! 1. `HELIOS_CONFIG` environment variable (path to TOML file)
//! 2. `helios.toml` in the current working directory
//! 3. Built-in defaults (the original SOLAR_01 deployment values)
//!
//! Every section is `#[serde(default)]`, so a partial file only overrides
//! what it names. Credentials can additionally be supplied via
//! `HELIOS_EMAIL` / `HELIOS_PASSWORD`, which win over the file.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Root configuration for one edge deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Device identity and presentation timezone
    #[serde(default)]
    pub device: DeviceConfig,

    /// Window cadence
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Backend endpoint and credentials
    #[serde(default)]
    pub backend: BackendConfig,

    /// Local telemetry store
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device identifier reported in every payload
    pub device_id: String,
    /// Timezone label carried in payload metadata
    pub timezone: String,
    /// Presentation offset from UTC, minutes east
    pub utc_offset_minutes: i32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: "SOLAR_01".to_string(),
            timezone: "Asia/Manila".to_string(),
            utc_offset_minutes: 8 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Window length in minutes
    pub period_minutes: u32,
    /// Seconds past the cadence boundary before a cycle starts, letting
    /// upstream writers settle
    pub settle_offset_secs: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            period_minutes: 5,
            settle_offset_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend service root URL
    pub base_url: String,
    pub email: String,
    pub password: String,
    pub login_timeout_secs: u64,
    pub post_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            email: String::new(),
            password: String::new(),
            login_timeout_secs: 10,
            post_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the sled telemetry database
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("helios_data"),
        }
    }
}

impl EdgeConfig {
    /// Load configuration using the standard search order, then apply
    /// credential overrides from the environment.
    pub fn load() -> Self {
        let mut config = Self::load_file_or_defaults();
        config.apply_env_overrides();
        config
    }

    fn load_file_or_defaults() -> Self {
        if let Ok(path) = std::env::var("HELIOS_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), device = %config.device.device_id, "Loaded config from HELIOS_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from HELIOS_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "HELIOS_CONFIG points to non-existent file, falling back");
            }
        }

        let local = Path::new("helios.toml");
        if local.exists() {
            match Self::load_from_file(local) {
                Ok(config) => {
                    info!(device = %config.device.device_id, "Loaded ./helios.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse ./helios.toml, using defaults");
                }
            }
        } else {
            info!("No config file found, using built-in defaults");
        }

        Self::default()
    }

    /// Parse a specific TOML file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(email) = std::env::var("HELIOS_EMAIL") {
            self.backend.email = email;
        }
        if let Ok(password) = std::env::var("HELIOS_PASSWORD") {
            self.backend.password = password;
        }
        if let Ok(url) = std::env::var("HELIOS_BACKEND_URL") {
            self.backend.base_url = url;
        }
    }

    /// Presentation offset; an out-of-range configured value degrades to UTC.
    pub fn presentation_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.device.utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                minutes = self.device.utc_offset_minutes,
                "utc_offset_minutes out of range, using UTC"
            );
            Utc.fix()
        })
    }
}
