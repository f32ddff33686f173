//! Configuration types for the device catalog service

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Where the device registry lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_devices_path")]
    pub devices_path: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            devices_path: default_devices_path(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl RegistryConfig {
    /// Full URL of the device listing endpoint
    pub fn devices_url(&self) -> String {
        join_url(&self.base_url, &self.devices_path)
    }
}

/// Date-ranged telemetry endpoints, relative to the registry base URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_temperature_path")]
    pub temperature_path: String,
    #[serde(default = "default_water_path")]
    pub water_path: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            temperature_path: default_temperature_path(),
            water_path: default_water_path(),
        }
    }
}

/// Periodic catalog refresh. An interval of zero disables the loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default)]
    pub interval_seconds: u64,
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
        }
    }
}

/// Join a base URL and an absolute path without doubling the slash
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_devices_path() -> String {
    "/api/devices/list".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_temperature_path() -> String {
    "/api/temperature/data".to_string()
}

fn default_water_path() -> String {
    "/api/water/data".to_string()
}

fn default_true() -> bool {
    true
}

fn default_dashboard_port() -> u16 {
    11120
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::CatalogError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        crate::CatalogError::Config(format!("Failed to parse config file {:?}: {}", path, e))
    })
}
