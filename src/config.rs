use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// System configuration from `config.toml`. Every field has a default so a
/// missing file runs the scanner with stock behavior; strategy settings live
/// in the persisted portfolio instead.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub system: SystemConfig,
    pub scanner: ScannerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub database_path: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { database_path: "weatheredge.db".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Markets analyzed per cycle; the rest wait for the next cycle.
    pub max_markets_per_cycle: usize,
    /// Pause between markets, a deliberate throttle for upstream rate limits.
    pub market_pause_ms: u64,
    pub discovery_retries: u32,
    pub discovery_retry_delay_ms: u64,
    pub ensemble_retries: u32,
    pub ensemble_retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub ensemble_cache_ttl_secs: u64,
    /// Additive shift of the ensemble mean, reserved for calibration.
    pub bias_correction: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_markets_per_cycle: 15,
            market_pause_ms: 300,
            discovery_retries: 1,
            discovery_retry_delay_ms: 800,
            ensemble_retries: 2,
            ensemble_retry_delay_ms: 1000,
            request_timeout_secs: 15,
            ensemble_cache_ttl_secs: 240,
            bias_correction: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub csv_logging: bool,
    pub csv_log_path: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self { csv_logging: false, csv_log_path: "trades.csv".to_string() }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path)),
            Err(_) => Ok(Config::default()),
        }
    }
}

/// Environment overrides for the upstream API endpoints.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub gamma_api_url: String,
    pub ensemble_api_url: String,
}

impl EnvConfig {
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        Self {
            gamma_api_url: std::env::var("GAMMA_API_URL")
                .unwrap_or_else(|_| "https://gamma-api.polymarket.com".to_string()),
            ensemble_api_url: std::env::var("ENSEMBLE_API_URL")
                .unwrap_or_else(|_| "https://ensemble-api.open-meteo.com/v1/ensemble".to_string()),
        }
    }
}
