use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod defaults;

use defaults::*;

/// Top-level daemon configuration (spec.md §1 Config Store, extended by
/// SPEC_FULL.md §B.1). Streams themselves are administrative data living in
/// the database, not config-file content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub storage: StorageConfig,
    pub relay: RelayConfig,
    pub health: HealthConfig,
    #[serde(default)]
    pub circuitbreaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: Option<u32>,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_max_connections() -> Option<u32> {
    Some(DEFAULT_MAX_CONNECTIONS)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// §6 HTTP surface bind settings. The router itself (per-request worker
/// pool, auth, static assets) is out of scope per spec.md §1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout() -> String {
    DEFAULT_REQUEST_TIMEOUT.to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Segment storage and HLS manifest scratch-directory retention (spec.md §6
/// "Persisted state layout", §4.6 "Manifests are written to a process-owned
/// scratch directory").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_segments_path")]
    pub segments_path: PathBuf,

    #[serde(default = "default_manifest_scratch_path")]
    pub manifest_scratch_path: PathBuf,
    #[serde(default = "default_manifest_scratch_retention")]
    pub manifest_scratch_retention: String,
    #[serde(default = "default_storage_cleanup_interval")]
    pub storage_cleanup_interval: String,

    /// Default segment `max_age_days` for streams that don't override it.
    #[serde(default = "default_segment_max_age_days")]
    pub default_segment_max_age_days: u32,
}

fn default_segments_path() -> PathBuf {
    PathBuf::from(DEFAULT_SEGMENTS_PATH)
}

fn default_manifest_scratch_path() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST_SCRATCH_PATH)
}

fn default_manifest_scratch_retention() -> String {
    DEFAULT_MANIFEST_SCRATCH_RETENTION.to_string()
}

fn default_storage_cleanup_interval() -> String {
    DEFAULT_STORAGE_CLEANUP_INTERVAL.to_string()
}

fn default_segment_max_age_days() -> u32 {
    DEFAULT_SEGMENT_MAX_AGE_DAYS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            segments_path: default_segments_path(),
            manifest_scratch_path: default_manifest_scratch_path(),
            manifest_scratch_retention: default_manifest_scratch_retention(),
            storage_cleanup_interval: default_storage_cleanup_interval(),
            default_segment_max_age_days: default_segment_max_age_days(),
        }
    }
}

/// Relay Controller (C3) / Relay API Client (C4) tunables (spec.md §4.1, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Path or command name for the Relay binary.
    #[serde(default = "default_relay_binary")]
    pub binary: String,
    #[serde(default = "default_relay_management_port")]
    pub management_port: u16,
    /// External muxer (`ffmpeg`-style) invoked as a subprocess for recording
    /// and continuous playback (spec.md §4.5, §4.6).
    #[serde(default = "default_muxer_command")]
    pub muxer_command: String,

    #[serde(default = "default_relay_readiness_timeout")]
    pub readiness_timeout: String,
    #[serde(default = "default_relay_start_grace_period")]
    pub stop_grace_period: String,
    #[serde(default = "default_relay_connect_timeout")]
    pub connect_timeout: String,
    #[serde(default = "default_relay_request_timeout")]
    pub request_timeout: String,
    #[serde(default = "default_relay_offer_timeout")]
    pub offer_timeout: String,
}

fn default_relay_binary() -> String {
    DEFAULT_RELAY_BINARY.to_string()
}
fn default_relay_management_port() -> u16 {
    DEFAULT_RELAY_MANAGEMENT_PORT
}
fn default_muxer_command() -> String {
    DEFAULT_MUXER_COMMAND.to_string()
}
fn default_relay_readiness_timeout() -> String {
    DEFAULT_RELAY_READINESS_TIMEOUT.to_string()
}
fn default_relay_start_grace_period() -> String {
    DEFAULT_RELAY_START_GRACE_PERIOD.to_string()
}
fn default_relay_connect_timeout() -> String {
    DEFAULT_RELAY_CONNECT_TIMEOUT.to_string()
}
fn default_relay_request_timeout() -> String {
    DEFAULT_RELAY_REQUEST_TIMEOUT.to_string()
}
fn default_relay_offer_timeout() -> String {
    DEFAULT_RELAY_OFFER_TIMEOUT.to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            binary: default_relay_binary(),
            management_port: default_relay_management_port(),
            muxer_command: default_muxer_command(),
            readiness_timeout: default_relay_readiness_timeout(),
            stop_grace_period: default_relay_start_grace_period(),
            connect_timeout: default_relay_connect_timeout(),
            request_timeout: default_relay_request_timeout(),
            offer_timeout: default_relay_offer_timeout(),
        }
    }
}

/// Unified Health Monitor (C6) tunables (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_tick_interval")]
    pub tick_interval: String,
    #[serde(default = "default_max_api_failures")]
    pub max_api_failures: u32,
    #[serde(default = "default_restart_cooldown")]
    pub restart_cooldown: String,
    #[serde(default = "default_max_restarts_per_window")]
    pub max_restarts_per_window: usize,
    #[serde(default = "default_restart_window")]
    pub restart_window: String,
    #[serde(default = "default_stream_max_consecutive_failures")]
    pub stream_max_consecutive_failures: u32,
    #[serde(default = "default_stream_reregistration_cooldown")]
    pub stream_reregistration_cooldown: String,
    #[serde(default = "default_restart_history_capacity")]
    pub restart_history_capacity: usize,
}

fn default_health_tick_interval() -> String {
    DEFAULT_HEALTH_TICK_INTERVAL.to_string()
}
fn default_max_api_failures() -> u32 {
    DEFAULT_MAX_API_FAILURES
}
fn default_restart_cooldown() -> String {
    DEFAULT_RESTART_COOLDOWN.to_string()
}
fn default_max_restarts_per_window() -> usize {
    DEFAULT_MAX_RESTARTS_PER_WINDOW
}
fn default_restart_window() -> String {
    DEFAULT_RESTART_WINDOW.to_string()
}
fn default_stream_max_consecutive_failures() -> u32 {
    DEFAULT_STREAM_MAX_CONSECUTIVE_FAILURES
}
fn default_stream_reregistration_cooldown() -> String {
    DEFAULT_STREAM_REREGISTRATION_COOLDOWN.to_string()
}
fn default_restart_history_capacity() -> usize {
    DEFAULT_RESTART_HISTORY_CAPACITY
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_health_tick_interval(),
            max_api_failures: default_max_api_failures(),
            restart_cooldown: default_restart_cooldown(),
            max_restarts_per_window: default_max_restarts_per_window(),
            restart_window: default_restart_window(),
            stream_max_consecutive_failures: default_stream_max_consecutive_failures(),
            stream_reregistration_cooldown: default_stream_reregistration_cooldown(),
            restart_history_capacity: default_restart_history_capacity(),
        }
    }
}

/// Circuit breaker configuration with support for named profiles, reused
/// verbatim from the teacher's generic shape to guard every Relay API
/// Client call (SPEC_FULL.md §C).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CircuitBreakerConfig {
    #[serde(default)]
    pub global: CircuitBreakerProfileConfig,
    #[serde(default)]
    pub profiles: std::collections::HashMap<String, CircuitBreakerProfileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerProfileConfig {
    #[serde(default = "default_circuit_breaker_type")]
    pub implementation_type: String,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout: String,
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout: String,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_circuit_breaker_type() -> String {
    "simple".to_string()
}
fn default_failure_threshold() -> u32 {
    3
}
fn default_operation_timeout() -> String {
    "5s".to_string()
}
fn default_reset_timeout() -> String {
    "30s".to_string()
}
fn default_success_threshold() -> u32 {
    2
}

impl Default for CircuitBreakerProfileConfig {
    fn default() -> Self {
        Self {
            implementation_type: default_circuit_breaker_type(),
            failure_threshold: default_failure_threshold(),
            operation_timeout: default_operation_timeout(),
            reset_timeout: default_reset_timeout(),
            success_threshold: default_success_threshold(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            web: WebConfig::default(),
            storage: StorageConfig::default(),
            relay: RelayConfig::default(),
            health: HealthConfig::default(),
            circuitbreaker: CircuitBreakerConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file = std::env::var("NVR_CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Layered config: TOML file, then `NVR_`-prefixed environment
    /// variables, exactly as the teacher's `config/mod.rs` does with
    /// `figment` (SPEC_FULL.md §B.1).
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !std::path::Path::new(config_file).exists() {
            tracing::warn!(
                "Config file '{}' not found, using default configuration values",
                config_file
            );
            let config: Config = Figment::new()
                .merge(figment::providers::Serialized::defaults(Self::default()))
                .merge(Env::prefixed("NVR_").split("__"))
                .extract()?;
            return Ok(config);
        }

        let config: Config = Figment::new()
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("NVR_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_figment() {
        let config: Config = Figment::new()
            .merge(figment::providers::Serialized::defaults(Config::default()))
            .extract()
            .unwrap();
        assert_eq!(config.web.port, DEFAULT_PORT);
        assert_eq!(config.health.max_api_failures, DEFAULT_MAX_API_FAILURES);
    }
}
