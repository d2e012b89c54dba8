/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./nvr.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REQUEST_TIMEOUT: &str = "30s";

// Storage defaults
pub const DEFAULT_SEGMENTS_PATH: &str = "./data/segments";
pub const DEFAULT_MANIFEST_SCRATCH_PATH: &str = "./data/manifests";
pub const DEFAULT_MANIFEST_SCRATCH_RETENTION: &str = "1h";
pub const DEFAULT_STORAGE_CLEANUP_INTERVAL: &str = "10m";
pub const DEFAULT_SEGMENT_MAX_AGE_DAYS: u32 = 14;

// Relay defaults (spec.md §4.1, §4.2)
pub const DEFAULT_RELAY_BINARY: &str = "relay";
pub const DEFAULT_RELAY_MANAGEMENT_PORT: u16 = 9997;
pub const DEFAULT_MUXER_COMMAND: &str = "ffmpeg";
pub const DEFAULT_RELAY_READINESS_TIMEOUT: &str = "2s";
pub const DEFAULT_RELAY_START_GRACE_PERIOD: &str = "5s";
pub const DEFAULT_RELAY_CONNECT_TIMEOUT: &str = "5s";
pub const DEFAULT_RELAY_REQUEST_TIMEOUT: &str = "5s";
pub const DEFAULT_RELAY_OFFER_TIMEOUT: &str = "10s";

// Unified Health Monitor defaults (spec.md §4.4)
pub const DEFAULT_HEALTH_TICK_INTERVAL: &str = "30s";
pub const DEFAULT_MAX_API_FAILURES: u32 = 3;
pub const DEFAULT_RESTART_COOLDOWN: &str = "120s";
pub const DEFAULT_MAX_RESTARTS_PER_WINDOW: usize = 5;
pub const DEFAULT_RESTART_WINDOW: &str = "600s";
pub const DEFAULT_STREAM_MAX_CONSECUTIVE_FAILURES: u32 = 3;
pub const DEFAULT_STREAM_REREGISTRATION_COOLDOWN: &str = "60s";
pub const DEFAULT_RESTART_HISTORY_CAPACITY: usize = 32;

// Recording Consumer defaults (spec.md §4.5)
pub const DEFAULT_SEGMENT_DURATION_SECONDS: u32 = 60;
pub const DEFAULT_MUXER_STOP_GRACE_PERIOD: &str = "5s";

// Timeline Engine defaults (spec.md §4.6)
pub const DEFAULT_SEGMENT_QUERY_LIMIT: u32 = 5000;
pub const DEFAULT_MANIFEST_DISCONTINUITY_GAP_SECONDS: f64 = 1.0;
pub const DEFAULT_CONTINUOUS_PLAYBACK_MAX_SPAN_HOURS: i64 = 24;
pub const DEFAULT_PLAYBACK_CHUNK_BYTES: usize = 32 * 1024;
