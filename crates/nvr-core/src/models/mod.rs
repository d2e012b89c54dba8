//! Domain types shared across the daemon: streams, their runtime state, the
//! Relay's view of them, and recorded segments.
//!
//! These are plain data structures (spec.md §3). Ownership rules ("the
//! Stream Catalog exclusively owns `StreamState`...") are enforced by the
//! modules that hold them (`catalog`, `repositories`), not by the types
//! themselves.

use chrono::{DateTime, Utc};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A configured camera/stream, as stored in the Config Store (spec.md §3 "Stream").
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct Stream {
    pub name: String,
    pub url: String,
    pub onvif_username: Option<String>,
    pub onvif_password: Option<String>,
    pub enabled: bool,
    pub backchannel: bool,
    pub segment_duration_seconds: i32,
    pub max_age_days: i32,
    pub storage_cap_bytes: Option<i64>,
    pub ptz_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/streams` and `PUT /api/streams/{name}` (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
pub struct StreamRequest {
    pub name: Option<String>,
    pub url: String,
    pub onvif_username: Option<String>,
    pub onvif_password: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub backchannel: bool,
    pub segment_duration_seconds: Option<i32>,
    pub max_age_days: Option<i32>,
    pub storage_cap_bytes: Option<i64>,
    #[serde(default)]
    pub ptz_enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Validate a stream name against spec.md §3: 1-63 printable characters, no `/`.
pub fn validate_stream_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.chars().count() > 63 {
        return Err(format!(
            "stream name must be 1-63 characters, got {}",
            name.chars().count()
        ));
    }
    if name.contains('/') {
        return Err("stream name must not contain '/'".to_string());
    }
    if !name.chars().all(|c| !c.is_control()) {
        return Err("stream name must be printable".to_string());
    }
    Ok(())
}

/// Runtime state of a stream (spec.md §3 "StreamState").
///
/// Driven by the state machine in spec.md §4.3: the Recording Consumer and
/// the Unified Health Monitor are the only callers that transition it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamState {
    Initializing,
    Running,
    Reconnecting,
    Error,
    Stopped,
}

impl StreamState {
    /// Phase 2 of the Unified Health Monitor only acts on streams in this set
    /// (spec.md §4.4).
    pub fn is_unhealthy(self) -> bool {
        matches!(self, StreamState::Error | StreamState::Reconnecting)
    }
}

/// The two atomic counters spec.md §3 calls out explicitly: `reconnect_attempts`
/// and `last_reconnect_time`. Read without a lock; written under the owning
/// `StreamEntry`'s per-stream lock alongside `StreamState` so composite reads
/// never observe a torn update.
#[derive(Debug, Default)]
pub struct ReconnectCounters {
    pub attempts: AtomicU32,
    /// Unix seconds; 0 means "never".
    pub last_reconnect_time: AtomicI64,
}

impl ReconnectCounters {
    pub fn reset(&self) {
        self.attempts.store(0, Ordering::SeqCst);
    }

    pub fn record_attempt(&self) -> u32 {
        let attempts = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.last_reconnect_time.store(now_unix(), Ordering::SeqCst);
        attempts
    }

    pub fn last_reconnect_time(&self) -> i64 {
        self.last_reconnect_time.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn seconds_since_last_reconnect(&self) -> i64 {
        let last = self.last_reconnect_time();
        if last == 0 {
            i64::MAX
        } else {
            (now_unix() - last).max(0)
        }
    }
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Whether, and how, the Relay currently knows about a stream (spec.md §3
/// "RelayRegistration"). Cache state only; the Relay itself is authoritative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayRegistration {
    pub registered: bool,
    pub rtsp_url: Option<String>,
    pub webrtc_url: Option<String>,
}

impl RelayRegistration {
    pub fn derive(port: u16, name: &str) -> Self {
        Self {
            registered: true,
            rtsp_url: Some(format!("rtsp://127.0.0.1:{port}/{name}")),
            webrtc_url: Some(format!("http://127.0.0.1:{port}/webrtc/{name}")),
        }
    }
}

/// Credentials a downstream consumer temporarily overwrote so they can be
/// restored byte-for-byte on stop (spec.md §3 "OriginalConfig").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalConfig {
    pub url: String,
    pub onvif_username: Option<String>,
    pub onvif_password: Option<String>,
}

impl From<&Stream> for OriginalConfig {
    fn from(stream: &Stream) -> Self {
        Self {
            url: stream.url.clone(),
            onvif_username: stream.onvif_username.clone(),
            onvif_password: stream.onvif_password.clone(),
        }
    }
}

/// A recorded MP4 fragment (spec.md §3 "Segment").
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct Segment {
    pub id: i64,
    pub stream: String,
    pub path: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub size_bytes: i64,
    pub has_detection: bool,
    pub protected: bool,
    pub retention_override_days: Option<i32>,
}

impl Segment {
    pub fn duration_seconds(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// spec.md §4.6: overlap predicate used by both the segment query and the
    /// HLS/continuous-playback windowing, `end > start && start < end`.
    pub fn overlaps(&self, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> bool {
        self.end_time > window_start && self.start_time < window_end
    }
}

/// Request body used by the Recording Consumer (C7) to close a segment into
/// the Segment Catalog.
#[derive(Debug, Clone)]
pub struct NewSegment {
    pub stream: String,
    pub path: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub size_bytes: i64,
    pub has_detection: bool,
}

/// A fixed-capacity ring of Relay restart timestamps (spec.md §3
/// "RestartHistory"), backing the rate limiter in `health::rate_limiter`.
#[derive(Debug)]
pub struct RestartHistory {
    capacity: usize,
    timestamps: std::sync::Mutex<std::collections::VecDeque<DateTime<Utc>>>,
}

impl RestartHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            timestamps: std::sync::Mutex::new(std::collections::VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, at: DateTime<Utc>) {
        let mut ring = self.timestamps.lock().unwrap();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(at);
    }

    /// Count of restarts at or after `since`.
    pub fn count_since(&self, since: DateTime<Utc>) -> usize {
        self.timestamps
            .lock()
            .unwrap()
            .iter()
            .filter(|ts| **ts >= since)
            .count()
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.timestamps.lock().unwrap().back().copied()
    }

    pub fn len(&self) -> usize {
        self.timestamps.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_name_validation() {
        assert!(validate_stream_name("front-door").is_ok());
        assert!(validate_stream_name("").is_err());
        assert!(validate_stream_name(&"x".repeat(64)).is_err());
        assert!(validate_stream_name("front/door").is_err());
    }

    #[test]
    fn segment_overlap_is_half_open() {
        let base = Utc::now();
        let seg = Segment {
            id: 1,
            stream: "cam1".into(),
            path: "/x".into(),
            start_time: base,
            end_time: base + chrono::Duration::seconds(10),
            size_bytes: 0,
            has_detection: false,
            protected: false,
            retention_override_days: None,
        };
        assert!(seg.overlaps(base - chrono::Duration::seconds(1), base + chrono::Duration::seconds(1)));
        // [0,10) queried with window start=10 should not overlap.
        assert!(!seg.overlaps(base + chrono::Duration::seconds(10), base + chrono::Duration::seconds(20)));
    }

    #[test]
    fn restart_history_respects_capacity() {
        let ring = RestartHistory::new(2);
        let t0 = Utc::now();
        ring.record(t0);
        ring.record(t0 + chrono::Duration::seconds(1));
        ring.record(t0 + chrono::Duration::seconds(2));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn reconnect_counters_reset() {
        let counters = ReconnectCounters::default();
        counters.record_attempt();
        counters.record_attempt();
        assert_eq!(counters.attempts(), 2);
        counters.reset();
        assert_eq!(counters.attempts(), 0);
    }
}
