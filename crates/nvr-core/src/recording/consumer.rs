//! Recording Consumer (C7): per-stream muxer subprocess that reads the
//! Relay-derived RTSP URL (or the original URL as a fallback) and writes
//! segmented MP4 files under `<storage>/<name>/…` (spec.md §4.5).
//!
//! Grounded on the teacher's `services/ffmpeg_wrapper.rs`: `kill_on_drop`
//! subprocess supervision, a per-process handle tracking uptime/status, and
//! a dedicated stderr line-monitoring task.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc::Receiver, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::StreamCatalog;
use crate::config::{RelayConfig, StorageConfig};
use crate::errors::AppResult;
use crate::health::ReconnectSignal;
use crate::models::{NewSegment, StreamState};
use crate::relay::RelayApiClient;
use crate::repositories::SegmentRepository;

const DEFAULT_READY_DEADLINE: Duration = Duration::from_secs(40);
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Per-stream supervisor state. One lives for as long as the stream is
/// enabled; `cancellation` fires on `stop(name)`.
struct StreamWorker {
    cancellation: CancellationToken,
    reconnect_now: Arc<AtomicBool>,
}

/// Recording Consumer (C7): owns one background task per enabled stream.
pub struct RecordingConsumer {
    catalog: Arc<StreamCatalog>,
    relay_client: Arc<RelayApiClient>,
    segments: SegmentRepository,
    storage: StorageConfig,
    muxer_command: String,
    stream_max_consecutive_failures: u32,
    workers: RwLock<HashMap<String, StreamWorker>>,
}

impl RecordingConsumer {
    pub fn new(
        catalog: Arc<StreamCatalog>,
        relay_client: Arc<RelayApiClient>,
        segments: SegmentRepository,
        storage: StorageConfig,
        relay_config: &RelayConfig,
        stream_max_consecutive_failures: u32,
    ) -> Self {
        Self {
            catalog,
            relay_client,
            segments,
            storage,
            muxer_command: relay_config.muxer_command.clone(),
            stream_max_consecutive_failures,
            workers: RwLock::new(HashMap::new()),
        }
    }

    /// `start(name)` (spec.md §4.5).
    pub async fn start(self: &Arc<Self>, name: &str) -> AppResult<()> {
        {
            let workers = self.workers.read().await;
            if workers.contains_key(name) {
                return Ok(());
            }
        }

        let cancellation = CancellationToken::new();
        let reconnect_now = Arc::new(AtomicBool::new(false));
        self.workers.write().await.insert(
            name.to_string(),
            StreamWorker {
                cancellation: cancellation.clone(),
                reconnect_now: reconnect_now.clone(),
            },
        );

        let this = Arc::clone(self);
        let name = name.to_string();
        tokio::spawn(async move {
            this.run_stream_loop(name, cancellation, reconnect_now).await;
        });
        Ok(())
    }

    /// `stop(name)` (spec.md §4.5): signal the subprocess, wait with a
    /// bounded grace period, restore `OriginalConfig` if set.
    pub async fn stop(&self, name: &str) -> AppResult<()> {
        let worker = self.workers.write().await.remove(name);
        if let Some(worker) = worker {
            worker.cancellation.cancel();
        }
        let _ = self.catalog.end_recording_via_relay(name).await;
        Ok(())
    }

    /// `signal_reconnect(name)` (spec.md §4.5): request a restart of the
    /// muxer, used after a Relay restart.
    pub async fn signal_reconnect(&self, name: &str) {
        if let Some(worker) = self.workers.read().await.get(name) {
            worker.reconnect_now.store(true, Ordering::SeqCst);
        }
    }

    /// `signal_reconnect_all()` (spec.md §4.5).
    pub async fn signal_reconnect_all(&self) {
        for worker in self.workers.read().await.values() {
            worker.reconnect_now.store(true, Ordering::SeqCst);
        }
    }

    /// Drains the Health Monitor's reconnect channel for as long as the
    /// process runs, breaking the Health Monitor → Recording Consumer cyclic
    /// dependency with message passing (spec.md §9).
    pub async fn drive_reconnect_signals(self: Arc<Self>, mut rx: Receiver<ReconnectSignal>) {
        while let Some(signal) = rx.recv().await {
            match signal {
                ReconnectSignal::Stream(name) => self.signal_reconnect(&name).await,
                ReconnectSignal::All => self.signal_reconnect_all().await,
            }
        }
    }

    async fn run_stream_loop(
        self: Arc<Self>,
        name: String,
        cancellation: CancellationToken,
        reconnect_now: Arc<AtomicBool>,
    ) {
        info!(stream = %name, "recording consumer starting");
        loop {
            if cancellation.is_cancelled() {
                return;
            }

            let (source_url, via_relay) = match self.resolve_source(&name).await {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(stream = %name, error = %err, "unable to resolve source, retrying in 5s");
                    if wait_or_cancel(&cancellation, Duration::from_secs(5)).await {
                        return;
                    }
                    continue;
                }
            };

            if via_relay {
                let _ = self.catalog.begin_recording_via_relay(&name).await;
            }

            let segment_duration = self.segment_duration_for(&name).await;

            reconnect_now.store(false, Ordering::SeqCst);
            let ran_one = self
                .record_one_segment(&name, &source_url, segment_duration, &cancellation, &reconnect_now)
                .await;

            if cancellation.is_cancelled() {
                return;
            }
            if ran_one {
                if let Ok(entry) = self.catalog.get_entry(&name).await {
                    entry.counters.reset();
                }
            } else {
                if let Ok(entry) = self.catalog.get_entry(&name).await {
                    let attempts = entry.counters.record_attempt();
                    // RECONNECTING -> ERROR once attempts cross the threshold
                    // (spec.md §4.3 state machine); the Health Monitor's
                    // Phase 2 re-registration then takes over recovery.
                    let next_state = if attempts >= self.stream_max_consecutive_failures {
                        StreamState::Error
                    } else {
                        StreamState::Reconnecting
                    };
                    let _ = self.catalog.transition(&name, next_state).await;
                }
                if wait_or_cancel(&cancellation, Duration::from_secs(2)).await {
                    return;
                }
            }
        }
    }

    /// `ensure_ready_for(name)` via the Stream Catalog; on failure, fall
    /// back to recording directly from the original URL (spec.md §4.5).
    async fn resolve_source(&self, name: &str) -> AppResult<(String, bool)> {
        match self.catalog.ensure_ready_for(name, DEFAULT_READY_DEADLINE).await {
            Ok(()) => match self.relay_client.derive_rtsp_url(name).await {
                Ok(url) => Ok((url, true)),
                Err(_) => self.original_url(name).await.map(|url| (url, false)),
            },
            Err(_) => self.original_url(name).await.map(|url| (url, false)),
        }
    }

    async fn original_url(&self, name: &str) -> AppResult<String> {
        let entry = self.catalog.get_entry(name).await?;
        Ok(entry.stream.url.clone())
    }

    async fn segment_duration_for(&self, name: &str) -> Duration {
        match self.catalog.get_entry(name).await {
            Ok(entry) => Duration::from_secs(entry.stream.segment_duration_seconds.max(1) as u64),
            Err(_) => Duration::from_secs(60),
        }
    }

    /// Spawn the muxer for exactly one segment, wait for it to roll over or
    /// be cancelled, then close the segment into the catalog (spec.md §4.5:
    /// "partial segments are preserved").
    async fn record_one_segment(
        &self,
        name: &str,
        source_url: &str,
        segment_duration: Duration,
        cancellation: &CancellationToken,
        reconnect_now: &Arc<AtomicBool>,
    ) -> bool {
        let start_time = Utc::now();
        let dir = PathBuf::from(&self.storage.segments_path)
            .join(name)
            .join(start_time.format("%Y").to_string())
            .join(start_time.format("%m").to_string())
            .join(start_time.format("%d").to_string());
        if let Err(err) = tokio::fs::create_dir_all(&dir).await {
            warn!(stream = %name, error = %err, "failed to create segment directory");
            return false;
        }

        let filename = format!("{}.mp4", start_time.format("%H%M%S%.3f"));
        let output_path = dir.join(&filename);

        let mut cmd = Command::new(&self.muxer_command);
        cmd.arg("-i")
            .arg(source_url)
            .arg("-t")
            .arg(segment_duration.as_secs().to_string())
            .arg(&output_path);
        cmd.kill_on_drop(true);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(stream = %name, error = %err, "failed to spawn muxer");
                return false;
            }
        };

        if let Some(stderr) = child.stderr.take() {
            let name = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "muxer", stream = %name, "{line}");
                }
            });
        }

        let _ = self.catalog.transition(name, StreamState::Running).await;

        let exited = tokio::select! {
            status = child.wait() => matches!(status, Ok(s) if s.success()),
            _ = cancellation.cancelled() => {
                let _ = child.kill().await;
                let _ = tokio::time::timeout(STOP_GRACE_PERIOD, child.wait()).await;
                false
            }
            _ = poll_reconnect(reconnect_now) => {
                let _ = child.kill().await;
                let _ = tokio::time::timeout(STOP_GRACE_PERIOD, child.wait()).await;
                true
            }
        };

        let end_time = Utc::now();
        let size_bytes = tokio::fs::metadata(&output_path)
            .await
            .map(|m| m.len() as i64)
            .unwrap_or(0);

        if size_bytes > 0 {
            let new_segment = NewSegment {
                stream: name.to_string(),
                path: output_path.to_string_lossy().to_string(),
                start_time,
                end_time,
                size_bytes,
                has_detection: false,
            };
            if let Err(err) = self.segments.insert(new_segment).await {
                warn!(stream = %name, error = %err, "failed to close segment into catalog");
            }
        }

        exited
    }
}

/// Waits up to `duration` unless the token cancels first; returns true if
/// cancellation fired.
async fn wait_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = token.cancelled() => true,
    }
}

/// Polls the reconnect flag at a short interval until it's set, used inside
/// `tokio::select!` to let a pending reconnect interrupt an in-flight
/// segment.
async fn poll_reconnect(flag: &Arc<AtomicBool>) {
    loop {
        if flag.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
