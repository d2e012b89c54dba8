//! Segment Catalog (C2) retention sweep: enforces the per-stream `max_age_days`
//! and `storage_cap_bytes` policies named in spec.md §3 "Stream" and
//! "Segment", honoring the `protected` exemption, a segment's own
//! `retention_override_days` when present, and the file-first-then-row
//! deletion invariant.
//!
//! Grounded on the same cooperative-loop shape as `health::monitor` (a
//! dedicated task woken on a tick, checking a cancellation token at a finer
//! granularity than the sweep interval) and on `sandboxed_file_manager`'s
//! own cleanup-sweep idiom for age-based eviction.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::StreamCatalog;
use crate::models::Segment;
use crate::repositories::SegmentRepository;

/// Periodic sweeper over the Segment Catalog (spec.md §3 invariants:
/// "protected segments are exempt from eviction", "deleting a segment
/// removes both the index row and the file atomically (file-first, then
/// row)").
pub struct RetentionSweeper {
    catalog: Arc<StreamCatalog>,
    segments: SegmentRepository,
    default_max_age_days: u32,
    interval: Duration,
    cancellation: CancellationToken,
}

impl RetentionSweeper {
    pub fn new(
        catalog: Arc<StreamCatalog>,
        segments: SegmentRepository,
        default_max_age_days: u32,
        interval: Duration,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            segments,
            default_max_age_days,
            interval,
            cancellation,
        }
    }

    /// Runs until the cancellation token fires, checking it once per second
    /// regardless of the configured sweep interval (same shutdown
    /// responsiveness as the Unified Health Monitor, spec.md §4.4/§5).
    pub async fn run(self: Arc<Self>) {
        let mut elapsed = self.interval;
        loop {
            if self.cancellation.is_cancelled() {
                info!("retention sweeper shutting down");
                return;
            }
            if elapsed >= self.interval {
                elapsed = Duration::ZERO;
                self.sweep_once().await;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            elapsed += Duration::from_secs(1);
        }
    }

    async fn sweep_once(&self) {
        let streams = self.catalog.list().await;
        for stream in streams {
            if let Err(err) = self.sweep_age(&stream.name, stream.max_age_days).await {
                warn!(stream = %stream.name, error = %err, "age-based retention sweep failed");
            }
            if let Some(cap) = stream.storage_cap_bytes {
                if let Err(err) = self.sweep_storage_cap(&stream.name, cap).await {
                    warn!(stream = %stream.name, error = %err, "storage-cap retention sweep failed");
                }
            }
        }
    }

    /// Evicts unprotected segments whose `start_time` is older than their
    /// effective age limit: a segment's own `retention_override_days` when
    /// set and positive, else the stream's `max_age_days` (falling back to
    /// the daemon-wide default when that is non-positive too). Per-segment
    /// cutoffs are computed in application code rather than pushed into the
    /// `list_expired` query, since a single stream-wide cutoff can't express
    /// a segment whose override is longer (it would be evicted early) or
    /// shorter (it would survive too long) than the stream default.
    async fn sweep_age(&self, stream: &str, max_age_days: i32) -> Result<(), crate::errors::RepositoryError> {
        let stream_default_days = if max_age_days > 0 {
            max_age_days as i64
        } else {
            self.default_max_age_days as i64
        };
        let now = Utc::now();
        let candidates = self.segments.list_unprotected(stream).await?;
        for segment in &candidates {
            let effective_days = effective_age_days(segment.retention_override_days, stream_default_days);
            let cutoff = now - chrono::Duration::days(effective_days);
            if segment.start_time < cutoff {
                self.evict(segment).await;
            }
        }
        Ok(())
    }

    /// Evicts the oldest unprotected segments until the stream's total
    /// recorded size is back under its configured cap.
    async fn sweep_storage_cap(&self, stream: &str, cap_bytes: i64) -> Result<(), crate::errors::RepositoryError> {
        let mut total = self.segments.total_size_bytes(stream).await?;
        if total <= cap_bytes {
            return Ok(());
        }
        let candidates = self.segments.list_unprotected(stream).await?;
        for segment in &candidates {
            if total <= cap_bytes {
                break;
            }
            total -= segment.size_bytes;
            self.evict(segment).await;
        }
        Ok(())
    }

    /// File-first, then row (spec.md §3 invariant). A file removal error
    /// other than "already gone" aborts this segment's eviction; the next
    /// sweep retries it rather than leaving an orphaned file with no index
    /// entry pointing at it.
    async fn evict(&self, segment: &Segment) {
        match tokio::fs::remove_file(&segment.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(
                    stream = %segment.stream,
                    path = %segment.path,
                    error = %err,
                    "failed to remove expired segment file, will retry next sweep"
                );
                return;
            }
        }
        match self.segments.delete_row(segment.id).await {
            Ok(()) => debug!(stream = %segment.stream, segment_id = segment.id, "evicted segment"),
            Err(err) => warn!(
                stream = %segment.stream,
                segment_id = segment.id,
                error = %err,
                "removed segment file but failed to delete its row"
            ),
        }
    }
}

/// A segment's own `retention_override_days` wins when set and positive;
/// otherwise the stream's (or daemon's default) age limit applies.
fn effective_age_days(override_days: Option<i32>, stream_default_days: i64) -> i64 {
    match override_days {
        Some(days) if days > 0 => days as i64,
        _ => stream_default_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn segment(id: i64, age_days: i64, size_bytes: i64, protected: bool) -> Segment {
        Segment {
            id,
            stream: "cam1".into(),
            path: format!("/data/cam1/{id}.mp4"),
            start_time: Utc::now() - ChronoDuration::days(age_days),
            end_time: Utc::now() - ChronoDuration::days(age_days) + ChronoDuration::minutes(1),
            size_bytes,
            has_detection: false,
            protected,
            retention_override_days: None,
        }
    }

    #[test]
    fn protected_segments_are_never_eviction_candidates() {
        // list_unprotected/list_expired are SQL-filtered (`protected = false`);
        // this guards the in-memory assumption their results encode.
        let seg = segment(1, 100, 1024, true);
        assert!(seg.protected);
    }

    #[test]
    fn effective_age_days_falls_back_to_stream_default_without_override() {
        assert_eq!(effective_age_days(None, 7), 7);
        assert_eq!(effective_age_days(Some(0), 7), 7);
        assert_eq!(effective_age_days(Some(-1), 7), 7);
    }

    #[test]
    fn effective_age_days_prefers_a_positive_override() {
        assert_eq!(effective_age_days(Some(30), 7), 30);
        assert_eq!(effective_age_days(Some(1), 7), 1);
    }

    #[test]
    fn override_extends_retention_past_the_stream_default() {
        let mut seg = segment(1, 10, 1024, false);
        seg.retention_override_days = Some(30);
        let effective_days = effective_age_days(seg.retention_override_days, 7);
        let cutoff = Utc::now() - ChronoDuration::days(effective_days);
        assert!(seg.start_time > cutoff, "a 10-day-old segment with a 30-day override should not be expired yet");
    }

    #[test]
    fn override_shortens_retention_below_the_stream_default() {
        let mut seg = segment(1, 5, 1024, false);
        seg.retention_override_days = Some(2);
        let effective_days = effective_age_days(seg.retention_override_days, 30);
        let cutoff = Utc::now() - ChronoDuration::days(effective_days);
        assert!(seg.start_time < cutoff, "a 5-day-old segment with a 2-day override should already be expired");
    }
}
