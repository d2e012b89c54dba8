//! HLS-style manifest generation (spec.md §4.6): an M3U8 playlist over a
//! set of already-queried segments, written to a process-owned scratch
//! directory (teacher idiom: generated artifacts live in a
//! `sandboxed_file_manager`-managed directory, never directly in
//! `std::fs`).

use thiserror::Error;
use uuid::Uuid;

use crate::models::Segment;

const DISCONTINUITY_GAP_SECONDS: f64 = 1.0;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no segments in requested window")]
    NoSegments,
    #[error("failed to write manifest: {0}")]
    Io(String),
}

/// Render the M3U8 body for a set of segments, already sorted by
/// `start_time` ascending (spec.md §4.6): version 3, media-sequence 0,
/// allow-cache yes, one `#EXTINF` per segment, a `#EXT-X-DISCONTINUITY`
/// wherever the gap between consecutive segments exceeds one second, and a
/// trailing `#EXT-X-ENDLIST`.
///
/// Zero-duration segments (`end == start`) are omitted: spec.md §8 calls
/// out that they "cannot produce `EXTINF:0`".
pub fn render(segments: &[Segment]) -> Result<String, ManifestError> {
    let playable: Vec<&Segment> = segments
        .iter()
        .filter(|s| s.duration_seconds() > 0.0)
        .collect();
    if playable.is_empty() {
        return Err(ManifestError::NoSegments);
    }

    let mut body = String::new();
    body.push_str("#EXTM3U\n");
    body.push_str("#EXT-X-VERSION:3\n");
    body.push_str("#EXT-X-MEDIA-SEQUENCE:0\n");
    body.push_str("#EXT-X-ALLOW-CACHE:YES\n");

    let mut previous_end: Option<chrono::DateTime<chrono::Utc>> = None;
    for segment in &playable {
        if let Some(prev_end) = previous_end {
            let gap = (segment.start_time - prev_end).num_milliseconds() as f64 / 1000.0;
            if gap > DISCONTINUITY_GAP_SECONDS {
                body.push_str("#EXT-X-DISCONTINUITY\n");
            }
        }
        body.push_str(&format!("#EXTINF:{:.3},\n", segment.duration_seconds()));
        body.push_str(&format!("/api/recordings/play/{}\n", segment.id));
        previous_end = Some(segment.end_time);
    }
    body.push_str("#EXT-X-ENDLIST\n");
    Ok(body)
}

/// Write the rendered manifest to a uniquely named file under the scratch
/// manager's sandbox and return its relative path. Caller is expected to
/// delete it after serving (spec.md §4.6).
pub async fn build_manifest(
    segments: &[Segment],
    scratch: &sandboxed_file_manager::SandboxedManager,
) -> Result<String, ManifestError> {
    let body = render(segments)?;
    let relative_path = format!("{}.m3u8", Uuid::new_v4());
    scratch
        .write(&relative_path, body)
        .await
        .map_err(|e| ManifestError::Io(e.to_string()))?;
    Ok(relative_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn segment(id: i64, start_offset: i64, end_offset: i64) -> Segment {
        let base = Utc::now();
        Segment {
            id,
            stream: "cam1".into(),
            path: format!("/data/cam1/{id}.mp4"),
            start_time: base + ChronoDuration::seconds(start_offset),
            end_time: base + ChronoDuration::seconds(end_offset),
            size_bytes: 1024,
            has_detection: false,
            protected: false,
            retention_override_days: None,
        }
    }

    #[test]
    fn empty_segments_is_an_error() {
        assert!(matches!(render(&[]), Err(ManifestError::NoSegments)));
    }

    #[test]
    fn zero_duration_segment_is_omitted() {
        let segments = vec![segment(1, 0, 0), segment(2, 0, 60)];
        let body = render(&segments).unwrap();
        assert!(!body.contains("/api/recordings/play/1\n"));
        assert!(body.contains("/api/recordings/play/2\n"));
    }

    #[test]
    fn discontinuity_inserted_across_gap() {
        // [100,160], [160,220], [300,360] from spec.md §8 scenario d.
        let segments = vec![segment(1, 100, 160), segment(2, 160, 220), segment(3, 300, 360)];
        let body = render(&segments).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        let discontinuities = lines.iter().filter(|l| **l == "#EXT-X-DISCONTINUITY").count();
        assert_eq!(discontinuities, 1);
        assert!(body.trim_end().ends_with("#EXT-X-ENDLIST"));
    }

    #[test]
    fn no_discontinuity_for_contiguous_segments() {
        let segments = vec![segment(1, 0, 60), segment(2, 60, 120)];
        let body = render(&segments).unwrap();
        assert!(!body.contains("#EXT-X-DISCONTINUITY"));
    }
}
