//! Continuous fragmented-MP4 playback (spec.md §4.6): stitches consecutive
//! segments into a single HTTP-streamed MP4 by handing the external muxer a
//! concat playlist and piping its stdout to the response body in fixed
//! chunks.
//!
//! Grounded on the teacher's `services/cyclic_buffer.rs` chunked streaming
//! and `proxy/session_tracker.rs` for tracking the active session so a
//! client disconnect tears down the subprocess.

use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures_util::Stream;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::RepositoryResult;
use crate::models::Segment;
use crate::repositories::SegmentRepository;

/// Chunk size for the stdout→HTTP pipe (spec.md §4.6: "fixed chunks (32 KiB)").
const CHUNK_SIZE: usize = 32 * 1024;

/// How far past `start` to pull segments for one continuous session
/// (spec.md §4.6: "up to 24 h from start").
const MAX_WINDOW: Duration = Duration::from_secs(24 * 3600);

const MUXER_FLAGS: &str = "frag_keyframe+empty_moov+default_base_moof";

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no segments found at or after start")]
    NoSegments,
    #[error(transparent)]
    Repository(#[from] crate::errors::RepositoryError),
    #[error("failed to write playlist: {0}")]
    PlaylistIo(String),
    #[error("failed to spawn muxer: {0}")]
    SpawnFailed(String),
}

/// Locate the first segment with `end > start` and everything contiguous
/// after it within `MAX_WINDOW`, ordered by `start_time` ascending
/// (spec.md §4.6).
async fn segments_for_playback(
    repository: &SegmentRepository,
    stream: &str,
    start: DateTime<Utc>,
) -> Result<Vec<Segment>, PlaybackError> {
    let window_end = start + chrono::Duration::from_std(MAX_WINDOW).unwrap();
    let segments: RepositoryResult<Vec<Segment>> =
        super::query::list(repository, stream, start, window_end, Some(super::query::DEFAULT_LIMIT)).await;
    let segments = segments?;
    let segments: Vec<Segment> = segments.into_iter().filter(|s| s.end_time > start).collect();
    if segments.is_empty() {
        return Err(PlaybackError::NoSegments);
    }
    Ok(segments)
}

/// Build an ffmpeg-style concat-demuxer playlist body: one `file '<path>'`
/// line per segment, in playback order.
fn render_playlist(segments: &[Segment]) -> String {
    let mut body = String::new();
    for segment in segments {
        body.push_str(&format!("file '{}'\n", segment.path.replace('\'', "'\\''")));
    }
    body
}

/// An in-flight continuous-playback session: the muxer subprocess plus the
/// scratch playlist file backing it. Implements [`Stream`] of stdout chunks
/// so it can be handed directly to `axum::body::Body::from_stream`; dropping
/// it tears down the subprocess (`kill_on_drop`) and removes the playlist.
pub struct PlaybackSession {
    child: Child,
    stdout: tokio::process::ChildStdout,
    playlist_path: std::path::PathBuf,
    scratch: sandboxed_file_manager::SandboxedManager,
    buf: BytesMut,
}

impl PlaybackSession {
    /// Start a continuous-playback session for `stream` beginning at
    /// `start`: queries overlapping segments, writes a scratch playlist,
    /// and spawns the muxer with fragmented-MP4 output flags.
    pub async fn start(
        repository: &SegmentRepository,
        scratch: sandboxed_file_manager::SandboxedManager,
        muxer_command: &str,
        stream: &str,
        start: DateTime<Utc>,
    ) -> Result<Self, PlaybackError> {
        let segments = segments_for_playback(repository, stream, start).await?;
        debug!(stream, segment_count = segments.len(), "assembling continuous playback");

        let relative_path = format!("{}.playlist.txt", Uuid::new_v4());
        let body = render_playlist(&segments);
        scratch
            .write(&relative_path, body)
            .await
            .map_err(|e| PlaybackError::PlaylistIo(e.to_string()))?;
        let playlist_path = scratch
            .get_full_path(&relative_path)
            .map_err(|e| PlaybackError::PlaylistIo(e.to_string()))?;

        let mut cmd = Command::new(muxer_command);
        cmd.arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(&playlist_path)
            .arg("-c")
            .arg("copy")
            .arg("-movflags")
            .arg(MUXER_FLAGS)
            .arg("-f")
            .arg("mp4")
            .arg("-");
        cmd.kill_on_drop(true);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            PlaybackError::SpawnFailed(format!("failed to spawn {muxer_command}: {e}"))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlaybackError::SpawnFailed("muxer stdout not piped".into()))?;

        if let Some(stderr) = child.stderr.take() {
            let stream = stream.to_string();
            tokio::spawn(async move {
                use tokio::io::{AsyncBufReadExt, BufReader};
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "muxer", stream = %stream, "{line}");
                }
            });
        }

        Ok(Self {
            child,
            stdout,
            playlist_path,
            scratch,
            buf: BytesMut::zeroed(CHUNK_SIZE),
        })
    }
}

impl Stream for PlaybackSession {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut read_buf = tokio::io::ReadBuf::new(&mut this.buf[..]);
        match Pin::new(&mut this.stdout).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => {
                let n = read_buf.filled().len();
                if n == 0 {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Ok(Bytes::copy_from_slice(read_buf.filled()))))
                }
            }
            Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        // `kill_on_drop(true)` tears down the muxer; the playlist is scratch
        // space owned by this session and is removed best-effort here since
        // Drop can't be async.
        let scratch = self.scratch.clone();
        let path = self.playlist_path.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "failed to remove playback playlist");
            }
            drop(scratch);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

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
    fn playlist_lists_segments_in_order() {
        let segments = vec![segment(1, 0, 60), segment(2, 60, 120)];
        let body = render_playlist(&segments);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("/data/cam1/1.mp4"));
        assert!(lines[1].contains("/data/cam1/2.mp4"));
    }

    #[test]
    fn playlist_escapes_single_quotes() {
        let mut s = segment(1, 0, 60);
        s.path = "/data/cam's/1.mp4".into();
        let body = render_playlist(&[s]);
        assert!(body.contains("cam'\\''s"));
    }
}
