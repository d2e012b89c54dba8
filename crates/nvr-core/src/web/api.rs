//! HTTP handlers for the daemon's public surface (spec.md §6).

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::models::{Segment, Stream, StreamRequest, StreamState};
use crate::timeline::{self, manifest, playback::PlaybackSession};
use crate::utils::time::{decode_colon_escapes, parse_time_param, resolve_window};

use super::AppState;
use super::responses;

#[derive(Debug, Clone, Serialize)]
pub struct StreamView {
    #[serde(flatten)]
    pub stream: Stream,
    pub state: StreamState,
    pub reconnect_attempts: u32,
    /// Unix seconds of the last reconnect attempt; `None` means never.
    pub last_reconnect_time: Option<i64>,
}

/// `GET /api/streams` (spec.md §6): every configured stream, its runtime
/// state, and reconnect telemetry so a stream stuck in `ERROR`/
/// `RECONNECTING` stays visible with its attempt history rather than
/// silently vanishing from view (spec.md §9 Open Questions).
pub async fn list_streams(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let streams = state.catalog.list().await;
    let mut views = Vec::with_capacity(streams.len());
    for stream in streams {
        let name = stream.name.clone();
        let stream_state = state.catalog.state_of(&name).await.unwrap_or(StreamState::Error);
        let (reconnect_attempts, last_reconnect_time) = match state.catalog.get_entry(&name).await {
            Ok(entry) => {
                let last = entry.counters.last_reconnect_time();
                (entry.counters.attempts(), if last == 0 { None } else { Some(last) })
            }
            Err(_) => (0, None),
        };
        views.push(StreamView {
            stream,
            state: stream_state,
            reconnect_attempts,
            last_reconnect_time,
        });
    }
    Ok(responses::ok(views))
}

/// `POST /api/streams` (spec.md §6): register a new stream, starting its
/// recording consumer if enabled.
pub async fn add_stream(
    State(state): State<AppState>,
    Json(request): Json<StreamRequest>,
) -> AppResult<impl IntoResponse> {
    let stream = state.catalog.add(request).await?;
    if stream.enabled {
        state.recording_consumer.start(&stream.name).await?;
    }
    Ok(responses::created(stream))
}

/// `PUT /api/streams/{name}` (spec.md §6): update a stream and reconcile the
/// Relay registration and recording consumer accordingly.
pub async fn update_stream(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<StreamRequest>,
) -> AppResult<impl IntoResponse> {
    let updated = state.catalog.update(&name, request).await?;
    if updated.enabled {
        state.recording_consumer.start(&updated.name).await?;
    } else {
        state.recording_consumer.stop(&updated.name).await?;
    }
    Ok(responses::ok(updated))
}

/// `DELETE /api/streams/{name}` (spec.md §6): stop its consumer, unregister,
/// and drop it from the Config Store.
pub async fn delete_stream(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.recording_consumer.stop(&name).await?;
    state.catalog.delete(&name).await?;
    Ok(responses::no_content())
}

#[derive(Debug, Deserialize)]
pub struct TimelineParams {
    pub stream: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentView {
    pub id: i64,
    pub stream: String,
    pub path: String,
    pub start_time: DateTime<Utc>,
    pub start_unix: i64,
    pub end_time: DateTime<Utc>,
    pub end_unix: i64,
    pub duration_seconds: f64,
    pub size_bytes: i64,
    pub has_detection: bool,
}

impl From<Segment> for SegmentView {
    fn from(segment: Segment) -> Self {
        Self {
            id: segment.id,
            stream: segment.stream.clone(),
            path: segment.path.clone(),
            start_time: segment.start_time,
            start_unix: segment.start_time.timestamp(),
            end_time: segment.end_time,
            end_unix: segment.end_time.timestamp(),
            duration_seconds: segment.duration_seconds(),
            size_bytes: segment.size_bytes,
            has_detection: segment.has_detection,
        }
    }
}

fn window_from_params(params: &TimelineParams) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = params.start.as_deref().map(|s| decode_colon_escapes(s).into_owned());
    let end = params.end.as_deref().map(|s| decode_colon_escapes(s).into_owned());
    resolve_window(start.as_deref(), end.as_deref()).map_err(AppError::validation)
}

/// `GET /api/timeline/segments` (spec.md §6): segments overlapping the
/// requested window, with both human-readable and UNIX timestamps.
pub async fn list_segments(
    State(state): State<AppState>,
    Query(params): Query<TimelineParams>,
) -> AppResult<impl IntoResponse> {
    let (start, end) = window_from_params(&params)?;
    let segments = timeline::list(&state.segments, &params.stream, start, end, params.limit).await?;
    let views: Vec<SegmentView> = segments.into_iter().map(SegmentView::from).collect();
    Ok(responses::ok(views))
}

/// `GET /api/timeline/manifest` (spec.md §6): an HLS-style M3U8 manifest
/// over the requested window.
pub async fn get_manifest(
    State(state): State<AppState>,
    Query(params): Query<TimelineParams>,
) -> AppResult<Response> {
    let (start, end) = window_from_params(&params)?;
    let segments = timeline::list(&state.segments, &params.stream, start, end, params.limit).await?;
    let relative_path = manifest::build_manifest(&segments, &state.manifest_scratch)
        .await
        .map_err(|e| AppError::SegmentIoFailed(params.stream.clone(), e.to_string()))?;

    let body = state
        .manifest_scratch
        .read_to_string(&relative_path)
        .await
        .map_err(|e| AppError::SegmentIoFailed(params.stream.clone(), e.to_string()))?;
    if let Err(err) = state.manifest_scratch.remove_file(&relative_path).await {
        tracing::warn!(path = %relative_path, error = %err, "failed to remove scratch manifest after serving");
    }

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")],
        body,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct PlaybackParams {
    pub stream: String,
    pub start: String,
}

/// `GET /api/playback/continuous` (spec.md §6): a continuous fragmented-MP4
/// stream stitched across consecutive segments from `start`.
pub async fn continuous_playback(
    State(state): State<AppState>,
    Query(params): Query<PlaybackParams>,
) -> AppResult<Response> {
    let start = parse_time_param(&decode_colon_escapes(&params.start)).map_err(AppError::validation)?;

    let session = PlaybackSession::start(
        &state.segments,
        state.manifest_scratch.clone(),
        &state.config.relay.muxer_command,
        &params.stream,
        start,
    )
    .await
    .map_err(|e| AppError::SegmentIoFailed(params.stream.clone(), e.to_string()))?;

    let body = Body::from_stream(session);
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "video/mp4")], body).into_response())
}

#[derive(Debug, Deserialize)]
pub struct WebrtcParams {
    pub src: String,
}

/// `POST /api/webrtc?src={name}` (spec.md §6): forward an SDP offer to the
/// Relay and return its SDP answer.
pub async fn webrtc_offer(
    State(state): State<AppState>,
    Query(params): Query<WebrtcParams>,
    sdp: String,
) -> AppResult<impl IntoResponse> {
    let answer = state.relay_client.proxy_webrtc_offer(&params.src, &sdp).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "application/sdp")], answer))
}

/// `POST /api/webrtc/ice?src={name}` (spec.md §6): forward a trickled ICE
/// candidate to the Relay.
pub async fn webrtc_ice(
    State(state): State<AppState>,
    Query(params): Query<WebrtcParams>,
    Json(candidate): Json<Value>,
) -> AppResult<impl IntoResponse> {
    state.relay_client.proxy_webrtc_ice(&params.src, &candidate).await?;
    Ok(responses::no_content())
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub database_reachable: bool,
    pub relay_reachable: bool,
    pub monitor_tick_age_secs: Option<u64>,
}

/// `GET /api/health` (spec.md §6): per-subsystem readiness, since a single
/// status code can't tell an operator which dependency is down.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database_reachable = state.database.health_check().await.is_healthy;
    let relay_reachable = state.relay_controller.is_ready().await;
    let monitor_tick_age_secs = state.health_monitor.last_tick_age().map(|age| age.as_secs());

    let body = HealthBody {
        database_reachable,
        relay_reachable,
        monitor_tick_age_secs,
    };
    let status = if database_reachable && relay_reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
