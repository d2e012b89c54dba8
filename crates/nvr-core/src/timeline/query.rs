//! Segment query (spec.md §4.6): `list(stream, start, end, limit)`.

use chrono::{DateTime, Utc};

use crate::errors::RepositoryResult;
use crate::models::Segment;
use crate::repositories::{SegmentQuery, SegmentRepository};

pub const DEFAULT_LIMIT: u32 = 5000;

/// Returns segments overlapping `[start, end)`, sorted by `start` ascending,
/// truncated to `limit` (spec.md §4.6). The overlap predicate is delegated
/// to `SegmentRepository::list_overlapping` so both this and manifest
/// generation share one definition.
pub async fn list(
    repository: &SegmentRepository,
    stream: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: Option<u32>,
) -> RepositoryResult<Vec<Segment>> {
    let query = SegmentQuery {
        stream: stream.to_string(),
        window_start: start,
        window_end: end,
        limit: limit.unwrap_or(DEFAULT_LIMIT),
    };
    repository.list_overlapping(&query).await
}
