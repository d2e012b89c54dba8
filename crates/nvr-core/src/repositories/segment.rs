//! Segment Catalog (C2) repository: durable index of recorded MP4 segments.
//!
//! Query semantics follow spec.md §4.6: `list` returns segments overlapping
//! `[start, end)`, sorted by `start_time` ascending, truncated to `limit`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, Statement};
use std::sync::Arc;

use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{NewSegment, Segment};
use crate::repositories::traits::Repository;
use crate::utils::database_retry::{RetryConfig, with_retry};

const SEGMENT_COLUMNS: &str = "id, stream, path, start_time, end_time, size_bytes, \
     has_detection, protected, retention_override_days";

#[derive(Clone)]
pub struct SegmentRepository {
    connection: Arc<DatabaseConnection>,
}

/// Overlap query parameters (spec.md §4.6): segments where `end > start AND
/// start < end`, for a given stream, ordered by `start_time` ascending.
#[derive(Debug, Clone)]
pub struct SegmentQuery {
    pub stream: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub limit: u32,
}

impl SegmentRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Close a new segment into the catalog (spec.md §4.5: "On every closed
    /// segment, the consumer appends a row"). Retried with backoff since a
    /// concurrent retention sweep can momentarily lock the same table.
    pub async fn insert(&self, new_segment: NewSegment) -> RepositoryResult<Segment> {
        with_retry(
            &RetryConfig::for_writes(),
            || self.insert_once(&new_segment),
            "segment_insert",
        )
        .await
    }

    async fn insert_once(&self, new_segment: &NewSegment) -> RepositoryResult<Segment> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "INSERT INTO segments \
             (stream, path, start_time, end_time, size_bytes, has_detection, protected, retention_override_days) \
             VALUES ($1, $2, $3, $4, $5, $6, false, NULL)"
                .to_string(),
            [
                new_segment.stream.clone().into(),
                new_segment.path.clone().into(),
                new_segment.start_time.to_rfc3339().into(),
                new_segment.end_time.to_rfc3339().into(),
                new_segment.size_bytes.into(),
                new_segment.has_detection.into(),
            ],
        );
        self.connection
            .execute(stmt)
            .await
            .map_err(RepositoryError::Database)?;

        #[derive(FromQueryResult)]
        struct IdRow {
            id: i64,
        }
        let last_id_stmt = Statement::from_sql_and_values(
            backend,
            "SELECT id FROM segments WHERE stream = $1 ORDER BY id DESC LIMIT 1".to_string(),
            [new_segment.stream.clone().into()],
        );
        let row = IdRow::find_by_statement(last_id_stmt)
            .one(&*self.connection)
            .await
            .map_err(RepositoryError::Database)?
            .ok_or_else(|| RepositoryError::RecordNotFound {
                table: "segments".to_string(),
                field: "stream".to_string(),
                value: new_segment.stream.clone(),
            })?;

        self.find_by_id(row.id)
            .await?
            .ok_or_else(|| RepositoryError::RecordNotFound {
                table: "segments".to_string(),
                field: "id".to_string(),
                value: row.id.to_string(),
            })
    }

    /// Overlap query backing `GET /api/timeline/segments` and manifest
    /// generation (spec.md §4.6).
    pub async fn list_overlapping(&self, query: &SegmentQuery) -> RepositoryResult<Vec<Segment>> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            format!(
                "SELECT {SEGMENT_COLUMNS} FROM segments \
                 WHERE stream = $1 AND end_time > $2 AND start_time < $3 \
                 ORDER BY start_time ASC LIMIT $4"
            ),
            [
                query.stream.clone().into(),
                query.window_start.to_rfc3339().into(),
                query.window_end.to_rfc3339().into(),
                query.limit.into(),
            ],
        );
        Segment::find_by_statement(stmt)
            .all(&*self.connection)
            .await
            .map_err(RepositoryError::Database)
    }

    /// Delete a segment's row; callers are responsible for removing the
    /// backing file first (spec.md §3 invariant: "file-first, then row").
    pub async fn delete_row(&self, id: i64) -> RepositoryResult<()> {
        with_retry(
            &RetryConfig::for_writes(),
            || Repository::<Segment, i64>::delete(self, id),
            "segment_delete_row",
        )
        .await
    }

    /// Unprotected segments for a stream older than `cutoff`, oldest first
    /// (spec.md §3: "`protected` segments are exempt from eviction"),
    /// backing the retention sweep's age-based eviction.
    pub async fn list_expired(&self, stream: &str, cutoff: DateTime<Utc>) -> RepositoryResult<Vec<Segment>> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            format!(
                "SELECT {SEGMENT_COLUMNS} FROM segments \
                 WHERE stream = $1 AND protected = false AND start_time < $2 \
                 ORDER BY start_time ASC"
            ),
            [stream.to_string().into(), cutoff.to_rfc3339().into()],
        );
        Segment::find_by_statement(stmt)
            .all(&*self.connection)
            .await
            .map_err(RepositoryError::Database)
    }

    /// All unprotected segments for a stream, oldest first, backing
    /// storage-cap eviction.
    pub async fn list_unprotected(&self, stream: &str) -> RepositoryResult<Vec<Segment>> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            format!(
                "SELECT {SEGMENT_COLUMNS} FROM segments \
                 WHERE stream = $1 AND protected = false ORDER BY start_time ASC"
            ),
            [stream.to_string().into()],
        );
        Segment::find_by_statement(stmt)
            .all(&*self.connection)
            .await
            .map_err(RepositoryError::Database)
    }

    /// Sum of `size_bytes` across every segment for a stream (protected or
    /// not), used to evaluate a per-stream storage cap.
    pub async fn total_size_bytes(&self, stream: &str) -> RepositoryResult<i64> {
        #[derive(FromQueryResult)]
        struct TotalRow {
            total: Option<i64>,
        }
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "SELECT SUM(size_bytes) AS total FROM segments WHERE stream = $1".to_string(),
            [stream.to_string().into()],
        );
        let row = TotalRow::find_by_statement(stmt)
            .one(&*self.connection)
            .await
            .map_err(RepositoryError::Database)?;
        Ok(row.and_then(|r| r.total).unwrap_or(0))
    }
}

#[async_trait]
impl Repository<Segment, i64> for SegmentRepository {
    type CreateRequest = NewSegment;
    type UpdateRequest = NewSegment;
    type Query = SegmentQuery;

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Segment>> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            format!("SELECT {SEGMENT_COLUMNS} FROM segments WHERE id = $1"),
            [id.into()],
        );
        Segment::find_by_statement(stmt)
            .one(&*self.connection)
            .await
            .map_err(RepositoryError::Database)
    }

    async fn find_all(&self, query: Self::Query) -> RepositoryResult<Vec<Segment>> {
        self.list_overlapping(&query).await
    }

    async fn create(&self, request: Self::CreateRequest) -> RepositoryResult<Segment> {
        self.insert(request).await
    }

    async fn update(&self, id: i64, request: Self::UpdateRequest) -> RepositoryResult<Segment> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "UPDATE segments SET path = $1, start_time = $2, end_time = $3, size_bytes = $4, \
             has_detection = $5 WHERE id = $6"
                .to_string(),
            [
                request.path.clone().into(),
                request.start_time.to_rfc3339().into(),
                request.end_time.to_rfc3339().into(),
                request.size_bytes.into(),
                request.has_detection.into(),
                id.into(),
            ],
        );
        let result = self
            .connection
            .execute(stmt)
            .await
            .map_err(RepositoryError::Database)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::RecordNotFound {
                table: "segments".to_string(),
                field: "id".to_string(),
                value: id.to_string(),
            });
        }
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::RecordNotFound {
                table: "segments".to_string(),
                field: "id".to_string(),
                value: id.to_string(),
            })
    }

    async fn delete(&self, id: i64) -> RepositoryResult<()> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "DELETE FROM segments WHERE id = $1".to_string(),
            [id.into()],
        );
        let result = self
            .connection
            .execute(stmt)
            .await
            .map_err(RepositoryError::Database)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::RecordNotFound {
                table: "segments".to_string(),
                field: "id".to_string(),
                value: id.to_string(),
            });
        }
        Ok(())
    }

    async fn count(&self, query: Self::Query) -> RepositoryResult<u64> {
        Ok(self.list_overlapping(&query).await?.len() as u64)
    }
}
