//! Config Store (C1) repository: persistent catalog of streams.
//!
//! Implemented against raw SQL via `sea_orm::Statement`/`FromQueryResult`
//! rather than generated entities, following the same pattern
//! `database::Database::health_check` already uses for backend-portable
//! queries.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, Statement};
use std::sync::Arc;

use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Stream, StreamRequest};
use crate::repositories::traits::Repository;

const STREAM_COLUMNS: &str = "name, url, onvif_username, onvif_password, enabled, backchannel, \
     segment_duration_seconds, max_age_days, storage_cap_bytes, ptz_enabled, created_at, updated_at";

#[derive(Clone)]
pub struct StreamRepository {
    connection: Arc<DatabaseConnection>,
}

/// No filterable fields today; `find_all`/`count` always operate over the
/// whole catalog (spec.md §3's Config Store is small — tens of streams).
#[derive(Debug, Clone, Default)]
pub struct StreamQuery;

impl StreamRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn list_enabled(&self) -> RepositoryResult<Vec<Stream>> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_string(
            backend,
            format!(
                "SELECT {STREAM_COLUMNS} FROM streams WHERE enabled = true ORDER BY name ASC"
            ),
        );
        let rows = Stream::find_by_statement(stmt)
            .all(&*self.connection)
            .await
            .map_err(RepositoryError::Database)?;
        Ok(rows)
    }

    pub async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Stream>> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            format!("SELECT {STREAM_COLUMNS} FROM streams WHERE name = $1"),
            [name.into()],
        );
        Stream::find_by_statement(stmt)
            .one(&*self.connection)
            .await
            .map_err(RepositoryError::Database)
    }
}

#[async_trait]
impl Repository<Stream, String> for StreamRepository {
    type CreateRequest = StreamRequest;
    type UpdateRequest = StreamRequest;
    type Query = StreamQuery;

    async fn find_by_id(&self, id: String) -> RepositoryResult<Option<Stream>> {
        self.find_by_name(&id).await
    }

    async fn find_all(&self, _query: Self::Query) -> RepositoryResult<Vec<Stream>> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_string(
            backend,
            format!("SELECT {STREAM_COLUMNS} FROM streams ORDER BY name ASC"),
        );
        Stream::find_by_statement(stmt)
            .all(&*self.connection)
            .await
            .map_err(RepositoryError::Database)
    }

    async fn create(&self, request: Self::CreateRequest) -> RepositoryResult<Stream> {
        let name = request.name.clone().ok_or_else(|| RepositoryError::ConstraintViolation {
            constraint: "streams.name".to_string(),
            message: "stream name is required on create".to_string(),
        })?;
        let now = Utc::now();
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "INSERT INTO streams \
             (name, url, onvif_username, onvif_password, enabled, backchannel, \
              segment_duration_seconds, max_age_days, storage_cap_bytes, ptz_enabled, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
                .to_string(),
            [
                name.clone().into(),
                request.url.clone().into(),
                request.onvif_username.clone().into(),
                request.onvif_password.clone().into(),
                request.enabled.into(),
                request.backchannel.into(),
                request.segment_duration_seconds.unwrap_or(60).into(),
                request.max_age_days.unwrap_or(30).into(),
                request.storage_cap_bytes.into(),
                request.ptz_enabled.into(),
                now.to_rfc3339().into(),
                now.to_rfc3339().into(),
            ],
        );
        self.connection
            .execute(stmt)
            .await
            .map_err(RepositoryError::Database)?;

        self.find_by_name(&name)
            .await?
            .ok_or_else(|| RepositoryError::RecordNotFound {
                table: "streams".to_string(),
                field: "name".to_string(),
                value: name,
            })
    }

    async fn update(&self, id: String, request: Self::UpdateRequest) -> RepositoryResult<Stream> {
        let now = Utc::now();
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "UPDATE streams SET url = $1, onvif_username = $2, onvif_password = $3, \
             enabled = $4, backchannel = $5, segment_duration_seconds = $6, max_age_days = $7, \
             storage_cap_bytes = $8, ptz_enabled = $9, updated_at = $10 WHERE name = $11"
                .to_string(),
            [
                request.url.clone().into(),
                request.onvif_username.clone().into(),
                request.onvif_password.clone().into(),
                request.enabled.into(),
                request.backchannel.into(),
                request.segment_duration_seconds.unwrap_or(60).into(),
                request.max_age_days.unwrap_or(30).into(),
                request.storage_cap_bytes.into(),
                request.ptz_enabled.into(),
                now.to_rfc3339().into(),
                id.clone().into(),
            ],
        );
        let result = self
            .connection
            .execute(stmt)
            .await
            .map_err(RepositoryError::Database)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::RecordNotFound {
                table: "streams".to_string(),
                field: "name".to_string(),
                value: id,
            });
        }

        self.find_by_name(&id)
            .await?
            .ok_or_else(|| RepositoryError::RecordNotFound {
                table: "streams".to_string(),
                field: "name".to_string(),
                value: id,
            })
    }

    async fn delete(&self, id: String) -> RepositoryResult<()> {
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "DELETE FROM streams WHERE name = $1".to_string(),
            [id.clone().into()],
        );
        let result = self
            .connection
            .execute(stmt)
            .await
            .map_err(RepositoryError::Database)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::RecordNotFound {
                table: "streams".to_string(),
                field: "name".to_string(),
                value: id,
            });
        }
        Ok(())
    }

    async fn count(&self, _query: Self::Query) -> RepositoryResult<u64> {
        #[derive(FromQueryResult)]
        struct CountRow {
            count: i64,
        }
        let backend = self.connection.get_database_backend();
        let stmt = Statement::from_string(backend, "SELECT COUNT(*) as count FROM streams".to_string());
        let row = CountRow::find_by_statement(stmt)
            .one(&*self.connection)
            .await
            .map_err(RepositoryError::Database)?;
        Ok(row.map(|r| r.count as u64).unwrap_or(0))
    }
}
