//! SeaORM-based database implementation.
//!
//! Database-agnostic access (SQLite primary target; Postgres/MySQL carried
//! for parity with the teacher's multi-backend `Database` wrapper, per
//! SPEC_FULL.md §B.1) backing the Config Store (C1) and the Segment Catalog
//! (C2).

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database as SeaOrmDatabase, DatabaseBackend, DatabaseConnection};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;

pub mod migrations;

/// Database connection manager with multi-database support.
#[derive(Clone)]
pub struct Database {
    pub connection: Arc<DatabaseConnection>,
    pub backend: DatabaseBackend,
    pub database_type: DatabaseType,
    pub circuit_breaker: Arc<crate::utils::ConcreteCircuitBreaker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    SQLite,
    PostgreSQL,
    MySQL,
}

impl Database {
    /// Create a new database connection with proper optimizations.
    pub async fn new(config: &DatabaseConfig, app_config: &crate::config::Config) -> Result<Self> {
        let database_type = Self::detect_database_type(&config.url)?;
        let backend = match database_type {
            DatabaseType::SQLite => DatabaseBackend::Sqlite,
            DatabaseType::PostgreSQL => DatabaseBackend::Postgres,
            DatabaseType::MySQL => DatabaseBackend::MySql,
        };

        info!("Connecting to {} database", database_type.as_str());

        let connection_url = match database_type {
            DatabaseType::SQLite => Self::ensure_sqlite_auto_creation(&config.url)?,
            _ => config.url.clone(),
        };

        let mut connect_options = ConnectOptions::new(&connection_url);
        connect_options
            .max_connections(config.max_connections.unwrap_or(10))
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        let connection = match SeaOrmDatabase::connect(connect_options).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("Database connection failed: {:?}", e);
                let mut source = e.source();
                let mut level = 0;
                while let Some(err) = source {
                    tracing::error!("  Level {}: {}", level, err);
                    source = err.source();
                    level += 1;
                }
                return Err(anyhow::anyhow!(
                    "Failed to connect to database at '{}': {}",
                    &config.url,
                    e
                ));
            }
        };
        let connection = Arc::new(connection);
        debug!("Database connection established successfully");

        let circuit_breaker = crate::utils::create_circuit_breaker_for_service("database", app_config)
            .unwrap_or_else(|e| {
                warn!(
                    "Failed to create database circuit breaker from config: {}. Using defaults.",
                    e
                );
                crate::utils::create_circuit_breaker(
                    crate::utils::CircuitBreakerType::Simple,
                    crate::utils::CircuitBreakerConfig::default(),
                )
            });

        Ok(Self {
            connection,
            backend,
            database_type,
            circuit_breaker,
        })
    }

    fn detect_database_type(url: &str) -> Result<DatabaseType> {
        if url.starts_with("sqlite:") {
            Ok(DatabaseType::SQLite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Ok(DatabaseType::PostgreSQL)
        } else if url.starts_with("mysql:") {
            Ok(DatabaseType::MySQL)
        } else {
            anyhow::bail!("Unsupported database URL format: {}", url);
        }
    }

    /// Ensure SQLite URL includes auto-creation mode and that the parent
    /// directory of the database file exists.
    fn ensure_sqlite_auto_creation(url: &str) -> Result<String> {
        if url.contains("mode=") || url.contains(":memory:") {
            return Ok(url.to_string());
        }

        let file_path = if let Some(path) = url.strip_prefix("sqlite://") {
            path
        } else if let Some(path) = url.strip_prefix("sqlite:") {
            path
        } else {
            anyhow::bail!("Invalid SQLite URL format: {}", url);
        };

        let path = std::path::Path::new(file_path);
        if path.exists() {
            return Ok(url.to_string());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create directory for SQLite database: {}",
                        parent.display()
                    )
                })?;
                info!("Created directory for SQLite database: {}", parent.display());
            }
        }

        let auto_create_url = if url.contains('?') {
            format!("{}&mode=rwc", url)
        } else {
            format!("{}?mode=rwc", url)
        };
        Ok(auto_create_url)
    }

    /// Run database migrations (Config Store + Segment Catalog schema).
    pub async fn migrate(&self) -> Result<()> {
        use migrations::Migrator;
        use sea_orm_migration::MigratorTrait;

        info!("Running database migrations for {}", self.database_type.as_str());
        Migrator::up(&*self.connection, None)
            .await
            .context("Failed to run migrations")?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    pub fn connection(&self) -> Arc<DatabaseConnection> {
        self.connection.clone()
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    /// Readiness body for `GET /api/health` (SPEC_FULL.md §C).
    pub async fn health_check(&self) -> DatabaseHealthResult {
        use sea_orm::ConnectionTrait;

        let conn = self.connection.clone();
        let backend = self.backend;
        let cb_result = self
            .circuit_breaker
            .execute(|| async {
                let stmt = sea_orm::Statement::from_string(backend, "SELECT 1".to_owned());
                conn.query_one(stmt).await.map_err(|e| e.to_string())
            })
            .await;

        let response_time = cb_result.execution_time;
        match cb_result.result {
            Ok(_) => DatabaseHealthResult {
                is_healthy: true,
                response_time,
                error: None,
            },
            Err(crate::utils::circuit_breaker::CircuitBreakerError::CircuitOpen) => {
                DatabaseHealthResult {
                    is_healthy: false,
                    response_time,
                    error: Some("circuit breaker open".to_string()),
                }
            }
            Err(crate::utils::circuit_breaker::CircuitBreakerError::ServiceError(e)) => {
                DatabaseHealthResult {
                    is_healthy: false,
                    response_time,
                    error: Some(format!("database error: {e}")),
                }
            }
            Err(crate::utils::circuit_breaker::CircuitBreakerError::Timeout) => DatabaseHealthResult {
                is_healthy: false,
                response_time,
                error: Some("database query timeout".to_string()),
            },
        }
    }

    pub async fn is_available(&self) -> bool {
        self.circuit_breaker.is_available().await
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseHealthResult {
    pub is_healthy: bool,
    pub response_time: std::time::Duration,
    pub error: Option<String>,
}

impl DatabaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::SQLite => "SQLite",
            DatabaseType::PostgreSQL => "PostgreSQL",
            DatabaseType::MySQL => "MySQL",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
