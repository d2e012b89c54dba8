//! SeaORM migrations for the Config Store (C1) and Segment Catalog (C2).
//!
//! Database-agnostic, following the teacher's multi-backend migration
//! pattern: timestamps are stored as RFC3339 strings so SQLite, Postgres and
//! MySQL all round-trip through `chrono::DateTime<Utc>` identically.

use sea_orm_migration::prelude::*;

pub mod m20260101_000001_initial_schema;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260101_000001_initial_schema::Migration)]
    }
}
