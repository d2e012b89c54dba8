//! Repository pattern implementation for data access.
//!
//! Clean separation between the Stream Catalog / Timeline Engine's
//! in-memory logic and the two SeaORM-backed tables that back the Config
//! Store (C1) and the Segment Catalog (C2).
//!
//! # Usage
//!
//! ```rust,no_run
//! use nvr_core::repositories::StreamRepository;
//! use sea_orm::DatabaseConnection;
//! use std::sync::Arc;
//!
//! async fn example(connection: Arc<DatabaseConnection>) -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = StreamRepository::new(connection);
//!     let streams = repo.list_enabled().await?;
//!     Ok(())
//! }
//! ```

pub mod retry_wrapper;
pub mod segment;
pub mod stream;
pub mod traits;

pub use retry_wrapper::{RepositoryRetryExt, RetryWrapper};
pub use segment::SegmentRepository;
pub use stream::StreamRepository;
pub use traits::*;
