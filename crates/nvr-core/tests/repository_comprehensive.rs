//! Repository layer comprehensive testing
//!
//! Covers core CRUD operations, overlap-window queries, and error handling
//! for the Config Store (`StreamRepository`) and Segment Catalog
//! (`SegmentRepository`) against an in-memory SQLite database.

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use sea_orm::ConnectionTrait;

use nvr_core::config::{Config, DatabaseConfig};
use nvr_core::database::Database;
use nvr_core::models::{NewSegment, StreamRequest};
use nvr_core::repositories::segment::SegmentQuery;
use nvr_core::repositories::stream::StreamQuery;
use nvr_core::repositories::{Repository, SegmentRepository, StreamRepository};

async fn create_test_database() -> Database {
    let app_config = Config::default();
    let db_config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(5),
    };
    let db = Database::new(&db_config, &app_config).await.expect("connect");
    db.migrate().await.expect("migrate");
    db
}

fn stream_request(name: &str) -> StreamRequest {
    StreamRequest {
        name: Some(name.to_string()),
        url: format!("rtsp://camera.local/{name}"),
        onvif_username: None,
        onvif_password: None,
        enabled: true,
        backchannel: false,
        segment_duration_seconds: Some(60),
        max_age_days: Some(30),
        storage_cap_bytes: None,
        ptz_enabled: false,
    }
}

#[tokio::test]
async fn stream_repository_complete_lifecycle() {
    let db = create_test_database().await;
    let repo = StreamRepository::new(db.connection());

    let created = repo.create(stream_request("front-door")).await.unwrap();
    assert_eq!(created.name, "front-door");
    assert_eq!(created.url, "rtsp://camera.local/front-door");
    assert!(created.enabled);

    let found = repo.find_by_id(created.name.clone()).await.unwrap();
    assert!(found.is_some());
    assert_eq!(found.unwrap().name, created.name);

    let mut update_request = stream_request("front-door");
    update_request.url = "rtsp://camera.local/front-door-v2".to_string();
    update_request.enabled = false;
    let updated = repo.update(created.name.clone(), update_request).await.unwrap();
    assert_eq!(updated.url, "rtsp://camera.local/front-door-v2");
    assert!(!updated.enabled);

    let all = repo.find_all(StreamQuery).await.unwrap();
    assert_eq!(all.len(), 1);

    let count = repo.count(StreamQuery).await.unwrap();
    assert_eq!(count, 1);

    repo.delete(created.name.clone()).await.unwrap();
    assert!(repo.find_by_id(created.name).await.unwrap().is_none());
}

#[tokio::test]
async fn stream_repository_list_enabled_excludes_disabled() {
    let db = create_test_database().await;
    let repo = StreamRepository::new(db.connection());

    repo.create(stream_request("enabled-cam")).await.unwrap();
    let mut disabled_request = stream_request("disabled-cam");
    disabled_request.enabled = false;
    repo.create(disabled_request).await.unwrap();

    let enabled = repo.list_enabled().await.unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].name, "enabled-cam");
}

#[tokio::test]
async fn stream_repository_rejects_operations_on_missing_name() {
    let db = create_test_database().await;
    let repo = StreamRepository::new(db.connection());

    let update_result = repo.update("does-not-exist".to_string(), stream_request("does-not-exist")).await;
    assert!(update_result.is_err());

    let delete_result = repo.delete("does-not-exist".to_string()).await;
    assert!(delete_result.is_err());
}

fn new_segment(stream: &str, start_offset_secs: i64, duration_secs: i64) -> NewSegment {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let start = base + ChronoDuration::seconds(start_offset_secs);
    NewSegment {
        stream: stream.to_string(),
        path: format!("{stream}/2026/01/01/{start_offset_secs}.mp4"),
        start_time: start,
        end_time: start + ChronoDuration::seconds(duration_secs),
        size_bytes: 1_048_576,
        has_detection: false,
    }
}

#[tokio::test]
async fn segment_repository_insert_and_overlap_query() {
    let db = create_test_database().await;
    let repo = SegmentRepository::new(db.connection());

    repo.insert(new_segment("driveway", 0, 60)).await.unwrap();
    repo.insert(new_segment("driveway", 60, 60)).await.unwrap();
    repo.insert(new_segment("driveway", 120, 60)).await.unwrap();
    // a segment for a different stream must not leak into the query below
    repo.insert(new_segment("backyard", 0, 60)).await.unwrap();

    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let query = SegmentQuery {
        stream: "driveway".to_string(),
        window_start: base + ChronoDuration::seconds(30),
        window_end: base + ChronoDuration::seconds(90),
        limit: 100,
    };
    let overlapping = repo.list_overlapping(&query).await.unwrap();

    // half-open [start, end) overlap: segment 0 (0-60) and segment 1 (60-120) both
    // intersect [30, 90); segment 2 (120-180) does not.
    assert_eq!(overlapping.len(), 2);
    assert!(overlapping[0].start_time <= overlapping[1].start_time);
}

#[tokio::test]
async fn segment_repository_delete_row_removes_only_target() {
    let db = create_test_database().await;
    let repo = SegmentRepository::new(db.connection());

    let first = repo.insert(new_segment("driveway", 0, 60)).await.unwrap();
    let second = repo.insert(new_segment("driveway", 60, 60)).await.unwrap();

    repo.delete_row(first.id).await.unwrap();

    assert!(repo.find_by_id(first.id).await.unwrap().is_none());
    assert!(repo.find_by_id(second.id).await.unwrap().is_some());
}

#[tokio::test]
async fn segment_repository_delete_missing_row_errors() {
    let db = create_test_database().await;
    let repo = SegmentRepository::new(db.connection());

    let result = repo.delete_row(999_999).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn segment_repository_list_expired_excludes_protected() {
    let db = create_test_database().await;
    let repo = SegmentRepository::new(db.connection());

    let old = repo.insert(new_segment("driveway", 0, 60)).await.unwrap();
    let recent = repo.insert(new_segment("driveway", 86_400 * 30, 60)).await.unwrap();

    // Mark the old segment protected directly; retention must skip it.
    let backend = db.connection().get_database_backend();
    db.connection()
        .execute(sea_orm::Statement::from_sql_and_values(
            backend,
            "UPDATE segments SET protected = true WHERE id = $1".to_string(),
            [old.id.into()],
        ))
        .await
        .unwrap();

    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let cutoff = base + ChronoDuration::seconds(86_400 * 29);
    let expired = repo.list_expired("driveway", cutoff).await.unwrap();

    assert!(expired.iter().all(|s| s.id != old.id));
    assert!(expired.iter().all(|s| s.id != recent.id));
}

#[tokio::test]
async fn segment_repository_total_size_bytes_sums_all_segments() {
    let db = create_test_database().await;
    let repo = SegmentRepository::new(db.connection());

    repo.insert(new_segment("driveway", 0, 60)).await.unwrap();
    repo.insert(new_segment("driveway", 60, 60)).await.unwrap();
    repo.insert(new_segment("backyard", 0, 60)).await.unwrap();

    let total = repo.total_size_bytes("driveway").await.unwrap();
    assert_eq!(total, 1_048_576 * 2);
}

#[tokio::test]
async fn segment_repository_list_unprotected_orders_oldest_first() {
    let db = create_test_database().await;
    let repo = SegmentRepository::new(db.connection());

    repo.insert(new_segment("driveway", 120, 60)).await.unwrap();
    repo.insert(new_segment("driveway", 0, 60)).await.unwrap();
    repo.insert(new_segment("driveway", 60, 60)).await.unwrap();

    let segments = repo.list_unprotected("driveway").await.unwrap();
    assert_eq!(segments.len(), 3);
    assert!(segments.windows(2).all(|w| w[0].start_time <= w[1].start_time));
}
