//! Web layer: the HTTP surface spec.md §6 defines, exposed over the Config
//! Store, Segment Catalog, Stream Catalog, Relay API Client, and Timeline
//! Engine.
//!
//! # Design Principles
//!
//! - **Thin handlers**: each route delegates to the owning subsystem and
//!   maps its `Result` straight onto the response; no business logic lives
//!   in `api.rs` itself.
//! - **One error type**: `AppError` already carries its own `IntoResponse`
//!   impl with the status-code mapping spec.md §7 specifies, so handlers
//!   return `AppResult<T>` directly.

use anyhow::Result;
use axum::{
    Router,
    routing::{get, post, put},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::{
    catalog::StreamCatalog,
    config::Config,
    database::Database,
    health::HealthMonitor,
    recording::RecordingConsumer,
    relay::{RelayApiClient, RelayController},
    repositories::SegmentRepository,
};

pub mod api;
pub mod middleware;
pub mod responses;

pub use responses::ApiResponse;

/// Web server configuration and setup.
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub async fn new(
        config: Config,
        database: Database,
        catalog: Arc<StreamCatalog>,
        segments: SegmentRepository,
        relay_client: Arc<RelayApiClient>,
        relay_controller: Arc<RelayController>,
        recording_consumer: Arc<RecordingConsumer>,
        health_monitor: Arc<HealthMonitor>,
        manifest_scratch: sandboxed_file_manager::SandboxedManager,
    ) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;

        let state = AppState {
            config,
            database,
            catalog,
            segments,
            relay_client,
            relay_controller,
            recording_consumer,
            health_monitor,
            manifest_scratch,
        };

        let app = Self::create_router(state);
        Ok(Self { app, addr })
    }

    fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/api/streams", get(api::list_streams).post(api::add_stream))
            .route(
                "/api/streams/{name}",
                put(api::update_stream).delete(api::delete_stream),
            )
            .route("/api/timeline/segments", get(api::list_segments))
            .route("/api/timeline/manifest", get(api::get_manifest))
            .route("/api/playback/continuous", get(api::continuous_playback))
            .route("/api/webrtc", post(api::webrtc_offer))
            .route("/api/webrtc/ice", post(api::webrtc_ice))
            .route("/api/health", get(api::health))
            .layer(axum::middleware::from_fn(middleware::timeout_middleware))
            .layer(axum::middleware::from_fn(middleware::request_size_middleware))
            .layer(axum::middleware::from_fn(middleware::security_headers_middleware))
            .layer(axum::middleware::from_fn(middleware::request_logging_middleware))
            .layer(tower_http::cors::CorsLayer::permissive())
            .with_state(state)
    }

    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    /// Serve with a notification when the server is actually listening or
    /// fails to bind, so the caller can sequence background task startup
    /// after the port is live.
    pub async fn serve_with_signal(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
    ) -> Result<()> {
        match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => {
                let _ = ready_signal.send(Ok(()));
                axum::serve(listener, self.app).await?;
                Ok(())
            }
            Err(bind_error) => {
                let bind_err_msg = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", bind_err_msg)));
                Err(anyhow::anyhow!("{}", bind_err_msg))
            }
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub database: Database,
    pub catalog: Arc<StreamCatalog>,
    pub segments: SegmentRepository,
    pub relay_client: Arc<RelayApiClient>,
    pub relay_controller: Arc<RelayController>,
    pub recording_consumer: Arc<RecordingConsumer>,
    pub health_monitor: Arc<HealthMonitor>,
    pub manifest_scratch: sandboxed_file_manager::SandboxedManager,
}
