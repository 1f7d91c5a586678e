//! mCSD Update Client: orchestration and HTTP trigger around `mcsd-core`
//! and `mcsd-client`.

pub mod config;
pub mod cursor;
pub mod discover;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod registry;
pub mod report;

use std::sync::Arc;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use mcsd_client::FhirAccess;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

pub use config::EngineConfig;
pub use cursor::CursorStore;
pub use error::EngineError;
pub use orchestrator::Dependencies;
pub use registry::DirectoryRegistry;
pub use report::{RunReport, SourceReport};

/// Shared application state (§5, §6).
pub struct AppState {
    pub registry: Arc<DirectoryRegistry>,
    pub cursor: Arc<CursorStore>,
    pub access: Arc<FhirAccess>,
    pub config: EngineConfig,
    /// Process-wide exclusion lock: at most one update run proceeds at a
    /// time, since every source shares the cursor file and registry.
    pub run_lock: Mutex<()>,
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn orchestrator_dependencies(&self) -> Dependencies {
        Dependencies {
            registry: self.registry.clone(),
            cursor: self.cursor.clone(),
            access: self.access.clone(),
            query_directory_base_url: self.config.query_directory.base_url.clone(),
            default_resource_types: self.config.directory_resource_types_or_default(),
            snapshot_mode_support: self.config.snapshot_mode_support,
        }
    }
}

/// Build the application router: a single trigger endpoint and a health
/// probe, with the same middleware stack the wider FHIR server chassis
/// uses (trace, CORS, body-size limit).
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/mcsd/update", post(handlers::trigger_update))
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
