//! HTTP surface (§6): the single trigger endpoint and a liveness probe.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{error, info};

use crate::{AppState, EngineError};

/// `GET /health`: liveness only, no dependency checks.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// `POST /mcsd/update`: run one synchronization pass over every registered
/// source directory and return the per-source report (§6).
///
/// Takes the process-wide exclusion lock (§5) for the duration of the run;
/// a concurrent request waits for that lock rather than running in
/// parallel, since every source shares the cursor file and the registry.
///
/// Returns HTTP 500 only for an engine-level failure that prevents the run
/// from starting at all (§7) — e.g. every configured root was filtered out
/// by the exclusion list, leaving nothing to sync. Per-source failures
/// never produce a non-200 response; they are embedded in that source's
/// report block instead.
pub async fn trigger_update(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, EngineError> {
    let _guard = state.run_lock.lock().await;

    if state.registry.len().await == 0 {
        error!("refusing to start update run: no source directories registered");
        return Err(EngineError::NoSourcesRegistered);
    }

    info!("update run starting");

    let deps = state.orchestrator_dependencies();
    let report = crate::orchestrator::run_update(&deps, state.cancel.clone()).await;

    let any_fatal = report.values().any(|r| r.is_fatal());
    if any_fatal {
        error!("update run completed with at least one source failing fatally");
    } else {
        info!("update run completed");
    }

    Ok(Json(report))
}
