//! Engine-level errors (§7): failures that mean the run never started at
//! all, as opposed to a per-source or per-entry failure captured in the
//! report. These are the only failures the HTTP trigger surfaces as a
//! non-200 response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no source directories are registered to sync (exclusion list may have filtered all configured roots)")]
    NoSourcesRegistered,
}

/// §6: "On failure at the engine level... HTTP 500 with a plain-text
/// message." Per §7, these messages are operator-facing text, not a
/// structured body.
impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
