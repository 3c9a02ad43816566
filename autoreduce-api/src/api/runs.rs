//! Per-run submission and removal endpoints
//!
//! Provides POST and DELETE /api/runs/{instrument}

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::post,
    Extension, Json, Router,
};
use tracing::debug;

use super::auth::AuthenticatedUser;
use super::payload::{removal_runs, RunsPayload};
use super::DELETE_ALL_VERSIONS;
use crate::gateway::{self, RemovalRequest, SubmissionRequest};
use crate::service::{RemovalResult, SubmissionResult};
use crate::{ApiResult, AppState};

/// POST /api/runs/{instrument}
///
/// **Request:** `{"runs": [..], "reduction_arguments": {..}, "user_id": 1, "description": ".."}`
/// **Response:** `{"submitted_runs": [..]}`
pub async fn submit_runs(
    State(state): State<AppState>,
    Path(instrument): Path<String>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    body: Bytes,
) -> ApiResult<Json<SubmissionResult>> {
    let payload = RunsPayload::from_body(&body)?;
    debug!(user = %user.username, %instrument, "Run submission requested");

    let request = SubmissionRequest {
        instrument,
        selection: payload.runs,
        options: payload.options,
    };
    let result = gateway::submit(state.submissions.as_ref(), request).await?;
    Ok(Json(result))
}

/// DELETE /api/runs/{instrument}
///
/// **Request:** `{"runs": [..]}`
/// **Response:** `{"removed_runs": [..]}`, every version of each run is removed
pub async fn remove_runs(
    State(state): State<AppState>,
    Path(instrument): Path<String>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    body: Bytes,
) -> ApiResult<Json<RemovalResult>> {
    let runs = removal_runs(&body)?;
    debug!(user = %user.username, %instrument, "Run removal requested");

    let request = RemovalRequest {
        instrument,
        identifiers: runs,
        delete_all_versions: DELETE_ALL_VERSIONS,
        batch: false,
    };
    let result = gateway::remove(state.submissions.as_ref(), request).await?;
    Ok(Json(result))
}

/// Build per-run routes
pub fn run_routes() -> Router<AppState> {
    Router::new().route("/api/runs/:instrument", post(submit_runs).delete(remove_runs))
}
