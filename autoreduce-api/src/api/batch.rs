//! Batch submission and removal endpoints

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
use crate::service::{BatchSubmissionResult, RemovalResult};
use crate::{ApiResult, AppState};

/// POST /api/runs/batch/{instrument}
///
/// Same body as a per-run submission; all runs become one batch.
/// **Response:** `{"batch_id": 1, "submitted_runs": [..]}`
pub async fn submit_batch(
    State(state): State<AppState>,
    Path(instrument): Path<String>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    body: Bytes,
) -> ApiResult<Json<BatchSubmissionResult>> {
    let payload = RunsPayload::from_body(&body)?;
    debug!(user = %user.username, %instrument, "Batch submission requested");

    let request = SubmissionRequest {
        instrument,
        selection: payload.runs,
        options: payload.options,
    };
    let result = gateway::submit_batch(state.submissions.as_ref(), request).await?;
    Ok(Json(result))
}

/// DELETE /api/runs/batch/{instrument}
///
/// `runs` holds batch ids here, not run numbers.
pub async fn remove_batches(
    State(state): State<AppState>,
    Path(instrument): Path<String>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    body: Bytes,
) -> ApiResult<Json<RemovalResult>> {
    let batch_ids = removal_runs(&body)?;
    debug!(user = %user.username, %instrument, "Batch removal requested");

    let request = RemovalRequest {
        instrument,
        identifiers: batch_ids,
        delete_all_versions: DELETE_ALL_VERSIONS,
        batch: true,
    };
    let result = gateway::remove(state.submissions.as_ref(), request).await?;
    Ok(Json(result))
}

/// Build batch routes
pub fn batch_routes() -> Router<AppState> {
    Router::new().route(
        "/api/runs/batch/:instrument",
        post(submit_batch).delete(remove_batches),
    )
}
