//! Deprecated path-encoded run routes
//!
//! Runs are taken from the URL instead of the body. Submissions made here
//! carry no reduction arguments, an unknown submitter and no description.
//! Every response is marked with `Deprecation: true`.

use axum::{
    extract::{Path, State},
    http::{HeaderName, HeaderValue},
    routing::{delete, post},
    Json, Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use super::DELETE_ALL_VERSIONS;
use crate::error::ValidationError;
use crate::gateway::{self, RemovalRequest, SubmissionRequest};
use crate::selection::{parse_path_run, RunSelection};
use crate::service::{ReductionOptions, RemovalResult, SubmissionResult};
use crate::{ApiResult, AppState};

fn path_selection(start: &str, end: Option<&str>) -> Result<RunSelection, ValidationError> {
    let start = parse_path_run(start)?;
    let end = end.map(parse_path_run).transpose()?;
    Ok(RunSelection::from_bounds(start, end))
}

async fn submit_selection(
    state: &AppState,
    instrument: String,
    selection: RunSelection,
) -> ApiResult<Json<SubmissionResult>> {
    let request = SubmissionRequest {
        instrument,
        selection,
        options: ReductionOptions::default(),
    };
    Ok(Json(gateway::submit(state.submissions.as_ref(), request).await?))
}

async fn remove_selection(
    state: &AppState,
    instrument: String,
    identifiers: RunSelection,
    batch: bool,
) -> ApiResult<Json<RemovalResult>> {
    let request = RemovalRequest {
        instrument,
        identifiers,
        delete_all_versions: DELETE_ALL_VERSIONS,
        batch,
    };
    Ok(Json(gateway::remove(state.submissions.as_ref(), request).await?))
}

/// POST /api/runs/{instrument}/{start}
pub async fn submit_run(
    State(state): State<AppState>,
    Path((instrument, start)): Path<(String, String)>,
) -> ApiResult<Json<SubmissionResult>> {
    let selection = path_selection(&start, None)?;
    submit_selection(&state, instrument, selection).await
}

/// POST /api/runs/{instrument}/{start}/{end}
pub async fn submit_range(
    State(state): State<AppState>,
    Path((instrument, start, end)): Path<(String, String, String)>,
) -> ApiResult<Json<SubmissionResult>> {
    let selection = path_selection(&start, Some(&end))?;
    submit_selection(&state, instrument, selection).await
}

/// DELETE /api/runs/{instrument}/{start}
pub async fn remove_run(
    State(state): State<AppState>,
    Path((instrument, start)): Path<(String, String)>,
) -> ApiResult<Json<RemovalResult>> {
    let selection = path_selection(&start, None)?;
    remove_selection(&state, instrument, selection, false).await
}

/// DELETE /api/runs/{instrument}/{start}/{end}
pub async fn remove_range(
    State(state): State<AppState>,
    Path((instrument, start, end)): Path<(String, String, String)>,
) -> ApiResult<Json<RemovalResult>> {
    let selection = path_selection(&start, Some(&end))?;
    remove_selection(&state, instrument, selection, false).await
}

/// DELETE /api/runs/batch/{instrument}/{pk}
pub async fn remove_batch(
    State(state): State<AppState>,
    Path((instrument, pk)): Path<(String, String)>,
) -> ApiResult<Json<RemovalResult>> {
    let selection = path_selection(&pk, None)?;
    remove_selection(&state, instrument, selection, true).await
}

/// Build deprecated routes, each response tagged with `Deprecation: true`
pub fn legacy_routes() -> Router<AppState> {
    Router::new()
        .route("/api/runs/:instrument/:start", post(submit_run).delete(remove_run))
        .route(
            "/api/runs/:instrument/:start/:end",
            post(submit_range).delete(remove_range),
        )
        .route("/api/submit/run/:instrument/:start", post(submit_run))
        .route("/api/submit/run/:instrument/:start/:end", post(submit_range))
        .route("/api/runs/batch/:instrument/:pk", delete(remove_batch))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("deprecation"),
            HeaderValue::from_static("true"),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_selection() {
        assert_eq!(path_selection("63125", None).unwrap(), RunSelection::Single(63125));
        assert_eq!(
            path_selection("1", Some("3")).unwrap().resolve().unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_path_selection_rejects_garbage() {
        assert!(matches!(
            path_selection("abc", None).unwrap_err(),
            ValidationError::NotPositive { .. }
        ));
        assert!(path_selection("5", Some("0")).is_err());
    }
}
