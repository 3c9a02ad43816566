//! Host header validation against the configured allowed hosts

use autoreduce_common::api::types::ErrorResponse;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::AppState;

/// Reject requests addressed to a host this deployment does not serve
///
/// Requests without a `Host` header pass through.
pub async fn host_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(value) = request.headers().get(header::HOST) {
        let allowed = value
            .to_str()
            .map(|host| state.config.is_host_allowed(host))
            .unwrap_or(false);

        if !allowed {
            warn!(host = ?value, "Rejected request for disallowed host");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Invalid Host header")),
            )
                .into_response();
        }
    }

    next.run(request).await
}
