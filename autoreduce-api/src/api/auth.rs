//! Token authentication middleware
//!
//! Applied to every `/api` route. Requests must carry
//! `Authorization: Token <key>` for an active user; anything else is
//! rejected with 401 before a handler runs.

use autoreduce_common::api::auth::{parse_authorization, TokenHeaderError};
use autoreduce_common::api::types::{AuthErrorResponse, ErrorResponse};
use autoreduce_common::db::User;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, warn};

use crate::AppState;

/// The user a request was authenticated as
///
/// Inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Authentication middleware
///
/// Resolves the token through the identity store and rejects unknown
/// tokens and inactive users.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let key = match request.headers().get(header::AUTHORIZATION) {
        Some(value) => parse_authorization(value.as_bytes())
            .map_err(AuthError::MalformedHeader)?
            .ok_or(AuthError::NotAuthenticated)?,
        None => return Err(AuthError::NotAuthenticated),
    };

    let user = state
        .identity
        .user_for_token(&key)
        .await
        .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?
        .ok_or(AuthError::InvalidToken)?;

    if !user.is_active {
        warn!(user = %user.username, "Rejected token of inactive user");
        return Err(AuthError::InactiveUser);
    }

    debug!(user = %user.username, path = %request.uri().path(), "Authenticated request");
    request.extensions_mut().insert(AuthenticatedUser(user));

    Ok(next.run(request).await)
}

/// Authentication error types for HTTP responses
#[derive(Debug)]
pub enum AuthError {
    NotAuthenticated,
    MalformedHeader(TokenHeaderError),
    InvalidToken,
    InactiveUser,
    StoreUnavailable(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let detail = match self {
            AuthError::NotAuthenticated => "Authentication credentials were not provided.".to_string(),
            AuthError::MalformedHeader(err) => err.to_string(),
            AuthError::InvalidToken => "Invalid token.".to_string(),
            AuthError::InactiveUser => "User inactive or deleted.".to_string(),
            AuthError::StoreUnavailable(cause) => {
                error!(error = %cause, "Identity store lookup failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("Internal server error")),
                )
                    .into_response();
            }
        };

        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, HeaderValue::from_static("Token"))],
            Json(AuthErrorResponse::new(detail)),
        )
            .into_response()
    }
}
