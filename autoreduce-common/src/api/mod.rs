//! Shared HTTP API functionality
//!
//! Contains ONLY pure functions, database operations and shared types. The
//! axum middleware that wraps them lives in the service crate.

pub mod auth;
pub mod types;

pub use auth::{
    find_user_by_token, generate_token_key, get_or_create_token, parse_authorization,
    TokenHeaderError, TOKEN_KEY_LEN,
};
pub use types::{AuthErrorResponse, ErrorResponse, MessageResponse};
