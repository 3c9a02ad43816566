//! Shared API response envelopes
//!
//! Error bodies come in three shapes, each with a single field:
//! - `{"error": ...}` for malformed or incomplete requests
//! - `{"message": ...}` for operations the submission service rejected
//! - `{"detail": ...}` for authentication failures

use serde::{Deserialize, Serialize};

/// Client error caused by the request itself
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Operation rejected by the submission service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Returned with 401 Unauthorized
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthErrorResponse {
    pub detail: String,
}

impl AuthErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_shapes_have_single_field() {
        assert_eq!(
            serde_json::to_string(&ErrorResponse::new("No 'runs' key specified")).unwrap(),
            r#"{"error":"No 'runs' key specified"}"#
        );
        assert_eq!(
            serde_json::to_string(&MessageResponse::new("boom")).unwrap(),
            r#"{"message":"boom"}"#
        );
        assert_eq!(
            serde_json::to_string(&AuthErrorResponse::new("Invalid token.")).unwrap(),
            r#"{"detail":"Invalid token."}"#
        );
    }
}
