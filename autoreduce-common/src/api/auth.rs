//! API token authentication helpers
//!
//! Clients send `Authorization: Token <key>`. Keys are 40 lowercase hex
//! characters, one per user, stored in the `auth_tokens` table.
//!
//! # Pure Functions
//!
//! Header parsing and key generation have no HTTP framework dependencies;
//! the service crate wraps them in axum middleware.

use rand::RngCore;
use sqlx::SqlitePool;

use crate::db::models::User;
use crate::Result;

/// Length of a token key in hex characters
pub const TOKEN_KEY_LEN: usize = 40;

const TOKEN_SCHEME: &str = "token";

/// Malformed `Authorization` header carrying the token scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenHeaderError {
    /// `Token` with nothing after it
    MissingCredentials,
    /// More than one value after `Token`
    ContainsSpaces,
    /// Header bytes are not valid text
    InvalidCharacters,
}

impl std::fmt::Display for TokenHeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenHeaderError::MissingCredentials => {
                write!(f, "Invalid token header. No credentials provided.")
            }
            TokenHeaderError::ContainsSpaces => {
                write!(f, "Invalid token header. Token string should not contain spaces.")
            }
            TokenHeaderError::InvalidCharacters => write!(
                f,
                "Invalid token header. Token string should not contain invalid characters."
            ),
        }
    }
}

impl std::error::Error for TokenHeaderError {}

/// Extract the token key from a raw `Authorization` header value
///
/// Returns `Ok(None)` when the header uses a different scheme (or is
/// empty), so the request counts as carrying no credentials at all.
///
/// # Examples
///
/// ```
/// use autoreduce_common::api::auth::parse_authorization;
///
/// assert_eq!(parse_authorization(b"Token abc123").unwrap(), Some("abc123".to_string()));
/// assert_eq!(parse_authorization(b"Bearer abc123").unwrap(), None);
/// assert!(parse_authorization(b"Token").is_err());
/// ```
pub fn parse_authorization(raw: &[u8]) -> std::result::Result<Option<String>, TokenHeaderError> {
    let mut parts = raw
        .split(|b| b.is_ascii_whitespace())
        .filter(|part| !part.is_empty());

    match parts.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case(TOKEN_SCHEME.as_bytes()) => {}
        _ => return Ok(None),
    }

    let key = parts.next().ok_or(TokenHeaderError::MissingCredentials)?;
    if parts.next().is_some() {
        return Err(TokenHeaderError::ContainsSpaces);
    }

    std::str::from_utf8(key)
        .map(|k| Some(k.to_string()))
        .map_err(|_| TokenHeaderError::InvalidCharacters)
}

/// Generate a fresh random token key (40 hex characters)
pub fn generate_token_key() -> String {
    let mut bytes = [0u8; TOKEN_KEY_LEN / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Resolve a token key to its user
///
/// Returns `None` for unknown keys. Inactive users are returned as-is so
/// the caller can distinguish "invalid token" from "inactive user".
pub async fn find_user_by_token(pool: &SqlitePool, key: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.is_active, u.is_staff, u.created_at
        FROM auth_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.key = ?
        "#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Return the user's token, creating one if they have none yet
pub async fn get_or_create_token(pool: &SqlitePool, user_id: i64) -> Result<String> {
    let existing: Option<String> =
        sqlx::query_scalar("SELECT key FROM auth_tokens WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    if let Some(key) = existing {
        return Ok(key);
    }

    let key = generate_token_key();
    sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES (?, ?)")
        .bind(&key)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::db::users::create_user;

    #[test]
    fn test_parse_token_header() {
        assert_eq!(
            parse_authorization(b"Token 0123abcd").unwrap(),
            Some("0123abcd".to_string())
        );
        // Scheme is case-insensitive
        assert_eq!(
            parse_authorization(b"token 0123abcd").unwrap(),
            Some("0123abcd".to_string())
        );
    }

    #[test]
    fn test_other_scheme_is_not_credentials() {
        assert_eq!(parse_authorization(b"Bearer xyz").unwrap(), None);
        assert_eq!(parse_authorization(b"").unwrap(), None);
    }

    #[test]
    fn test_malformed_token_header() {
        assert_eq!(
            parse_authorization(b"Token").unwrap_err(),
            TokenHeaderError::MissingCredentials
        );
        assert_eq!(
            parse_authorization(b"Token abc def").unwrap_err(),
            TokenHeaderError::ContainsSpaces
        );
        assert_eq!(
            parse_authorization(b"Token \xff\xfe").unwrap_err(),
            TokenHeaderError::InvalidCharacters
        );
    }

    #[test]
    fn test_generated_key_shape() {
        let key = generate_token_key();
        assert_eq!(key.len(), TOKEN_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, generate_token_key());
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let pool = init_memory_database().await.unwrap();
        let user = create_user(&pool, "admin", true, true).await.unwrap();

        let key = get_or_create_token(&pool, user.id).await.unwrap();
        // Second call returns the same key
        assert_eq!(get_or_create_token(&pool, user.id).await.unwrap(), key);

        let found = find_user_by_token(&pool, &key).await.unwrap().unwrap();
        assert_eq!(found.username, "admin");

        assert!(find_user_by_token(&pool, "not-a-key").await.unwrap().is_none());
    }
}
