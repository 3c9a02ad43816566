//! User queries

use crate::db::models::User;
use crate::{Error, Result};
use sqlx::SqlitePool;

/// Create a new user
///
/// Fails with [`Error::InvalidInput`] if the username is blank or taken.
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    is_staff: bool,
    is_active: bool,
) -> Result<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::InvalidInput("Username must not be empty".to_string()));
    }

    if find_user_by_username(pool, username).await?.is_some() {
        return Err(Error::InvalidInput(format!(
            "User already exists: {}",
            username
        )));
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, is_staff, is_active)
        VALUES (?, ?, ?)
        RETURNING id, username, is_active, is_staff, created_at
        "#,
    )
    .bind(username)
    .bind(is_staff)
    .bind(is_active)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, is_active, is_staff, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Mark a user active or inactive; inactive users cannot authenticate
pub async fn set_user_active(pool: &SqlitePool, user_id: i64, is_active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User id {}", user_id)));
    }

    Ok(())
}
