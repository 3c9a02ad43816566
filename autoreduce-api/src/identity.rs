//! Identity store: resolves API tokens to users

use async_trait::async_trait;
use autoreduce_common::api::auth::find_user_by_token;
use autoreduce_common::db::User;
use sqlx::SqlitePool;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up the owner of a token key; `None` if the key is unknown
    async fn user_for_token(&self, key: &str) -> autoreduce_common::Result<Option<User>>;
}

/// Identity store over the `users` and `auth_tokens` tables
#[derive(Clone)]
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn user_for_token(&self, key: &str) -> autoreduce_common::Result<Option<User>> {
        find_user_by_token(&self.pool, key).await
    }
}
