//! autoreduce-api library
//!
//! Authenticated REST façade over the run submission service. The router,
//! state and gateways are exposed here for integration testing.

pub mod api;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod selection;
pub mod service;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use autoreduce_common::ApiConfig;
use axum::{middleware, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::identity::{IdentityStore, SqliteIdentityStore};
use crate::service::{ArchiveCatalog, SqliteSubmissionService, SubmissionService};

/// Application state shared across handlers
///
/// Holds only shared handles; nothing here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    /// Resolves `Authorization: Token` keys to users
    pub identity: Arc<dyn IdentityStore>,
    /// Owner of run records and reduction work
    pub submissions: Arc<dyn SubmissionService>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        submissions: Arc<dyn SubmissionService>,
        config: ApiConfig,
    ) -> Self {
        Self {
            identity,
            submissions,
            config: Arc::new(config),
        }
    }

    /// State backed by the embedded SQLite stores and the data archive
    pub fn from_pool(pool: SqlitePool, config: ApiConfig) -> Self {
        let catalog = Arc::new(ArchiveCatalog::new(
            config.archive_root.clone(),
            config.verify_data_files,
        ));
        Self::new(
            Arc::new(SqliteIdentityStore::new(pool.clone())),
            Arc::new(SqliteSubmissionService::new(pool, catalog)),
            config,
        )
    }
}

/// Build application router
///
/// Every `/api` route requires token authentication; `/health` does not.
/// The host guard runs before authentication.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(api::run_routes())
        .merge(api::batch_routes())
        .merge(api::legacy_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(middleware::from_fn_with_state(state.clone(), api::host_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
