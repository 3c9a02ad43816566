//! HTTP API handlers for autoreduce-api

pub mod auth;
pub mod batch;
pub mod health;
pub mod host;
pub mod legacy;
pub mod payload;
pub mod runs;

pub use auth::{auth_middleware, AuthError, AuthenticatedUser};
pub use batch::batch_routes;
pub use health::health_routes;
pub use host::host_guard;
pub use legacy::legacy_routes;
pub use runs::run_routes;

/// Removals over HTTP always drop every version of a run
pub const DELETE_ALL_VERSIONS: bool = true;
