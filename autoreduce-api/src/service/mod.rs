//! Run submission service
//!
//! The [`SubmissionService`] trait is the contract with whatever owns run
//! records and reduction work. The HTTP layer only ever talks to this trait.
//! [`SqliteSubmissionService`] is the embedded implementation shipped with
//! the server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod catalog;
pub mod sqlite;

pub use catalog::{ArchiveCatalog, CatalogError, DataLocation, RunCatalog};
pub use sqlite::SqliteSubmissionService;

/// Failure reported by a submission service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The operation was refused, e.g. a run missing from the catalog
    #[error("{0}")]
    Domain(String),

    /// The service itself failed
    #[error("{0}")]
    Internal(String),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Internal(format!("Database error: {}", err))
    }
}

impl From<autoreduce_common::Error> for ServiceError {
    fn from(err: autoreduce_common::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        ServiceError::Domain(err.to_string())
    }
}

/// Reduction settings attached to a submission
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionOptions {
    /// Opaque to this service's callers; stored and forwarded verbatim
    pub reduction_arguments: Map<String, Value>,
    /// -1 when the submitter is unknown
    pub submitter_id: i64,
    pub description: String,
}

impl Default for ReductionOptions {
    fn default() -> Self {
        Self {
            reduction_arguments: Map::new(),
            submitter_id: autoreduce_common::db::UNKNOWN_SUBMITTER,
            description: String::new(),
        }
    }
}

/// What a removal's identifiers refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalKind {
    Runs,
    Batches,
}

/// Response body for per-run submissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub submitted_runs: Vec<i64>,
}

/// Response body for batch submissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSubmissionResult {
    pub batch_id: i64,
    pub submitted_runs: Vec<i64>,
}

/// Response body for removals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalResult {
    pub removed_runs: Vec<i64>,
}

#[async_trait]
pub trait SubmissionService: Send + Sync {
    /// Submit each run as its own unit of reduction work
    ///
    /// Returns the runs accepted, in request order.
    async fn submit_runs(
        &self,
        instrument: &str,
        runs: &[i64],
        options: &ReductionOptions,
    ) -> Result<Vec<i64>, ServiceError>;

    /// Submit all runs as one aggregate unit of reduction work
    async fn submit_batch(
        &self,
        instrument: &str,
        runs: &[i64],
        options: &ReductionOptions,
    ) -> Result<BatchSubmissionResult, ServiceError>;

    /// Remove runs (or batches) and return the identifiers actually removed
    ///
    /// Identifiers that do not exist are skipped without error.
    async fn remove(
        &self,
        instrument: &str,
        identifiers: &[i64],
        delete_all_versions: bool,
        kind: RemovalKind,
    ) -> Result<Vec<i64>, ServiceError>;
}
