//! Database models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Status given to every freshly submitted reduction run
pub const STATUS_QUEUED: &str = "Queued";

/// Sentinel submitter id meaning "unknown"
pub const UNKNOWN_SUBMITTER: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: NaiveDateTime,
}

/// One unit of reduction work: a single run version or a whole batch
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReductionRun {
    pub id: i64,
    pub instrument_id: i64,
    pub run_version: i64,
    pub batch_run: bool,
    pub status: String,
    /// JSON object text, passed through from the submitter untouched
    pub reduction_arguments: String,
    pub started_by: i64,
    pub run_description: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RunNumber {
    pub id: i64,
    pub reduction_run_id: i64,
    pub run_number: i64,
    pub data_location: String,
}
