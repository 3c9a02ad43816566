//! SQLite-backed submission service
//!
//! Persists one reduction-run record per submitted run (or one per batch)
//! with status `Queued`. Every operation runs in a single transaction, and
//! all catalog lookups happen before the transaction opens, so a rejected
//! submission leaves nothing behind.

use std::sync::Arc;

use async_trait::async_trait;
use autoreduce_common::db::{ReductionRun, RunNumber, STATUS_QUEUED};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{
    BatchSubmissionResult, DataLocation, ReductionOptions, RemovalKind, RunCatalog, ServiceError,
    SubmissionService,
};

#[derive(Clone)]
pub struct SqliteSubmissionService {
    pool: SqlitePool,
    catalog: Arc<dyn RunCatalog>,
}

impl SqliteSubmissionService {
    pub fn new(pool: SqlitePool, catalog: Arc<dyn RunCatalog>) -> Self {
        Self { pool, catalog }
    }

    /// Number of reduction-run records currently stored
    pub async fn reduction_run_count(&self) -> Result<i64, ServiceError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM reduction_runs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn reduction_run(&self, id: i64) -> Result<Option<ReductionRun>, ServiceError> {
        let run = sqlx::query_as::<_, ReductionRun>(
            r#"
            SELECT id, instrument_id, run_version, batch_run, status, reduction_arguments,
                   started_by, run_description, created_at
            FROM reduction_runs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    /// All reduction-run records for an instrument, oldest first
    pub async fn reduction_runs(&self, instrument: &str) -> Result<Vec<ReductionRun>, ServiceError> {
        let runs = sqlx::query_as::<_, ReductionRun>(
            r#"
            SELECT r.id, r.instrument_id, r.run_version, r.batch_run, r.status,
                   r.reduction_arguments, r.started_by, r.run_description, r.created_at
            FROM reduction_runs r
            JOIN instruments i ON i.id = r.instrument_id
            WHERE i.name = ?
            ORDER BY r.id ASC
            "#,
        )
        .bind(instrument)
        .fetch_all(&self.pool)
        .await?;
        Ok(runs)
    }

    pub async fn run_numbers(&self, reduction_run_id: i64) -> Result<Vec<RunNumber>, ServiceError> {
        let numbers = sqlx::query_as::<_, RunNumber>(
            r#"
            SELECT id, reduction_run_id, run_number, data_location
            FROM run_numbers
            WHERE reduction_run_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(reduction_run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(numbers)
    }

    async fn lookup_all(
        &self,
        instrument: &str,
        runs: &[i64],
    ) -> Result<Vec<DataLocation>, ServiceError> {
        let mut locations = Vec::with_capacity(runs.len());
        for &run in runs {
            locations.push(self.catalog.lookup(instrument, run).await?);
        }
        Ok(locations)
    }
}

#[async_trait]
impl SubmissionService for SqliteSubmissionService {
    async fn submit_runs(
        &self,
        instrument: &str,
        runs: &[i64],
        options: &ReductionOptions,
    ) -> Result<Vec<i64>, ServiceError> {
        if runs.is_empty() {
            return Ok(Vec::new());
        }

        let locations = self.lookup_all(instrument, runs).await?;
        let arguments = encode_arguments(options)?;

        let mut tx = self.pool.begin().await?;
        let instrument_id = get_or_create_instrument(&mut tx, instrument).await?;

        for (&run, location) in runs.iter().zip(&locations) {
            let version = next_run_version(&mut tx, instrument_id, run).await?;
            let record_id =
                insert_reduction_run(&mut tx, instrument_id, version, false, &arguments, options)
                    .await?;
            insert_run_number(&mut tx, record_id, run, location).await?;

            debug!(instrument, run, version, record_id, "Queued reduction run");
        }

        tx.commit().await?;

        info!(instrument, count = runs.len(), "Submitted runs for reduction");
        Ok(runs.to_vec())
    }

    async fn submit_batch(
        &self,
        instrument: &str,
        runs: &[i64],
        options: &ReductionOptions,
    ) -> Result<BatchSubmissionResult, ServiceError> {
        if runs.is_empty() {
            return Err(ServiceError::Domain("Cannot submit an empty batch".to_string()));
        }

        let locations = self.lookup_all(instrument, runs).await?;
        let arguments = encode_arguments(options)?;

        let mut tx = self.pool.begin().await?;
        let instrument_id = get_or_create_instrument(&mut tx, instrument).await?;

        let batch_id =
            insert_reduction_run(&mut tx, instrument_id, 0, true, &arguments, options).await?;
        for (&run, location) in runs.iter().zip(&locations) {
            insert_run_number(&mut tx, batch_id, run, location).await?;
        }

        tx.commit().await?;

        info!(instrument, batch_id, count = runs.len(), "Submitted batch for reduction");
        Ok(BatchSubmissionResult {
            batch_id,
            submitted_runs: runs.to_vec(),
        })
    }

    async fn remove(
        &self,
        instrument: &str,
        identifiers: &[i64],
        delete_all_versions: bool,
        kind: RemovalKind,
    ) -> Result<Vec<i64>, ServiceError> {
        // Every statement here is a DELETE, so the transaction holds the
        // write lock from its first statement and waits on busy_timeout
        let mut tx = self.pool.begin().await?;

        let mut removed = Vec::new();
        for &identifier in identifiers {
            let deleted = match kind {
                RemovalKind::Runs => {
                    delete_run_versions(&mut tx, instrument, identifier, delete_all_versions)
                        .await?
                }
                RemovalKind::Batches => delete_batch(&mut tx, instrument, identifier).await?,
            };

            if deleted > 0 {
                debug!(instrument, identifier, deleted, ?kind, "Removed reduction records");
                removed.push(identifier);
            }
        }

        tx.commit().await?;

        info!(
            instrument,
            ?kind,
            requested = identifiers.len(),
            removed = removed.len(),
            "Removed reduction runs"
        );
        Ok(removed)
    }
}

fn encode_arguments(options: &ReductionOptions) -> Result<String, ServiceError> {
    serde_json::to_string(&options.reduction_arguments)
        .map_err(|e| ServiceError::Internal(format!("Failed to encode reduction arguments: {}", e)))
}

async fn find_instrument(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<i64>, ServiceError> {
    let id = sqlx::query_scalar("SELECT id FROM instruments WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

async fn get_or_create_instrument(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<i64, ServiceError> {
    sqlx::query("INSERT OR IGNORE INTO instruments (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    find_instrument(conn, name)
        .await?
        .ok_or_else(|| ServiceError::Internal(format!("Instrument {} vanished after insert", name)))
}

/// Versions start at 0 and count up per instrument and run number
async fn next_run_version(
    conn: &mut SqliteConnection,
    instrument_id: i64,
    run: i64,
) -> Result<i64, ServiceError> {
    let version = sqlx::query_scalar(
        r#"
        SELECT COALESCE(MAX(r.run_version) + 1, 0)
        FROM reduction_runs r
        JOIN run_numbers n ON n.reduction_run_id = r.id
        WHERE r.instrument_id = ? AND r.batch_run = 0 AND n.run_number = ?
        "#,
    )
    .bind(instrument_id)
    .bind(run)
    .fetch_one(&mut *conn)
    .await?;
    Ok(version)
}

async fn insert_reduction_run(
    conn: &mut SqliteConnection,
    instrument_id: i64,
    run_version: i64,
    batch_run: bool,
    arguments: &str,
    options: &ReductionOptions,
) -> Result<i64, ServiceError> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO reduction_runs
            (instrument_id, run_version, batch_run, status, reduction_arguments, started_by, run_description)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(instrument_id)
    .bind(run_version)
    .bind(batch_run)
    .bind(STATUS_QUEUED)
    .bind(arguments)
    .bind(options.submitter_id)
    .bind(&options.description)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

async fn insert_run_number(
    conn: &mut SqliteConnection,
    reduction_run_id: i64,
    run: i64,
    location: &DataLocation,
) -> Result<(), ServiceError> {
    sqlx::query(
        "INSERT INTO run_numbers (reduction_run_id, run_number, data_location) VALUES (?, ?, ?)",
    )
    .bind(reduction_run_id)
    .bind(run)
    .bind(location.path.to_string_lossy().into_owned())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Delete the non-batch records of a run, newest version first
///
/// Removes every version, or only the newest one. Run numbers go with
/// their record through the foreign key cascade.
async fn delete_run_versions(
    conn: &mut SqliteConnection,
    instrument: &str,
    run: i64,
    all_versions: bool,
) -> Result<u64, ServiceError> {
    // LIMIT -1 is unbounded in SQLite
    let limit: i64 = if all_versions { -1 } else { 1 };
    let result = sqlx::query(
        r#"
        DELETE FROM reduction_runs
        WHERE id IN (
            SELECT r.id
            FROM reduction_runs r
            JOIN instruments i ON i.id = r.instrument_id
            JOIN run_numbers n ON n.reduction_run_id = r.id
            WHERE i.name = ? AND r.batch_run = 0 AND n.run_number = ?
            ORDER BY r.run_version DESC
            LIMIT ?
        )
        "#,
    )
    .bind(instrument)
    .bind(run)
    .bind(limit)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

async fn delete_batch(
    conn: &mut SqliteConnection,
    instrument: &str,
    batch_id: i64,
) -> Result<u64, ServiceError> {
    let result = sqlx::query(
        r#"
        DELETE FROM reduction_runs
        WHERE id = ? AND batch_run = 1
          AND instrument_id = (SELECT id FROM instruments WHERE name = ?)
        "#,
    )
    .bind(batch_id)
    .bind(instrument)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ArchiveCatalog, CatalogError};
    use autoreduce_common::db::{init_database, init_memory_database};
    use serde_json::json;

    const INSTRUMENT: &str = "TESTINSTRUMENT";

    async fn service() -> SqliteSubmissionService {
        let pool = init_memory_database().await.unwrap();
        SqliteSubmissionService::new(pool, Arc::new(ArchiveCatalog::new("/tmp/archive", false)))
    }

    /// Catalog that knows no runs at all
    struct EmptyCatalog;

    #[async_trait]
    impl RunCatalog for EmptyCatalog {
        async fn lookup(&self, instrument: &str, run: i64) -> Result<DataLocation, CatalogError> {
            Err(CatalogError::RunNotFound {
                instrument: instrument.to_string(),
                run,
            })
        }
    }

    #[tokio::test]
    async fn test_submit_creates_one_record_per_run() {
        let service = service().await;
        let runs: Vec<i64> = (63125..=63130).collect();

        let submitted = service
            .submit_runs(INSTRUMENT, &runs, &ReductionOptions::default())
            .await
            .unwrap();

        assert_eq!(submitted, runs);
        assert_eq!(service.reduction_run_count().await.unwrap(), 6);

        let records = service.reduction_runs(INSTRUMENT).await.unwrap();
        assert!(records.iter().all(|r| !r.batch_run && r.status == STATUS_QUEUED));
        assert!(records.iter().all(|r| r.run_version == 0 && r.started_by == -1));

        let numbers = service.run_numbers(records[0].id).await.unwrap();
        assert_eq!(numbers.len(), 1);
        assert_eq!(numbers[0].run_number, 63125);
        assert!(numbers[0].data_location.ends_with("TESTINSTRUMENT00063125.nxs"));
    }

    #[tokio::test]
    async fn test_resubmission_bumps_version() {
        let service = service().await;
        let options = ReductionOptions::default();

        service.submit_runs(INSTRUMENT, &[63125], &options).await.unwrap();
        service.submit_runs(INSTRUMENT, &[63125, 63125], &options).await.unwrap();

        let versions: Vec<i64> = service
            .reduction_runs(INSTRUMENT)
            .await
            .unwrap()
            .iter()
            .map(|r| r.run_version)
            .collect();
        assert_eq!(versions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_arguments_and_metadata_are_stored() {
        let service = service().await;
        let options = ReductionOptions {
            reduction_arguments: json!({"apple": "banana", "nested": {"n": [1, 2]}})
                .as_object()
                .unwrap()
                .clone(),
            submitter_id: 99199,
            description: "Test description".to_string(),
        };

        service.submit_runs(INSTRUMENT, &[63125], &options).await.unwrap();

        let record = &service.reduction_runs(INSTRUMENT).await.unwrap()[0];
        assert_eq!(record.started_by, 99199);
        assert_eq!(record.run_description, "Test description");
        let stored: serde_json::Value = serde_json::from_str(&record.reduction_arguments).unwrap();
        assert_eq!(stored, json!({"apple": "banana", "nested": {"n": [1, 2]}}));
    }

    #[tokio::test]
    async fn test_catalog_failure_persists_nothing() {
        let pool = init_memory_database().await.unwrap();
        let service = SqliteSubmissionService::new(pool, Arc::new(EmptyCatalog));

        let err = service
            .submit_runs(INSTRUMENT, &[63125, 63126], &ReductionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Domain(_)));
        assert_eq!(service.reduction_run_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_is_one_record_with_all_runs() {
        let service = service().await;
        let options = ReductionOptions {
            submitter_id: 99199,
            description: "Test description".to_string(),
            ..Default::default()
        };

        let result = service.submit_batch(INSTRUMENT, &[63125, 63130], &options).await.unwrap();

        assert_eq!(result.submitted_runs, vec![63125, 63130]);
        assert_eq!(service.reduction_run_count().await.unwrap(), 1);

        let record = service.reduction_run(result.batch_id).await.unwrap().unwrap();
        assert!(record.batch_run);
        assert_eq!(record.started_by, 99199);
        assert_eq!(record.run_description, "Test description");

        let numbers: Vec<i64> = service
            .run_numbers(result.batch_id)
            .await
            .unwrap()
            .iter()
            .map(|n| n.run_number)
            .collect();
        assert_eq!(numbers, vec![63125, 63130]);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let service = service().await;
        let err = service
            .submit_batch(INSTRUMENT, &[], &ReductionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Domain("Cannot submit an empty batch".to_string()));
    }

    #[tokio::test]
    async fn test_remove_latest_or_all_versions() {
        let service = service().await;
        let options = ReductionOptions::default();
        service.submit_runs(INSTRUMENT, &[1, 1, 1, 2], &options).await.unwrap();

        let removed = service.remove(INSTRUMENT, &[1], false, RemovalKind::Runs).await.unwrap();
        assert_eq!(removed, vec![1]);
        assert_eq!(service.reduction_run_count().await.unwrap(), 3);

        // Only the newest version went
        let versions: Vec<i64> = service
            .reduction_runs(INSTRUMENT)
            .await
            .unwrap()
            .iter()
            .map(|r| r.run_version)
            .collect();
        assert_eq!(versions, vec![0, 1, 0]);

        let removed = service.remove(INSTRUMENT, &[1], true, RemovalKind::Runs).await.unwrap();
        assert_eq!(removed, vec![1]);
        assert_eq!(service.reduction_run_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_ignores_unknown_identifiers() {
        let service = service().await;
        service
            .submit_runs(INSTRUMENT, &[63125], &ReductionOptions::default())
            .await
            .unwrap();

        let removed = service
            .remove(INSTRUMENT, &[99999, 63125, 63125], true, RemovalKind::Runs)
            .await
            .unwrap();
        assert_eq!(removed, vec![63125]);

        let removed = service.remove("NOSUCHINSTRUMENT", &[1], true, RemovalKind::Runs).await.unwrap();
        assert!(removed.is_empty());
    }

    #[tokio::test]
    async fn test_batch_removal_only_touches_batches() {
        let service = service().await;
        let options = ReductionOptions::default();
        service.submit_runs(INSTRUMENT, &[63125], &options).await.unwrap();
        let batch = service.submit_batch(INSTRUMENT, &[63125, 63130], &options).await.unwrap();

        let single_id = service.reduction_runs(INSTRUMENT).await.unwrap()[0].id;

        // A per-run record id is not a batch id
        let removed = service
            .remove(INSTRUMENT, &[single_id], true, RemovalKind::Batches)
            .await
            .unwrap();
        assert!(removed.is_empty());

        let removed = service
            .remove(INSTRUMENT, &[batch.batch_id], true, RemovalKind::Batches)
            .await
            .unwrap();
        assert_eq!(removed, vec![batch.batch_id]);
        assert_eq!(service.reduction_run_count().await.unwrap(), 1);
        assert!(service.run_numbers(batch.batch_id).await.unwrap().is_empty());

        // Batch records do not count as versions of their runs
        let removed = service.remove(INSTRUMENT, &[63130], true, RemovalKind::Runs).await.unwrap();
        assert!(removed.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submit_and_remove_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("autoreduce.db")).await.unwrap();
        let service = Arc::new(SqliteSubmissionService::new(
            pool,
            Arc::new(ArchiveCatalog::new("/tmp/archive", false)),
        ));
        service
            .submit_runs("WISH", &[1], &ReductionOptions::default())
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..40i64 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    service
                        .remove("WISH", &[1000 + i, 1], true, RemovalKind::Runs)
                        .await
                        .map(|_| ())
                } else {
                    service
                        .submit_runs("WISH", &[1, 1000 + i], &ReductionOptions::default())
                        .await
                        .map(|_| ())
                }
            }));
        }

        for task in tasks {
            if let Err(err) = task.await.unwrap() {
                panic!("concurrent write failed: {}", err);
            }
        }
    }
}
