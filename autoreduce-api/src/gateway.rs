//! Gateways between the HTTP handlers and the submission service
//!
//! Each gateway resolves the request's run selection, makes exactly one
//! service call and wraps the outcome in its response envelope. Nothing is
//! retried.

use tracing::{info, warn};

use crate::error::{ApiError, ApiResult, ValidationError};
use crate::selection::RunSelection;
use crate::service::{
    BatchSubmissionResult, ReductionOptions, RemovalKind, RemovalResult, SubmissionResult,
    SubmissionService,
};

/// A submission as parsed from one HTTP request
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub instrument: String,
    pub selection: RunSelection,
    pub options: ReductionOptions,
}

/// A removal as parsed from one HTTP request
#[derive(Debug, Clone)]
pub struct RemovalRequest {
    pub instrument: String,
    /// Run numbers, or batch ids when `batch` is set
    pub identifiers: RunSelection,
    pub delete_all_versions: bool,
    pub batch: bool,
}

/// Submit every selected run as its own reduction
pub async fn submit(
    service: &dyn SubmissionService,
    request: SubmissionRequest,
) -> ApiResult<SubmissionResult> {
    ensure_instrument(&request.instrument)?;
    let runs = request.selection.resolve()?;

    let submitted_runs = service
        .submit_runs(&request.instrument, &runs, &request.options)
        .await
        .map_err(|e| log_failure("submit", &request.instrument, e.into()))?;

    info!(
        instrument = %request.instrument,
        submitted = submitted_runs.len(),
        submitter = request.options.submitter_id,
        "Runs submitted"
    );
    Ok(SubmissionResult { submitted_runs })
}

/// Submit all selected runs as a single batch reduction
pub async fn submit_batch(
    service: &dyn SubmissionService,
    request: SubmissionRequest,
) -> ApiResult<BatchSubmissionResult> {
    ensure_instrument(&request.instrument)?;
    let runs = request.selection.resolve()?;

    let result = service
        .submit_batch(&request.instrument, &runs, &request.options)
        .await
        .map_err(|e| log_failure("submit_batch", &request.instrument, e.into()))?;

    info!(
        instrument = %request.instrument,
        batch_id = result.batch_id,
        submitted = result.submitted_runs.len(),
        submitter = request.options.submitter_id,
        "Batch submitted"
    );
    Ok(result)
}

/// Remove runs or batches; identifiers that do not exist are skipped
pub async fn remove(
    service: &dyn SubmissionService,
    request: RemovalRequest,
) -> ApiResult<RemovalResult> {
    ensure_instrument(&request.instrument)?;
    let identifiers = request.identifiers.resolve()?;
    let kind = if request.batch {
        RemovalKind::Batches
    } else {
        RemovalKind::Runs
    };

    let removed_runs = service
        .remove(
            &request.instrument,
            &identifiers,
            request.delete_all_versions,
            kind,
        )
        .await
        .map_err(|e| log_failure("remove", &request.instrument, e.into()))?;

    info!(
        instrument = %request.instrument,
        ?kind,
        requested = identifiers.len(),
        removed = removed_runs.len(),
        "Removal complete"
    );
    Ok(RemovalResult { removed_runs })
}

fn ensure_instrument(instrument: &str) -> Result<(), ValidationError> {
    if instrument.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "instrument",
            expected: "a non-empty name",
        });
    }
    Ok(())
}

fn log_failure(operation: &str, instrument: &str, err: ApiError) -> ApiError {
    if let ApiError::Domain(message) = &err {
        warn!(operation, instrument, reason = %message, "Submission service refused request");
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records each call and answers with canned results
    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<(String, Vec<i64>, Option<(bool, RemovalKind)>)>>,
        fail_with: Option<ServiceError>,
    }

    impl RecordingService {
        fn outcome(&self) -> Result<(), ServiceError> {
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SubmissionService for RecordingService {
        async fn submit_runs(
            &self,
            instrument: &str,
            runs: &[i64],
            _options: &ReductionOptions,
        ) -> Result<Vec<i64>, ServiceError> {
            self.calls.lock().unwrap().push((instrument.to_string(), runs.to_vec(), None));
            self.outcome()?;
            Ok(runs.to_vec())
        }

        async fn submit_batch(
            &self,
            instrument: &str,
            runs: &[i64],
            _options: &ReductionOptions,
        ) -> Result<BatchSubmissionResult, ServiceError> {
            self.calls.lock().unwrap().push((instrument.to_string(), runs.to_vec(), None));
            self.outcome()?;
            Ok(BatchSubmissionResult {
                batch_id: 7,
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
            self.calls.lock().unwrap().push((
                instrument.to_string(),
                identifiers.to_vec(),
                Some((delete_all_versions, kind)),
            ));
            self.outcome()?;
            Ok(Vec::new())
        }
    }

    fn submission(selection: RunSelection) -> SubmissionRequest {
        SubmissionRequest {
            instrument: "WISH".to_string(),
            selection,
            options: ReductionOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_submit_forwards_resolved_range() {
        let service = RecordingService::default();
        let result = submit(&service, submission(RunSelection::from_bounds(10, Some(12))))
            .await
            .unwrap();

        assert_eq!(result.submitted_runs, vec![10, 11, 12]);
        let calls = service.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn test_invalid_selection_never_reaches_service() {
        let service = RecordingService::default();
        let err = submit(&service, submission(RunSelection::from_bounds(12, Some(10))))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_domain_error_is_propagated() {
        let service = RecordingService {
            fail_with: Some(ServiceError::Domain("run not in catalog".to_string())),
            ..Default::default()
        };
        let err = submit_batch(&service, submission(RunSelection::List(vec![1, 2])))
            .await
            .unwrap_err();

        match err {
            ApiError::Domain(message) => assert_eq!(message, "run not in catalog"),
            other => panic!("expected domain error, got {:?}", other),
        }
        // No retry
        assert_eq!(service.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_passes_policy_and_kind() {
        let service = RecordingService::default();
        let request = RemovalRequest {
            instrument: "WISH".to_string(),
            identifiers: RunSelection::List(vec![3]),
            delete_all_versions: true,
            batch: true,
        };

        let result = remove(&service, request).await.unwrap();

        assert!(result.removed_runs.is_empty());
        let calls = service.calls.lock().unwrap();
        assert_eq!(calls[0].2, Some((true, RemovalKind::Batches)));
    }

    #[tokio::test]
    async fn test_blank_instrument_rejected() {
        let service = RecordingService::default();
        let mut request = submission(RunSelection::Single(1));
        request.instrument = "  ".to_string();

        assert!(submit(&service, request).await.is_err());
        assert!(service.calls.lock().unwrap().is_empty());
    }
}
