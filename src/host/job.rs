use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::contour::{Contour, MarginRequest};
use crate::error::{GridError, HostError, MarginError, OperationError};

/// One unit of work submitted to a [`MarginHost`](super::MarginHost).
///
/// Deserializes from `{ "jobId", "operation": { "kind", ... }, "contours",
/// "spacing", "padding", ... }`; the pipeline settings sit at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub job_id: String,
    pub operation: MarginRequest,
    pub contours: Vec<Contour>,
    #[serde(flatten)]
    pub config: PipelineConfig,
}

impl JobPayload {
    #[must_use]
    pub fn new(
        job_id: impl Into<String>,
        operation: MarginRequest,
        contours: Vec<Contour>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            operation,
            contours,
            config,
        }
    }
}

/// Coarse classification of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Cancelled,
    InvalidInput,
    ResourceLimitExceeded,
    Failed,
}

/// Why a job produced no contours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub(crate) fn cancelled() -> Self {
        Self::from(MarginError::from(HostError::Cancelled))
    }

    pub(crate) fn panicked(message: &str) -> Self {
        Self::from(MarginError::from(OperationError::Failed(format!(
            "job panicked: {message}"
        ))))
    }
}

impl From<MarginError> for JobFailure {
    fn from(err: MarginError) -> Self {
        let kind = match &err {
            MarginError::Grid(GridError::ResourceLimitExceeded { .. }) => {
                FailureKind::ResourceLimitExceeded
            }
            MarginError::Grid(GridError::InvalidResolution { .. } | GridError::EmptyDimension(_))
            | MarginError::Operation(OperationError::InvalidInput(_)) => FailureKind::InvalidInput,
            MarginError::Host(HostError::Cancelled) => FailureKind::Cancelled,
            _ => FailureKind::Failed,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Outcome of one job, keyed by the submitted job id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: String,
    pub result: Result<Vec<Contour>, JobFailure>,
}

impl JobReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The failure kind, if the job failed.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.result.as_ref().err().map(|f| f.kind)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn payload_from_json() {
        let json = r#"{
            "jobId": "ptv-1",
            "operation": { "kind": "DIRECTIONAL", "perSide": { "left": 5, "sup": 2 } },
            "contours": [
                { "points": [0,0,0, 10,0,0, 10,10,0, 0,10,0], "slicePosition": 0 }
            ],
            "spacing": [1, 1, 2],
            "padding": 4
        }"#;
        let payload: JobPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.job_id, "ptv-1");
        assert_eq!(payload.contours.len(), 1);
        assert_eq!(payload.config.spacing, [1.0, 1.0, 2.0]);
        assert!(!payload.config.eclipse_fudge);
        match payload.operation {
            MarginRequest::Directional { is_outer, per_side } => {
                assert!(is_outer);
                assert!((per_side.left - 5.0).abs() < 1e-12);
                assert!((per_side.superior - 2.0).abs() < 1e-12);
                assert!(per_side.right.abs() < 1e-12);
            }
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn errors_are_classified() {
        let limit = JobFailure::from(MarginError::from(GridError::ResourceLimitExceeded {
            voxels: 10,
            limit: 5,
        }));
        assert_eq!(limit.kind, FailureKind::ResourceLimitExceeded);

        let bad = JobFailure::from(MarginError::from(OperationError::InvalidInput("x".into())));
        assert_eq!(bad.kind, FailureKind::InvalidInput);
        assert!(bad.message.contains("invalid input"));

        assert_eq!(JobFailure::cancelled().kind, FailureKind::Cancelled);
        let panicked = JobFailure::panicked("boom");
        assert_eq!(panicked.kind, FailureKind::Failed);
        assert!(panicked.message.contains("job panicked: boom"));
    }

    #[test]
    fn report_serializes_failure_kind() {
        let report = JobReport {
            job_id: "a".into(),
            result: Err(JobFailure::cancelled()),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"CANCELLED\""));
        assert!(json.contains("\"jobId\":\"a\""));
    }
}
