use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::error::StoreError;
use crate::stages::Stage;
use crate::store::JobId;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Job {job_id} cannot move from {from} to {to}: {reason}")]
    InvalidTransition {
        job_id: JobId,
        from: String,
        to: String,
        reason: String,
    },

    #[error("Job {0} not found")]
    JobNotFound(JobId),

    #[error("Invalid job data: {0}")]
    InvalidJob(String),

    #[error("Store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => LifecycleError::JobNotFound(id),
            StoreError::Conflict {
                job_id,
                expected,
                found,
            } => LifecycleError::InvalidTransition {
                job_id,
                from: found,
                to: expected,
                reason: "job was changed by another writer".to_string(),
            },
            other => LifecycleError::Store(other),
        }
    }
}

/// Data drift found and repaired while a transition went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LifecycleWarning {
    /// Nothing was open, so nothing was closed before opening the next interval.
    NoOpenInterval { job_id: JobId },
    /// Several intervals were open; all of them were closed.
    MultipleOpenIntervals { job_id: JobId, count: usize },
    /// A paused job had no usable previous stage and resumed into the fallback.
    MissingPreviousStage { job_id: JobId, fallback: Stage },
    /// A stored stage name is not part of the production order.
    UnrecognizedStage { job_id: JobId, name: String },
}

impl fmt::Display for LifecycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleWarning::NoOpenInterval { job_id } => {
                write!(f, "job {} had no open interval", job_id)
            }
            LifecycleWarning::MultipleOpenIntervals { job_id, count } => {
                write!(f, "job {} had {} open intervals", job_id, count)
            }
            LifecycleWarning::MissingPreviousStage { job_id, fallback } => write!(
                f,
                "job {} had no previous stage recorded, resumed into {}",
                job_id, fallback
            ),
            LifecycleWarning::UnrecognizedStage { job_id, name } => {
                write!(f, "job {} references unknown stage '{}'", job_id, name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_job_not_found() {
        let err: LifecycleError = StoreError::NotFound(12).into();
        assert!(matches!(err, LifecycleError::JobNotFound(12)));

        let err: LifecycleError = StoreError::Conflict {
            job_id: 3,
            expected: "Printing".into(),
            found: "Paused".into(),
        }
        .into();
        assert!(matches!(err, LifecycleError::InvalidTransition { job_id: 3, .. }));

        let err: LifecycleError = StoreError::Unavailable("disk full".into()).into();
        assert!(matches!(err, LifecycleError::Store(_)));
        assert_eq!(err.to_string(), "Store failure: Store unavailable: disk full");
    }

    #[test]
    fn test_warning_display() {
        let warning = LifecycleWarning::MissingPreviousStage {
            job_id: 4,
            fallback: Stage::Printing,
        };
        assert_eq!(
            warning.to_string(),
            "job 4 had no previous stage recorded, resumed into Printing"
        );
    }

    #[test]
    fn test_warning_json() {
        let json = serde_json::to_value(LifecycleWarning::MultipleOpenIntervals {
            job_id: 2,
            count: 3,
        })
        .unwrap();
        assert_eq!(json["kind"], "multipleOpenIntervals");
        assert_eq!(json["jobId"], 2);
    }
}
