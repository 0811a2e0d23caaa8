use std::result;

use thiserror::Error;

use crate::{market::error::MarketStateError, util::PanicPayload};

/// Failure of the execution boundary a job runs in, as opposed to a failure of the job's logic.
///
/// Jobs that manage their own boundary (a subprocess, for instance) can return
/// [`IsolationFault::Crashed`] as their error to have it reported as an isolation fault.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IsolationFault {
    #[error("Job panicked: {0}")]
    Panicked(PanicPayload),

    #[error("Isolated context was terminated before the job completed")]
    Terminated,

    #[error("Isolated context crashed: {0}")]
    Crashed(String),
}

#[derive(Error, Debug)]
pub enum SyncJobError {
    #[error("[Isolation] {0}")]
    Isolation(#[from] IsolationFault),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("[InvalidResult] {0}")]
    InvalidResult(#[from] MarketStateError),
}

impl SyncJobError {
    pub(crate) fn from_job_error(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match err.downcast::<IsolationFault>() {
            Ok(fault) => Self::Isolation(*fault),
            Err(err) => Self::JobFailed(err.to_string()),
        }
    }

    /// Returns `true` if the execution boundary failed, rather than the job's own logic.
    pub fn is_isolation_fault(&self) -> bool {
        matches!(self, Self::Isolation(_))
    }
}

pub(crate) type JobResult<T> = result::Result<T, SyncJobError>;
