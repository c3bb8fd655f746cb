use crate::remote::RemoteError;
use crate::report::DatapointOutcome;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for binary-level code that only reports errors.
pub type BumpResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Why processing of a single datapoint stopped early.
#[derive(Debug, Error)]
pub enum DatapointError {
    #[error("build timed out after {}s", .0.as_secs())]
    ReproductionTimeout(Duration),
    #[error("build failed but no diagnostics could be extracted from its log")]
    UnparseableLog,
    #[error("remote infrastructure failure: {0}")]
    RemoteInfrastructure(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DatapointError {
    pub fn outcome(&self) -> DatapointOutcome {
        match self {
            DatapointError::ReproductionTimeout(_) => DatapointOutcome::Timeout,
            DatapointError::UnparseableLog => DatapointOutcome::UnparseableLog,
            DatapointError::RemoteInfrastructure(_) | DatapointError::Io(_) => {
                DatapointOutcome::InfrastructureFailure
            }
        }
    }
}

impl From<RemoteError> for DatapointError {
    fn from(error: RemoteError) -> DatapointError {
        match error {
            RemoteError::Timeout(timeout) => DatapointError::ReproductionTimeout(timeout),
            RemoteError::Infrastructure(message) => DatapointError::RemoteInfrastructure(message),
            RemoteError::Io(e) => DatapointError::Io(e),
        }
    }
}
