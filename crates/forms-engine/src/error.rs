//! Error types for the forms engine

use thiserror::Error;

use crate::application::{ActionError, ScheduleError, SessionError};
use crate::domain::aggregates::SchemaError;
use crate::domain::services::VersionError;
use crate::ports::inbound::UseCaseError;
use crate::ports::outbound::{RepositoryError, UploadError};

/// Any failure the engine can surface to a host
#[derive(Error, Debug)]
pub enum FormsError {
    /// Illegal nesting, naming or edit of a published form
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Illegal lineage transition
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    UseCase(#[from] UseCaseError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the forms engine
pub type FormsResult<T> = Result<T, FormsError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_twice() -> FormsResult<()> {
        let second: Result<(), VersionError> = Err(VersionError::NotDraft);
        second?;
        Ok(())
    }

    #[test]
    fn test_layer_errors_convert() {
        let err = publish_twice().unwrap_err();
        assert!(matches!(err, FormsError::Version(VersionError::NotDraft)));
        assert_eq!(err.to_string(), "form is not a draft");
    }
}
