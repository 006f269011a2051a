use shared::{
    domain::{ContactId, Mode},
    error::{ApiError, ErrorCode},
    validation::ValidationErrors,
};
use storage::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("cannot {action} while {from}")]
    IllegalTransition { from: Mode, action: &'static str },
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("contact {0} is not loaded")]
    NotFound(ContactId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no tokio runtime available for filter timers")]
    NoRuntime,
}

impl ControllerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::IllegalTransition { .. } => ErrorCode::IllegalTransition,
            Self::Validation(_) => ErrorCode::Validation,
            Self::NotFound(_) | Self::Store(StoreError::NotFound(_)) => ErrorCode::NotFound,
            Self::Store(StoreError::Transient { .. }) => ErrorCode::Transient,
            Self::Store(StoreError::DuplicateId(_)) | Self::NoRuntime => ErrorCode::Internal,
        }
    }
}

impl From<&ControllerError> for ApiError {
    fn from(value: &ControllerError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;
