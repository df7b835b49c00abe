use thiserror::Error;

use crate::dao::DaoError;
use crate::media::ExternalError;

#[derive(Debug, Error)]
pub enum MeetingError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("External service failure: {0}")]
    ExternalFailure(#[from] ExternalError),
    #[error("Passcode hashing failed: {0}")]
    Passcode(String),
    #[error("Store error: {0}")]
    Store(DaoError),
}

impl From<DaoError> for MeetingError {
    fn from(e: DaoError) -> Self {
        match e {
            DaoError::NotFound => MeetingError::NotFound("Resource"),
            other => MeetingError::Store(other),
        }
    }
}

pub type MeetingResult<T> = Result<T, MeetingError>;
