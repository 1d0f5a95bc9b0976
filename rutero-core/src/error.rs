use crate::repository::StoreError;

/// Business error taxonomy shared by the generation and reservation paths.
///
/// Expected conditions (a seat already held, a lapsed hold) are values here,
/// never panics; only the `Storage` variant represents a systemic failure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("hold expired: {0}")]
    Expired(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("route template misconfigured: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => CoreError::NotFound(what),
            StoreError::Backend(msg) => CoreError::Storage(msg),
        }
    }
}
