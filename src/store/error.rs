//! Error taxonomy seen by callers of the content store.

use thiserror::Error;

use crate::content::{ContentError, InvalidSlug};
use crate::storage::StorageError;

/// What an operator has to do when content cannot be persisted at all.
pub const PERSIST_REMEDIATION: &str = "configure GITHUB_OWNER, GITHUB_REPO and GITHUB_TOKEN for this environment";

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// every violation found in the payload
    #[error("validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error(transparent)]
    InvalidSlug(#[from] InvalidSlug),

    /// writes are impossible in this environment until it is reconfigured
    #[error("cannot persist content: {reason}; {remediation}")]
    CannotPersist { reason: String, remediation: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// changed by someone else since it was read; re-read before retrying
    #[error("conflict at {path}: {reason}")]
    Conflict { path: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown content kind '{0}'")]
    UnknownKind(String),

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(StorageError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Only transport failures are worth retrying as-is.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }

    pub(crate) fn validation(errors: Vec<String>) -> Self {
        StoreError::Validation { errors }
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ReadOnly(path) => StoreError::CannotPersist {
                reason: format!("the content directory {} is read-only", path.display()),
                remediation: PERSIST_REMEDIATION.to_string(),
            },
            StorageError::NotConfigured(detail) => StoreError::CannotPersist {
                reason: format!("remote storage is not configured ({})", detail),
                remediation: PERSIST_REMEDIATION.to_string(),
            },
            StorageError::NotFound(what) => StoreError::NotFound(what),
            StorageError::Unauthorized(detail) => StoreError::Unauthorized(detail),
            StorageError::Forbidden(detail) => StoreError::Forbidden(detail),
            StorageError::Conflict { path, reason } => StoreError::Conflict { path, reason },
            StorageError::Transport(detail) => StoreError::Transport(detail),
            StorageError::Content(ContentError::InvalidSlug(slug)) => StoreError::InvalidSlug(slug),
            other => StoreError::Storage(other),
        }
    }
}

impl From<ContentError> for StoreError {
    fn from(err: ContentError) -> Self {
        StoreError::from(StorageError::from(err))
    }
}
