//! Storage layer error types
//!
//! Every backend (local files, GitHub, a local Git repository) reports
//! failures through [`StorageError`]. Variants carry an explicit kind so
//! callers never have to inspect message text.

use std::path::PathBuf;

use thiserror::Error;

use crate::content::ContentError;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// remote credentials or repository coordinates are missing
    #[error("remote storage not configured: {0}")]
    NotConfigured(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// the file (or branch) changed since it was read
    #[error("conflict at {path}: {reason}")]
    Conflict { path: String, reason: String },

    /// the content directory cannot be written
    #[error("read-only filesystem: {}", .0.display())]
    ReadOnly(PathBuf),

    /// network failure, timeout or 5xx from the host
    #[error("transport error: {0}")]
    Transport(String),

    /// any other 4xx from the host
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid path: '{0}'")]
    InvalidPath(String),

    #[error("unexpected entry type at {path}: expected {expected}, found {found}")]
    UnexpectedEntryType {
        path: String,
        expected: String,
        found: String,
    },

    #[error("nothing to commit")]
    EmptyCommit,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("invalid base64 content: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("invalid utf-8 in file content: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// check if this error is a conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }

    /// check if the same call may succeed when repeated unchanged.
    ///
    /// A conflict is not retriable: the caller has to re-read first.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StorageError::Transport(_))
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
