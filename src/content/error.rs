//! Errors raised while decoding content records.

use thiserror::Error;

use crate::content::slug::InvalidSlug;

/// Result type alias for content decoding.
pub type ContentResult<T> = Result<T, ContentError>;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("invalid frontmatter: {0}")]
    Frontmatter(#[source] serde_yaml::Error),

    #[error("invalid json document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidSlug(#[from] InvalidSlug),
}
