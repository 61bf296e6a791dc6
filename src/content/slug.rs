//! Slug sanitizing and validation.
//!
//! Slugs end up as file names in the local content directory and as path
//! segments in remote API calls, so every storage operation goes through
//! [`Slug`]. Raw strings are never joined onto a path.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a raw identifier cannot become a [`Slug`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid slug '{raw}': only lowercase letters, digits and hyphens are allowed")]
pub struct InvalidSlug {
    pub raw: String,
}

/// A validated slug: non-empty, `[a-z0-9-]` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Sanitize then validate a caller-supplied identifier.
    pub fn parse(raw: &str) -> Result<Self, InvalidSlug> {
        let candidate = sanitize(raw);
        if !validate(&candidate) {
            return Err(InvalidSlug { raw: raw.to_string() });
        }
        Ok(Self(candidate))
    }

    /// Derive a slug from a human title.
    pub fn from_title(title: &str) -> Result<Self, InvalidSlug> {
        let generated = generate_slug(title);
        if !validate(&generated) {
            return Err(InvalidSlug { raw: title.to_string() });
        }
        Ok(Self(generated))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = InvalidSlug;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

/// Strip path traversal sequences and anything outside `[A-Za-z0-9._-]`.
///
/// Removal repeats until stable: dropping a `/` from `./.` would otherwise
/// leave a fresh `..` behind.
pub fn sanitize(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    while out.contains("..") {
        out = out.replace("..", "");
    }

    out
}

/// Final gate before any storage operation: `^[a-z0-9-]+$`.
pub fn validate(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Build a slug from free text.
///
/// Lower-cases and trims, drops everything but ASCII word characters,
/// whitespace and hyphens, collapses separator runs into one hyphen and trims
/// hyphens from both ends. The result may be empty.
pub fn generate_slug(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_separator = false;

    for c in lowered.trim().chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_separator = true;
        } else if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.push(c);
        }
        // anything else is punctuation and vanishes without splitting words
    }

    out
}
