//! commit messages for content changes
//!
//! Local writes ignore them; on a Git host they are the history of the site.

use std::fmt;

use crate::store::api::EntityKind;

/// A formatted commit message, e.g. `[blog] save hello-world`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage(String);

impl CommitMessage {
    pub fn save(kind: EntityKind, slug: Option<&str>) -> Self {
        Self::format(kind, "save", slug)
    }

    pub fn delete(kind: EntityKind, slug: Option<&str>) -> Self {
        Self::format(kind, "delete", slug)
    }

    pub fn batch(count: usize) -> Self {
        Self(format!("[batch] save {} {}", count, if count == 1 { "entry" } else { "entries" }))
    }

    pub fn migrate_case_studies(count: usize) -> Self {
        Self(format!("[portfolio] migrate {} case studies", count))
    }

    fn format(kind: EntityKind, verb: &str, slug: Option<&str>) -> Self {
        match slug {
            Some(slug) => Self(format!("[{}] {} {}", kind.tag(), verb, slug)),
            None => Self(format!("[{}] {}", kind.tag(), verb)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
