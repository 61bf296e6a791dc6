//! core value types shared by the storage backends.

use std::fmt;
use std::path::{Path, PathBuf};

use git2::{ObjectType, Oid};
use serde::{Deserialize, Serialize};

use crate::content::{Document, Slug};
use crate::storage::error::{StorageError, StorageResult};

/// A repository-relative, forward-slash path under the content tree.
///
/// Built from [`Slug`]s and fixed document names; arbitrary input has to pass
/// [`ContentPath::new`], which refuses empty, `.` and `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContentPath(String);

impl ContentPath {
    pub const CONTENT_DIR: &'static str = "content";
    pub const BLOG_DIR: &'static str = "content/blog";

    pub fn new(raw: impl Into<String>) -> StorageResult<Self> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && !raw.contains('\\')
            && raw
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

        if !valid {
            return Err(StorageError::InvalidPath(raw));
        }
        Ok(Self(raw))
    }

    pub fn blog_dir() -> Self {
        Self(Self::BLOG_DIR.to_string())
    }

    /// `content/blog/<slug>.md`
    pub fn blog_post(slug: &Slug) -> Self {
        Self(format!("{}/{}.md", Self::BLOG_DIR, slug))
    }

    /// `content/<document>.json`
    pub fn document(document: Document) -> Self {
        Self(format!("{}/{}", Self::CONTENT_DIR, document.file_name()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// last path segment
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Join onto a filesystem root one segment at a time.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContentPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque content-derived version of a stored file.
///
/// Equal to the Git blob hash of the file's bytes, so a tag computed locally
/// matches the one a Git host reports for the same content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn of_bytes(bytes: &[u8]) -> StorageResult<Self> {
        let oid = Oid::hash_object(ObjectType::Blob, bytes)?;
        Ok(Self(oid.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(hex: impl Into<String>) -> Self {
                Self(hex.into())
            }

            pub(crate) fn from_oid(oid: Oid) -> Self {
                Self(oid.to_string())
            }

            pub(crate) fn to_oid(&self) -> StorageResult<Oid> {
                Ok(Oid::from_str(&self.0)?)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// short form of the id
            pub fn short(&self) -> &str {
                &self.0[..self.0.len().min(7)]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

object_id!(
    /// Git commit identifier, hex encoded
    CommitId
);
object_id!(
    /// Git tree identifier
    TreeId
);
object_id!(
    /// Git blob identifier
    BlobId
);

/// a branch on the content repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName(String);

impl BranchName {
    pub const MAIN: &'static str = "main";

    pub fn new(name: impl Into<String>) -> StorageResult<Self> {
        let name = name.into();
        if name.is_empty()
            || name.contains("..")
            || name.starts_with('/')
            || name.ends_with('/')
            || name.chars().any(|c| c.is_whitespace() || c == '\\')
        {
            return Err(StorageError::InvalidPath(name));
        }
        Ok(Self(name))
    }

    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    /// full ref path, e.g. `refs/heads/main`
    pub fn as_ref_path(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BranchName {
    fn default() -> Self {
        Self::main()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// git signature (author/committer info)
#[derive(Debug, Clone)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn folio() -> Self {
        Self::new("folio", "folio@localhost")
    }

    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl Default for GitSignature {
    fn default() -> Self {
        Self::folio()
    }
}

/// Result of a committed write on a Git host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitDescriptor {
    pub sha: CommitId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    /// version of the written file, when the host reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_version: Option<VersionTag>,
}

/// A path together with the version observed when it was read.
///
/// `version: None` means the file did not exist at read time; writing through
/// such a handle only succeeds if it still doesn't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileHandle {
    pub path: ContentPath,
    pub version: Option<VersionTag>,
}

/// Optimistic concurrency guard for a write or delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Precondition {
    /// write whatever is there now
    #[default]
    Any,
    /// the file must currently be at this version (`None`: must be absent)
    Expect(Option<VersionTag>),
}

impl Precondition {
    pub fn check(&self, path: &ContentPath, current: Option<&VersionTag>) -> StorageResult<()> {
        let Precondition::Expect(expected) = self else {
            return Ok(());
        };

        if expected.as_ref() == current {
            return Ok(());
        }

        let reason = match (expected, current) {
            (None, Some(found)) => format!("file already exists at version {}", found),
            (Some(wanted), None) => format!("expected version {} but the file is gone", wanted),
            (Some(wanted), Some(found)) => format!("expected version {} but found {}", wanted, found),
            (None, None) => return Ok(()),
        };

        Err(StorageError::Conflict {
            path: path.to_string(),
            reason,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    Write(String),
    Delete,
}

/// One entry of a multi-file commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: ContentPath,
    pub action: FileAction,
    pub expected: Precondition,
}

impl FileChange {
    pub fn write(path: ContentPath, content: impl Into<String>) -> Self {
        Self {
            path,
            action: FileAction::Write(content.into()),
            expected: Precondition::Any,
        }
    }

    pub fn delete(path: ContentPath) -> Self {
        Self {
            path,
            action: FileAction::Delete,
            expected: Precondition::Any,
        }
    }

    pub fn expecting(mut self, expected: Precondition) -> Self {
        self.expected = expected;
        self
    }
}

/// A file read from a backend together with its current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: String,
    pub version: VersionTag,
}

/// What a successful single-file write reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub version: VersionTag,
    /// set when the write became a commit on a Git host
    pub commit: Option<CommitDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}
