//! storage layer for folio
//!
//! Two interchangeable backends persist content files: the local filesystem
//! and a Git host reached through its contents and Git data APIs. The facade
//! in [`crate::store`] only sees the [`ContentBackend`] trait.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────┐
//!                    │    ContentBackend    │
//!                    └──────────────────────┘
//!                      │                  │
//!                      ▼                  ▼
//!            ┌────────────────┐   ┌────────────────┐
//!            │ LocalFileStore │   │  RemoteClient  │
//!            └────────────────┘   └────────────────┘
//!                                         │ GitHost
//!                                ┌────────┴────────┐
//!                                ▼                 ▼
//!                         ┌────────────┐   ┌───────────────┐
//!                         │ GithubHost │   │ GitRepository │
//!                         └────────────┘   └───────────────┘
//!                                            tree · commit · refs
//! ```

mod commit;
mod error;
pub mod local;
mod refs;
pub mod remote;
mod repository;
mod tree;
mod types;

pub use commit::CommitInfo;
pub use error::{StorageError, StorageResult};
pub use local::LocalFileStore;
pub use remote::{GitHost, GithubConfig, GithubHost, RemoteClient, RemoteFile};
pub use repository::GitRepository;
pub use types::{
    BackendKind, BlobId, BranchName, CommitDescriptor, CommitId, ContentPath, FileAction,
    FileChange, GitSignature, Precondition, RemoteFileHandle, StoredFile, TreeId, VersionTag,
    WriteReceipt,
};

/// Capability shared by every persistence backend.
///
/// Paths are repository-relative; `message` is used as the commit message by
/// backends that commit and ignored by the others.
pub trait ContentBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// human-readable target, e.g. a directory or `owner/repo@branch`
    fn describe(&self) -> String;

    fn writable(&self) -> bool {
        true
    }

    fn read(&self, path: &ContentPath) -> StorageResult<Option<StoredFile>>;

    fn write(
        &self,
        path: &ContentPath,
        content: &str,
        expected: Precondition,
        message: &str,
    ) -> StorageResult<WriteReceipt>;

    fn delete(&self, path: &ContentPath, expected: Precondition, message: &str) -> StorageResult<()>;

    /// file names directly inside `dir`
    fn list(&self, dir: &ContentPath) -> StorageResult<Vec<String>>;

    /// Apply several changes. Backends that can commit atomically override
    /// this; the default applies them one by one.
    fn write_many(&self, changes: &[FileChange], message: &str) -> StorageResult<()> {
        if changes.is_empty() {
            return Err(StorageError::EmptyCommit);
        }
        for change in changes {
            match &change.action {
                FileAction::Write(content) => {
                    self.write(&change.path, content, change.expected.clone(), message)?;
                }
                FileAction::Delete => self.delete(&change.path, change.expected.clone(), message)?,
            }
        }
        Ok(())
    }

    /// verify the backend is reachable with the configured credentials
    fn check(&self) -> StorageResult<()> {
        Ok(())
    }
}
