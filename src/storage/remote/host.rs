//! The primitive calls of a hosted Git content API and their wire types.
//!
//! The shapes follow the GitHub REST API (contents, refs, commits, trees,
//! blobs). [`crate::storage::GitRepository`] serves the same calls from a
//! repository on disk.

use serde::{Deserialize, Serialize};

use crate::storage::error::StorageResult;
use crate::storage::types::{BlobId, BranchName, CommitId, ContentPath, TreeId, VersionTag};

/// A file as returned by the contents API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentsFile {
    pub path: String,
    pub sha: VersionTag,
    /// base64, possibly wrapped with newlines
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

/// An entry of a directory listing from the contents API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentsEntry {
    pub name: String,
    pub path: String,
    pub sha: VersionTag,
    /// `file`, `dir`, `symlink` or `submodule`
    #[serde(rename = "type")]
    pub kind: String,
}

impl ContentsEntry {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

/// Body of a create-or-update contents call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PutContents {
    pub message: String,
    /// base64
    pub content: String,
    /// current version; required by the host when the file exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<VersionTag>,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteContents {
    pub message: String,
    pub sha: VersionTag,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: CommitId,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Response of a contents write or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentsWrite {
    /// the written file; null after a delete
    #[serde(default)]
    pub content: Option<ContentsEntry>,
    pub commit: CommitRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitObject {
    pub sha: CommitId,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub name: String,
    pub object: GitObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePointer {
    pub sha: TreeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentPointer {
    pub sha: CommitId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCommit {
    pub sha: CommitId,
    pub tree: TreePointer,
    #[serde(default)]
    pub parents: Vec<ParentPointer>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    /// octal, e.g. `100644`
    pub mode: String,
    /// `blob`, `tree` or `commit`
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitTree {
    pub sha: TreeId,
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    /// the host cut a recursive listing short
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBlob {
    pub content: String,
    /// `utf-8` or `base64`
    pub encoding: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub sha: BlobId,
}

/// One override in a tree creation request.
///
/// `sha: None` serializes as `null`, which removes the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTree {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_tree: Option<TreeId>,
    pub tree: Vec<NewTreeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCommit {
    pub message: String,
    pub tree: TreeId,
    pub parents: Vec<CommitId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateRef {
    pub sha: CommitId,
    pub force: bool,
}

/// Primitive operations of a Git content host.
///
/// Contents calls are conditional: a write or delete carrying a stale `sha`
/// fails with [`crate::storage::StorageError::Conflict`]. `update_ref`
/// without `force` only accepts fast-forwards.
pub trait GitHost: Send + Sync {
    /// e.g. `owner/repo` or a repository path
    fn describe(&self) -> String;

    fn check_access(&self) -> StorageResult<()>;

    /// `None` when the file does not exist on `branch`
    fn get_contents(&self, path: &ContentPath, branch: &BranchName) -> StorageResult<Option<ContentsFile>>;

    /// a missing directory lists as empty
    fn list_contents(&self, dir: &ContentPath, branch: &BranchName) -> StorageResult<Vec<ContentsEntry>>;

    fn put_contents(&self, path: &ContentPath, request: &PutContents) -> StorageResult<ContentsWrite>;

    fn delete_contents(&self, path: &ContentPath, request: &DeleteContents) -> StorageResult<ContentsWrite>;

    fn get_ref(&self, branch: &BranchName) -> StorageResult<GitRef>;

    fn get_commit(&self, sha: &CommitId) -> StorageResult<GitCommit>;

    fn get_tree(&self, sha: &TreeId, recursive: bool) -> StorageResult<GitTree>;

    fn create_blob(&self, blob: &NewBlob) -> StorageResult<BlobRef>;

    fn create_tree(&self, tree: &NewTree) -> StorageResult<GitTree>;

    fn create_commit(&self, commit: &NewCommit) -> StorageResult<GitCommit>;

    fn update_ref(&self, branch: &BranchName, update: &UpdateRef) -> StorageResult<GitRef>;
}
