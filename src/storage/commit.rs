//! commit creation for the local Git host
//!
//! Every content change becomes one commit on the content branch. The commit
//! is created detached and the branch only moves afterwards, through
//! the compare-and-swap in `refs`.

use chrono::{DateTime, TimeZone, Utc};
use git2::Repository;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tree::TreeMutator;
use crate::storage::types::{CommitId, GitSignature, TreeId};

/// A commit as read back from the content repository.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let timestamp = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::from_oid(commit.id()),
            tree_id: TreeId::from_oid(commit.tree_id()),
            parent_ids: commit.parent_ids().map(CommitId::from_oid).collect(),
            message: commit.message().unwrap_or("").to_string(),
            timestamp,
        }
    }

    /// the `[kind] action slug` line
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// Fluent builder for a detached content commit.
///
/// The commit is written without touching any ref; callers publish it by
/// moving the branch.
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<TreeId>,
    parents: Vec<CommitId>,
    message: String,
    signature: GitSignature,
}

impl<'a> CommitBuilder<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            signature: GitSignature::folio(),
        }
    }

    pub fn tree(mut self, tree_id: TreeId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    /// replace the parent list, e.g. with the parents of a Git data API request
    pub fn parents(mut self, parents: Vec<CommitId>) -> Self {
        self.parents = parents;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn signature(mut self, signature: GitSignature) -> Self {
        self.signature = signature;
        self
    }

    pub fn commit(self) -> StorageResult<CommitId> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| StorageError::Internal("commit requires a tree".to_string()))?;

        let tree = self
            .repo
            .find_tree(tree_id.to_oid()?)
            .map_err(|_| StorageError::NotFound(format!("tree {}", tree_id)))?;
        let author = self.signature.to_git2_signature()?;

        let mut parents = Vec::with_capacity(self.parents.len());
        for id in &self.parents {
            let parent = self
                .repo
                .find_commit(id.to_oid()?)
                .map_err(|_| StorageError::NotFound(format!("commit {}", id)))?;
            parents.push(parent);
        }
        let parents: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let oid = self.repo.commit(None, &author, &author, &self.message, &tree, &parents)?;
        Ok(CommitId::from_oid(oid))
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: &CommitId) -> StorageResult<CommitInfo> {
    let commit = repo
        .find_commit(id.to_oid()?)
        .map_err(|_| StorageError::NotFound(format!("commit {}", id)))?;

    Ok(CommitInfo::from_git2(&commit))
}

/// create the root commit of a new content repository: an empty tree
pub fn create_initial_commit(repo: &Repository, signature: &GitSignature) -> StorageResult<CommitId> {
    let tree_id = TreeMutator::empty(repo).write()?;

    CommitBuilder::new(repo)
        .tree(tree_id)
        .message("[folio] initialize content repository")
        .signature(signature.clone())
        .commit()
}
