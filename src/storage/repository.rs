//! A Git repository on disk acting as a content host.
//!
//! [`GitRepository`] wraps `git2::Repository` and answers every [`GitHost`]
//! call locally, with the same conditional semantics as the hosted API: a
//! stale `sha` is a conflict and a ref only fast-forwards unless forced. It
//! backs the remote mode for self-hosted content repositories and for tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use git2::{FileMode, ObjectType, Oid, Repository, Tree};
use parking_lot::Mutex;
use tracing::debug;

use crate::storage::commit::{self, CommitBuilder, CommitInfo};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::refs::RefManager;
use crate::storage::remote::host::{
    BlobRef, CommitRef, ContentsEntry, ContentsFile, ContentsWrite, DeleteContents, GitCommit,
    GitHost, GitObject, GitRef, GitTree, NewBlob, NewCommit, NewTree, ParentPointer, PutContents,
    TreeEntry, TreePointer, UpdateRef,
};
use crate::storage::tree::{self, TreeMutator};
use crate::storage::types::{
    BlobId, BranchName, CommitId, ContentPath, GitSignature, Precondition, TreeId, VersionTag,
};

/// The local Git host.
///
/// Clone this to share across threads - it uses Arc internally. Every call
/// holds the repository lock for its whole read-check-commit sequence.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
    signature: GitSignature,
}

struct GitRepositoryInner {
    repo: Mutex<Repository>,
    path: PathBuf,
}

impl GitRepository {
    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path)
            .map_err(|_| StorageError::NotConfigured(format!("no git repository at {}", path.display())))?;

        Ok(Self::wrap(repo, path))
    }

    /// Initialize a repository whose `main` branch holds one empty commit.
    pub fn init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repository = Self::wrap(Repository::init(path)?, path);

        repository.with_repo(|repo| {
            let commit_id = commit::create_initial_commit(repo, &repository.signature)?;
            RefManager::init_main_branch(repo, &commit_id)
        })?;

        debug!(path = %path.display(), "initialized content repository");
        Ok(repository)
    }

    pub fn open_or_init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open(path)
        } else {
            Self::init(path)
        }
    }

    fn wrap(repo: Repository, path: &Path) -> Self {
        Self {
            inner: Arc::new(GitRepositoryInner {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
            }),
            signature: GitSignature::folio(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Author and committer of the commits this handle creates.
    pub fn with_signature(mut self, signature: GitSignature) -> Self {
        self.signature = signature;
        self
    }

    /// Run `f` with exclusive access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    // ==================== Inspection ====================

    pub fn head(&self, branch: &BranchName) -> StorageResult<CommitId> {
        self.with_repo(|repo| RefManager::resolve_branch(repo, branch))
    }

    pub fn commit_info(&self, id: &CommitId) -> StorageResult<CommitInfo> {
        self.with_repo(|repo| commit::get_commit(repo, id))
    }

    /// Commits reachable from `branch`, newest first.
    pub fn history(&self, branch: &BranchName, limit: usize) -> StorageResult<Vec<CommitInfo>> {
        self.with_repo(|repo| {
            let head = RefManager::resolve_branch(repo, branch)?;
            let mut walk = repo.revwalk()?;
            walk.push(head.to_oid()?)?;

            let mut commits = Vec::new();
            for oid in walk.take(limit) {
                commits.push(CommitInfo::from_git2(&repo.find_commit(oid?)?));
            }
            Ok(commits)
        })
    }

    // ==================== Contents Helpers ====================

    /// Commit a single-path edit on `branch`, moving it only if it is still at `head`.
    fn commit_edit(
        &self,
        repo: &Repository,
        branch: &BranchName,
        head: &CommitId,
        tree_id: TreeId,
        message: &str,
    ) -> StorageResult<CommitId> {
        let commit_id = CommitBuilder::new(repo)
            .tree(tree_id)
            .parent(head.clone())
            .message(message)
            .signature(self.signature.clone())
            .commit()?;

        RefManager::update_branch_if_unchanged(repo, branch, head, &commit_id)?;
        Ok(commit_id)
    }
}

fn branch_tree<'repo>(repo: &'repo Repository, branch: &BranchName) -> StorageResult<(CommitId, Tree<'repo>)> {
    let head = RefManager::resolve_branch(repo, branch)?;
    let tree = repo.find_commit(head.to_oid()?)?.tree()?;
    Ok((head, tree))
}

fn describe_tree(repo: &Repository, id: &TreeId, recursive: bool) -> StorageResult<GitTree> {
    let tree = repo
        .find_tree(id.to_oid()?)
        .map_err(|_| StorageError::NotFound(format!("tree {}", id)))?;

    let entries = tree::flatten(&tree, recursive)?
        .into_iter()
        .map(|entry| TreeEntry {
            mode: entry.mode_string(),
            kind: entry.kind.str().to_string(),
            sha: entry.id.to_string(),
            path: entry.path,
        })
        .collect();

    Ok(GitTree {
        sha: id.clone(),
        tree: entries,
        truncated: false,
    })
}

fn describe_commit(info: CommitInfo) -> GitCommit {
    GitCommit {
        sha: info.id,
        tree: TreePointer { sha: info.tree_id },
        parents: info.parent_ids.into_iter().map(|sha| ParentPointer { sha }).collect(),
        message: info.message,
        html_url: None,
    }
}

fn rejected(message: String) -> StorageError {
    StorageError::Rejected { status: 422, message }
}

impl GitHost for GitRepository {
    fn describe(&self) -> String {
        format!("git:{}", self.inner.path.display())
    }

    fn check_access(&self) -> StorageResult<()> {
        self.with_repo(|repo| {
            repo.head()
                .map_err(|_| StorageError::NotFound(format!("HEAD of {}", self.inner.path.display())))?;
            Ok(())
        })
    }

    fn get_contents(&self, path: &ContentPath, branch: &BranchName) -> StorageResult<Option<ContentsFile>> {
        self.with_repo(|repo| {
            let (_, tree) = branch_tree(repo, branch)?;
            let Some((oid, _)) = tree::blob_at(&tree, path.as_str())? else {
                return Ok(None);
            };

            let blob = repo.find_blob(oid)?;
            Ok(Some(ContentsFile {
                path: path.to_string(),
                sha: VersionTag::new(oid.to_string()),
                content: STANDARD.encode(blob.content()),
                encoding: "base64".to_string(),
            }))
        })
    }

    fn list_contents(&self, dir: &ContentPath, branch: &BranchName) -> StorageResult<Vec<ContentsEntry>> {
        self.with_repo(|repo| {
            let (_, tree) = branch_tree(repo, branch)?;
            let Some(subtree) = tree::subtree_at(repo, &tree, dir.as_str())? else {
                return Ok(Vec::new());
            };

            let entries = tree::flatten(&subtree, false)?
                .into_iter()
                .map(|entry| ContentsEntry {
                    path: format!("{}/{}", dir, entry.path),
                    sha: VersionTag::new(entry.id.to_string()),
                    kind: match entry.kind {
                        ObjectType::Tree => "dir",
                        ObjectType::Commit => "submodule",
                        _ => "file",
                    }
                    .to_string(),
                    name: entry.path,
                })
                .collect();
            Ok(entries)
        })
    }

    fn put_contents(&self, path: &ContentPath, request: &PutContents) -> StorageResult<ContentsWrite> {
        let branch = BranchName::new(request.branch.as_str())?;
        let bytes = STANDARD.decode(request.content.as_bytes())?;

        self.with_repo(|repo| {
            let (head, tree) = branch_tree(repo, &branch)?;
            let current = tree::blob_at(&tree, path.as_str())?;
            let current_version = current.map(|(oid, _)| VersionTag::new(oid.to_string()));
            Precondition::Expect(request.sha.clone()).check(path, current_version.as_ref())?;

            let oid = repo.blob(&bytes)?;
            let mode = current.map_or(FileMode::Blob.into(), |(_, mode)| mode);

            let mut mutator = TreeMutator::from_tree(repo, &tree);
            mutator.upsert(path.as_str(), oid, mode);
            let tree_id = mutator.write()?;
            let commit_id = self.commit_edit(repo, &branch, &head, tree_id, &request.message)?;

            Ok(ContentsWrite {
                content: Some(ContentsEntry {
                    name: path.file_name().to_string(),
                    path: path.to_string(),
                    sha: VersionTag::new(oid.to_string()),
                    kind: "file".to_string(),
                }),
                commit: CommitRef {
                    sha: commit_id,
                    html_url: None,
                },
            })
        })
    }

    fn delete_contents(&self, path: &ContentPath, request: &DeleteContents) -> StorageResult<ContentsWrite> {
        let branch = BranchName::new(request.branch.as_str())?;

        self.with_repo(|repo| {
            let (head, tree) = branch_tree(repo, &branch)?;
            let Some((oid, _)) = tree::blob_at(&tree, path.as_str())? else {
                return Err(StorageError::NotFound(path.to_string()));
            };
            let current = VersionTag::new(oid.to_string());
            Precondition::Expect(Some(request.sha.clone())).check(path, Some(&current))?;

            let mut mutator = TreeMutator::from_tree(repo, &tree);
            mutator.remove(path.as_str());
            let tree_id = mutator.write()?;
            let commit_id = self.commit_edit(repo, &branch, &head, tree_id, &request.message)?;

            Ok(ContentsWrite {
                content: None,
                commit: CommitRef {
                    sha: commit_id,
                    html_url: None,
                },
            })
        })
    }

    fn get_ref(&self, branch: &BranchName) -> StorageResult<GitRef> {
        let sha = self.head(branch)?;
        Ok(GitRef {
            name: branch.as_ref_path(),
            object: GitObject {
                sha,
                kind: "commit".to_string(),
            },
        })
    }

    fn get_commit(&self, sha: &CommitId) -> StorageResult<GitCommit> {
        Ok(describe_commit(self.commit_info(sha)?))
    }

    fn get_tree(&self, sha: &TreeId, recursive: bool) -> StorageResult<GitTree> {
        self.with_repo(|repo| describe_tree(repo, sha, recursive))
    }

    fn create_blob(&self, blob: &NewBlob) -> StorageResult<BlobRef> {
        let bytes = match blob.encoding.as_str() {
            "base64" => STANDARD.decode(blob.content.as_bytes())?,
            "utf-8" | "utf8" => blob.content.as_bytes().to_vec(),
            other => return Err(rejected(format!("unsupported blob encoding '{}'", other))),
        };

        self.with_repo(|repo| {
            let oid = repo.blob(&bytes)?;
            Ok(BlobRef {
                sha: BlobId::from_oid(oid),
            })
        })
    }

    fn create_tree(&self, request: &NewTree) -> StorageResult<GitTree> {
        self.with_repo(|repo| {
            let base = match &request.base_tree {
                Some(id) => Some(
                    repo.find_tree(id.to_oid()?)
                        .map_err(|_| rejected(format!("base tree {} does not exist", id)))?,
                ),
                None => None,
            };

            let mut mutator = match &base {
                Some(base) => TreeMutator::from_tree(repo, base),
                None => TreeMutator::empty(repo),
            };

            for entry in &request.tree {
                ContentPath::new(entry.path.as_str())?;
                match &entry.sha {
                    Some(sha) => {
                        let oid = Oid::from_str(sha).map_err(|_| rejected(format!("invalid object id '{}'", sha)))?;
                        let mode = i32::from_str_radix(&entry.mode, 8)
                            .map_err(|_| rejected(format!("invalid mode '{}' for {}", entry.mode, entry.path)))?;
                        mutator.upsert(&entry.path, oid, mode);
                    }
                    None => mutator.remove(&entry.path),
                }
            }

            let tree_id = mutator.write()?;
            describe_tree(repo, &tree_id, false)
        })
    }

    fn create_commit(&self, request: &NewCommit) -> StorageResult<GitCommit> {
        self.with_repo(|repo| {
            let commit_id = CommitBuilder::new(repo)
                .tree(request.tree.clone())
                .parents(request.parents.clone())
                .message(request.message.as_str())
                .signature(self.signature.clone())
                .commit()?;

            Ok(describe_commit(commit::get_commit(repo, &commit_id)?))
        })
    }

    fn update_ref(&self, branch: &BranchName, update: &UpdateRef) -> StorageResult<GitRef> {
        self.with_repo(|repo| RefManager::update_branch(repo, branch, &update.sha, update.force))?;
        self.get_ref(branch)
    }
}
