//! Branch management for the local Git host.
//!
//! The content branch is the single commit point of every write: objects can
//! be created freely, but nothing is visible until the branch moves. Moves go
//! through compare-and-swap or a fast-forward check so a concurrent writer is
//! reported instead of overwritten.

use git2::Repository;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BranchName, CommitId};

/// Manages Git references (branches).
pub struct RefManager;

impl RefManager {
    /// Resolve a branch name to its current commit ID.
    pub fn resolve_branch(repo: &Repository, branch: &BranchName) -> StorageResult<CommitId> {
        let reference = repo
            .find_reference(&branch.as_ref_path())
            .map_err(|_| StorageError::NotFound(format!("branch {}", branch)))?;

        let commit = reference
            .peel_to_commit()
            .map_err(|_| StorageError::NotFound(format!("branch {}", branch)))?;

        Ok(CommitId::from_oid(commit.id()))
    }

    pub fn branch_exists(repo: &Repository, branch: &BranchName) -> bool {
        repo.find_reference(&branch.as_ref_path()).is_ok()
    }

    /// Create a new branch pointing to the given commit.
    pub fn create_branch(repo: &Repository, branch: &BranchName, target: &CommitId) -> StorageResult<()> {
        if Self::branch_exists(repo, branch) {
            return Err(StorageError::Conflict {
                path: branch.as_ref_path(),
                reason: "branch already exists".to_string(),
            });
        }

        let commit = repo.find_commit(target.to_oid()?)?;
        repo.branch(branch.as_str(), &commit, false)?;

        Ok(())
    }

    /// Point a branch at a new commit unconditionally.
    fn set_branch(repo: &Repository, branch: &BranchName, target: &CommitId) -> StorageResult<()> {
        let mut reference = repo
            .find_reference(&branch.as_ref_path())
            .map_err(|_| StorageError::NotFound(format!("branch {}", branch)))?;

        reference.set_target(target.to_oid()?, &format!("folio: move to {}", target.short()))?;

        Ok(())
    }

    /// Update a branch only if it still points to the expected commit.
    pub fn update_branch_if_unchanged(
        repo: &Repository,
        branch: &BranchName,
        expected: &CommitId,
        new_target: &CommitId,
    ) -> StorageResult<()> {
        let current = Self::resolve_branch(repo, branch)?;

        if current != *expected {
            return Err(StorageError::Conflict {
                path: branch.as_ref_path(),
                reason: format!("branch moved from {} to {}", expected.short(), current.short()),
            });
        }

        Self::set_branch(repo, branch, new_target)
    }

    /// Move a branch, refusing anything but a fast-forward unless `force`.
    pub fn update_branch(repo: &Repository, branch: &BranchName, target: &CommitId, force: bool) -> StorageResult<()> {
        let current = Self::resolve_branch(repo, branch)?;

        if !force && current != *target && !repo.graph_descendant_of(target.to_oid()?, current.to_oid()?)? {
            return Err(StorageError::Conflict {
                path: branch.as_ref_path(),
                reason: format!("{} is not a fast forward of {}", target.short(), current.short()),
            });
        }

        Self::set_branch(repo, branch, target)
    }

    /// Create the main branch if needed and point HEAD at it.
    pub fn init_main_branch(repo: &Repository, initial_commit: &CommitId) -> StorageResult<()> {
        let main = BranchName::main();

        if !Self::branch_exists(repo, &main) {
            Self::create_branch(repo, &main, initial_commit)?;
        }

        repo.set_head(&main.as_ref_path())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::commit::{create_initial_commit, CommitBuilder};
    use crate::storage::tree::TreeMutator;
    use crate::storage::types::GitSignature;
    use tempfile::TempDir;

    fn setup_repo_with_commit() -> (TempDir, Repository, CommitId) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let commit_id = create_initial_commit(&repo, &GitSignature::folio()).unwrap();
        RefManager::init_main_branch(&repo, &commit_id).unwrap();
        (dir, repo, commit_id)
    }

    fn child_of(repo: &Repository, parent: &CommitId, message: &str) -> CommitId {
        let tree_id = TreeMutator::empty(repo).write().unwrap();
        CommitBuilder::new(repo)
            .tree(tree_id)
            .parent(parent.clone())
            .message(message)
            .commit()
            .unwrap()
    }

    #[test]
    fn test_main_branch() {
        let (_dir, repo, initial) = setup_repo_with_commit();
        let main = BranchName::main();

        assert!(RefManager::branch_exists(&repo, &main));
        assert_eq!(RefManager::resolve_branch(&repo, &main).unwrap(), initial);
        assert_eq!(repo.head().unwrap().name(), Some("refs/heads/main"));
    }

    #[test]
    fn test_duplicate_branch_error() {
        let (_dir, repo, initial) = setup_repo_with_commit();
        let result = RefManager::create_branch(&repo, &BranchName::main(), &initial);
        assert!(result.unwrap_err().is_conflict());
    }

    #[test]
    fn test_missing_branch() {
        let (_dir, repo, _) = setup_repo_with_commit();
        let branch = BranchName::new("drafts").unwrap();
        assert!(RefManager::resolve_branch(&repo, &branch).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_branch_if_unchanged() {
        let (_dir, repo, c1) = setup_repo_with_commit();
        let main = BranchName::main();
        let c2 = child_of(&repo, &c1, "second");

        RefManager::update_branch_if_unchanged(&repo, &main, &c1, &c2).unwrap();

        let result = RefManager::update_branch_if_unchanged(&repo, &main, &c1, &c2);
        assert!(result.unwrap_err().is_conflict());
    }

    #[test]
    fn test_fast_forward_only() {
        let (_dir, repo, c1) = setup_repo_with_commit();
        let main = BranchName::main();
        let a = child_of(&repo, &c1, "a");
        let b = child_of(&repo, &c1, "b");

        RefManager::update_branch(&repo, &main, &a, false).unwrap();

        // b does not contain a
        assert!(RefManager::update_branch(&repo, &main, &b, false).unwrap_err().is_conflict());
        assert_eq!(RefManager::resolve_branch(&repo, &main).unwrap(), a);

        RefManager::update_branch(&repo, &main, &b, true).unwrap();
        assert_eq!(RefManager::resolve_branch(&repo, &main).unwrap(), b);
    }
}
