//! tree operations for the local Git host.
//!
//! In Git a tree is a directory. Content paths are nested
//! (`content/blog/<slug>.md`), so changing one file means rebuilding every
//! tree on the way from that file up to the root. [`TreeMutator`] collects
//! path edits and writes the affected trees bottom-up; untouched subtrees
//! keep their object ids.

use std::collections::BTreeMap;

use git2::{FileMode, ObjectType, Oid, Repository, Tree, TreeWalkMode, TreeWalkResult};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::TreeId;

/// One entry of a flattened tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    pub path: String,
    pub mode: i32,
    pub kind: ObjectType,
    pub id: Oid,
}

impl FlatEntry {
    /// Git's six-digit octal mode, e.g. `100644`.
    pub fn mode_string(&self) -> String {
        format!("{:06o}", self.mode)
    }
}

/// List `tree`, descending into subtrees when `recursive`.
pub fn flatten(tree: &Tree<'_>, recursive: bool) -> StorageResult<Vec<FlatEntry>> {
    let mut entries = Vec::new();

    if !recursive {
        for entry in tree.iter() {
            entries.push(FlatEntry {
                path: entry.name().unwrap_or_default().to_string(),
                mode: entry.filemode(),
                kind: entry.kind().unwrap_or(ObjectType::Any),
                id: entry.id(),
            });
        }
        return Ok(entries);
    }

    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if let Some(name) = entry.name() {
            entries.push(FlatEntry {
                path: format!("{}{}", root, name),
                mode: entry.filemode(),
                kind: entry.kind().unwrap_or(ObjectType::Any),
                id: entry.id(),
            });
        }
        TreeWalkResult::Ok
    })?;

    Ok(entries)
}

/// Find the blob at `path`, if any.
///
/// Returns an error when the path names a directory.
pub fn blob_at(tree: &Tree<'_>, path: &str) -> StorageResult<Option<(Oid, i32)>> {
    let entry = match tree.get_path(std::path::Path::new(path)) {
        Ok(entry) => entry,
        Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::Git(e)),
    };

    if entry.kind() != Some(ObjectType::Blob) {
        return Err(StorageError::UnexpectedEntryType {
            path: path.to_string(),
            expected: "blob (file)".to_string(),
            found: format!("{:?}", entry.kind()),
        });
    }
    Ok(Some((entry.id(), entry.filemode())))
}

/// Find the subtree at `path`; `None` when the directory does not exist.
pub fn subtree_at<'repo>(repo: &'repo Repository, tree: &Tree<'_>, path: &str) -> StorageResult<Option<Tree<'repo>>> {
    match tree.get_path(std::path::Path::new(path)) {
        Ok(entry) if entry.kind() == Some(ObjectType::Tree) => Ok(Some(repo.find_tree(entry.id())?)),
        Ok(_) => Ok(None),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(StorageError::Git(e)),
    }
}

/// a mutable tree builder for making changes
///
/// Edits are keyed by full path and only applied in [`TreeMutator::write`];
/// the base tree is never modified.
///
/// ```ignore
/// let mut mutator = TreeMutator::from_tree(repo, &base);
/// mutator.upsert("content/blog/hello.md", blob, FileMode::Blob.into());
/// mutator.remove("content/blog/old.md");
/// let new_tree_id = mutator.write()?;
/// ```
pub struct TreeMutator<'a, 'repo> {
    repo: &'repo Repository,
    base: Option<&'a Tree<'repo>>,
    /// path -> new (object, mode), or `None` to remove
    edits: BTreeMap<String, Option<(Oid, i32)>>,
}

impl<'a, 'repo> TreeMutator<'a, 'repo> {
    pub fn from_tree(repo: &'repo Repository, base: &'a Tree<'repo>) -> Self {
        Self {
            repo,
            base: Some(base),
            edits: BTreeMap::new(),
        }
    }

    pub fn empty(repo: &'repo Repository) -> Self {
        Self {
            repo,
            base: None,
            edits: BTreeMap::new(),
        }
    }

    /// insert or replace the entry at `path`
    pub fn upsert(&mut self, path: &str, id: Oid, mode: i32) {
        self.edits.insert(path.to_string(), Some((id, mode)));
    }

    /// remove the entry at `path`; a missing path is ignored
    pub fn remove(&mut self, path: &str) {
        self.edits.insert(path.to_string(), None);
    }

    /// write all changed trees and return the new root tree id
    ///
    /// Directories left empty by removals are dropped, as Git cannot store
    /// them.
    pub fn write(self) -> StorageResult<TreeId> {
        let edits = self
            .edits
            .into_iter()
            .map(|(path, target)| Edit {
                segments: path.split('/').map(str::to_string).collect(),
                target,
            })
            .collect();

        let root = match write_level(self.repo, self.base, edits)? {
            Some(id) => id,
            None => self.repo.treebuilder(None)?.write()?,
        };
        Ok(TreeId::from_oid(root))
    }
}

struct Edit {
    segments: Vec<String>,
    target: Option<(Oid, i32)>,
}

/// Apply `edits` to one directory level; `None` means the level ended up empty.
fn write_level(repo: &Repository, base: Option<&Tree<'_>>, edits: Vec<Edit>) -> StorageResult<Option<Oid>> {
    let mut builder = repo.treebuilder(base)?;
    let mut nested: BTreeMap<String, Vec<Edit>> = BTreeMap::new();

    for mut edit in edits {
        if edit.segments.len() == 1 {
            let name = edit.segments[0].as_str();
            match edit.target {
                Some((id, mode)) => {
                    builder.insert(name, id, mode)?;
                }
                None => {
                    if builder.get(name)?.is_some() {
                        builder.remove(name)?;
                    }
                }
            }
        } else {
            let dir = edit.segments.remove(0);
            nested.entry(dir).or_default().push(edit);
        }
    }

    for (dir, edits) in nested {
        let subtree = match builder.get(dir.as_str())? {
            Some(entry) if entry.kind() == Some(ObjectType::Tree) => Some(repo.find_tree(entry.id())?),
            _ => None,
        };

        match write_level(repo, subtree.as_ref(), edits)? {
            Some(id) => {
                builder.insert(dir.as_str(), id, FileMode::Tree.into())?;
            }
            None => {
                if builder.get(dir.as_str())?.is_some() {
                    builder.remove(dir.as_str())?;
                }
            }
        }
    }

    if builder.is_empty() {
        return Ok(None);
    }
    Ok(Some(builder.write()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn blob(repo: &Repository, content: &str) -> Oid {
        repo.blob(content.as_bytes()).unwrap()
    }

    #[test]
    fn test_nested_upsert() {
        let (_dir, repo) = setup_repo();
        let post = blob(&repo, "post");
        let doc = blob(&repo, "{}");

        let mut mutator = TreeMutator::empty(&repo);
        mutator.upsert("content/blog/hello.md", post, FileMode::Blob.into());
        mutator.upsert("content/portfolio.json", doc, FileMode::Blob.into());
        let tree_id = mutator.write().unwrap();

        let tree = repo.find_tree(tree_id.to_oid().unwrap()).unwrap();
        assert_eq!(blob_at(&tree, "content/blog/hello.md").unwrap(), Some((post, 0o100644)));
        assert_eq!(blob_at(&tree, "content/portfolio.json").unwrap().map(|b| b.0), Some(doc));
        assert_eq!(blob_at(&tree, "content/missing.json").unwrap(), None);
        assert!(blob_at(&tree, "content/blog").is_err());

        let paths: Vec<_> = flatten(&tree, true).unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec!["content", "content/blog", "content/blog/hello.md", "content/portfolio.json"]
        );
    }

    #[test]
    fn test_untouched_subtrees_keep_ids() {
        let (_dir, repo) = setup_repo();
        let mut mutator = TreeMutator::empty(&repo);
        mutator.upsert("content/blog/a.md", blob(&repo, "a"), FileMode::Blob.into());
        mutator.upsert("content/resume.json", blob(&repo, "{}"), FileMode::Blob.into());
        let first = repo.find_tree(mutator.write().unwrap().to_oid().unwrap()).unwrap();
        let blog_before = subtree_at(&repo, &first, "content/blog").unwrap().unwrap().id();

        let mut mutator = TreeMutator::from_tree(&repo, &first);
        mutator.upsert("content/resume.json", blob(&repo, "{\"a\":1}"), FileMode::Blob.into());
        let second = repo.find_tree(mutator.write().unwrap().to_oid().unwrap()).unwrap();
        let blog_after = subtree_at(&repo, &second, "content/blog").unwrap().unwrap().id();

        assert_eq!(blog_before, blog_after);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_remove_prunes_empty_dirs() {
        let (_dir, repo) = setup_repo();
        let mut mutator = TreeMutator::empty(&repo);
        mutator.upsert("content/blog/a.md", blob(&repo, "a"), FileMode::Blob.into());
        mutator.upsert("content/resume.json", blob(&repo, "{}"), FileMode::Blob.into());
        let tree = repo.find_tree(mutator.write().unwrap().to_oid().unwrap()).unwrap();

        let mut mutator = TreeMutator::from_tree(&repo, &tree);
        mutator.remove("content/blog/a.md");
        mutator.remove("content/never-existed.json");
        let tree = repo.find_tree(mutator.write().unwrap().to_oid().unwrap()).unwrap();

        assert!(subtree_at(&repo, &tree, "content/blog").unwrap().is_none());
        assert!(blob_at(&tree, "content/resume.json").unwrap().is_some());
    }

    #[test]
    fn test_mode_string() {
        let (_dir, repo) = setup_repo();
        let mut mutator = TreeMutator::empty(&repo);
        mutator.upsert("a.txt", blob(&repo, "a"), FileMode::Blob.into());
        let tree = repo.find_tree(mutator.write().unwrap().to_oid().unwrap()).unwrap();

        let entries = flatten(&tree, false).unwrap();
        assert_eq!(entries[0].mode_string(), "100644");
        assert_eq!(entries[0].kind, ObjectType::Blob);
    }
}
