//! Conditional single-file writes and atomic multi-file commits on a Git host.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, info, warn};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::remote::host::{
    ContentsWrite, DeleteContents, GitHost, NewBlob, NewCommit, NewTree, NewTreeEntry, PutContents,
    TreeEntry, UpdateRef,
};
use crate::storage::types::{
    BackendKind, BranchName, CommitDescriptor, ContentPath, FileAction, FileChange, Precondition,
    RemoteFileHandle, StoredFile, VersionTag, WriteReceipt,
};
use crate::storage::ContentBackend;

const FILE_MODE: &str = "100644";

/// A decoded file together with the handle to write it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub handle: RemoteFileHandle,
    pub content: String,
}

/// Client for one branch of a content repository.
pub struct RemoteClient {
    host: Box<dyn GitHost>,
    branch: BranchName,
}

impl RemoteClient {
    pub fn new(host: impl GitHost + 'static, branch: BranchName) -> Self {
        Self {
            host: Box::new(host),
            branch,
        }
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    pub fn host(&self) -> &dyn GitHost {
        self.host.as_ref()
    }

    pub fn check_access(&self) -> StorageResult<()> {
        self.host.check_access()?;
        self.host.get_ref(&self.branch)?;
        Ok(())
    }

    // ==================== Single Files ====================

    /// Current version of `path`; a missing file is `None`, not an error.
    pub fn get_current_version(&self, path: &ContentPath) -> StorageResult<Option<VersionTag>> {
        Ok(self.host.get_contents(path, &self.branch)?.map(|file| file.sha))
    }

    pub fn handle(&self, path: &ContentPath) -> StorageResult<RemoteFileHandle> {
        Ok(RemoteFileHandle {
            path: path.clone(),
            version: self.get_current_version(path)?,
        })
    }

    pub fn read_file(&self, path: &ContentPath) -> StorageResult<Option<RemoteFile>> {
        let Some(file) = self.host.get_contents(path, &self.branch)? else {
            return Ok(None);
        };

        let content = decode_content(&file.content)?;
        Ok(Some(RemoteFile {
            handle: RemoteFileHandle {
                path: path.clone(),
                version: Some(file.sha),
            },
            content,
        }))
    }

    /// File names directly inside `dir`.
    pub fn list_dir(&self, dir: &ContentPath) -> StorageResult<Vec<String>> {
        let mut names: Vec<_> = self
            .host
            .list_contents(dir, &self.branch)?
            .into_iter()
            .filter(|entry| entry.is_file())
            .map(|entry| entry.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Create or update `path` using the version it has right now.
    pub fn commit_file(&self, path: &ContentPath, content: &str, message: &str) -> StorageResult<CommitDescriptor> {
        let handle = self.handle(path)?;
        self.commit_file_if(&handle, content, message)
    }

    /// Write through a handle from an earlier read; fails with `Conflict` if
    /// the file changed since.
    pub fn commit_file_if(&self, handle: &RemoteFileHandle, content: &str, message: &str) -> StorageResult<CommitDescriptor> {
        let request = PutContents {
            message: message.to_string(),
            content: STANDARD.encode(content.as_bytes()),
            sha: handle.version.clone(),
            branch: self.branch.to_string(),
        };

        let response = self.host.put_contents(&handle.path, &request)?;
        info!(path = %handle.path, commit = %response.commit.sha.short(), "committed file");
        Ok(to_descriptor(response))
    }

    /// Delete `path`; a missing file fails with `NotFound`.
    pub fn delete_file(&self, path: &ContentPath, message: &str) -> StorageResult<CommitDescriptor> {
        let handle = self.handle(path)?;
        self.delete_file_if(&handle, message)
    }

    pub fn delete_file_if(&self, handle: &RemoteFileHandle, message: &str) -> StorageResult<CommitDescriptor> {
        let version = handle
            .version
            .clone()
            .ok_or_else(|| StorageError::NotFound(handle.path.to_string()))?;

        let request = DeleteContents {
            message: message.to_string(),
            sha: version,
            branch: self.branch.to_string(),
        };

        let response = self.host.delete_contents(&handle.path, &request)?;
        info!(path = %handle.path, commit = %response.commit.sha.short(), "deleted file");
        Ok(to_descriptor(response))
    }

    // ==================== Multi-file Commit ====================

    /// Apply all `changes` as one commit on the branch.
    ///
    /// Reads the branch head and its full tree, checks every expected version,
    /// creates blobs only for content that differs from the tree, then creates
    /// tree and commit and fast-forwards the branch. The ref update is the only
    /// visible step: a failure before it leaves nothing but unreachable objects.
    pub fn commit_files(&self, changes: &[FileChange], message: &str) -> StorageResult<CommitDescriptor> {
        if changes.is_empty() {
            return Err(StorageError::EmptyCommit);
        }

        let head = self.host.get_ref(&self.branch)?.object.sha;
        let head_commit = self.host.get_commit(&head)?;
        let base_tree = self.host.get_tree(&head_commit.tree.sha, true)?;
        if base_tree.truncated {
            warn!(tree = %base_tree.sha, "recursive tree listing was truncated; unlisted paths read as absent");
        }

        let existing: HashMap<&str, &TreeEntry> = base_tree
            .tree
            .iter()
            .filter(|entry| entry.is_blob())
            .map(|entry| (entry.path.as_str(), entry))
            .collect();

        for change in changes {
            let current = existing.get(change.path.as_str()).map(|entry| VersionTag::new(&entry.sha));
            change.expected.check(&change.path, current.as_ref())?;
            if change.action == FileAction::Delete && current.is_none() {
                return Err(StorageError::NotFound(change.path.to_string()));
            }
        }

        let mut entries = Vec::with_capacity(changes.len());
        let mut unchanged = 0;
        for change in changes {
            let found = existing.get(change.path.as_str());
            let mode = found.map_or(FILE_MODE.to_string(), |entry| entry.mode.clone());

            let sha = match &change.action {
                FileAction::Write(content) => {
                    let local = VersionTag::of_bytes(content.as_bytes())?;
                    match found {
                        Some(entry) if entry.sha == local.as_str() => {
                            unchanged += 1;
                            Some(entry.sha.clone())
                        }
                        _ => {
                            let blob = self.host.create_blob(&NewBlob {
                                content: STANDARD.encode(content.as_bytes()),
                                encoding: "base64".to_string(),
                            })?;
                            Some(blob.sha.to_string())
                        }
                    }
                }
                FileAction::Delete => None,
            };

            entries.push(NewTreeEntry {
                path: change.path.to_string(),
                mode,
                kind: "blob".to_string(),
                sha,
            });
        }

        if unchanged == changes.len() {
            debug!(files = changes.len(), "content unchanged; nothing to commit");
            return Ok(CommitDescriptor {
                sha: head,
                html_url: head_commit.html_url,
                content_version: None,
            });
        }

        let tree = self.host.create_tree(&NewTree {
            base_tree: Some(head_commit.tree.sha.clone()),
            tree: entries,
        })?;

        let commit = self.host.create_commit(&NewCommit {
            message: message.to_string(),
            tree: tree.sha,
            parents: vec![head.clone()],
        })?;

        self.host.update_ref(
            &self.branch,
            &UpdateRef {
                sha: commit.sha.clone(),
                force: false,
            },
        )?;

        info!(
            branch = %self.branch,
            files = changes.len(),
            parent = %head.short(),
            commit = %commit.sha.short(),
            "committed files"
        );

        Ok(CommitDescriptor {
            sha: commit.sha,
            html_url: commit.html_url,
            content_version: None,
        })
    }
}

fn to_descriptor(response: ContentsWrite) -> CommitDescriptor {
    CommitDescriptor {
        sha: response.commit.sha,
        html_url: response.commit.html_url,
        content_version: response.content.map(|entry| entry.sha),
    }
}

/// Decode a contents payload; hosts wrap base64 across lines.
pub fn decode_content(encoded: &str) -> StorageResult<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}

impl ContentBackend for RemoteClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.host.describe(), self.branch)
    }

    fn read(&self, path: &ContentPath) -> StorageResult<Option<StoredFile>> {
        Ok(self.read_file(path)?.and_then(|file| {
            file.handle.version.map(|version| StoredFile {
                content: file.content,
                version,
            })
        }))
    }

    fn write(
        &self,
        path: &ContentPath,
        content: &str,
        expected: Precondition,
        message: &str,
    ) -> StorageResult<WriteReceipt> {
        let descriptor = match expected {
            Precondition::Any => self.commit_file(path, content, message)?,
            Precondition::Expect(version) => {
                let handle = RemoteFileHandle {
                    path: path.clone(),
                    version,
                };
                self.commit_file_if(&handle, content, message)?
            }
        };

        let version = match &descriptor.content_version {
            Some(version) => version.clone(),
            None => VersionTag::of_bytes(content.as_bytes())?,
        };
        Ok(WriteReceipt {
            version,
            commit: Some(descriptor),
        })
    }

    fn delete(&self, path: &ContentPath, expected: Precondition, message: &str) -> StorageResult<()> {
        match expected {
            Precondition::Any => self.delete_file(path, message)?,
            Precondition::Expect(version) => {
                let handle = RemoteFileHandle {
                    path: path.clone(),
                    version,
                };
                self.delete_file_if(&handle, message)?
            }
        };
        Ok(())
    }

    fn list(&self, dir: &ContentPath) -> StorageResult<Vec<String>> {
        self.list_dir(dir)
    }

    fn write_many(&self, changes: &[FileChange], message: &str) -> StorageResult<()> {
        self.commit_files(changes, message)?;
        Ok(())
    }

    fn check(&self) -> StorageResult<()> {
        self.check_access()
    }
}
