//! Filesystem backend.
//!
//! Content lives under `<root>/content/`. Every write replaces the whole file
//! through a temporary file in the same directory and a rename, so a reader
//! sees either the old or the new version.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::content::{self, Document, PostFile, PostHeader, Slug};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{
    BackendKind, ContentPath, FileAction, FileChange, Precondition, StoredFile, VersionTag,
    WriteReceipt,
};
use crate::storage::ContentBackend;

/// Reads and writes content files on the local disk.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    read_only: bool,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    /// A store that refuses every write without touching the disk.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: true,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn fs_path(&self, path: &ContentPath) -> PathBuf {
        path.to_fs_path(&self.root)
    }

    fn ensure_writable(&self, path: &ContentPath) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly(self.fs_path(path)));
        }
        Ok(())
    }

    // ==================== File Operations ====================

    pub fn read_file(&self, path: &ContentPath) -> StorageResult<Option<StoredFile>> {
        let target = self.fs_path(path);
        let bytes = match fs::read(&target) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&target, e)),
        };

        let version = VersionTag::of_bytes(&bytes)?;
        let content = String::from_utf8(bytes)?;
        Ok(Some(StoredFile { content, version }))
    }

    pub fn current_version(&self, path: &ContentPath) -> StorageResult<Option<VersionTag>> {
        Ok(self.read_file(path)?.map(|file| file.version))
    }

    pub fn write_file(
        &self,
        path: &ContentPath,
        content: &str,
        expected: &Precondition,
    ) -> StorageResult<VersionTag> {
        self.ensure_writable(path)?;

        if *expected != Precondition::Any {
            expected.check(path, self.current_version(path)?.as_ref())?;
        }

        let target = self.fs_path(path);
        let dir = target
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
        temp.write_all(content.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| io_error(&target, e))?;
        temp.persist(&target).map_err(|e| io_error(&target, e.error))?;

        debug!(path = %path, bytes = content.len(), "wrote file");
        VersionTag::of_bytes(content.as_bytes())
    }

    pub fn delete_file(&self, path: &ContentPath, expected: &Precondition) -> StorageResult<()> {
        self.ensure_writable(path)?;

        let current = self
            .current_version(path)?
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        expected.check(path, Some(&current))?;

        let target = self.fs_path(path);
        fs::remove_file(&target).map_err(|e| io_error(&target, e))?;

        debug!(path = %path, "deleted file");
        Ok(())
    }

    /// Names of the regular files directly inside `dir`, sorted.
    ///
    /// A missing directory is created (unless read-only) and lists as empty.
    pub fn list_dir(&self, dir: &ContentPath) -> StorageResult<Vec<String>> {
        let target = self.fs_path(dir);
        if !target.exists() {
            if !self.read_only {
                fs::create_dir_all(&target).map_err(|e| io_error(&target, e))?;
            }
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&target)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    // ==================== Blog Posts ====================

    /// `*.md` file names in the blog directory.
    pub fn list_blog_files(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .list_dir(&ContentPath::blog_dir())?
            .into_iter()
            .filter(|name| name.ends_with(".md"))
            .collect())
    }

    pub fn read_blog_post(&self, slug: &Slug) -> StorageResult<Option<PostFile>> {
        match self.read_file(&ContentPath::blog_post(slug))? {
            Some(file) => Ok(Some(PostFile::decode(&file.content)?)),
            None => Ok(None),
        }
    }

    pub fn write_blog_post(&self, slug: &Slug, header: &PostHeader, body: &str) -> StorageResult<VersionTag> {
        let file = PostFile {
            header: header.clone(),
            body: body.to_string(),
        };
        self.write_file(&ContentPath::blog_post(slug), &file.encode(), &Precondition::Any)
    }

    pub fn delete_blog_post(&self, slug: &Slug) -> StorageResult<()> {
        self.delete_file(&ContentPath::blog_post(slug), &Precondition::Any)
    }

    // ==================== JSON Documents ====================

    /// Read a singleton document; a missing file reads as the empty document.
    pub fn read_json_document<T: DeserializeOwned + Default>(&self, document: Document) -> StorageResult<T> {
        match self.read_file(&ContentPath::document(document))? {
            Some(file) => Ok(content::decode_document(&file.content)?),
            None => Ok(T::default()),
        }
    }

    pub fn write_json_document<T: Serialize>(&self, document: Document, value: &T) -> StorageResult<VersionTag> {
        let text = content::encode_document(value)?;
        self.write_file(&ContentPath::document(document), &text, &Precondition::Any)
    }
}

impl ContentBackend for LocalFileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn describe(&self) -> String {
        let mode = if self.read_only { "read-only" } else { "read-write" };
        format!("{} ({})", self.root.join(ContentPath::CONTENT_DIR).display(), mode)
    }

    fn writable(&self) -> bool {
        !self.read_only
    }

    fn read(&self, path: &ContentPath) -> StorageResult<Option<StoredFile>> {
        self.read_file(path)
    }

    fn write(
        &self,
        path: &ContentPath,
        content: &str,
        expected: Precondition,
        _message: &str,
    ) -> StorageResult<WriteReceipt> {
        let version = self.write_file(path, content, &expected)?;
        Ok(WriteReceipt { version, commit: None })
    }

    fn delete(&self, path: &ContentPath, expected: Precondition, _message: &str) -> StorageResult<()> {
        self.delete_file(path, &expected)
    }

    fn list(&self, dir: &ContentPath) -> StorageResult<Vec<String>> {
        self.list_dir(dir)
    }

    /// Checks every precondition before the first write. The writes
    /// themselves are sequential; there is no rollback on the filesystem.
    fn write_many(&self, changes: &[FileChange], _message: &str) -> StorageResult<()> {
        if changes.is_empty() {
            return Err(StorageError::EmptyCommit);
        }

        for change in changes {
            self.ensure_writable(&change.path)?;
            let current = self.current_version(&change.path)?;
            change.expected.check(&change.path, current.as_ref())?;
            if change.action == FileAction::Delete && current.is_none() {
                return Err(StorageError::NotFound(change.path.to_string()));
            }
        }

        for change in changes {
            match &change.action {
                FileAction::Write(content) => {
                    self.write_file(&change.path, content, &Precondition::Any)?;
                }
                FileAction::Delete => self.delete_file(&change.path, &Precondition::Any)?,
            }
        }
        Ok(())
    }
}

/// Classify by kind: a read-only mount gets its own error.
fn io_error(path: &Path, err: io::Error) -> StorageError {
    if err.kind() == io::ErrorKind::ReadOnlyFilesystem {
        StorageError::ReadOnly(path.to_path_buf())
    } else {
        StorageError::Io(err)
    }
}
