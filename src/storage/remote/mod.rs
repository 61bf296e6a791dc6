//! remote backend: content committed to a Git host
//!
//! [`RemoteClient`] implements single-file and multi-file commits on top of
//! the primitive calls of [`GitHost`]. [`GithubHost`] speaks the GitHub REST
//! API; [`crate::storage::GitRepository`] answers the same calls from disk.

mod client;
pub mod github;
pub mod host;

pub use client::{decode_content, RemoteClient, RemoteFile};
pub use github::{GithubConfig, GithubHost};
pub use host::{
    BlobRef, CommitRef, ContentsEntry, ContentsFile, ContentsWrite, DeleteContents, GitCommit,
    GitHost, GitObject, GitRef, GitTree, NewBlob, NewCommit, NewTree, NewTreeEntry, ParentPointer,
    PutContents, TreeEntry, TreePointer, UpdateRef,
};
