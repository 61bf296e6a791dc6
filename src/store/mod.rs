//! Content persistence facade.
//!
//! [`ContentStore`] picks a backend once from a [`StoreConfig`], validates
//! entities before they reach storage and reports failures in one taxonomy,
//! [`StoreError`], whichever backend is active.

mod api;
mod config;
mod error;
mod message;

pub use api::{ContentStore, Entity, EntityKind, StoreStatus};
pub use config::{Environment, RemoteTarget, StoreConfig};
pub use error::{StoreError, StoreResult, PERSIST_REMEDIATION};
pub use message::CommitMessage;
