//! folio - content persistence for a file-based portfolio site
//!
//! Blog posts are Markdown files with a frontmatter header; the portfolio,
//! resume and speaking pages are JSON documents. In development they are
//! written to the local `content/` directory. On a hosted deployment, where
//! the filesystem is read-only, every change becomes a commit on a Git host.
//!
//! # Example
//!
//! ```no_run
//! use folio::store::{ContentStore, EntityKind, StoreConfig};
//! use serde_json::json;
//!
//! let store = ContentStore::open(StoreConfig::from_env().unwrap()).unwrap();
//! store
//!     .save(
//!         EntityKind::BlogPost,
//!         Some("hello-world"),
//!         json!({
//!             "title": "Hello World",
//!             "date": "2024-01-01",
//!             "category": "Product Strategy",
//!             "excerpt": "x",
//!             "content": "<p>hi</p>"
//!         }),
//!     )
//!     .unwrap();
//! ```

pub mod content;
pub mod storage;
pub mod store;
