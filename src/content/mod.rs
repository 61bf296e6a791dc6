//! content model for the portfolio site
//!
//! Blog posts live one per Markdown file; the portfolio, resume and speaking
//! pages are whole JSON documents. Nothing here touches storage.

pub mod blog;
mod error;
pub mod portfolio;
pub mod resume;
pub mod slug;
pub mod speaking;
pub mod validation;

pub use blog::{BlogCategory, BlogPost, PostFile, PostHeader};
pub use error::{ContentError, ContentResult};
pub use portfolio::{PortfolioCategory, PortfolioDocument, PortfolioItem, StarBlock, StarFields};
pub use resume::{Education, Experience, ResumeDocument, Skills};
pub use slug::{generate_slug, InvalidSlug, Slug};
pub use speaking::{Engagement, EngagementType, Mentoring, SpeakingDocument, Testimonial};
pub use validation::ValidationReport;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Render a JSON document the way it is stored: pretty, two-space indent.
pub fn encode_document<T: Serialize>(document: &T) -> ContentResult<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

pub fn decode_document<T: DeserializeOwned>(text: &str) -> ContentResult<T> {
    Ok(serde_json::from_str(text)?)
}

/// The singleton JSON documents under `content/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    Portfolio,
    Resume,
    Speaking,
}

impl Document {
    pub fn file_name(self) -> &'static str {
        match self {
            Document::Portfolio => "portfolio.json",
            Document::Resume => "resume.json",
            Document::Speaking => "speaking.json",
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}
