//! Schema checks for content entities.
//!
//! Validators are pure and collect every violation in one pass so the admin
//! panel can show all of them at once.

use chrono::{DateTime, NaiveDate};

use crate::content::blog::{BlogCategory, BlogPost};
use crate::content::portfolio::{PortfolioCategory, PortfolioItem, StarBlock};
use crate::content::resume::ResumeDocument;
use crate::content::slug;
use crate::content::speaking::SpeakingDocument;

/// Outcome of validating one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn require(&mut self, present: bool, message: impl Into<String>) {
        if !present {
            self.errors.push(message.into());
        }
    }

    /// Prefix every message, used when several entities are validated together.
    pub fn prefixed(self, prefix: &str) -> Self {
        Self {
            errors: self
                .errors
                .into_iter()
                .map(|e| format!("{prefix}: {e}"))
                .collect(),
        }
    }
}

/// An ISO calendar date or an RFC 3339 timestamp.
pub fn is_valid_date(raw: &str) -> bool {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(raw).is_ok()
}

fn filled(value: &str) -> bool {
    !value.trim().is_empty()
}

fn category_message(labels: &[&str]) -> String {
    format!("Category must be one of: {}", labels.join(", "))
}

pub fn validate_blog_post(post: &BlogPost) -> ValidationReport {
    let mut report = ValidationReport::default();

    report.require(filled(&post.title), "Title is required");
    report.require(is_valid_date(&post.date), "Valid date is required");

    if post.category().is_none() {
        let labels: Vec<_> = BlogCategory::ALL.iter().map(|c| c.label()).collect();
        report.errors.push(category_message(&labels));
    }

    report.require(filled(&post.excerpt), "Excerpt is required");
    report.require(filled(&post.content), "Content is required");

    if !post.slug.is_empty() {
        report.require(slug::validate(&post.slug), "Invalid slug format");
    }

    report
}

pub fn validate_portfolio_item(item: &PortfolioItem) -> ValidationReport {
    let mut report = ValidationReport::default();

    report.require(filled(&item.name), "Project name is required");
    report.require(filled(&item.impact), "Impact description is required");
    report.require(filled(&item.description), "Description is required");
    report.require(is_valid_date(&item.date), "Valid date is required");

    if item.category().is_none() {
        let labels: Vec<_> = PortfolioCategory::ALL.iter().map(|c| c.label()).collect();
        report.errors.push(category_message(&labels));
    }

    report.require(
        item.tech_stack.iter().any(|t| filled(t)),
        "At least one tech stack item is required",
    );

    match &item.star {
        None => report.errors.push("Case study content is required".to_string()),
        Some(StarBlock::Rich { content }) => {
            report.require(filled(content), "Case study content is required");
        }
        Some(StarBlock::Legacy(fields)) => {
            report.require(filled(&fields.situation), "STAR Situation is required");
            report.require(filled(&fields.task), "STAR Task is required");
            report.require(filled(&fields.action), "STAR Action is required");
            report.require(filled(&fields.result), "STAR Result is required");
        }
    }

    report.require(slug::validate(&item.slug), "Invalid slug format");

    report
}

pub fn validate_resume(resume: &ResumeDocument) -> ValidationReport {
    let mut report = ValidationReport::default();

    report.require(filled(&resume.executive_summary), "Executive summary is required");
    report.require(!resume.experience.is_empty(), "At least one experience entry is required");

    for (i, entry) in resume.experience.iter().enumerate() {
        report.require(filled(&entry.company), format!("Experience {}: company is required", i + 1));
        report.require(filled(&entry.role), format!("Experience {}: role is required", i + 1));
    }

    report
}

pub fn validate_speaking(speaking: &SpeakingDocument) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (i, engagement) in speaking.engagements.iter().enumerate() {
        report.require(
            filled(&engagement.event),
            format!("Engagement {}: event name is required", i + 1),
        );
        report.require(
            is_valid_date(&engagement.date),
            format!("Engagement {}: valid date is required", i + 1),
        );
    }

    report
}
