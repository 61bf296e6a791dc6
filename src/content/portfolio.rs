//! Portfolio items and the `portfolio.json` collection document.
//!
//! Case studies exist in two shapes in stored data: the legacy STAR block with
//! four separate fields and the rich block holding one `content` blob. The
//! rich block is canonical. Legacy blocks are accepted on read and on save and
//! converted by [`StarBlock::into_canonical`]. An item may also have no case
//! study at all; it is written back without one.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The fixed set of portfolio categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortfolioCategory {
    AiMl,
    ProductStrategy,
    SolutionArchitecture,
    GtmExecution,
}

impl PortfolioCategory {
    pub const ALL: [PortfolioCategory; 4] = [
        PortfolioCategory::AiMl,
        PortfolioCategory::ProductStrategy,
        PortfolioCategory::SolutionArchitecture,
        PortfolioCategory::GtmExecution,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PortfolioCategory::AiMl => "AI/ML",
            PortfolioCategory::ProductStrategy => "Product Strategy",
            PortfolioCategory::SolutionArchitecture => "Solution Architecture",
            PortfolioCategory::GtmExecution => "GTM Execution",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for PortfolioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Legacy Situation/Task/Action/Result fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarFields {
    #[serde(default)]
    pub situation: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub result: String,
}

/// A case-study block in either stored shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StarBlock {
    Rich { content: String },
    Legacy(StarFields),
}

impl StarBlock {
    pub fn rich(content: impl Into<String>) -> Self {
        StarBlock::Rich {
            content: content.into(),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, StarBlock::Legacy(_))
    }

    /// Convert to the rich shape. Each legacy field becomes a titled section;
    /// empty fields are skipped.
    pub fn into_canonical(self) -> Self {
        match self {
            rich @ StarBlock::Rich { .. } => rich,
            StarBlock::Legacy(fields) => {
                let sections = [
                    ("Situation", &fields.situation),
                    ("Task", &fields.task),
                    ("Action", &fields.action),
                    ("Result", &fields.result),
                ];

                let content = sections
                    .iter()
                    .filter(|(_, text)| !text.trim().is_empty())
                    .map(|(title, text)| format!("<h3>{}</h3>\n<p>{}</p>", title, escape_html(text.trim())))
                    .collect::<Vec<_>>()
                    .join("\n");

                StarBlock::Rich { content }
            }
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// One project in the portfolio collection.
///
/// Fields this model does not know about are kept in `extra` and written back
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star: Option<StarBlock>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PortfolioItem {
    pub fn category(&self) -> Option<PortfolioCategory> {
        PortfolioCategory::parse(&self.category)
    }

    pub fn has_legacy_star(&self) -> bool {
        self.star.as_ref().is_some_and(StarBlock::is_legacy)
    }

    /// Tidy editor input: trim tech-stack entries, drop empty ones and turn an
    /// empty GitHub URL into none.
    pub fn normalize(&mut self) {
        self.tech_stack = self
            .tech_stack
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if self.github_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            self.github_url = None;
        }
    }
}

/// The whole `portfolio.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDocument {
    #[serde(default)]
    pub projects: Vec<PortfolioItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PortfolioDocument {
    pub fn get(&self, slug: &str) -> Option<&PortfolioItem> {
        self.projects.iter().find(|p| p.slug == slug)
    }

    /// Replace the entry with the same slug in place, or append.
    ///
    /// Returns true when an existing entry was replaced.
    pub fn upsert(&mut self, item: PortfolioItem) -> bool {
        match self.projects.iter_mut().find(|p| p.slug == item.slug) {
            Some(existing) => {
                *existing = item;
                true
            }
            None => {
                self.projects.push(item);
                false
            }
        }
    }

    /// Remove the entry with `slug`, keeping the order of the others.
    pub fn remove(&mut self, slug: &str) -> Option<PortfolioItem> {
        let index = self.projects.iter().position(|p| p.slug == slug)?;
        Some(self.projects.remove(index))
    }

    pub fn legacy_count(&self) -> usize {
        self.projects.iter().filter(|p| p.has_legacy_star()).count()
    }

    /// Convert every legacy case study to the rich shape; returns how many
    /// items changed.
    pub fn migrate_case_studies(&mut self) -> usize {
        let mut migrated = 0;
        for item in &mut self.projects {
            if item.has_legacy_star() {
                item.star = item.star.take().map(StarBlock::into_canonical);
                migrated += 1;
            }
        }
        migrated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(slug: &str) -> PortfolioItem {
        PortfolioItem {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            ..Default::default()
        }
    }

    #[test]
    fn test_star_block_both_shapes() {
        let rich: StarBlock = serde_json::from_value(json!({ "content": "<p>story</p>" })).unwrap();
        assert_eq!(rich, StarBlock::rich("<p>story</p>"));

        let legacy: StarBlock = serde_json::from_value(json!({
            "situation": "s", "task": "t", "action": "a", "result": "r"
        }))
        .unwrap();
        assert!(legacy.is_legacy());
    }

    #[test]
    fn test_legacy_to_canonical() {
        let legacy = StarBlock::Legacy(StarFields {
            situation: "Churn was <5%".to_string(),
            task: "Grow".to_string(),
            action: String::new(),
            result: "Done".to_string(),
        });

        let StarBlock::Rich { content } = legacy.into_canonical() else {
            panic!("expected rich block");
        };
        assert_eq!(
            content,
            "<h3>Situation</h3>\n<p>Churn was &lt;5%</p>\n<h3>Task</h3>\n<p>Grow</p>\n<h3>Result</h3>\n<p>Done</p>"
        );
    }

    #[test]
    fn test_unknown_fields_survive() {
        let value = json!({
            "projects": [{ "slug": "a", "name": "A", "featured": true, "star": { "content": "x" } }],
            "updatedBy": "admin"
        });
        let doc: PortfolioDocument = serde_json::from_value(value).unwrap();
        assert_eq!(doc.projects[0].extra.get("featured"), Some(&json!(true)));

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["projects"][0]["featured"], json!(true));
        assert_eq!(back["updatedBy"], json!("admin"));
        assert_eq!(back["projects"][0]["techStack"], json!([]));
    }

    #[test]
    fn test_upsert_and_remove_keep_order() {
        let mut doc = PortfolioDocument::default();
        doc.upsert(item("a"));
        doc.upsert(item("b"));
        doc.upsert(item("c"));

        let mut updated = item("b");
        updated.name = "Bee".to_string();
        assert!(doc.upsert(updated));

        let removed = doc.remove("a").unwrap();
        assert_eq!(removed.slug, "a");

        let slugs: Vec<_> = doc.projects.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "c"]);
        assert_eq!(doc.get("b").unwrap().name, "Bee");
        assert!(doc.remove("missing").is_none());
    }

    #[test]
    fn test_migrate_case_studies() {
        let mut doc = PortfolioDocument::default();
        let mut legacy = item("old");
        legacy.star = Some(StarBlock::Legacy(StarFields {
            situation: "s".to_string(),
            ..Default::default()
        }));
        let mut modern = item("new");
        modern.star = Some(StarBlock::rich("<p>x</p>"));
        doc.upsert(legacy);
        doc.upsert(modern);
        doc.upsert(item("bare"));

        assert_eq!(doc.legacy_count(), 1);
        assert_eq!(doc.migrate_case_studies(), 1);
        assert_eq!(doc.legacy_count(), 0);
        assert_eq!(doc.migrate_case_studies(), 0);
        assert_eq!(doc.get("bare").unwrap().star, None);
    }

    #[test]
    fn test_item_without_case_study() {
        let doc: PortfolioDocument = serde_json::from_value(json!({ "projects": [{ "slug": "a", "name": "A" }] })).unwrap();
        assert_eq!(doc.projects[0].star, None);
        assert_eq!(doc.legacy_count(), 0);

        let back = serde_json::to_value(&doc).unwrap();
        assert!(back["projects"][0].get("star").is_none());
    }

    #[test]
    fn test_normalize() {
        let mut it = item("x");
        it.tech_stack = vec![" Rust ".to_string(), "".to_string(), "Go".to_string()];
        it.github_url = Some("  ".to_string());
        it.normalize();
        assert_eq!(it.tech_stack, vec!["Rust", "Go"]);
        assert_eq!(it.github_url, None);
    }
}
