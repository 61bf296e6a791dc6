//! The singleton speaking document (`speaking.json`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakingDocument {
    #[serde(default)]
    pub engagements: Vec<Engagement>,
    #[serde(default)]
    pub mentoring: Mentoring,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SpeakingDocument {
    /// Empty URL strings from the editor mean "no link".
    pub fn normalize(&mut self) {
        for engagement in &mut self.engagements {
            for url in [&mut engagement.video_url, &mut engagement.slides_url] {
                if url.as_deref().is_some_and(|u| u.trim().is_empty()) {
                    *url = None;
                }
            }
        }
        self.mentoring.areas.retain(|a| !a.trim().is_empty());
    }
}

/// Engagement type. Labels outside the known set are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EngagementType {
    #[default]
    Conference,
    Webinar,
    Workshop,
    Podcast,
    Other(String),
}

impl EngagementType {
    pub fn label(&self) -> &str {
        match self {
            EngagementType::Conference => "Conference",
            EngagementType::Webinar => "Webinar",
            EngagementType::Workshop => "Workshop",
            EngagementType::Podcast => "Podcast",
            EngagementType::Other(label) => label,
        }
    }
}

impl From<String> for EngagementType {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Conference" => EngagementType::Conference,
            "Webinar" => EngagementType::Webinar,
            "Workshop" => EngagementType::Workshop,
            "Podcast" => EngagementType::Podcast,
            _ => EngagementType::Other(label),
        }
    }
}

impl From<EngagementType> for String {
    fn from(kind: EngagementType) -> Self {
        kind.label().to_string()
    }
}

impl fmt::Display for EngagementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub topic: String,
    #[serde(rename = "type", default)]
    pub kind: EngagementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slides_url: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mentoring {
    #[serde(default)]
    pub areas: Vec<String>,
    #[serde(default)]
    pub testimonials: Vec<Testimonial>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
