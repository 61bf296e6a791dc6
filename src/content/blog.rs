//! Blog posts and their Markdown-with-frontmatter file format.
//!
//! A post is stored as:
//!
//! ```text
//! ---
//! title: "Hello World"
//! date: "2024-01-01"
//! category: "Product Strategy"
//! excerpt: "x"
//! ---
//!
//! <p>hi</p>
//! ```
//!
//! Header values are always written double-quoted with escapes, so any title
//! round-trips. Reading goes through a YAML parser, which also accepts files
//! edited by hand with bare scalars.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::error::{ContentError, ContentResult};
use crate::content::slug::Slug;

const DELIMITER: &str = "---";

/// The fixed set of blog categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlogCategory {
    ProductStrategy,
    AiAdoption,
    GrowthLeadership,
}

impl BlogCategory {
    pub const ALL: [BlogCategory; 3] = [
        BlogCategory::ProductStrategy,
        BlogCategory::AiAdoption,
        BlogCategory::GrowthLeadership,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BlogCategory::ProductStrategy => "Product Strategy",
            BlogCategory::AiAdoption => "AI Adoption",
            BlogCategory::GrowthLeadership => "Growth Leadership",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for BlogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A blog post as edited in the admin panel.
///
/// Fields default to empty so an incomplete payload still deserializes and
/// the validator can report every missing field at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
}

impl BlogPost {
    pub fn category(&self) -> Option<BlogCategory> {
        BlogCategory::parse(&self.category)
    }

    /// Split into the on-disk representation.
    pub fn to_file(&self) -> PostFile {
        PostFile {
            header: PostHeader {
                title: self.title.clone(),
                date: self.date.clone(),
                category: self.category.clone(),
                excerpt: self.excerpt.clone(),
            },
            body: self.content.clone(),
        }
    }

    /// Rebuild a post from its file; the slug comes from the file name.
    pub fn from_file(slug: &Slug, file: PostFile) -> Self {
        Self {
            slug: slug.to_string(),
            title: file.header.title,
            date: file.header.date,
            category: file.header.category,
            excerpt: file.header.excerpt,
            content: file.body,
        }
    }
}

/// Scalar metadata held in the frontmatter block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostHeader {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub title: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub date: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub category: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub excerpt: String,
}

impl PostHeader {
    fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("title", &self.title),
            ("date", &self.date),
            ("category", &self.category),
            ("excerpt", &self.excerpt),
        ]
    }
}

/// Header block plus raw body of a post file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFile {
    pub header: PostHeader,
    pub body: String,
}

impl PostFile {
    /// Render `---\n<header>\n---\n\n<body>`.
    pub fn encode(&self) -> String {
        let header = self
            .header
            .fields()
            .iter()
            .map(|(key, value)| format!("{}: {}", key, quote(value)))
            .collect::<Vec<_>>()
            .join("\n");

        format!("{DELIMITER}\n{header}\n{DELIMITER}\n\n{}", self.body)
    }

    /// Parse a post file. A file without a header block is all body.
    pub fn decode(text: &str) -> ContentResult<Self> {
        let Some((header, body)) = split_frontmatter(text) else {
            return Ok(Self {
                header: PostHeader::default(),
                body: text.to_string(),
            });
        };

        let header = if header.trim().is_empty() {
            PostHeader::default()
        } else {
            serde_yaml::from_str(header).map_err(ContentError::Frontmatter)?
        };

        // exactly one blank separator line belongs to the format, not the body
        let body = body
            .strip_prefix("\r\n")
            .or_else(|| body.strip_prefix('\n'))
            .unwrap_or(body);

        Ok(Self {
            header,
            body: body.to_string(),
        })
    }
}

/// Split `text` into (header, rest-after-closing-delimiter). Delimiter lines
/// may end in `\n` or `\r\n`.
fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut start = 0;
    loop {
        let end = rest[start..].find('\n').map_or(rest.len(), |i| start + i + 1);
        let line = rest[start..end].strip_suffix('\n').unwrap_or(&rest[start..end]);
        if line.strip_suffix('\r').unwrap_or(line) == DELIMITER {
            return Some((&rest[..start], &rest[end..]));
        }
        if end == rest.len() {
            return None;
        }
        start = end;
    }
}

/// YAML double-quoted scalar.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if needs_escape(c) => {
                let code = u32::from(c);
                if code <= 0xff {
                    out.push_str(&format!("\\x{:02X}", code));
                } else {
                    out.push_str(&format!("\\u{:04X}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Characters a YAML reader rejects, or folds into a space, when written raw
/// inside a quoted scalar.
fn needs_escape(c: char) -> bool {
    c.is_control() || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}' | '\u{fffe}' | '\u{ffff}')
}

/// Hand-edited headers may hold bare dates or numbers; keep their text.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s,
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .map_err(serde::de::Error::custom)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> BlogPost {
        BlogPost {
            slug: "hello-world".to_string(),
            title: "Hello World".to_string(),
            date: "2024-01-01".to_string(),
            category: "Product Strategy".to_string(),
            excerpt: "x".to_string(),
            content: "<p>hi</p>".to_string(),
        }
    }

    #[test]
    fn test_encode_format() {
        let text = sample().to_file().encode();
        assert_eq!(
            text,
            "---\ntitle: \"Hello World\"\ndate: \"2024-01-01\"\ncategory: \"Product Strategy\"\nexcerpt: \"x\"\n---\n\n<p>hi</p>"
        );
    }

    #[test]
    fn test_roundtrip_with_quotes_and_backslashes() {
        let mut post = sample();
        post.title = r#"The "Real" C:\ path"#.to_string();
        post.excerpt = "line one\nline two".to_string();
        post.content = "\n# Heading\n\n---\n\nafter a rule\n".to_string();

        let slug = Slug::parse("hello-world").unwrap();
        let decoded = PostFile::decode(&post.to_file().encode()).unwrap();
        assert_eq!(BlogPost::from_file(&slug, decoded), post);
    }

    #[test]
    fn test_decode_hand_written_header() {
        let text = "---\ntitle: Plain title\ndate: 2023-05-06\ncategory: AI Adoption\n---\nBody";
        let file = PostFile::decode(text).unwrap();
        assert_eq!(file.header.title, "Plain title");
        assert_eq!(file.header.date, "2023-05-06");
        assert_eq!(file.header.excerpt, "");
        assert_eq!(file.body, "Body");
    }

    #[test]
    fn test_decode_without_frontmatter() {
        let file = PostFile::decode("just text").unwrap();
        assert_eq!(file.header, PostHeader::default());
        assert_eq!(file.body, "just text");
    }

    #[test]
    fn test_decode_empty_header() {
        let file = PostFile::decode("---\n---\n\nbody").unwrap();
        assert_eq!(file.header, PostHeader::default());
        assert_eq!(file.body, "body");
    }

    #[test]
    fn test_roundtrip_with_control_and_separator_chars() {
        let mut post = sample();
        post.title = "Bell\u{7} A\u{2028}B\u{85}C\u{2029}D\u{feff}".to_string();
        post.excerpt = "nul\u{0} del\u{7f} esc\u{1b} nbsp\u{a0}".to_string();

        let encoded = post.to_file().encode();
        assert!(encoded.contains(r#"title: "Bell\x07 A\u2028B\x85C\u2029D\uFEFF""#));

        let slug = Slug::parse("hello-world").unwrap();
        let decoded = PostFile::decode(&encoded).unwrap();
        assert_eq!(BlogPost::from_file(&slug, decoded), post);
    }

    #[test]
    fn test_decode_crlf_file() {
        let text = "---\r\ntitle: \"Windows\"\r\ndate: 2024-01-01\r\n---\r\n\r\nBody line\r\n";
        let file = PostFile::decode(text).unwrap();
        assert_eq!(file.header.title, "Windows");
        assert_eq!(file.header.date, "2024-01-01");
        assert_eq!(file.body, "Body line\r\n");

        let empty = PostFile::decode("---\r\n---\r\n\r\nbody").unwrap();
        assert_eq!(empty.header, PostHeader::default());
        assert_eq!(empty.body, "body");
    }

    #[test]
    fn test_decode_unclosed_header_is_body() {
        let file = PostFile::decode("---\ntitle: x\nno closing line").unwrap();
        assert_eq!(file.header, PostHeader::default());
        assert_eq!(file.body, "---\ntitle: x\nno closing line");
    }

    #[test]
    fn test_decode_bad_yaml() {
        let result = PostFile::decode("---\ntitle: [unclosed\n---\n\nbody");
        assert!(matches!(result, Err(ContentError::Frontmatter(_))));
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(BlogCategory::parse("AI Adoption"), Some(BlogCategory::AiAdoption));
        assert_eq!(BlogCategory::parse("ai adoption"), None);
        assert_eq!(sample().category(), Some(BlogCategory::ProductStrategy));
    }

    proptest! {
        #[test]
        fn any_header_text_reads_back(title in any::<String>(), excerpt in any::<String>(), body in any::<String>()) {
            let header = PostHeader {
                title,
                date: "2024-01-01".to_string(),
                category: "AI Adoption".to_string(),
                excerpt,
            };
            let file = PostFile { header, body };

            let decoded = PostFile::decode(&file.encode()).unwrap();
            prop_assert_eq!(decoded, file);
        }
    }
}
