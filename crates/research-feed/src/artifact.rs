/// Builds the publishable metadata record for a document. Pure; never fails.
use chrono::{DateTime, SecondsFormat, Utc};

use crate::model::{ArtifactMetadata, Document};

pub const NAME_PREFIX: &str = "ResearchToken - ";
pub const ANONYMOUS_AUTHOR: &str = "anonymous";
/// Excerpt length embedded in the human-readable description.
pub const DESCRIPTION_EXCERPT_CHARS: usize = 400;
/// Excerpt length carried in the durable payload.
pub const RESEARCH_SNIPPET_CHARS: usize = 2000;

pub fn build(document: &Document, author: Option<&str>) -> ArtifactMetadata {
    build_at(document, author, Utc::now())
}

pub fn build_at(
    document: &Document,
    author: Option<&str>,
    now: DateTime<Utc>,
) -> ArtifactMetadata {
    let excerpt = take_chars(&document.content, DESCRIPTION_EXCERPT_CHARS);
    let created_by = author
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(ANONYMOUS_AUTHOR);

    ArtifactMetadata {
        name: format!("{NAME_PREFIX}{}", document.name),
        description: format!(
            "Token created from research article {} ({})\n\nExcerpt:\n{excerpt}",
            document.name, document.path
        ),
        article_file: document.path.clone(),
        created_by: created_by.to_string(),
        created_at: iso8601(now),
        research_snippet: take_chars(&document.content, RESEARCH_SNIPPET_CHARS),
    }
}

/// `2024-05-01T12:00:00.000Z`
pub fn iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn take_chars(s: &str, n: usize) -> String {
    match s.char_indices().nth(n) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn doc(content: String) -> Document {
        Document {
            path: "o/long.md".to_string(),
            name: "long.md".to_string(),
            content,
        }
    }

    #[test]
    fn long_content_is_truncated_twice() {
        let content: String = (0..5000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let meta = build(&doc(content.clone()), None);

        assert_eq!(meta.research_snippet, content[..2000]);
        assert_eq!(meta.research_snippet.chars().count(), 2000);

        let (_, excerpt) = meta.description.split_once("Excerpt:\n").unwrap();
        assert_eq!(excerpt, &content[..400]);
        assert!(!meta.description.contains(&content[..401]));
    }

    #[test]
    fn fields_carry_provenance() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let meta = build_at(&doc("short".to_string()), Some("0xabc"), at);
        assert_eq!(meta.name, "ResearchToken - long.md");
        assert_eq!(meta.article_file, "o/long.md");
        assert_eq!(meta.created_by, "0xabc");
        assert_eq!(meta.created_at, "2024-05-01T12:00:00.000Z");
        assert_eq!(meta.research_snippet, "short");
        assert!(meta.description.contains("long.md"));
        assert!(meta.description.contains("o/long.md"));
        assert!(meta.description.ends_with("Excerpt:\nshort"));
    }

    #[test]
    fn missing_author_is_anonymous() {
        assert_eq!(build(&doc(String::new()), None).created_by, "anonymous");
        assert_eq!(build(&doc(String::new()), Some("  ")).created_by, "anonymous");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let content = "é".repeat(3000);
        let meta = build(&doc(content), None);
        assert_eq!(meta.research_snippet.chars().count(), 2000);
    }

    #[test]
    fn metadata_json_field_order() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let meta = build_at(&doc("x".to_string()), None, at);
        let json = serde_json::to_string(&meta).unwrap();
        let keys = [
            "\"name\"",
            "\"description\"",
            "\"article_file\"",
            "\"created_by\"",
            "\"created_at\"",
            "\"research_snippet\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
    }
}
