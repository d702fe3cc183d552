/// Renders document text as display markup.
///
/// Order matters: escape, then inject cross-reference anchors for known document
/// names, then wrap keyword matches in category spans. In `Legacy` mode the highlight
/// pass runs over the whole string, anchors included, so a keyword inside a linked
/// name (or its `data-fname` attribute) gets wrapped too. `Segmented` mode splits the
/// text into plain and reference segments first and only highlights plain ones.
use std::collections::BTreeSet;
use std::str::FromStr;

use regex::Captures;

use crate::error::AppError;
use crate::tags::{Category, TagRuleSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnnotateMode {
    #[default]
    Legacy,
    Segmented,
}

impl FromStr for AnnotateMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(AnnotateMode::Legacy),
            "segmented" => Ok(AnnotateMode::Segmented),
            other => Err(AppError::Config(format!(
                "ANNOTATE_MODE must be 'legacy' or 'segmented', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub html: String,
    /// Classified from the raw input, not from the markup.
    pub tags: BTreeSet<Category>,
}

#[derive(Debug, Clone, Copy)]
pub struct Annotator {
    rules: &'static TagRuleSet,
    mode: AnnotateMode,
}

enum Segment {
    Plain(String),
    Reference(String),
}

impl Annotator {
    pub fn new(mode: AnnotateMode) -> Self {
        Self {
            rules: TagRuleSet::standard(),
            mode,
        }
    }

    /// Annotate `text`, linking every occurrence of each name in `known_names`.
    /// Names are applied in the given order.
    pub fn annotate<S: AsRef<str>>(&self, text: &str, known_names: &[S]) -> Annotation {
        let escaped = escape_html(text);
        let html = match self.mode {
            AnnotateMode::Legacy => self.render_legacy(escaped, known_names),
            AnnotateMode::Segmented => self.render_segmented(escaped, known_names),
        };
        Annotation {
            html,
            tags: self.rules.classify(text),
        }
    }

    fn render_legacy<S: AsRef<str>>(&self, escaped: String, known_names: &[S]) -> String {
        let mut html = escaped;
        for name in known_names.iter().map(AsRef::as_ref) {
            if name.is_empty() {
                continue;
            }
            html = html.replace(name, &reference_anchor(name));
        }
        self.highlight(&html)
    }

    fn render_segmented<S: AsRef<str>>(&self, escaped: String, known_names: &[S]) -> String {
        let mut segments = vec![Segment::Plain(escaped)];
        for name in known_names.iter().map(AsRef::as_ref) {
            if name.is_empty() {
                continue;
            }
            segments = segments
                .into_iter()
                .flat_map(|segment| match segment {
                    Segment::Plain(text) => split_on_name(&text, name),
                    reference => vec![reference],
                })
                .collect();
        }

        segments
            .iter()
            .map(|segment| match segment {
                Segment::Plain(text) => self.highlight(text),
                Segment::Reference(name) => reference_anchor(name),
            })
            .collect()
    }

    /// Wrap every keyword match in a span, one category at a time. Each pass sees
    /// the output of the previous one.
    fn highlight(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in self.rules.rules() {
            let class = rule.category.as_str();
            out = rule
                .pattern
                .replace_all(&out, |caps: &Captures| {
                    format!(r#"<span class="{class}">{}</span>"#, &caps[0])
                })
                .into_owned();
        }
        out
    }
}

fn split_on_name(text: &str, name: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(name) {
        if idx > last {
            out.push(Segment::Plain(text[last..idx].to_string()));
        }
        out.push(Segment::Reference(name.to_string()));
        last = idx + name.len();
    }
    if last < text.len() {
        out.push(Segment::Plain(text[last..].to_string()));
    }
    out
}

fn reference_anchor(name: &str) -> String {
    format!(r##"<a href="#" data-fname="{name}" class="article-link">{name}</a>"##)
}

/// Escape `&`, `<`, `"` and `'`. `>` is left alone.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}
