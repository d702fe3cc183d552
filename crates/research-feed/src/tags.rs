/// Category tagging.
///
/// Seven fixed categories, each with a keyword pattern and an inline marker
/// (`[tag:<category>]`). A document carries every category whose marker or keyword
/// appears in it, and falls back to `green` so it always shows under some filter.
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Green,
    Orange,
    Blue,
    Yellow,
    Red,
    Pink,
    Purple,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Green,
        Category::Orange,
        Category::Blue,
        Category::Yellow,
        Category::Red,
        Category::Pink,
        Category::Purple,
    ];

    /// Category used when nothing else matches.
    pub const DEFAULT: Category = Category::Green;

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Green => "green",
            Category::Orange => "orange",
            Category::Blue => "blue",
            Category::Yellow => "yellow",
            Category::Red => "red",
            Category::Pink => "pink",
            Category::Purple => "purple",
        }
    }

    /// Literal marker that tags a document regardless of keywords, e.g. `[tag:red]`.
    pub fn marker(self) -> String {
        format!("[tag:{}]", self.as_str())
    }

    fn keywords(self) -> &'static str {
        match self {
            Category::Green => r"tool(?:s|ing)?|engineer(?:ing)?",
            Category::Orange => r"ceo|executive|strategy",
            Category::Blue => r"input|submit|form",
            Category::Yellow => r"extract|export|download",
            Category::Red => r"routes?|paths?",
            Category::Pink => r"investigate|investigation|probe",
            Category::Purple => r"assimilate|assimilation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::UnknownCategory(wanted.to_string()))
    }
}

/// One category's keyword rule. The pattern is case-insensitive and bounded by ASCII
/// word characters only, so accented letters next to a keyword do not block a match.
#[derive(Debug)]
pub struct TagRule {
    pub category: Category,
    pub pattern: Regex,
}

/// The static rule table, one rule per category in `Category::ALL` order.
#[derive(Debug)]
pub struct TagRuleSet {
    rules: Vec<TagRule>,
}

static STANDARD_RULES: LazyLock<TagRuleSet> = LazyLock::new(TagRuleSet::build);

impl TagRuleSet {
    /// The process-wide rule table, compiled on first use.
    pub fn standard() -> &'static TagRuleSet {
        &STANDARD_RULES
    }

    fn build() -> Self {
        let rules = Category::ALL
            .into_iter()
            .map(|category| TagRule {
                category,
                pattern: Regex::new(&format!(r"(?i-u)\b(?:{})\b", category.keywords()))
                    .expect("valid regex"),
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[TagRule] {
        &self.rules
    }

    /// Categories that apply to `text`. Never empty.
    pub fn classify(&self, text: &str) -> BTreeSet<Category> {
        let lower = text.to_lowercase();
        let mut tags: BTreeSet<Category> = self
            .rules
            .iter()
            .filter(|rule| {
                lower.contains(&rule.category.marker()) || rule.pattern.is_match(&lower)
            })
            .map(|rule| rule.category)
            .collect();

        if tags.is_empty() {
            tags.insert(Category::DEFAULT);
        }
        tags
    }
}

/// Classify with the standard rule table.
pub fn classify(text: &str) -> BTreeSet<Category> {
    TagRuleSet::standard().classify(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(cats: &[Category]) -> BTreeSet<Category> {
        cats.iter().copied().collect()
    }

    #[test]
    fn untagged_text_defaults_to_green() {
        assert_eq!(classify(""), set(&[Category::Green]));
        assert_eq!(classify("Nothing to see here."), set(&[Category::Green]));
    }

    #[test]
    fn keywords_select_categories() {
        let tags = classify("We submit a form and export data.");
        assert_eq!(tags, set(&[Category::Blue, Category::Yellow]));

        assert_eq!(classify("The CEO set a STRATEGY"), set(&[Category::Orange]));
        assert_eq!(classify("we will probe it"), set(&[Category::Pink]));
        assert_eq!(classify("Assimilation complete"), set(&[Category::Purple]));
        assert_eq!(classify("all routes lead here"), set(&[Category::Red]));
        assert_eq!(classify("two paths"), set(&[Category::Red]));
    }

    #[test]
    fn green_only_when_matched_keeps_others_out() {
        let tags = classify("Tooling for engineering teams");
        assert_eq!(tags, set(&[Category::Green]));
    }

    #[test]
    fn keywords_are_word_bounded() {
        // "formal", "toolbox", "pathway", "exported" are not keywords
        assert_eq!(
            classify("a formal toolbox pathway, exported"),
            set(&[Category::Green])
        );
        assert_eq!(classify("subform input"), set(&[Category::Blue]));
    }

    #[test]
    fn non_ascii_letters_count_as_word_boundaries() {
        assert_eq!(classify("éform"), set(&[Category::Blue]));
        assert_eq!(classify("formé"), set(&[Category::Blue]));
        assert_eq!(classify("ÉXPORT"), set(&[Category::Green]));
        assert_eq!(classify("naïve route"), set(&[Category::Red]));
    }

    #[test]
    fn inline_marker_forces_category() {
        assert_eq!(classify("plain text [tag:purple]"), set(&[Category::Purple]));
        assert_eq!(classify("[TAG:Red] shouting"), set(&[Category::Red]));
        assert_eq!(
            classify("[tag:orange] with a download"),
            set(&[Category::Orange, Category::Yellow])
        );
    }

    #[test]
    fn classification_is_stable_across_calls() {
        let texts = ["export the route", "nothing", "[tag:pink] ceo"];
        let first: Vec<_> = texts.iter().map(|t| classify(t)).collect();
        let reversed: Vec<_> = texts.iter().rev().map(|t| classify(t)).collect();
        let again: Vec<_> = texts.iter().map(|t| classify(t)).collect();
        assert_eq!(first, again);
        assert_eq!(first, reversed.into_iter().rev().collect::<Vec<_>>());
    }

    #[test]
    fn parse_category_names() {
        assert_eq!("Blue".parse::<Category>().unwrap(), Category::Blue);
        assert_eq!(" pink ".parse::<Category>().unwrap(), Category::Pink);
        assert!(matches!(
            "magenta".parse::<Category>(),
            Err(AppError::UnknownCategory(_))
        ));
    }

    #[test]
    fn one_rule_per_category_in_order() {
        let cats: Vec<_> = TagRuleSet::standard()
            .rules()
            .iter()
            .map(|r| r.category)
            .collect();
        assert_eq!(cats, Category::ALL.to_vec());
    }
}
