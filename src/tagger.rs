//! Derives tags from post content. Tagging is a pluggable capability: the
//! index builder only depends on the [`Tagger`] trait, so a smarter strategy
//! can replace the keyword rules without touching the filtering code.

use serde::Deserialize;

/// Produces the tags for a post from its raw markdown source. The returned
/// tags must be unique; their order is the order in which they are shown.
pub trait Tagger: Send + Sync {
    fn tags(&self, content: &str) -> Vec<String>;
}

/// A single keyword rule: posts mentioning `keyword` (case-insensitively)
/// get tagged `tag`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub tag: String,
}

impl KeywordRule {
    pub fn new(keyword: &str, tag: &str) -> KeywordRule {
        KeywordRule {
            keyword: keyword.to_owned(),
            tag: tag.to_owned(),
        }
    }
}

/// Tags posts by plain substring matching against a list of rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeywordTagger {
    rules: Vec<KeywordRule>,
}

impl KeywordTagger {
    pub fn new(rules: Vec<KeywordRule>) -> KeywordTagger {
        KeywordTagger { rules }
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }
}

impl Default for KeywordTagger {
    /// The built-in rules.
    fn default() -> KeywordTagger {
        KeywordTagger::new(vec![
            KeywordRule::new("bit", "Bit"),
            KeywordRule::new("component", "Component Management"),
            KeywordRule::new("monorepo", "Monorepo"),
            KeywordRule::new("pnpm", "pnpm"),
            KeywordRule::new("react", "React"),
            KeywordRule::new("development", "Development"),
            KeywordRule::new("software", "Software Engineering"),
        ])
    }
}

impl Tagger for KeywordTagger {
    fn tags(&self, content: &str) -> Vec<String> {
        let content = content.to_lowercase();
        let mut tags: Vec<String> = Vec::new();
        for rule in &self.rules {
            if content.contains(&rule.keyword.to_lowercase())
                && !tags.contains(&rule.tag)
            {
                tags.push(rule.tag.clone());
            }
        }
        tags
    }
}
