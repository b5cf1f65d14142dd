//! Filters the post index by tag and by free-text query. The filter state
//! lives entirely in the URL query string:
//!
//! * `tag`: a single tag (kept for old links),
//! * `tags`: a comma-separated list of percent-encoded tags,
//! * `q`: free text.
//!
//! Selected tags combine with AND semantics and must match a post's tags
//! exactly. Query words combine with OR semantics and match when they appear
//! anywhere inside one of the post's (normalized) tags.

use std::collections::{BTreeSet, HashMap};
use unicode_normalization::UnicodeNormalization;

use crate::post::PostMetadata;

/// Normalizes text for fuzzy matching: lowercases, applies canonical
/// decomposition, and drops everything but ASCII letters, digits, `-` and
/// whitespace (which also drops the combining marks, so `Café` becomes
/// `cafe`).
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| matches!(*c, 'a'..='z' | '0'..='9' | '-') || c.is_whitespace())
        .collect()
}

/// Splits a raw query into normalized tokens on runs of commas and
/// whitespace. Empty tokens are discarded.
pub fn query_tokens(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(normalize)
        .filter(|token| !token.is_empty())
        .collect()
}

/// Returns the posts that carry every one of `selected_tags` and, if there
/// are any `query_tokens`, have at least one tag containing one of them.
/// The relative order of `posts` is preserved, and with no tags and no
/// tokens every post is returned.
pub fn filter_posts<'a>(
    posts: &'a [PostMetadata],
    selected_tags: &BTreeSet<String>,
    query_tokens: &[String],
) -> Vec<&'a PostMetadata> {
    posts
        .iter()
        .filter(|post| selected_tags.iter().all(|tag| post.has_tag(tag)))
        .filter(|post| {
            query_tokens.is_empty()
                || post.tags.iter().map(|tag| normalize(tag)).any(|tag| {
                    query_tokens.iter().any(|token| tag.contains(token.as_str()))
                })
        })
        .collect()
}

/// The filter selections of the post index view. A [`FilterState`] is
/// rebuilt from the URL on every navigation and never updated in place: the
/// modifiers return new values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    selected_tags: BTreeSet<String>,

    /// The query as typed, kept for writing back into the URL.
    query: String,
    query_tokens: Vec<String>,
}

impl FilterState {
    /// Parses a URL query string (with or without the leading `?`).
    /// Unknown parameters are ignored; repeated ones accumulate.
    pub fn from_query(query: &str) -> FilterState {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut tags = BTreeSet::new();
        let mut text: Vec<String> = Vec::new();

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match decode(key).as_str() {
                "tag" => tags.extend(non_empty(decode(value))),
                "tags" => tags.extend(
                    value.split(',').filter_map(|piece| non_empty(decode(piece))),
                ),
                "q" => text.extend(non_empty(decode(value))),
                _ => {}
            }
        }

        FilterState::default()
            .with_tags(tags)
            .with_query(&text.join(" "))
    }

    /// Writes the state back into a query string, `?tags=a,b&q=text`. An
    /// empty state yields an empty string.
    pub fn to_query(&self) -> String {
        let mut params = Vec::new();
        if !self.selected_tags.is_empty() {
            params.push(format!("tags={}", encode_tags(&self.selected_tags)));
        }
        if !self.query_tokens.is_empty() {
            params.push(format!("q={}", urlencoding::encode(self.query.trim())));
        }
        match params.is_empty() {
            true => String::new(),
            false => format!("?{}", params.join("&")),
        }
    }

    pub fn selected_tags(&self) -> &BTreeSet<String> {
        &self.selected_tags
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn query_tokens(&self) -> &[String] {
        &self.query_tokens
    }

    pub fn is_empty(&self) -> bool {
        self.selected_tags.is_empty() && self.query_tokens.is_empty()
    }

    /// Returns a state that also selects `tags`.
    pub fn with_tags<I: IntoIterator<Item = String>>(&self, tags: I) -> FilterState {
        let mut state = self.clone();
        state.selected_tags.extend(tags);
        state
    }

    /// Returns a state with `tag` selected if it wasn't, and deselected if it
    /// was.
    pub fn toggle_tag(&self, tag: &str) -> FilterState {
        let mut state = self.clone();
        if !state.selected_tags.remove(tag) {
            state.selected_tags.insert(tag.to_owned());
        }
        state
    }

    /// Returns a state with the free-text query replaced by `query`.
    pub fn with_query(&self, query: &str) -> FilterState {
        FilterState {
            selected_tags: self.selected_tags.clone(),
            query: query.to_owned(),
            query_tokens: query_tokens(query),
        }
    }

    /// Returns the empty state.
    pub fn cleared(&self) -> FilterState {
        FilterState::default()
    }

    /// Filters `posts` with this state. See [`filter_posts`].
    pub fn apply<'a>(&self, posts: &'a [PostMetadata]) -> Vec<&'a PostMetadata> {
        filter_posts(posts, &self.selected_tags, &self.query_tokens)
    }
}

/// The query string linking to the index filtered by a single tag.
pub fn tag_link(tag: &str) -> String {
    format!("?tag={}", urlencoding::encode(tag))
}

/// The query string linking to the index filtered by all of `tags`, listed in
/// the order given.
pub fn tags_link<S: AsRef<str>>(tags: &[S]) -> String {
    format!("?tags={}", encode_tags(tags))
}

fn encode_tags<I>(tags: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let tags: Vec<_> = tags
        .into_iter()
        .map(|tag| urlencoding::encode(tag.as_ref()).into_owned())
        .collect();
    tags.join(",")
}

/// Counts the posts per tag, most used first (ties broken by name).
pub fn tag_counts(posts: &[PostMetadata]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tag in posts.iter().flat_map(|post| post.tags.iter()) {
        *counts.entry(tag.as_str()).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(tag, count)| (tag.to_owned(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Percent-decodes a query component, treating `+` as a space. Invalid UTF-8
/// is replaced rather than rejected.
fn decode(component: &str) -> String {
    let component = component.replace('+', " ");
    match urlencoding::decode(&component) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(
            component.as_bytes(),
        ))
        .into_owned(),
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    match trimmed.is_empty() {
        true => None,
        false => Some(trimmed.to_owned()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn post(slug: &str, tags: &[&str]) -> PostMetadata {
        PostMetadata {
            slug: slug.to_owned(),
            title: slug.to_uppercase(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn posts() -> Vec<PostMetadata> {
        vec![post("a", &["x", "y"]), post("b", &["x"]), post("c", &["y"])]
    }

    fn slugs(posts: Vec<&PostMetadata>) -> Vec<&str> {
        posts.into_iter().map(|p| p.slug.as_str()).collect()
    }

    fn tags(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_tags_are_and_combined() {
        let posts = posts();
        assert_eq!(slugs(filter_posts(&posts, &tags(&["x", "y"]), &[])), vec!["a"]);
        assert_eq!(slugs(filter_posts(&posts, &tags(&["x"]), &[])), vec!["a", "b"]);
    }

    #[test]
    fn test_query_tokens_are_or_combined() {
        let posts = posts();
        assert_eq!(slugs(filter_posts(&posts, &tags(&[]), &query_tokens("y"))), vec!["a", "c"]);
        assert_eq!(
            slugs(filter_posts(&posts, &tags(&[]), &query_tokens("y, x"))),
            vec!["a", "b", "c"],
        );
        assert!(filter_posts(&posts, &tags(&[]), &query_tokens("z")).is_empty());
    }

    #[test]
    fn test_identity() {
        let posts = posts();
        assert_eq!(filter_posts(&posts, &tags(&[]), &[]), posts.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_tag_match_is_exact_and_case_sensitive() {
        let posts = vec![post("a", &["React"]), post("b", &["react"])];
        assert_eq!(slugs(filter_posts(&posts, &tags(&["React"]), &[])), vec!["a"]);
        assert!(filter_posts(&posts, &tags(&["Reac"]), &[]).is_empty());
    }

    #[test]
    fn test_query_is_fuzzy_substring() {
        let posts = vec![
            post("a", &["Component Management"]),
            post("b", &["Software Engineering"]),
            post("c", &["Café Culture"]),
        ];
        assert_eq!(slugs(filter_posts(&posts, &tags(&[]), &query_tokens("MANAGE"))), vec!["a"]);
        assert_eq!(slugs(filter_posts(&posts, &tags(&[]), &query_tokens("cafe"))), vec!["c"]);
        assert_eq!(slugs(filter_posts(&posts, &tags(&[]), &query_tokens("ware eng"))), vec!["b"]);
    }

    #[test]
    fn test_tags_and_query_together() {
        let posts = posts();
        let state = FilterState::from_query("?tag=x&q=y");
        assert_eq!(slugs(state.apply(&posts)), vec!["a"]);
    }

    #[test]
    fn test_preserves_order() {
        let posts = vec![post("z", &["t"]), post("m", &["t"]), post("a", &["t"])];
        assert_eq!(slugs(filter_posts(&posts, &tags(&["t"]), &query_tokens("t"))), vec!["z", "m", "a"]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Crème Brûlée!"), "creme brulee");
        assert_eq!(normalize("C++ & Rust-lang 2024"), "c  rust-lang 2024");
    }

    #[test]
    fn test_query_tokens() {
        assert_eq!(query_tokens(" React,,  pnpm\tMonorepo "), vec!["react", "pnpm", "monorepo"]);
        assert!(query_tokens(" , !! ").is_empty());
    }

    #[test]
    fn test_from_query() {
        let state = FilterState::from_query(
            "?tag=Bit&tags=Component%20Management,React&q=pnpm+mono&utm_source=x",
        );
        assert_eq!(*state.selected_tags(), tags(&["Bit", "Component Management", "React"]));
        assert_eq!(state.query(), "pnpm mono");
        assert_eq!(state.query_tokens(), &["pnpm".to_owned(), "mono".to_owned()][..]);
    }

    #[test]
    fn test_from_query_encoded_comma_inside_tag() {
        let state = FilterState::from_query("tags=a%2Cb,c");
        assert_eq!(*state.selected_tags(), tags(&["a,b", "c"]));
    }

    #[test]
    fn test_from_query_empty() {
        assert!(FilterState::from_query("").is_empty());
        assert!(FilterState::from_query("?tags=,&q=").is_empty());
    }

    #[test]
    fn test_to_query_round_trip() {
        let state = FilterState::default()
            .with_tags(vec!["Software Engineering".to_owned(), "a,b".to_owned()])
            .with_query("monorepo tips");
        assert_eq!(
            state.to_query(),
            "?tags=Software%20Engineering,a%2Cb&q=monorepo%20tips",
        );
        assert_eq!(FilterState::from_query(&state.to_query()), state);
        assert_eq!(FilterState::default().to_query(), "");
    }

    #[test]
    fn test_modifiers_do_not_mutate() {
        let state = FilterState::from_query("?tags=x");
        let toggled = state.toggle_tag("y");
        assert_eq!(*state.selected_tags(), tags(&["x"]));
        assert_eq!(*toggled.selected_tags(), tags(&["x", "y"]));
        assert_eq!(*toggled.toggle_tag("x").selected_tags(), tags(&["y"]));
        assert!(toggled.cleared().is_empty());
    }

    #[test]
    fn test_tags_link_keeps_order() {
        assert_eq!(tags_link(&["b", "a", "c d"]), "?tags=b,a,c%20d");
    }

    #[test]
    fn test_tag_link() {
        assert_eq!(tag_link("Component Management"), "?tag=Component%20Management");
    }

    #[test]
    fn test_tag_counts() {
        let posts = vec![post("a", &["x", "y"]), post("b", &["x"]), post("c", &["z", "y"])];
        assert_eq!(
            tag_counts(&posts),
            vec![("x".to_owned(), 2), ("y".to_owned(), 2), ("z".to_owned(), 1)],
        );
    }
}
