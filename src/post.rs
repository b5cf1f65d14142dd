//! Defines the post records that flow between the index, the renderer, and
//! the views: [`PostMetadata`] (one entry of the post index), [`ParsedPost`]
//! (a rendered post body), and the view-shaped [`PostView`] and
//! [`PostCard`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::filter::tags_link;

/// One entry of the post index. The `slug` is derived from the source file
/// name and uniquely identifies both the entry and its markdown document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetadata {
    pub slug: String,
    pub title: String,

    /// Serialized as an ISO 8601 calendar date (`YYYY-MM-DD`).
    pub date: NaiveDate,

    /// Unique per post, in discovery order.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PostMetadata {
    /// Returns true if the post carries `tag` (exact, case-sensitive).
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A post rendered from its markdown source. Recomputed per view, never
/// persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPost {
    pub title: String,
    pub date: DateTime<Utc>,
    pub author: String,

    /// A sanitized HTML fragment.
    pub html_content: String,
}

/// Everything a post detail view needs.
#[derive(Clone, Debug, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: ParsedPost,
    pub tags: Vec<String>,
    pub image: Option<Url>,
}

/// The number of tags shown on a [`PostCard`] before the rest are folded
/// into a "+N more" link.
pub const CARD_TAG_LIMIT: usize = 3;

/// A homepage card for a recent post.
#[derive(Clone, Debug, Serialize)]
pub struct PostCard {
    pub slug: String,
    pub title: String,
    pub date: NaiveDate,
    pub image: Option<Url>,

    /// At most [`CARD_TAG_LIMIT`] tags.
    pub tags: Vec<String>,
    pub hidden_tag_count: usize,

    /// A query string selecting every tag of the post, present only when
    /// some tags were hidden.
    pub all_tags_query: Option<String>,
}

impl PostCard {
    pub fn new(meta: &PostMetadata, image: Option<Url>) -> PostCard {
        let hidden = meta.tags.len().saturating_sub(CARD_TAG_LIMIT);
        PostCard {
            slug: meta.slug.clone(),
            title: meta.title.clone(),
            date: meta.date,
            image,
            tags: meta.tags.iter().take(CARD_TAG_LIMIT).cloned().collect(),
            hidden_tag_count: hidden,
            all_tags_query: match hidden {
                0 => None,
                _ => Some(tags_link(&meta.tags)),
            },
        }
    }
}
