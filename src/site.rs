//! Serves the read-only views of the blog: a single post, the homepage cards,
//! and search results. A [`Site`] is assembled once from the post index, the
//! markdown sources and the image assets, and is immutable afterwards.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use url::Url;
use walkdir::WalkDir;

use crate::assets::AssetIndex;
use crate::config::Config;
use crate::filter::FilterState;
use crate::index::{self, read_index, MARKDOWN_EXTENSION};
use crate::parser::Parser;
use crate::post::{PostCard, PostMetadata, PostView};

pub struct Site {
    posts: Vec<PostMetadata>,

    /// Raw markdown keyed by slug.
    sources: HashMap<String, String>,
    assets: AssetIndex,
    parser: Parser,
    home_page_size: usize,
}

impl Site {
    /// Loads the index file, every post source and the image assets named by
    /// `config`.
    pub fn load(config: &Config) -> Result<Site> {
        let posts = read_index(&config.index_file)?;
        let sources = load_sources(&config.posts_directory)?;
        let mut assets =
            AssetIndex::from_directory(&config.images_directory, &config.images_url)?;
        if let Some(default_image) = &config.default_image {
            assets = assets.fallback(default_image.clone());
        }
        info!(
            "loaded {} indexed posts, {} sources and {} images",
            posts.len(),
            sources.len(),
            assets.len()
        );

        Ok(Site {
            parser: Parser::new(&config.author),
            home_page_size: config.home_page_size,
            ..Site::new(posts, sources, assets)
        })
    }

    /// Assembles a site from in-memory parts, using the default author and a
    /// home page of 3 posts.
    pub fn new(
        posts: Vec<PostMetadata>,
        sources: HashMap<String, String>,
        assets: AssetIndex,
    ) -> Site {
        Site {
            posts,
            sources,
            assets,
            parser: Parser::default(),
            home_page_size: 3,
        }
    }

    /// The index entries, most recent first.
    pub fn posts(&self) -> &[PostMetadata] {
        &self.posts
    }

    /// Renders the post identified by `slug`.
    pub fn post(&self, slug: &str) -> Result<PostView> {
        let not_found = || Error::NotFound(slug.to_owned());
        let meta = self.posts.iter().find(|p| p.slug == slug).ok_or_else(not_found)?;
        let source = self.sources.get(slug).ok_or_else(not_found)?;
        let post = self.parser.parse_post(source).map_err(|e| {
            debug!("rendering `{}`: {}", slug, e);
            not_found()
        })?;

        Ok(PostView {
            post,
            tags: meta.tags.clone(),
            image: self.image_for(slug),
        })
    }

    /// The cards of the most recent posts.
    pub fn home(&self) -> Vec<PostCard> {
        self.posts
            .iter()
            .take(self.home_page_size)
            .map(|meta| PostCard::new(meta, self.image_for(&meta.slug)))
            .collect()
    }

    pub fn search(&self, state: &FilterState) -> Vec<&PostMetadata> {
        state.apply(&self.posts)
    }

    /// The image of a post, or the default image if none matches.
    pub fn image_for(&self, slug: &str) -> Option<Url> {
        self.assets.resolve(slug).cloned()
    }
}

/// Reads every markdown file directly inside `dir`. Unreadable files are
/// skipped with a warning.
fn load_sources(dir: &Path) -> Result<HashMap<String, String>> {
    let mut sources = HashMap::new();
    for result in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = result?;
        let file_name = entry.file_name().to_string_lossy();
        let slug = match file_name.strip_suffix(MARKDOWN_EXTENSION) {
            Some(slug) if !slug.is_empty() && entry.file_type().is_file() => slug,
            _ => continue,
        };
        match fs::read_to_string(entry.path()) {
            Ok(source) => {
                sources.insert(slug.to_owned(), source);
            }
            Err(e) => warn!("skipping `{}`: {}", entry.path().display(), e),
        }
    }
    Ok(sources)
}

/// Represents the result of a site operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading the site or looking up a post.
#[derive(Debug)]
pub enum Error {
    /// Returned when a slug has no metadata, no source, or no renderable
    /// content.
    NotFound(String),

    /// Returned when the post index can't be read.
    Index(index::Error),

    /// Returned for I/O errors.
    Io(std::io::Error),

    /// Returned when a directory can't be walked.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(slug) => write!(f, "post `{}` not found", slug),
            Error::Index(err) => write!(f, "reading post index: {}", err),
            Error::Io(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NotFound(_) => None,
            Error::Index(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<index::Error> for Error {
    fn from(err: index::Error) -> Error {
        Error::Index(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
