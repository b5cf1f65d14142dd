//! Resolves the companion image of a post. Image files are named after one
//! salient keyword (e.g., `pnpm.svg`) while post slugs are usually longer
//! identifiers (e.g., `MyPnpmWorkspaceJourney`), so besides exact matches
//! the resolver also matches any word of the slug against the image names.

use log::debug;
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;
use walkdir::WalkDir;

/// Extensions recognized as images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["svg", "png", "jpg", "jpeg", "webp", "avif"];

/// Maps image basenames (file name less extension) to URLs. Built once and
/// read-only afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssetIndex {
    assets: BTreeMap<String, Url>,

    /// Returned by [`AssetIndex::resolve`] when nothing matches.
    fallback: Option<Url>,
}

impl AssetIndex {
    /// Scans `dir` for image files and maps each to `base_url` joined with
    /// its file name. `base_url` should end in a trailing slash. Files are
    /// visited in file name order, and when two files share a basename the
    /// first one wins.
    pub fn from_directory(
        dir: &Path,
        base_url: &Url,
    ) -> Result<AssetIndex, walkdir::Error> {
        let mut index = AssetIndex::default();
        for result in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = result?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            match base_url.join(&file_name) {
                Ok(url) => index.insert(&file_name, url),
                Err(e) => debug!("skipping asset `{}`: {}", file_name, e),
            }
        }
        Ok(index)
    }

    /// Builds an index out of a list of candidate image URLs. The basename is
    /// taken from the last path segment of each URL.
    pub fn from_urls<I: IntoIterator<Item = Url>>(urls: I) -> AssetIndex {
        let mut index = AssetIndex::default();
        for url in urls {
            let file_name = url
                .path_segments()
                .and_then(|segments| segments.last())
                .unwrap_or_default()
                .to_owned();
            index.insert(&file_name, url);
        }
        index
    }

    fn insert(&mut self, file_name: &str, url: Url) {
        if let Some(basename) = image_basename(file_name) {
            self.assets.entry(basename.to_owned()).or_insert(url);
        }
    }

    /// Sets the image used for posts without a matching asset.
    pub fn fallback(mut self, url: Url) -> AssetIndex {
        self.fallback = Some(url);
        self
    }

    /// Like [`AssetIndex::find`], but falls back to the image set with
    /// [`AssetIndex::fallback`].
    pub fn resolve(&self, slug: &str) -> Option<&Url> {
        self.find(slug).or_else(|| self.fallback.as_ref())
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Finds the image for `slug`. See [`find_image_asset`].
    pub fn find(&self, slug: &str) -> Option<&Url> {
        if let Some(url) = self.assets.get(slug) {
            return Some(url);
        }

        let tokens = slug_tokens(slug);
        let found = self
            .assets
            .iter()
            .find(|(basename, _)| {
                let basename = basename.to_lowercase();
                tokens.iter().any(|token| *token == basename)
            })
            .map(|(_, url)| url);
        if found.is_none() {
            debug!("no image asset for `{}`", slug);
        }
        found
    }
}

/// Finds the image asset for a post `slug`:
///
/// 1. An asset whose basename equals `slug` exactly.
/// 2. Otherwise the first asset (in basename order) whose lowercased
///    basename equals one of the slug's words (see [`slug_tokens`]).
/// 3. Otherwise `None`; callers supply their own fallback visual.
pub fn find_image_asset<'a>(slug: &str, index: &'a AssetIndex) -> Option<&'a Url> {
    index.find(slug)
}

/// Splits a slug into lowercase alphabetic words: camelCase humps are
/// separated and every run of non-letters is a boundary. For example,
/// `MyPnpmWorkspaceJourney` yields `my`, `pnpm`, `workspace`, `journey`.
pub fn slug_tokens(slug: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut previous_lowercase = false;
    for c in slug.chars() {
        if !c.is_ascii_alphabetic() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            previous_lowercase = false;
            continue;
        }
        if c.is_ascii_uppercase() && previous_lowercase {
            tokens.push(std::mem::take(&mut current));
        }
        current.push(c.to_ascii_lowercase());
        previous_lowercase = c.is_ascii_lowercase();
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Returns the file name less its extension if the extension is an image
/// extension.
fn image_basename(file_name: &str) -> Option<&str> {
    let (basename, extension) = file_name.rsplit_once('.')?;
    if basename.is_empty() {
        return None;
    }
    IMAGE_EXTENSIONS
        .iter()
        .any(|e| e.eq_ignore_ascii_case(extension))
        .then(|| basename)
}
