//! Exports the [`build_index`] function which stitches together the steps of
//! building the post index: reading and tagging every post source
//! ([`crate::index::Indexer`]) and writing the result to the configured index
//! file.

use crate::config::Config;
use crate::index::{write_index, Error as IndexError, Indexer};
use crate::post::PostMetadata;
use std::fmt;
use std::sync::Arc;

/// Builds the post index from a [`Config`] object and writes it to
/// `config.index_file`. Returns the indexed posts, most recent first.
pub fn build_index(config: &Config) -> Result<Vec<PostMetadata>> {
    let indexer = Indexer::new(Arc::new(config.tagger()), config.threads);
    let posts = indexer
        .build(&config.posts_directory)
        .map_err(Error::Index)?;
    write_index(&config.index_file, &posts).map_err(Error::Write)?;
    Ok(posts)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building the index. Errors can happen while indexing
/// the post sources or while writing the index file.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors reading or tagging the post sources.
    Index(IndexError),

    /// Returned for errors writing the index file.
    Write(IndexError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Index(err) => write!(f, "Indexing posts: {}", err),
            Error::Write(err) => write!(f, "Writing index: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Index(err) => Some(err),
            Error::Write(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::PROJECT_FILE;
    use crate::index::read_index;
    use crate::site::Site;
    use std::fs;

    #[test]
    fn test_build_then_load_site() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let testdata = std::env::current_dir()?.join("testdata");
        fs::write(
            dir.path().join(PROJECT_FILE),
            format!(
                "site_root: https://example.org/\n\
                 posts_directory: {}\n\
                 images_directory: {}\n\
                 index_file: data/blog-posts.json\n",
                testdata.join("blog").display(),
                testdata.join("blog-images").display(),
            ),
        )?;
        let config = Config::from_directory(dir.path(), Some(2))?;

        let posts = build_index(&config)?;
        assert_eq!(posts.len(), 3);
        assert_eq!(read_index(&dir.path().join("data/blog-posts.json"))?, posts);

        let site = Site::load(&config)?;
        assert_eq!(site.posts(), posts.as_slice());
        let cards = site.home();
        assert_eq!(cards.len(), 3);
        assert_eq!(
            cards[0].image.as_ref().map(url::Url::as_str),
            Some("https://example.org/blog-images/pnpm.svg")
        );
        Ok(())
    }

    #[test]
    fn test_missing_posts_directory() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "site_root: https://example.org/\nposts_directory: nowhere\n",
        )?;
        let config = Config::from_directory(dir.path(), Some(1))?;
        assert!(matches!(build_index(&config), Err(Error::Index(_))));
        assert!(!config.index_file.exists());
        Ok(())
    }
}
