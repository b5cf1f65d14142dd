//! Builds the post index: one [`PostMetadata`] per markdown file in the
//! posts directory. The index is computed once, ahead of rendering, and
//! stored as a JSON array so views can filter it without touching the
//! source files.

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, read_dir, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::parser::split_header;
use crate::post::PostMetadata;
use crate::tagger::Tagger;

pub const MARKDOWN_EXTENSION: &str = ".md";

/// Derives [`PostMetadata`] from post source files.
pub struct Indexer {
    tagger: Arc<dyn Tagger>,

    /// The number of worker threads reading and parsing files. Fewer than 2
    /// means everything happens on the calling thread.
    threads: usize,
}

impl Indexer {
    pub fn new(tagger: Arc<dyn Tagger>, threads: usize) -> Indexer {
        Indexer { tagger, threads }
    }

    /// Indexes every `.md` file directly inside `dir`. The result is ordered
    /// by date (most recent first), then by slug.
    pub fn build(&self, dir: &Path) -> Result<Vec<PostMetadata>> {
        let mut posts = match self.threads < 2 {
            true => self.build_singlethreaded(dir)?,
            false => self.build_parallel(dir)?,
        };
        posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));
        info!("indexed {} posts from `{}`", posts.len(), dir.display());
        Ok(posts)
    }

    fn build_singlethreaded(&self, dir: &Path) -> Result<Vec<PostMetadata>> {
        markdown_files(dir)?
            .iter()
            .map(|(slug, path)| index_file(self.tagger.as_ref(), slug, path))
            .collect()
    }

    fn build_parallel(&self, dir: &Path) -> Result<Vec<PostMetadata>> {
        use crossbeam_channel::unbounded;
        use std::thread;

        let (tx, rx) = unbounded::<(String, PathBuf)>();
        let mut workers = Vec::with_capacity(self.threads);

        for _ in 0..self.threads {
            let rx = rx.clone();
            let tagger = Arc::clone(&self.tagger);
            workers.push(thread::spawn(move || -> Result<Vec<PostMetadata>> {
                let mut v: Vec<PostMetadata> = Vec::new();
                for (slug, path) in rx {
                    v.push(index_file(tagger.as_ref(), &slug, &path)?);
                }
                Ok(v)
            }))
        }
        drop(rx);

        for file in markdown_files(dir)? {
            // Only fails once every worker has bailed out with an error,
            // which the joins below report.
            if tx.send(file).is_err() {
                break;
            }
        }
        drop(tx);

        let mut posts: Vec<PostMetadata> = Vec::new();
        for worker in workers {
            posts.extend(worker.join().map_err(|_| Error::WorkerPanicked)??);
        }
        Ok(posts)
    }
}

/// Lists the `(slug, path)` of every markdown file directly inside `dir`.
fn markdown_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let annotate = |e: std::io::Error| {
        Error::Annotated(format!("listing `{}`", dir.display()), Box::new(e.into()))
    };

    let mut files = Vec::new();
    for result in read_dir(dir).map_err(annotate)? {
        let entry = result.map_err(annotate)?;
        let os_file_name = entry.file_name();
        let file_name = os_file_name.to_string_lossy();
        if let Some(slug) = file_name.strip_suffix(MARKDOWN_EXTENSION) {
            if !slug.is_empty() && entry.file_type().map_err(annotate)?.is_file() {
                files.push((slug.to_owned(), entry.path()));
            }
        }
    }
    Ok(files)
}

fn index_file(tagger: &dyn Tagger, slug: &str, path: &Path) -> Result<PostMetadata> {
    let annotate =
        |e: std::io::Error| Error::Annotated(format!("indexing `{}`", path.display()), Box::new(e.into()));

    debug!("indexing `{}`", path.display());
    let content = fs::read_to_string(path).map_err(annotate)?;
    let modified = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map(|time| DateTime::<Utc>::from(time).naive_utc().date())
        .ok();
    Ok(describe(
        tagger,
        slug,
        &content,
        modified.unwrap_or_else(|| Utc::now().naive_utc().date()),
    ))
}

/// Derives the metadata of one post from its source. The title is the first
/// non-empty line less its `#` markers, and the date comes from a `Date:`
/// line right below it, else `fallback_date`.
pub fn describe(
    tagger: &dyn Tagger,
    slug: &str,
    content: &str,
    fallback_date: NaiveDate,
) -> PostMetadata {
    let header = split_header(content.trim_start());
    PostMetadata {
        slug: slug.to_owned(),
        title: header.title,
        date: header
            .date
            .map(|date| date.naive_utc().date())
            .unwrap_or(fallback_date),
        tags: tagger.tags(content),
    }
}

/// Writes the index to `path` as pretty-printed JSON, creating parent
/// directories as needed.
pub fn write_index(path: &Path, posts: &[PostMetadata]) -> Result<()> {
    let annotate = |e: std::io::Error| {
        Error::Annotated(format!("writing `{}`", path.display()), Box::new(e.into()))
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(annotate)?;
    }
    let file = File::create(path).map_err(annotate)?;
    serde_json::to_writer_pretty(BufWriter::new(file), posts)?;
    Ok(())
}

/// Reads an index written by [`write_index`]. Fails if two entries share a
/// slug.
pub fn read_index(path: &Path) -> Result<Vec<PostMetadata>> {
    let file = File::open(path).map_err(|e| {
        Error::Annotated(format!("reading `{}`", path.display()), Box::new(e.into()))
    })?;
    let posts: Vec<PostMetadata> = serde_json::from_reader(BufReader::new(file))?;

    let mut seen = HashSet::new();
    for post in &posts {
        if !seen.insert(post.slug.as_str()) {
            return Err(Error::DuplicateSlug(post.slug.clone()));
        }
    }
    Ok(posts)
}

/// Represents the result of an indexing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error building, reading or writing the post index.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O errors.
    Io(std::io::Error),

    /// Returned when the index file isn't valid JSON or can't be written.
    Json(serde_json::Error),

    /// Returned when an index file lists the same slug twice.
    DuplicateSlug(String),

    /// Returned when an indexing worker thread panicked.
    WorkerPanicked,

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Json(err) => err.fmt(f),
            Error::DuplicateSlug(slug) => {
                write!(f, "duplicate slug `{}` in post index", slug)
            }
            Error::WorkerPanicked => write!(f, "indexing worker panicked"),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::DuplicateSlug(_) => None,
            Error::WorkerPanicked => None,
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    /// Converts a [`serde_json::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for JSON (de)serialization.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}
