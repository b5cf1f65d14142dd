//! Loads the project configuration from `quire.yaml`.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

use crate::parser::DEFAULT_AUTHOR;
use crate::tagger::{KeywordRule, KeywordTagger};

pub const PROJECT_FILE: &str = "quire.yaml";

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(3)
    }
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_owned()
}

fn default_posts_directory() -> PathBuf {
    PathBuf::from("src/blog")
}

fn default_images_directory() -> PathBuf {
    PathBuf::from("src/blog-images")
}

fn default_images_url() -> String {
    String::from("blog-images/")
}

fn default_index_file() -> PathBuf {
    PathBuf::from("src/data/blog-posts.json")
}

fn default_preferences_file() -> PathBuf {
    PathBuf::from(".quire/preferences.yaml")
}

#[derive(Deserialize)]
struct Project {
    pub site_root: Url,

    #[serde(default = "default_author")]
    pub author: String,

    #[serde(default = "default_posts_directory")]
    pub posts_directory: PathBuf,

    #[serde(default = "default_images_directory")]
    pub images_directory: PathBuf,

    /// Relative to `site_root`.
    #[serde(default = "default_images_url")]
    pub images_url: String,

    #[serde(default = "default_index_file")]
    pub index_file: PathBuf,

    #[serde(default = "default_preferences_file")]
    pub preferences_file: PathBuf,

    /// Relative to `site_root`.
    #[serde(default)]
    pub default_image: Option<String>,

    #[serde(default)]
    pub home_page_size: PageSize,

    #[serde(default)]
    pub threads: Option<usize>,

    #[serde(default)]
    pub tag_rules: Option<Vec<KeywordRule>>,
}

/// The resolved project configuration. All paths are joined onto the
/// directory holding `quire.yaml`.
#[derive(Clone, Debug)]
pub struct Config {
    pub project_root: PathBuf,
    pub site_root: Url,
    pub author: String,
    pub posts_directory: PathBuf,
    pub images_directory: PathBuf,
    pub images_url: Url,
    pub index_file: PathBuf,
    pub preferences_file: PathBuf,
    pub default_image: Option<Url>,
    pub home_page_size: usize,
    pub threads: usize,
    pub tag_rules: Vec<KeywordRule>,
}

impl Config {
    /// Looks for `quire.yaml` in `dir` and then in each of its ancestors.
    /// `threads` overrides the configured thread count.
    pub fn from_directory(dir: &Path, threads: Option<usize>) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            return Config::from_project_file(&path, threads)
                .with_context(|| format!("Loading configuration `{}`", path.display()));
        }
        match dir.parent() {
            Some(parent) => Config::from_directory(parent, threads),
            None => Err(anyhow!(
                "Could not find `{}` in any parent directory",
                PROJECT_FILE
            )),
        }
    }

    pub fn from_project_file(path: &Path, threads: Option<usize>) -> Result<Config> {
        let file = File::open(path)
            .with_context(|| format!("Opening project file `{}`", path.display()))?;
        let project: Project = serde_yaml::from_reader(file)?;
        let project_root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )
        })?;

        let site_root = &project.site_root;
        let images_url = site_root.join(&project.images_url)?;
        let default_image = match &project.default_image {
            Some(image) => Some(site_root.join(image)?),
            None => None,
        };

        Ok(Config {
            images_url,
            default_image,
            posts_directory: project_root.join(project.posts_directory),
            images_directory: project_root.join(project.images_directory),
            index_file: project_root.join(project.index_file),
            preferences_file: project_root.join(project.preferences_file),
            project_root: project_root.to_owned(),
            site_root: project.site_root,
            author: project.author,
            home_page_size: project.home_page_size.0,
            threads: threads.or(project.threads).unwrap_or_else(num_cpus::get),
            tag_rules: match project.tag_rules {
                Some(rules) => rules,
                None => KeywordTagger::default().rules().to_vec(),
            },
        })
    }

    /// The tagger described by `tag_rules`.
    pub fn tagger(&self) -> KeywordTagger {
        KeywordTagger::new(self.tag_rules.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), "site_root: https://example.org/\n")?;
        let config = Config::from_directory(dir.path(), Some(2))?;
        assert_eq!(config.author, DEFAULT_AUTHOR);
        assert_eq!(config.posts_directory, dir.path().join("src/blog"));
        assert_eq!(config.index_file, dir.path().join("src/data/blog-posts.json"));
        assert_eq!(config.images_url.as_str(), "https://example.org/blog-images/");
        assert_eq!(config.default_image, None);
        assert_eq!(config.home_page_size, 3);
        assert_eq!(config.threads, 2);
        assert_eq!(config.tagger(), KeywordTagger::default());
        Ok(())
    }

    #[test]
    fn test_found_in_ancestor() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "site_root: https://example.org/blog/\n\
             author: Someone Else\n\
             posts_directory: posts\n\
             default_image: logo.png\n\
             home_page_size: 5\n\
             threads: 8\n\
             tag_rules:\n  - { keyword: rust, tag: Rust }\n",
        )?;
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested)?;

        let config = Config::from_directory(&nested, None)?;
        assert_eq!(config.project_root, dir.path());
        assert_eq!(config.author, "Someone Else");
        assert_eq!(config.posts_directory, dir.path().join("posts"));
        assert_eq!(
            config.default_image.as_ref().map(Url::as_str),
            Some("https://example.org/blog/logo.png")
        );
        assert_eq!(config.home_page_size, 5);
        assert_eq!(config.threads, 8);
        assert_eq!(config.tag_rules, vec![KeywordRule::new("rust", "Rust")]);
        Ok(())
    }

    #[test]
    fn test_invalid_project_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), "author: nobody\n")?;
        assert!(Config::from_directory(dir.path(), None).is_err());
        Ok(())
    }
}
