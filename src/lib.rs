//! folio: the blog content pipeline of a personal portfolio site
//!
//! Posts are Markdown documents with front-matter, kept in one directory.
//! They are loaded into an ordered `PostSet`, one is selected by slug, and
//! its body is rendered into a markup tree that a display layer (the
//! development server, the CLI, or anything consuming JSON) can show.

pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod server;
pub mod store;

use anyhow::Result;
use std::path::{Path, PathBuf};

use content::{ContentLoader, HtmlWriter, PostSet};
use error::LoadError;

/// Name of the optional site configuration file
pub const CONFIG_FILE: &str = "_config.yml";

/// A site rooted at a base directory
#[derive(Debug, Clone)]
pub struct Folio {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Directory holding the post documents
    pub posts_dir: PathBuf,
}

impl Folio {
    /// Create a new instance from a directory, reading `_config.yml` if present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join(CONFIG_FILE);

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    /// Create an instance with an explicit configuration
    pub fn with_config(base_dir: PathBuf, config: config::SiteConfig) -> Self {
        let posts_dir = base_dir.join(&config.posts_dir);
        Self {
            config,
            base_dir,
            posts_dir,
        }
    }

    /// A loader for the configured posts directory
    pub fn loader(&self) -> Result<ContentLoader, LoadError> {
        ContentLoader::new(self)
    }

    /// Load all posts, newest first
    pub async fn load_posts(&self) -> Result<PostSet> {
        Ok(self.loader()?.load().await?)
    }

    /// An HTML writer using the configured highlighting
    pub fn html_writer(&self) -> HtmlWriter {
        HtmlWriter::with_options(&self.config.highlight)
    }

    /// Create a new post
    pub fn new_post(&self, title: &str, slug: Option<&str>) -> Result<PathBuf> {
        commands::new::create_post(self, title, slug)
    }
}
