//! Post model

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use super::FrontMatter;

/// Slug used when neither the front-matter nor the file name yields one
const FALLBACK_SLUG: &str = "untitled";

/// A blog post
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// URL-safe identifier, unique within a `PostSet`
    pub slug: String,

    /// Post title
    pub title: String,

    /// Publication date, `None` when missing or unparseable
    pub date: Option<NaiveDateTime>,

    /// Markdown body, front-matter excluded
    pub content: String,

    /// Short summary from front-matter
    pub description: Option<String>,

    /// Post tags
    pub tags: Vec<String>,

    /// Source file path
    pub source: PathBuf,

    /// Custom front-matter fields
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Post {
    /// Create a new post with minimal required fields
    pub fn new(slug: &str, title: Option<String>, date: Option<NaiveDateTime>) -> Self {
        let slug = normalize_slug(slug);
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| slug.clone());
        Self {
            slug,
            title,
            date,
            content: String::new(),
            description: None,
            tags: Vec::new(),
            source: PathBuf::new(),
            extra: HashMap::new(),
        }
    }

    /// Build a post from the raw text of a source document
    pub fn from_document(source: &Path, raw: &str) -> Self {
        let (fm, body) = FrontMatter::parse(raw);
        let date = fm.parse_date();

        let slug = fm
            .slug
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| slug_from_path(source));

        let mut post = Post::new(&slug, fm.title, date);
        post.content = body.to_string();
        post.description = fm.description;
        post.tags = fm.tags;
        post.source = source.to_path_buf();
        post.extra = fm.extra;
        post
    }

    /// Format the date for display, empty when the post has none
    pub fn display_date(&self, format: &str) -> String {
        let Some(date) = self.date else {
            return String::new();
        };
        let mut out = String::new();
        if write!(out, "{}", date.format(format)).is_err() {
            tracing::warn!("Invalid date format {:?}, using %Y-%m-%d", format);
            return date.format("%Y-%m-%d").to_string();
        }
        out
    }
}

/// Derive a slug from a file name without its extension
pub fn slug_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(normalize_slug)
        .unwrap_or_else(|| FALLBACK_SLUG.to_string())
}

fn normalize_slug(raw: &str) -> String {
    let slug = slug::slugify(raw);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}
