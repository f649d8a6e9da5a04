//! Content loader - loads posts from the posts directory

use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use walkdir::WalkDir;

use super::{Post, PostSet};
use crate::error::LoadError;
use crate::Folio;

/// Loads posts from a directory of Markdown documents
#[derive(Debug, Clone)]
pub struct ContentLoader {
    posts_dir: PathBuf,
    pattern: glob::Pattern,
}

impl ContentLoader {
    /// Create a loader for the site's configured posts directory
    pub fn new(folio: &Folio) -> Result<Self, LoadError> {
        Self::with_dir(&folio.posts_dir, &folio.config.pattern)
    }

    /// Create a loader for an explicit directory and file name pattern
    pub fn with_dir<P: AsRef<Path>>(posts_dir: P, pattern: &str) -> Result<Self, LoadError> {
        let pattern = glob::Pattern::new(pattern).map_err(|source| LoadError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            posts_dir: posts_dir.as_ref().to_path_buf(),
            pattern,
        })
    }

    pub fn posts_dir(&self) -> &Path {
        &self.posts_dir
    }

    /// List the source documents in discovery order (sorted by file name)
    pub fn discover(&self) -> Result<Vec<PathBuf>, LoadError> {
        if !self.posts_dir.exists() {
            tracing::warn!("Posts directory {:?} does not exist", self.posts_dir);
            return Ok(Vec::new());
        }
        if !self.posts_dir.is_dir() {
            return Err(LoadError::NotADirectory(self.posts_dir.clone()));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.posts_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {:?}: {}", self.posts_dir, e);
                    continue;
                }
            };
            if entry.file_type().is_file() && self.is_post_file(entry.path()) {
                paths.push(entry.into_path());
            }
        }

        Ok(paths)
    }

    /// Load all posts, newest first.
    ///
    /// Documents are read concurrently; a document that cannot be read is
    /// skipped and never fails the load.
    pub async fn load(&self) -> Result<PostSet, LoadError> {
        let paths = self.discover()?;
        let count = paths.len();

        let mut reads = JoinSet::new();
        for (index, path) in paths.into_iter().enumerate() {
            reads.spawn(async move {
                let result = tokio::fs::read_to_string(&path).await;
                (index, path, result)
            });
        }

        // Reads finish in any order; slot them back into discovery order
        let mut slots: Vec<Option<Post>> = vec![None; count];
        while let Some(joined) = reads.join_next().await {
            match joined {
                Ok((index, path, Ok(raw))) => {
                    slots[index] = Some(Post::from_document(&path, &raw));
                }
                Ok((_, path, Err(e))) => {
                    tracing::warn!("Failed to load post {:?}: {}", path, e);
                }
                Err(e) => {
                    tracing::warn!("Post read task failed: {}", e);
                }
            }
        }

        let set = PostSet::from_discovered(slots.into_iter().flatten());
        tracing::debug!("Loaded {} posts from {:?}", set.len(), self.posts_dir);
        Ok(set)
    }

    fn is_post_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| !name.starts_with('.') && self.pattern.matches(name))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_load_orders_by_date() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", "---\ntitle: A\ndate: 2023-01-01\n---\nA body");
        write(dir.path(), "b.md", "---\ntitle: B\ndate: 2024-06-01\n---\nB body");
        write(dir.path(), "c.md", "No metadata at all");

        let loader = ContentLoader::with_dir(dir.path(), "*.md").unwrap();
        let set = loader.load().await.unwrap();
        let slugs: Vec<_> = set.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "a", "c"]);

        let c = set.get("c").unwrap();
        assert_eq!(c.title, "c");
        assert_eq!(c.content, "No metadata at all");
    }

    #[tokio::test]
    async fn test_pattern_and_hidden_files_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "post.md", "Body");
        write(dir.path(), "notes.txt", "Not a post");
        write(dir.path(), ".draft.md", "Hidden");
        fs::create_dir(dir.path().join("nested")).unwrap();
        write(&dir.path().join("nested"), "deep.md", "Not top level");

        let loader = ContentLoader::with_dir(dir.path(), "*.md").unwrap();
        let set = loader.load().await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("post").is_some());
    }

    #[tokio::test]
    async fn test_unreadable_document_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.md", "Fine");
        fs::write(dir.path().join("binary.md"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let loader = ContentLoader::with_dir(dir.path(), "*.md").unwrap();
        let set = loader.load().await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("good").is_some());
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ContentLoader::with_dir(dir.path().join("nope"), "*.md").unwrap();
        assert!(loader.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_instead_of_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "file.md", "x");
        let loader = ContentLoader::with_dir(dir.path().join("file.md"), "*.md").unwrap();
        assert!(matches!(
            loader.load().await,
            Err(LoadError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            ContentLoader::with_dir(".", "[*.md"),
            Err(LoadError::InvalidPattern { .. })
        ));
    }
}
