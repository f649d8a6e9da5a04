//! Create a new post

use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use crate::Folio;

/// Write a new post scaffold and return its path
pub fn create_post(folio: &Folio, title: &str, slug: Option<&str>) -> Result<PathBuf> {
    let now = chrono::Local::now();

    let slug = slug::slugify(slug.unwrap_or(title));
    if slug.is_empty() {
        anyhow::bail!("Cannot derive a file name from {:?}", title);
    }

    fs::create_dir_all(&folio.posts_dir)?;
    let file_path = folio.posts_dir.join(format!("{}.md", slug));

    if file_path.exists() {
        anyhow::bail!("File already exists: {:?}", file_path);
    }

    // A JSON string is a valid YAML double-quoted scalar
    let content = format!(
        "---\ntitle: {}\ndate: {}\n---\n\n",
        serde_json::to_string(title)?,
        now.format("%Y-%m-%d")
    );

    fs::write(&file_path, content)?;
    tracing::info!("Created: {:?}", file_path);

    Ok(file_path)
}
