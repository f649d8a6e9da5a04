//! End-to-end checks of load, select and render over a posts directory

use std::fs;
use std::path::Path;

use folio::config::SiteConfig;
use folio::content::{self, Block, Inline, Resolution};
use folio::error::SelectError;
use folio::Folio;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn site() -> (tempfile::TempDir, Folio) {
    let dir = tempfile::tempdir().unwrap();
    let folio = Folio::new(dir.path()).unwrap();
    fs::create_dir_all(&folio.posts_dir).unwrap();
    (dir, folio)
}

#[tokio::test]
async fn test_well_formed_post_round_trip() {
    let (_dir, folio) = site();
    write(
        &folio.posts_dir,
        "hello.md",
        "---\ntitle: \"T\"\ndate: \"2024-01-01\"\n---\nHello",
    );

    let posts = folio.load_posts().await.unwrap();
    let post = posts.get("hello").unwrap();
    assert_eq!(post.title, "T");
    assert_eq!(post.display_date(&folio.config.date_format), "2024-01-01");
    assert_eq!(post.content, "Hello");
}

#[tokio::test]
async fn test_ordering_and_selection() {
    let (_dir, folio) = site();
    write(&folio.posts_dir, "a-undated.md", "# Undated\n");
    write(&folio.posts_dir, "b-2023.md", "---\ndate: 2023-05-01\n---\nB");
    write(&folio.posts_dir, "c-2024.md", "---\ndate: 2024-05-01\n---\nC");
    write(&folio.posts_dir, "d-2023.md", "---\ndate: 2023-05-01\n---\nD");
    write(&folio.posts_dir, "e-broken.md", "---\ntitle: [oops\n---\nE");

    let posts = folio.load_posts().await.unwrap();
    let slugs: Vec<_> = posts.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(
        slugs,
        vec!["c-2024", "b-2023", "d-2023", "a-undated", "e-broken"]
    );

    let broken = posts.get("e-broken").unwrap();
    assert_eq!(broken.title, "e-broken");
    assert!(broken.content.contains("title: [oops"));

    let selection = content::select(&posts, Some("d-2023")).unwrap();
    assert_eq!(selection.post.slug, "d-2023");
    assert_eq!(selection.resolution, Resolution::Exact);

    let selection = content::select(&posts, Some("missing")).unwrap();
    assert_eq!(selection.post.slug, "c-2024");
    assert!(selection.is_fallback());
}

#[tokio::test]
async fn test_duplicate_derived_slugs_keep_first_file() {
    let (_dir, folio) = site();
    write(&folio.posts_dir, "Hello World.md", "---\ntitle: First\n---\n1");
    write(&folio.posts_dir, "hello-world.md", "---\ntitle: Second\n---\n2");

    let posts = folio.load_posts().await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts.get("hello-world").unwrap().title, "First");
}

#[tokio::test]
async fn test_empty_directory_is_not_ready() {
    let (_dir, folio) = site();
    let posts = folio.load_posts().await.unwrap();
    assert_eq!(
        content::select(&posts, Some("x")).unwrap_err(),
        SelectError::NotReady
    );
}

#[tokio::test]
async fn test_configured_directory_and_pattern() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(folio::CONFIG_FILE),
        "posts_dir: writing\npattern: \"*.markdown\"\n",
    )
    .unwrap();
    let folio = Folio::new(dir.path()).unwrap();
    assert_eq!(folio.posts_dir, dir.path().join("writing"));

    fs::create_dir_all(&folio.posts_dir).unwrap();
    write(&folio.posts_dir, "kept.markdown", "Kept");
    write(&folio.posts_dir, "ignored.md", "Ignored");

    let posts = folio.load_posts().await.unwrap();
    assert_eq!(posts.len(), 1);
    assert!(posts.get("kept").is_some());
}

#[tokio::test]
async fn test_rendered_post_is_safe() {
    let (_dir, folio) = site();
    write(
        &folio.posts_dir,
        "safe.md",
        "---\ntitle: Safe\n---\n## Links\n\n<script>steal()</script>\n\n- [ok](https://example.com)\n- [bad](javascript:steal())\n",
    );

    let posts = folio.load_posts().await.unwrap();
    let selection = content::select(&posts, None).unwrap();
    let doc = content::render(&selection.post.content);

    assert_eq!(
        doc.blocks[0],
        Block::Heading {
            level: 2,
            content: vec![Inline::text("Links")]
        }
    );
    assert_eq!(
        doc.blocks[1],
        Block::Paragraph {
            content: vec![Inline::text("<script>steal()</script>")]
        }
    );

    let html = folio.html_writer().write(&doc);
    assert!(!html.contains("<script>"));
    assert!(!html.contains("javascript:"));
    assert!(html.contains(
        r#"<a href="https://example.com" target="_blank" rel="noopener noreferrer">ok</a>"#
    ));
    assert!(html.contains("<li>bad</li>"));
}

#[test]
fn test_with_config_uses_posts_dir() {
    let config = SiteConfig {
        posts_dir: "posts".to_string(),
        ..SiteConfig::default()
    };
    let folio = Folio::with_config("/site".into(), config);
    assert_eq!(folio.posts_dir, Path::new("/site/posts"));
}
