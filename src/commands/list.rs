//! List posts

use anyhow::Result;
use serde::Serialize;

use crate::Folio;

#[derive(Serialize)]
struct ListEntry<'a> {
    slug: &'a str,
    title: &'a str,
    date: String,
}

/// Print the posts newest first
pub async fn run(folio: &Folio, json: bool) -> Result<()> {
    let posts = folio.load_posts().await?;
    let format = &folio.config.date_format;

    if json {
        let entries: Vec<_> = posts
            .iter()
            .map(|post| ListEntry {
                slug: &post.slug,
                title: &post.title,
                date: post.display_date(format),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Posts ({}):", posts.len());
    for post in posts.iter() {
        let date = post.display_date(format);
        println!(
            "  {:<10} {} [{}]",
            if date.is_empty() { "-" } else { date.as_str() },
            post.title,
            post.slug
        );
    }

    Ok(())
}
