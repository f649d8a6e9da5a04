//! Select a post and print it rendered

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use crate::content::{self, Document, Resolution};
use crate::error::SelectError;
use crate::Folio;

/// Output format for `show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShowFormat {
    Html,
    Json,
    Text,
}

#[derive(Serialize)]
struct Shown<'a> {
    slug: &'a str,
    title: &'a str,
    date: String,
    resolution: &'a Resolution,
    document: &'a Document,
}

/// Render the selected post (or the latest one) to stdout
pub async fn run(folio: &Folio, slug: Option<&str>, format: ShowFormat) -> Result<()> {
    let posts = folio.load_posts().await?;

    let selection = match content::select(&posts, slug) {
        Ok(selection) => selection,
        Err(SelectError::NotReady) => {
            println!("No posts yet.");
            return Ok(());
        }
    };

    if let Resolution::Fallback { requested } = &selection.resolution {
        tracing::warn!(
            "No post named {:?}, showing the latest post {:?}",
            requested,
            selection.post.slug
        );
    }

    let post = selection.post;
    let document = content::render(&post.content);
    let date = post.display_date(&folio.config.date_format);

    match format {
        ShowFormat::Html => {
            print!("{}", folio.html_writer().write(&document));
        }
        ShowFormat::Json => {
            let shown = Shown {
                slug: &post.slug,
                title: &post.title,
                date,
                resolution: &selection.resolution,
                document: &document,
            };
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ShowFormat::Text => {
            println!("{}", post.title);
            if !date.is_empty() {
                println!("{}", date);
            }
            println!();
            println!("{}", document.plain_text());
        }
    }

    Ok(())
}
