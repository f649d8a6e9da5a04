//! Choosing the post to display

use serde::Serialize;

use super::{Post, PostSet};
use crate::error::SelectError;

/// How a selection was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// The requested slug was found
    Exact,
    /// Nothing was requested, the most recent post was chosen
    Latest,
    /// The requested slug is unknown, the most recent post was chosen instead
    Fallback { requested: String },
}

/// The post chosen for display
#[derive(Debug, Clone, Serialize)]
pub struct Selection<'a> {
    pub post: &'a Post,
    pub resolution: Resolution,
}

/// Pick the post matching `requested`, or the most recent one.
///
/// Fails only with `SelectError::NotReady` when `posts` is empty.
pub fn select<'a>(
    posts: &'a PostSet,
    requested: Option<&str>,
) -> Result<Selection<'a>, SelectError> {
    let latest = posts.first().ok_or(SelectError::NotReady)?;

    let Some(slug) = requested else {
        return Ok(Selection {
            post: latest,
            resolution: Resolution::Latest,
        });
    };

    match posts.get(slug) {
        Some(post) => Ok(Selection {
            post,
            resolution: Resolution::Exact,
        }),
        None => {
            tracing::debug!("No post {:?}, falling back to {:?}", slug, latest.slug);
            Ok(Selection {
                post: latest,
                resolution: Resolution::Fallback {
                    requested: slug.to_string(),
                },
            })
        }
    }
}

impl Selection<'_> {
    pub fn is_fallback(&self) -> bool {
        matches!(self.resolution, Resolution::Fallback { .. })
    }
}
