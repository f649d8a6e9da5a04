//! Ordered, slug-keyed post collection

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::cmp::Reverse;

use super::Post;

/// Posts ordered newest first, unique by slug.
///
/// Posts without a date sort after every dated post. Ties keep the order
/// the posts were discovered in.
#[derive(Debug, Clone, Default)]
pub struct PostSet {
    posts: IndexMap<String, Post>,
}

impl PostSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from posts in discovery order.
    ///
    /// When two posts share a slug the first one discovered is kept.
    pub fn from_discovered<I>(posts: I) -> Self
    where
        I: IntoIterator<Item = Post>,
    {
        let mut map: IndexMap<String, Post> = IndexMap::new();
        for post in posts {
            if let Some(kept) = map.get(&post.slug) {
                tracing::warn!(
                    "Duplicate slug {:?}: keeping {:?}, skipping {:?}",
                    post.slug,
                    kept.source,
                    post.source
                );
                continue;
            }
            map.insert(post.slug.clone(), post);
        }

        map.sort_by(|_, a, _, b| Reverse(a.date).cmp(&Reverse(b.date)));

        Self { posts: map }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Posts in display order
    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.values()
    }

    /// The most recent post
    pub fn first(&self) -> Option<&Post> {
        self.posts.first().map(|(_, post)| post)
    }

    pub fn get(&self, slug: &str) -> Option<&Post> {
        self.posts.get(slug)
    }

    /// The post shown before `slug` in the listing (more recent)
    pub fn newer(&self, slug: &str) -> Option<&Post> {
        let pos = self.posts.get_index_of(slug)?;
        if pos > 0 {
            self.posts.get_index(pos - 1).map(|(_, post)| post)
        } else {
            None
        }
    }

    /// The post shown after `slug` in the listing (older)
    pub fn older(&self, slug: &str) -> Option<&Post> {
        let pos = self.posts.get_index_of(slug)?;
        self.posts.get_index(pos + 1).map(|(_, post)| post)
    }
}

impl Serialize for PostSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
