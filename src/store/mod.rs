//! Shared "current posts" slot
//!
//! Loads may overlap (a navigation reload racing a file watcher reload).
//! Every load takes a ticket before it starts and its result is applied only
//! if no load that started later has already been applied, so a slow stale
//! load can never replace a newer collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::content::{ContentLoader, PostSet};
use crate::error::LoadError;

/// Identifies one load, later loads get larger tickets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct StoreState {
    /// Ticket of the load currently shown, 0 before the first commit
    applied: u64,
    posts: Arc<PostSet>,
}

/// Owns the most recent post collection
#[derive(Debug)]
pub struct PostStore {
    state: RwLock<StoreState>,
    next_ticket: AtomicU64,
}

impl PostStore {
    /// Create an empty store; selections report `NotReady` until a commit
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                applied: 0,
                posts: Arc::new(PostSet::new()),
            }),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Reserve a ticket for a load that is about to start
    pub fn begin_load(&self) -> LoadTicket {
        LoadTicket(self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Apply a finished load. Returns `false` when a newer load was
    /// already applied and `posts` was discarded.
    pub fn commit(&self, ticket: LoadTicket, posts: PostSet) -> bool {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if ticket.0 <= state.applied {
            tracing::debug!(
                "Discarding stale load {} (already showing {})",
                ticket.0,
                state.applied
            );
            return false;
        }
        state.applied = ticket.0;
        state.posts = Arc::new(posts);
        true
    }

    /// The current collection
    pub fn snapshot(&self) -> Arc<PostSet> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&state.posts)
    }

    /// Ticket of the applied load, 0 when nothing was loaded yet
    pub fn generation(&self) -> u64 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).applied
    }

    /// Load posts and apply them unless a newer load won the race
    pub async fn reload(&self, loader: &ContentLoader) -> Result<bool, LoadError> {
        let ticket = self.begin_load();
        let posts = loader.load().await?;
        let count = posts.len();
        let applied = self.commit(ticket, posts);
        if applied {
            tracing::info!("Loaded {} posts (generation {})", count, ticket.0);
        }
        Ok(applied)
    }
}

impl Default for PostStore {
    fn default() -> Self {
        Self::new()
    }
}
