//! Error types for the content pipeline
//!
//! Application code (commands, server, CLI) works with `anyhow::Result`;
//! these are the conditions library callers are expected to match on.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole load
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Invalid post pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("Posts path {0:?} is not a directory")]
    NotADirectory(PathBuf),
}

/// Errors returned by post selection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    /// No posts have been loaded yet, show a loading state
    #[error("Posts are not loaded yet")]
    NotReady,
}
