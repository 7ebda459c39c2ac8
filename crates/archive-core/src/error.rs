use std::io;
use std::path::PathBuf;

use archive_db::StoreError;
use thiserror::Error;

/// Failure resolving one attachment. Aborts that event only, unless it wraps
/// a [`StoreError`].
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to fetch attachment: {0}")]
    Fetch(String),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to discard duplicate {}: {source}", path.display())]
    Discard {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that end a run.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Run cancelled after {handled} event(s)")]
    Interrupted { handled: usize },
}
