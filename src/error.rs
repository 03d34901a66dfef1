//! Error types for the log tail library.

use std::path::PathBuf;
use thiserror::Error;

/// The terminal error of a tail session.
///
/// A session reports at most one of these, after which it is closed.
#[derive(Error, Debug)]
pub enum Error {
    /// The file could not be opened: it does not exist or is inaccessible.
    ///
    /// `source` keeps the underlying io error.
    #[error("File not found: {}: {source}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file change notification service could not be initialized.
    #[error("File watcher initialization failed: {0}")]
    WatchInit(#[source] notify::Error),

    /// Registering a watch failed, or the watcher reported an unrecoverable error.
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Reading from the file failed.
    #[error("Read error: {0}")]
    Read(#[from] std::io::Error),

    /// The file never reappeared after a rotation.
    #[error("Gave up reopening {} after {attempts} attempts", path.display())]
    ReopenExhausted { path: PathBuf, attempts: u32 },

    /// The change notification feed closed while the session was running.
    #[error("File watcher event feed closed")]
    WatchFeedClosed,

    /// A line was not valid UTF-8.
    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Wraps a failed initial open of `path`, whatever the io error kind.
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::NotFound {
            path: path.into(),
            source,
        }
    }

    /// Returns true for the not-found condition on the initial open.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// A convenient Result type for log tail operations.
pub type Result<T> = std::result::Result<T, Error>;
