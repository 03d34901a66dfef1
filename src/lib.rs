//! A log tail library that follows a growing file line by line.
//!
//! Every complete line appended to the file is delivered once, in order,
//! across buffer growth, partial writes and log rotation. When the file is
//! renamed or removed, any unterminated remainder is delivered as a final
//! line and the path is reopened, with exponential backoff, until a new file
//! shows up.
//!
//! # Example
//!
//! ```rust,no_run
//! use log_tail::tail_file;
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tail = tail_file("app.log");
//!
//!     while let Some(line) = tail.next().await {
//!         println!("{}", line?);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod channel;
mod config;
mod error;
mod file;
mod reader;
mod rotation;
mod stream;
mod watcher;

#[cfg(test)]
mod test_helpers;

pub use config::{Backoff, TailConfig};
pub use error::{Error, Result};
pub use file::{FileId, FsOpener, Opened, Opener};
pub use reader::Line;
pub use stream::{ErrorReceiver, LineStream, Tail, TailHandle};
pub use watcher::{NotifyWatcher, Watch, WatchEvent};

use std::path::Path;

/// Starts following `path` with the default configuration.
///
/// Shorthand for [`Tail::start`]. Must be called from within a tokio runtime.
///
/// ```rust,no_run
/// use log_tail::tail_file;
///
/// #[tokio::main]
/// async fn main() {
///     let mut tail = tail_file("/var/log/syslog");
///
///     while let Some(line) = tail.next_line().await {
///         println!("{}", line);
///     }
///
///     if let Some(e) = tail.error().await {
///         eprintln!("Tail stopped: {}", e);
///     }
/// }
/// ```
pub fn tail_file<P: AsRef<Path>>(path: P) -> Tail {
    Tail::start(path)
}
