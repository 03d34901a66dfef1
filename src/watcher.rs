//! File change notifications using the notify crate.

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// A change notification for the watched path.
#[derive(Debug)]
pub enum WatchEvent {
    /// Content was written to the file.
    Write,
    /// The file was renamed away from the path.
    Rename,
    /// The file was removed.
    Remove,
    /// The notification backend reported an error.
    Error(notify::Error),
}

/// The change notification service a tail session listens to.
///
/// A session watches exactly one path at a time. `unwatch` must tolerate
/// being called for a path that is no longer watched.
pub trait Watch: Send + 'static {
    /// Starts delivering events for `path`.
    fn watch(&mut self, path: &Path) -> notify::Result<()>;

    /// Stops delivering events for `path`.
    fn unwatch(&mut self, path: &Path);

    /// Waits for the next event. `None` means the feed is closed for good.
    fn next_event(&mut self) -> impl Future<Output = Option<WatchEvent>> + Send;
}

/// [`Watch`] backed by the platform's recommended notify watcher.
pub struct NotifyWatcher {
    watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    watched: Option<PathBuf>,
}

impl NotifyWatcher {
    /// Initializes the notification backend. Nothing is watched yet.
    pub fn new() -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        Ok(Self {
            watcher,
            receiver: rx,
            watched: None,
        })
    }
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

impl Watch for NotifyWatcher {
    fn watch(&mut self, path: &Path) -> notify::Result<()> {
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        self.watched = Some(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) {
        if self.watched.as_deref() == Some(path) {
            // The backend may already have dropped the watch along with the file.
            let _ = self.watcher.unwatch(path);
            self.watched = None;
        }
    }

    async fn next_event(&mut self) -> Option<WatchEvent> {
        loop {
            match self.receiver.recv().await? {
                Ok(event) => {
                    if let Some(event) = classify(&event.kind) {
                        return Some(event);
                    }
                }
                Err(e) => return Some(WatchEvent::Error(e)),
            }
        }
    }
}

/// Maps a notify event kind onto the events a tail session reacts to.
pub(crate) fn classify(kind: &EventKind) -> Option<WatchEvent> {
    match kind {
        EventKind::Modify(ModifyKind::Name(_)) => Some(WatchEvent::Rename),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
            Some(WatchEvent::Write)
        }
        EventKind::Remove(_) => Some(WatchEvent::Remove),
        // Unlinking a file we still hold open only surfaces as a link count change.
        // The session compares file identities before acting on it.
        #[cfg(unix)]
        EventKind::Modify(ModifyKind::Metadata(_)) => Some(WatchEvent::Remove),
        _ => None,
    }
}
