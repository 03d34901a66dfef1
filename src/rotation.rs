//! Per-session reading state and the rotation state machine.
//!
//! A [`Session`] owns the open file, the scan buffer and the watch
//! registration for one path. It reacts to change notifications: writes
//! trigger a rescan, renames and removals trigger a rotation.
//!
//! ```text
//!   Normal --rename/remove/watch error--> Flushing --> Reopening --open ok--> Normal
//!     |                                       |             |
//!     +-------------- cancelled / fatal ------+-------------+--> Closed
//! ```

use crate::channel::CancellableSender;
use crate::config::TailConfig;
use crate::error::{Error, Result};
use crate::file::{FileId, Opened, Opener};
use crate::reader::{Line, LineScanner, Scan};
use crate::watcher::{Watch, WatchEvent};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a session is in the rotation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RotationState {
    /// Reading the current file with its watch registered.
    Normal,
    /// Emitting what is left of the old file before letting go of it.
    Flushing,
    /// Waiting for a file to appear at the path again.
    Reopening,
    Closed,
}

/// Whether the session should keep going after handling something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

impl From<Scan> for Flow {
    fn from(scan: Scan) -> Self {
        match scan {
            Scan::Drained => Flow::Continue,
            Scan::Cancelled => Flow::Stop,
        }
    }
}

pub(crate) struct Session<W: Watch, O: Opener> {
    path: PathBuf,
    config: TailConfig,
    watcher: W,
    watching: bool,
    opener: O,
    file: Option<O::Reader>,
    file_id: Option<FileId>,
    last_size: u64,
    scanner: LineScanner,
    lines: CancellableSender<Line>,
    state: RotationState,
}

impl<W: Watch, O: Opener> Session<W, O> {
    pub(crate) fn new(
        path: PathBuf,
        config: TailConfig,
        watcher: W,
        opener: O,
        lines: CancellableSender<Line>,
    ) -> Self {
        let scanner = LineScanner::with_capacity(config.initial_buffer_size);
        Self {
            path,
            config,
            watcher,
            watching: false,
            opener,
            file: None,
            file_id: None,
            last_size: 0,
            scanner,
            lines,
            state: RotationState::Normal,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> RotationState {
        self.state
    }

    /// Opens the path for the first time. Failure here ends the session.
    pub(crate) async fn open(&mut self) -> Result<()> {
        let opened = self
            .opener
            .open(&self.path)
            .await
            .map_err(|e| Error::open(&self.path, e))?;
        self.install(opened);
        Ok(())
    }

    pub(crate) fn watch(&mut self) -> Result<()> {
        self.watcher.watch(&self.path)?;
        self.watching = true;
        Ok(())
    }

    pub(crate) async fn next_event(&mut self) -> Option<WatchEvent> {
        self.watcher.next_event().await
    }

    /// Delivers every complete line the current file holds right now.
    pub(crate) async fn read_available(&mut self) -> Result<Flow> {
        let Some(file) = self.file.as_mut() else {
            return Ok(Flow::Continue);
        };
        Ok(self.scanner.scan(file, &self.lines).await?.into())
    }

    pub(crate) async fn handle(&mut self, event: WatchEvent) -> Result<Flow> {
        match event {
            WatchEvent::Write => self.read_available().await,
            WatchEvent::Rename | WatchEvent::Remove => {
                if self.still_current().await {
                    debug!(path = %self.path.display(), "Path still names the open file, rescanning");
                    return self.read_available().await;
                }
                self.rotate().await
            }
            WatchEvent::Error(e) => {
                warn!(path = %self.path.display(), error = %e, "File watcher reported an error");
                if self.still_current().await {
                    self.rewatch()?;
                    return self.read_available().await;
                }
                self.rotate().await
            }
        }
    }

    /// Lets go of the current file and follows the path to its replacement.
    pub(crate) async fn rotate(&mut self) -> Result<Flow> {
        self.transition(RotationState::Flushing);

        // Anything written to the old file before it was moved still belongs to this stream.
        if self.read_available().await? == Flow::Stop {
            return Ok(self.close());
        }
        if let Some(line) = self.scanner.take_partial() {
            debug!(path = %self.path.display(), bytes = line.len(), "Flushing unterminated line");
            if !self.lines.send(line).await {
                return Ok(self.close());
            }
        }
        self.unwatch();
        self.file = None;
        self.file_id = None;

        self.transition(RotationState::Reopening);
        let Some(opened) = self.reopen().await? else {
            return Ok(self.close());
        };
        self.install(opened);
        self.watch()?;

        self.transition(RotationState::Normal);
        self.read_available().await
    }

    /// Opens the path again, backing off between failures.
    ///
    /// Returns `None` if the session was cancelled while waiting.
    async fn reopen(&mut self) -> Result<Option<Opened<O::Reader>>> {
        let mut backoff = self.config.backoff();
        let mut attempts = 0u32;

        loop {
            let error = match self.opener.open(&self.path).await {
                Ok(opened) => {
                    info!(
                        path = %self.path.display(),
                        attempts = attempts + 1,
                        size = opened.size,
                        "Reopened rotated file"
                    );
                    return Ok(Some(opened));
                }
                Err(e) => e,
            };

            attempts += 1;
            if self
                .config
                .max_reopen_attempts
                .is_some_and(|max| attempts >= max)
            {
                return Err(Error::ReopenExhausted {
                    path: self.path.clone(),
                    attempts,
                });
            }

            let delay = backoff.next_delay();
            debug!(
                path = %self.path.display(),
                attempts,
                ?delay,
                error = %error,
                "Reopen failed, retrying"
            );
            tokio::select! {
                biased;
                _ = self.lines.cancelled() => return Ok(None),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn still_current(&mut self) -> bool {
        match self.file_id {
            Some(id) => self.opener.identity(&self.path).await == Some(id),
            None => false,
        }
    }

    fn rewatch(&mut self) -> Result<()> {
        self.unwatch();
        self.watch()
    }

    fn install(&mut self, opened: Opened<O::Reader>) {
        debug!(path = %self.path.display(), size = opened.size, "Opened file");
        self.last_size = opened.size;
        self.file_id = opened.id;
        self.file = Some(opened.reader);
    }

    fn unwatch(&mut self) {
        if self.watching {
            self.watcher.unwatch(&self.path);
            self.watching = false;
        }
    }

    fn transition(&mut self, next: RotationState) {
        debug!(path = %self.path.display(), from = ?self.state, to = ?next, "Rotation state change");
        self.state = next;
    }

    /// Releases the file and the watch. Safe to call more than once.
    pub(crate) fn close(&mut self) -> Flow {
        if self.state != RotationState::Closed {
            self.unwatch();
            self.file = None;
            self.transition(RotationState::Closed);
            debug!(path = %self.path.display(), last_size = self.last_size, "Session closed");
        }
        Flow::Stop
    }
}

impl<W: Watch, O: Opener> Drop for Session<W, O> {
    fn drop(&mut self) {
        self.close();
    }
}
