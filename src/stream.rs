//! Tail sessions: the background worker and the consumer-facing handles.

use crate::channel::{CancellableSender, channel};
use crate::config::TailConfig;
use crate::error::{Error, Result};
use crate::file::{FsOpener, Opener};
use crate::reader::Line;
use crate::rotation::{Flow, Session};
use crate::watcher::{NotifyWatcher, Watch};
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

/// Lines of a tail session, in file order.
pub type LineStream = ReceiverStream<Line>;

/// Receives the terminal error of a tail session, if there is one.
pub type ErrorReceiver = mpsc::Receiver<Error>;

/// Controls a running tail session from any thread.
#[derive(Debug, Clone)]
pub struct TailHandle {
    cancel: CancellationToken,
}

impl TailHandle {
    /// Stops the session. Calling this again, or from several threads at once, has no further effect.
    ///
    /// The worker notices at its next wait point, releases the file and the
    /// watch, and emits nothing more. A line it was blocked on delivering is dropped.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A file being followed line by line.
///
/// As a [`Stream`], a `Tail` yields every line and then, if the session
/// failed, the error as its final item. Dropping the `Tail` (or the
/// [`LineStream`] from [`Tail::into_parts`]) stops the session.
#[derive(Debug)]
pub struct Tail {
    lines: mpsc::Receiver<Line>,
    errors: ErrorReceiver,
    handle: TailHandle,
    lines_done: bool,
}

impl Tail {
    /// Starts following `path` with the default configuration.
    ///
    /// Returns immediately; opening the file happens in the background and a
    /// failure to do so arrives as the session's error. Must be called from
    /// within a tokio runtime.
    pub fn start<P: AsRef<Path>>(path: P) -> Self {
        Self::start_with_config(path, TailConfig::default())
    }

    pub fn start_with_config<P: AsRef<Path>>(path: P, config: TailConfig) -> Self {
        Self::start_with(path, config, NotifyWatcher::new, FsOpener)
    }

    /// Starts following `path` with caller-supplied collaborators.
    ///
    /// `open_watcher` is called once, on the worker, to set up change notifications.
    pub fn start_with<P, F, W, O>(path: P, config: TailConfig, open_watcher: F, opener: O) -> Self
    where
        P: AsRef<Path>,
        F: FnOnce() -> notify::Result<W> + Send + 'static,
        W: Watch,
        O: Opener,
    {
        let path = path.as_ref().to_path_buf();
        let cancel = CancellationToken::new();
        let (line_tx, line_rx) = channel(config.line_capacity, cancel.clone());
        let (error_tx, error_rx) = mpsc::channel(1);

        let span = info_span!("tail", path = %path.display());
        tokio::spawn(
            run_tail(path, config, open_watcher, opener, line_tx, error_tx, cancel.clone())
                .instrument(span),
        );

        Tail {
            lines: line_rx,
            errors: error_rx,
            handle: TailHandle { cancel },
            lines_done: false,
        }
    }

    /// Waits for the next line. `None` once the session has ended.
    pub async fn next_line(&mut self) -> Option<Line> {
        self.lines.recv().await
    }

    /// Waits for the session to end, returning its error if it failed.
    ///
    /// Lines still queued are not consumed.
    pub async fn error(&mut self) -> Option<Error> {
        self.errors.recv().await
    }

    /// Returns the session's error if one has been reported, without waiting.
    pub fn try_error(&mut self) -> Option<Error> {
        self.errors.try_recv().ok()
    }

    pub fn close(&self) {
        self.handle.close();
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn handle(&self) -> TailHandle {
        self.handle.clone()
    }

    /// Splits the session into its line output, its error output and a control handle.
    pub fn into_parts(self) -> (LineStream, ErrorReceiver, TailHandle) {
        (ReceiverStream::new(self.lines), self.errors, self.handle)
    }
}

impl Stream for Tail {
    type Item = Result<Line>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if !this.lines_done {
            match this.lines.poll_recv(cx) {
                Poll::Ready(Some(line)) => return Poll::Ready(Some(Ok(line))),
                Poll::Ready(None) => this.lines_done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
        this.errors.poll_recv(cx).map(|error| error.map(Err))
    }
}

/// Background worker: runs the session, reports how it ended, marks it closed.
async fn run_tail<F, W, O>(
    path: PathBuf,
    config: TailConfig,
    open_watcher: F,
    opener: O,
    lines: CancellableSender<Line>,
    errors: mpsc::Sender<Error>,
    cancel: CancellationToken,
) where
    F: FnOnce() -> notify::Result<W>,
    W: Watch,
    O: Opener,
{
    debug!("Tail session starting");
    let result = follow(path, config, open_watcher, opener, lines).await;

    // Closed must be observable before the error is.
    let closed_by_consumer = cancel.is_cancelled();
    cancel.cancel();
    if let Err(e) = result {
        if !closed_by_consumer {
            warn!(error = %e, "Tail session failed");
            // The slot holds one error and only this worker sends to it.
            let _ = errors.try_send(e);
        }
    }
    debug!("Tail session finished");
}

async fn follow<F, W, O>(
    path: PathBuf,
    config: TailConfig,
    open_watcher: F,
    opener: O,
    lines: CancellableSender<Line>,
) -> Result<()>
where
    F: FnOnce() -> notify::Result<W>,
    W: Watch,
    O: Opener,
{
    let watcher = open_watcher().map_err(Error::WatchInit)?;
    let mut session = Session::new(path, config, watcher, opener, lines.clone());

    session.open().await?;
    // Watch before the first scan so nothing appended in between goes unnoticed.
    session.watch()?;
    if session.read_available().await? == Flow::Stop {
        return Ok(());
    }
    debug!(path = %session.path().display(), "Caught up, waiting for changes");

    loop {
        let event = tokio::select! {
            biased;
            _ = lines.cancelled() => return Ok(()),
            event = session.next_event() => event,
        };
        let Some(event) = event else {
            return Err(Error::WatchFeedClosed);
        };
        if session.handle(event).await? == Flow::Stop {
            return Ok(());
        }
    }
}
