//! Bounded hand-off from the tail worker to the consumer.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Creates a bounded queue whose sends give up once `cancel` fires.
pub(crate) fn channel<T>(
    capacity: usize,
    cancel: CancellationToken,
) -> (CancellableSender<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CancellableSender { tx, cancel }, rx)
}

/// Producer half of a bounded queue tied to a session's cancellation token.
///
/// A send waits while the queue is full, so a slow consumer throttles the
/// producer. Cancellation unblocks a waiting send and makes it report failure;
/// the item is then discarded.
#[derive(Debug)]
pub(crate) struct CancellableSender<T> {
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
}

impl<T> Clone for CancellableSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> CancellableSender<T> {
    /// Delivers `item`, returning false if the session was cancelled first.
    ///
    /// A consumer that dropped its receiver counts as a cancellation.
    pub(crate) async fn send(&self, item: T) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(item) => {
                if sent.is_err() {
                    self.cancel.cancel();
                    return false;
                }
                true
            }
        }
    }

    /// Resolves once the session is cancelled or the consumer is gone.
    pub(crate) async fn cancelled(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => self.cancel.cancel(),
        }
    }
}
