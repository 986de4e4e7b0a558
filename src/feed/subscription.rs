//! Live subscription handle
//!
//! A [`Subscription`] yields the events pushed for one feed path. Dropping it
//! detaches from the feed, so tearing down the owning task is enough to
//! release the remote listener on every exit path.

use tokio::sync::broadcast;

use super::error::FeedError;
use super::snapshot::{FeedPath, Snapshot};

/// Event pushed by a feed subscription
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// The full current value of the subscribed path
    Value(Snapshot),
    /// The feed could not deliver a value
    Error(FeedError),
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Handle to a live feed subscription
pub struct Subscription {
    path: FeedPath,
    catchup: Option<FeedEvent>,
    rx: broadcast::Receiver<FeedEvent>,
    on_cancel: Option<CancelFn>,
}

impl Subscription {
    /// Wrap a broadcast receiver for `path`
    pub fn new(path: FeedPath, rx: broadcast::Receiver<FeedEvent>) -> Self {
        Self {
            path,
            catchup: None,
            rx,
            on_cancel: None,
        }
    }

    /// Deliver `event` before anything received on the channel
    ///
    /// Used to hand a late subscriber the current value of the path.
    pub fn with_catchup(mut self, event: FeedEvent) -> Self {
        self.catchup = Some(event);
        self
    }

    /// Run `f` once when the subscription is dropped
    pub fn on_cancel(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(f));
        self
    }

    /// Path this subscription listens on
    pub fn path(&self) -> &FeedPath {
        &self.path
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the feed closes the channel.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        if let Some(event) = self.catchup.take() {
            return Some(event);
        }

        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        path = %self.path,
                        skipped = skipped,
                        "Subscriber lagged, older snapshots skipped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.on_cancel.take() {
            cancel();
        }
        tracing::debug!(path = %self.path, "Subscription released");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("has_catchup", &self.catchup.is_some())
            .finish()
    }
}
