//! Per-path feed state
//!
//! This module defines the state the in-memory feed keeps for each path.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use super::config::FeedConfig;
use super::error::FeedError;
use super::snapshot::{FeedPath, Snapshot};
use super::subscription::{FeedEvent, Subscription};

/// Entry for a single path in the feed
pub struct FeedEntry {
    /// Latest value written to the path (for late-subscriber catchup)
    pub latest: Option<Snapshot>,

    /// Broadcast sender for fan-out to subscribers
    pub(super) tx: broadcast::Sender<FeedEvent>,

    /// Number of live subscriptions
    pub(super) subscriber_count: Arc<AtomicU32>,
}

impl FeedEntry {
    /// Create a new, empty entry
    pub(super) fn new(config: &FeedConfig) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity);

        Self {
            latest: None,
            tx,
            subscriber_count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Get the number of subscribers
    pub fn subscriber_count(&self) -> u32 {
        self.subscriber_count.load(Ordering::Relaxed)
    }

    /// Open a subscription that starts with the current value
    ///
    /// A path with no data yields an empty snapshot first, the same as a
    /// remote store answering a fresh value listener.
    pub(super) fn subscribe(&self, path: &FeedPath) -> Subscription {
        let rx = self.tx.subscribe();
        let current = self
            .latest
            .clone()
            .unwrap_or_else(|| Snapshot::empty(path));

        self.subscriber_count.fetch_add(1, Ordering::Relaxed);
        let count = Arc::clone(&self.subscriber_count);

        Subscription::new(path.clone(), rx)
            .with_catchup(FeedEvent::Value(current))
            .on_cancel(move || {
                count.fetch_sub(1, Ordering::Relaxed);
            })
    }

    /// Store a new value and push it to all subscribers
    ///
    /// Returns the number of subscribers that received it.
    pub(super) fn publish(&mut self, snapshot: Snapshot) -> usize {
        self.latest = Some(snapshot.clone());
        self.tx.send(FeedEvent::Value(snapshot)).unwrap_or(0)
    }

    /// Push an error to all subscribers without touching the stored value
    pub(super) fn fail(&self, error: FeedError) -> usize {
        self.tx.send(FeedEvent::Error(error)).unwrap_or(0)
    }
}
