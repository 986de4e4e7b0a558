//! In-memory feed implementation
//!
//! A path-keyed value store that pushes the full value of a path to every
//! subscriber whenever it is written. Used as the local stand-in for the
//! remote store in tests and demos.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use super::config::FeedConfig;
use super::entry::FeedEntry;
use super::error::FeedError;
use super::snapshot::{FeedPath, Snapshot};
use super::subscription::Subscription;
use super::RedemptionFeed;

/// In-memory push feed
///
/// Thread-safe via `RwLock`. Writes to a path and new subscriptions on that
/// path are serialized, so a subscriber never misses or duplicates a value
/// written while it is attaching.
pub struct MemoryFeed {
    /// Map of path to entry
    paths: RwLock<HashMap<FeedPath, FeedEntry>>,

    /// Configuration
    config: FeedConfig,
}

impl MemoryFeed {
    /// Create a new feed with default configuration
    pub fn new() -> Self {
        Self::with_config(FeedConfig::default())
    }

    /// Create a new feed with custom configuration
    pub fn with_config(config: FeedConfig) -> Self {
        Self {
            paths: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the feed configuration
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<FeedPath, FeedEntry>> {
        self.paths.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<FeedPath, FeedEntry>> {
        self.paths.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the value at `path` and push it to subscribers
    ///
    /// Returns the number of subscribers that received the new value.
    pub fn set(&self, path: &FeedPath, value: Value) -> usize {
        let mut paths = self.write();
        let entry = paths
            .entry(path.clone())
            .or_insert_with(|| FeedEntry::new(&self.config));

        let delivered = entry.publish(Snapshot::at(path, value));

        tracing::debug!(
            path = %path,
            subscribers = entry.subscriber_count(),
            delivered = delivered,
            "Value written"
        );

        delivered
    }

    /// Delete the value at `path`
    ///
    /// Subscribers receive an empty snapshot.
    pub fn remove(&self, path: &FeedPath) -> usize {
        self.set(path, Value::Null)
    }

    /// Push an error to every subscriber of `path`
    pub fn fail(&self, path: &FeedPath, error: FeedError) -> usize {
        let paths = self.read();

        if let Some(entry) = paths.get(path) {
            tracing::warn!(path = %path, error = %error, "Injecting feed error");
            entry.fail(error)
        } else {
            0
        }
    }

    /// Current value of `path`
    pub fn get(&self, path: &FeedPath) -> Option<Snapshot> {
        self.read().get(path).and_then(|entry| entry.latest.clone())
    }

    /// Number of live subscriptions on `path`
    pub fn subscriber_count(&self, path: &FeedPath) -> u32 {
        self.read()
            .get(path)
            .map(FeedEntry::subscriber_count)
            .unwrap_or(0)
    }

    /// Get total number of tracked paths
    pub fn path_count(&self) -> usize {
        self.read().len()
    }

    /// Drop paths that hold no value and have no subscribers
    pub fn cleanup(&self) {
        let mut paths = self.write();

        paths.retain(|path, entry| {
            let holds_value = entry.latest.as_ref().is_some_and(Snapshot::exists);
            let keep = holds_value || entry.subscriber_count() > 0;
            if !keep {
                tracing::debug!(path = %path, "Path removed by cleanup");
            }
            keep
        });
    }
}

impl RedemptionFeed for MemoryFeed {
    fn subscribe(&self, path: &FeedPath) -> Subscription {
        let mut paths = self.write();
        let entry = paths
            .entry(path.clone())
            .or_insert_with(|| FeedEntry::new(&self.config));

        let subscription = entry.subscribe(path);

        tracing::debug!(
            path = %path,
            subscribers = entry.subscriber_count(),
            "Subscriber added"
        );

        subscription
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}
