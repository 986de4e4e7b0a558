//! Push-based data feed
//!
//! The remote store holding each user's redemption codes is consumed through
//! the [`RedemptionFeed`] trait. A subscription on a path yields the full
//! value of that path every time anything under it changes; consumers replace
//! their state with each value instead of patching it.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<dyn RedemptionFeed>
//!                  ┌──────────────────────────────┐
//!                  │ paths: HashMap<FeedPath,     │
//!                  │   FeedEntry {                │
//!                  │     latest: Snapshot,        │
//!                  │     tx: broadcast::Tx,       │
//!                  │   }                          │
//!                  │ >                            │
//!                  └──────────────┬───────────────┘
//!                                 │
//!              ┌──────────────────┼──────────────────┐
//!              ▼                  ▼                  ▼
//!        [Subscription]     [Subscription]     [Subscription]
//!        catchup, then      sub.next()         dropped → count--
//!        sub.next()
//! ```
//!
//! [`MemoryFeed`] is the in-process implementation; a client for a real
//! remote store implements the trait by forwarding its value events into a
//! broadcast channel wrapped in a [`Subscription`].

pub mod config;
pub mod entry;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod subscription;

pub use config::FeedConfig;
pub use entry::FeedEntry;
pub use error::FeedError;
pub use snapshot::{ChildSnapshot, FeedPath, Snapshot};
pub use store::MemoryFeed;
pub use subscription::{FeedEvent, Subscription};

/// Source of live value snapshots keyed by path
pub trait RedemptionFeed: Send + Sync {
    /// Start listening on `path`
    ///
    /// The first event is the current value of the path. The listener stays
    /// attached until the returned [`Subscription`] is dropped.
    fn subscribe(&self, path: &FeedPath) -> Subscription;
}
