//! In-memory feed configuration

/// Configuration for [`MemoryFeed`](super::MemoryFeed)
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Capacity of each path's broadcast channel
    ///
    /// A subscriber that falls further behind than this skips the oldest
    /// values; since each value is a full snapshot, only the newest matters.
    pub broadcast_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 64,
        }
    }
}

impl FeedConfig {
    /// Set the per-path broadcast capacity (minimum 1)
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }
}
