//! Feed error types
//!
//! Errors reported on a subscription's event channel when the remote store
//! cannot deliver a value.

use super::snapshot::FeedPath;

/// Error delivered through a feed subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The signed-in user may not read this path
    PermissionDenied(FeedPath),
    /// Connection to the remote store was lost
    Disconnected(String),
    /// Payload could not be decoded into a snapshot
    Malformed(String),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::PermissionDenied(path) => write!(f, "Permission denied: {}", path),
            FeedError::Disconnected(reason) => write!(f, "Feed disconnected: {}", reason),
            FeedError::Malformed(reason) => write!(f, "Malformed feed payload: {}", reason),
        }
    }
}

impl std::error::Error for FeedError {}
