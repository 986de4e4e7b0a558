//! Identity source
//!
//! The signed-in user is supplied by an external identity provider. The
//! controller only reads it through [`IdentitySource`] and reacts to the
//! events it broadcasts.

use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

/// Opaque user identifier issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identity change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    /// A user signed in (or the session was restored)
    SignedIn(UserId),
    /// The current user signed out
    SignedOut,
    /// Authentication failed
    AuthFailed(String),
}

/// Provider of the current user and identity changes
pub trait IdentitySource: Send + Sync {
    /// Currently signed-in user, if any
    fn current_user(&self) -> Option<UserId>;

    /// Receive identity changes from now on
    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent>;
}

/// In-process identity source driven by explicit calls
pub struct MemoryIdentity {
    current: RwLock<Option<UserId>>,
    tx: broadcast::Sender<IdentityEvent>,
}

impl MemoryIdentity {
    /// Create a signed-out identity source
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            current: RwLock::new(None),
            tx,
        }
    }

    /// Create an identity source with `user` already signed in
    pub fn signed_in(capacity: usize, user: UserId) -> Self {
        let identity = Self::new(capacity);
        *identity
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(user);
        identity
    }

    fn emit(&self, current: Option<UserId>, event: IdentityEvent) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = current;
        let _ = self.tx.send(event);
    }

    /// Sign `user` in and notify listeners
    pub fn sign_in(&self, user: UserId) {
        tracing::info!(user = %user, "User signed in");
        self.emit(Some(user.clone()), IdentityEvent::SignedIn(user));
    }

    /// Sign the current user out and notify listeners
    pub fn sign_out(&self) {
        tracing::info!("User signed out");
        self.emit(None, IdentityEvent::SignedOut);
    }

    /// Report a failed authentication attempt
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.tx.send(IdentityEvent::AuthFailed(reason.into()));
    }
}

impl IdentitySource for MemoryIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.tx.subscribe()
    }
}
