//! Observer registry
//!
//! A prioritized set of listeners that can be notified in one pass. Listeners
//! are held as `Arc<L>` and compared by identity, so the same instance can
//! only be registered once while equal-looking instances are independent.
//!
//! Broadcasting works on a copy of the listener list. A callback may add or
//! remove listeners (itself included) without disturbing the pass in
//! progress; the change takes effect from the next broadcast.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Notification tier
///
/// `High` listeners are notified before `Low` ones. Within a tier,
/// listeners are notified in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    /// Notified first
    High,
    /// Notified after all high-priority listeners
    #[default]
    Low,
}

struct Registration<L: ?Sized> {
    listener: Arc<L>,
    priority: Priority,
}

impl<L: ?Sized> Clone for Registration<L> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            priority: self.priority,
        }
    }
}

/// Prioritized listener collection
pub struct ObserverRegistry<L: ?Sized> {
    /// Kept sorted by priority, then registration order
    entries: Mutex<Vec<Registration<L>>>,
}

fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    // Compare data addresses only; vtable pointers of the same object may differ
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<L: ?Sized> ObserverRegistry<L> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Registration<L>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener` at `priority`
    ///
    /// Returns `false` if this instance is already registered.
    pub fn add(&self, listener: Arc<L>, priority: Priority) -> bool {
        let mut entries = self.lock();

        if entries.iter().any(|e| same_listener(&e.listener, &listener)) {
            return false;
        }

        let position = entries
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(entries.len());
        entries.insert(position, Registration { listener, priority });
        true
    }

    /// Unregister `listener`
    ///
    /// Returns `false` if it was not registered.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| !same_listener(&e.listener, listener));
        entries.len() != before
    }

    /// Whether this instance is registered
    pub fn contains(&self, listener: &Arc<L>) -> bool {
        self.lock()
            .iter()
            .any(|e| same_listener(&e.listener, listener))
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no listeners are registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Listeners in notification order
    pub fn listeners(&self) -> Vec<Arc<L>> {
        self.lock()
            .iter()
            .map(|e| Arc::clone(&e.listener))
            .collect()
    }

    /// Invoke `action` for every listener in notification order
    ///
    /// The registry lock is not held while `action` runs.
    pub fn broadcast<F>(&self, mut action: F)
    where
        F: FnMut(&L, usize),
    {
        let snapshot: Vec<Registration<L>> = self.lock().clone();

        for (index, entry) in snapshot.iter().enumerate() {
            action(&entry.listener, index);
        }
    }
}

impl<L: ?Sized> Default for ObserverRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> std::fmt::Debug for ObserverRegistry<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("len", &self.len())
            .finish()
    }
}
