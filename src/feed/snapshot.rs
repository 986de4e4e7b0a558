//! Feed paths and value snapshots
//!
//! A snapshot is the full value stored under a feed path at one point in
//! time. Children are addressed by key, mirroring the tree layout of the
//! remote store.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::Result;

/// Slash-separated location in the remote feed (e.g. `users/u1/redemption-codes`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedPath(String);

impl FeedPath {
    /// Create a path, trimming leading and trailing slashes
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self(path.trim_matches('/').to_string())
    }

    /// Build a path by substituting `{user}` in a template
    pub fn for_user(template: &str, user_id: &str) -> Self {
        Self::new(template.replace("{user}", user_id))
    }

    /// The path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the path, used as the snapshot key
    pub fn key(&self) -> Option<&str> {
        self.0.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

impl std::fmt::Display for FeedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full value of a feed location
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    key: Option<String>,
    value: Value,
}

/// Borrowed view of one direct child of a [`Snapshot`]
#[derive(Debug, Clone)]
pub struct ChildSnapshot<'a> {
    /// Child key; `None` when the store handed back an unkeyed child
    pub key: Option<Cow<'a, str>>,
    /// Child value
    pub value: &'a Value,
}

impl Snapshot {
    /// Create a snapshot for a keyed location
    pub fn new(key: Option<String>, value: Value) -> Self {
        Self { key, value }
    }

    /// Snapshot of a path that holds no data
    pub fn empty(path: &FeedPath) -> Self {
        Self::new(path.key().map(str::to_string), Value::Null)
    }

    /// Snapshot of a path holding `value`
    pub fn at(path: &FeedPath, value: Value) -> Self {
        Self::new(path.key().map(str::to_string), value)
    }

    /// Decode a snapshot from a raw JSON payload
    pub fn from_slice(path: &FeedPath, payload: &[u8]) -> Result<Self> {
        let value = serde_json::from_slice(payload)?;
        Ok(Self::at(path, value))
    }

    /// Key of this location
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Raw value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether the location holds any data
    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    /// Number of direct children
    pub fn children_count(&self) -> usize {
        match &self.value {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.iter().filter(|v| !v.is_null()).count(),
            _ => 0,
        }
    }

    /// Iterate direct children in store order
    ///
    /// Objects yield their entries in key order. Arrays yield their non-null
    /// items keyed by index. Scalars have no children.
    pub fn children(&self) -> Box<dyn Iterator<Item = ChildSnapshot<'_>> + '_> {
        match &self.value {
            Value::Object(map) => Box::new(map.iter().map(|(key, value)| ChildSnapshot {
                key: Some(Cow::Borrowed(key.as_str())),
                value,
            })),
            Value::Array(items) => Box::new(
                items
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(i, value)| ChildSnapshot {
                        key: Some(Cow::Owned(i.to_string())),
                        value,
                    }),
            ),
            _ => Box::new(std::iter::empty()),
        }
    }
}
