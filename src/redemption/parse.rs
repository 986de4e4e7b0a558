//! Snapshot decoding
//!
//! The redemption path holds one child per stream, keyed by stream id. Each
//! child maps the submitted code to its state string:
//!
//! ```text
//! users/{user}/redemption-codes
//! ├── stream42
//! │   └── codeA: "applied"
//! └── stream7
//!     └── codeB: "pending"
//! ```
//!
//! Children that do not decode are skipped; one bad entry never discards the
//! rest of the batch.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::record::{RedemptionRecord, RedemptionState};
use crate::feed::{ChildSnapshot, Snapshot};

/// Decode every well-formed child of `snapshot` into a record
pub fn parse_snapshot(snapshot: &Snapshot) -> Vec<RedemptionRecord> {
    snapshot
        .children()
        .filter_map(|child| {
            let record = decode_child(&child);
            if record.is_none() {
                tracing::debug!(
                    stream = child.key.as_deref().unwrap_or("<none>"),
                    "Skipping malformed redemption entry"
                );
            }
            record
        })
        .collect()
}

/// Decode one `stream_id → {code: state}` child
///
/// The value must be a mapping of strings to strings with at least one
/// entry. When more than one code is present the first in key order wins.
pub fn decode_child(child: &ChildSnapshot<'_>) -> Option<RedemptionRecord> {
    let stream_id = child.key.as_deref().filter(|k| !k.is_empty())?;
    let codes = BTreeMap::<String, String>::deserialize(child.value).ok()?;
    let (code, state) = codes.into_iter().next()?;

    Some(RedemptionRecord {
        code,
        stream_id: stream_id.to_string(),
        state: RedemptionState::from_wire(&state),
    })
}
