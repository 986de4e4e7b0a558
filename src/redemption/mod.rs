//! Redemption records
//!
//! Value types for redeemed codes and the decoder that turns a feed snapshot
//! into a list of them.

pub mod parse;
pub mod record;

pub use parse::{decode_child, parse_snapshot};
pub use record::{RedemptionRecord, RedemptionState};
