//! Redemption records and states
//!
//! A record is one redemption code a user submitted, the stream it unlocks,
//! and the decision the server reached on it.

use std::fmt;

/// Server decision on a redemption code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedemptionState {
    /// Submitted, awaiting a decision
    Pending,
    /// Accepted; grants access to the stream
    Applied,
    /// Seen by the server but not usable
    Rejected,
    /// State string not recognized
    Unknown,
}

impl RedemptionState {
    /// Map a wire state string, ignoring ASCII case
    ///
    /// Anything outside the known vocabulary maps to [`RedemptionState::Unknown`].
    pub fn from_wire(s: &str) -> Self {
        if s.eq_ignore_ascii_case("pending") {
            RedemptionState::Pending
        } else if s.eq_ignore_ascii_case("applied") {
            RedemptionState::Applied
        } else if s.eq_ignore_ascii_case("rejected") {
            RedemptionState::Rejected
        } else {
            RedemptionState::Unknown
        }
    }

    /// Canonical wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionState::Pending => "pending",
            RedemptionState::Applied => "applied",
            RedemptionState::Rejected => "rejected",
            RedemptionState::Unknown => "unknown",
        }
    }

    /// Whether this state grants stream access
    pub fn is_applied(&self) -> bool {
        *self == RedemptionState::Applied
    }
}

impl fmt::Display for RedemptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One redemption code and its state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RedemptionRecord {
    /// Code as entered by the user
    pub code: String,
    /// Stream the code unlocks
    pub stream_id: String,
    /// Current server decision
    pub state: RedemptionState,
}

impl RedemptionRecord {
    /// Create a new record
    pub fn new(
        code: impl Into<String>,
        stream_id: impl Into<String>,
        state: RedemptionState,
    ) -> Self {
        Self {
            code: code.into(),
            stream_id: stream_id.into(),
            state,
        }
    }

    /// Whether this record grants access to `stream_id`
    pub fn grants(&self, stream_id: &str) -> bool {
        self.stream_id == stream_id && self.state.is_applied()
    }
}
