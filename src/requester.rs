//! Code redemption requests
//!
//! Submits a code to the remote redemption function and maps the reply into
//! an outcome for immediate feedback. The outcome is advisory: access is only
//! granted once the redemption feed reports the code as applied.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::redemption::RedemptionState;

/// Error returned by a callable endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Raised by the function's own validation, with a user-facing message
    Function {
        /// Human-readable reason
        message: String,
    },
    /// The function could not be reached
    Transport(String),
    /// Unexpected failure inside the function or the client
    Internal(String),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Function { message } => write!(f, "Function error: {}", message),
            CallError::Transport(reason) => write!(f, "Transport error: {}", reason),
            CallError::Internal(reason) => write!(f, "Internal error: {}", reason),
        }
    }
}

impl std::error::Error for CallError {}

/// Remote callable function client
///
/// Payloads and replies are JSON bodies.
pub trait CallableEndpoint: Send + Sync + 'static {
    /// Invoke `function` with `payload`
    fn call(
        &self,
        function: &str,
        payload: Bytes,
    ) -> impl Future<Output = Result<Bytes, CallError>> + Send;
}

/// Result of a redemption request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// Accepted, awaiting a decision
    Pending,
    /// Accepted and applied
    Applied,
    /// Accepted but not usable
    Rejected,
    /// Reply carried an unrecognized state
    Unknown,
    /// The function rejected the code, with its message
    InvalidCode(String),
    /// The request failed; the caller may resubmit
    Failure,
}

impl From<RedemptionState> for RedeemOutcome {
    fn from(state: RedemptionState) -> Self {
        match state {
            RedemptionState::Pending => RedeemOutcome::Pending,
            RedemptionState::Applied => RedeemOutcome::Applied,
            RedemptionState::Rejected => RedeemOutcome::Rejected,
            RedemptionState::Unknown => RedeemOutcome::Unknown,
        }
    }
}

impl std::fmt::Display for RedeemOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedeemOutcome::Pending => f.write_str("pending"),
            RedeemOutcome::Applied => f.write_str("applied"),
            RedeemOutcome::Rejected => f.write_str("rejected"),
            RedeemOutcome::Unknown => f.write_str("unknown"),
            RedeemOutcome::InvalidCode(message) => write!(f, "invalid code: {}", message),
            RedeemOutcome::Failure => f.write_str("failure"),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RedeemRequest<'a> {
    event_id: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
struct RedeemResponse {
    state: Option<String>,
}

/// Map a reply body to an outcome
///
/// A body that is not an object with a string `state` is a failure.
pub fn outcome_from_response(body: &[u8]) -> RedeemOutcome {
    match serde_json::from_slice::<RedeemResponse>(body) {
        Ok(RedeemResponse { state: Some(state) }) => RedemptionState::from_wire(&state).into(),
        Ok(RedeemResponse { state: None }) => RedeemOutcome::Failure,
        Err(e) => {
            tracing::debug!(error = %e, "Undecodable redemption reply");
            RedeemOutcome::Failure
        }
    }
}

/// Submits redemption codes to a callable endpoint
pub struct CodeRedeemer<E> {
    endpoint: Arc<E>,
    function: String,
    timeout: Duration,
}

impl<E> Clone for CodeRedeemer<E> {
    fn clone(&self) -> Self {
        Self {
            endpoint: Arc::clone(&self.endpoint),
            function: self.function.clone(),
            timeout: self.timeout,
        }
    }
}

impl<E: CallableEndpoint> CodeRedeemer<E> {
    /// Create a redeemer calling `function` on `endpoint`
    pub fn new(endpoint: Arc<E>, function: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint,
            function: function.into(),
            timeout,
        }
    }

    /// Name of the remote function
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Submit `code` for `stream_id`
    ///
    /// Always resolves to exactly one outcome; every error path maps to
    /// [`RedeemOutcome::InvalidCode`] or [`RedeemOutcome::Failure`].
    pub async fn redeem(&self, stream_id: &str, code: &str) -> RedeemOutcome {
        if stream_id.is_empty() {
            tracing::warn!("Redemption requested without a stream id");
            return RedeemOutcome::Failure;
        }

        let payload = match serde_json::to_vec(&RedeemRequest {
            event_id: stream_id,
            code,
        }) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode redemption request");
                return RedeemOutcome::Failure;
            }
        };

        let call = self.endpoint.call(&self.function, payload);
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                tracing::warn!(
                    stream = stream_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Redemption request timed out"
                );
                RedeemOutcome::Failure
            }
            Ok(Err(CallError::Function { message })) => RedeemOutcome::InvalidCode(message),
            Ok(Err(e)) => {
                tracing::warn!(stream = stream_id, error = %e, "Redemption request failed");
                RedeemOutcome::Failure
            }
            Ok(Ok(body)) => outcome_from_response(&body),
        };

        tracing::info!(stream = stream_id, outcome = %outcome, "Redemption request completed");
        outcome
    }
}
