//! Box-office redemption tracking for live streams
//!
//! Streams sold through the box office are unlocked by redeeming a code
//! rather than paying at checkout. This crate keeps the signed-in user's
//! redemption codes in sync with a push-based remote store and answers the
//! one question the rest of the client cares about: can this stream be
//! watched?
//!
//! # Overview
//!
//! - [`feed`]: the push-based store, with an in-memory implementation
//! - [`redemption`]: records and the snapshot decoder
//! - [`requester`]: submitting codes to the remote redemption function
//! - [`observer`]: prioritized listener registry
//! - [`identity`]: the signed-in user and its changes
//! - [`controller`]: ties the above together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use boxoffice_rs::controller::{BoxOfficeController, BoxOfficeObserver};
//! use boxoffice_rs::feed::MemoryFeed;
//! use boxoffice_rs::identity::{MemoryIdentity, UserId};
//! use boxoffice_rs::observer::Priority;
//! use boxoffice_rs::redemption::RedemptionRecord;
//! # use boxoffice_rs::requester::{CallableEndpoint, CallError};
//! # struct Functions;
//! # impl CallableEndpoint for Functions {
//! #     async fn call(&self, _: &str, _: bytes::Bytes) -> Result<bytes::Bytes, CallError> {
//! #         Err(CallError::Transport("offline".into()))
//! #     }
//! # }
//!
//! struct Gate;
//!
//! impl BoxOfficeObserver for Gate {
//!     fn redemptions_updated(&self, redemptions: &[RedemptionRecord]) {
//!         println!("{} codes", redemptions.len());
//!     }
//! }
//!
//! # async fn example() -> boxoffice_rs::error::Result<()> {
//! let identity = Arc::new(MemoryIdentity::signed_in(16, UserId::new("u1")));
//! let feed = Arc::new(MemoryFeed::new());
//! let controller = BoxOfficeController::new(identity, feed, Arc::new(Functions))?;
//!
//! controller.add_observer(Arc::new(Gate), Priority::Low);
//! let allowed = controller.can_stream(Some("stream42"));
//! # let _ = allowed;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod error;
pub mod feed;
pub mod identity;
pub mod observer;
pub mod redemption;
pub mod requester;
pub mod stream;

pub use controller::{BoxOfficeConfig, BoxOfficeController, BoxOfficeObserver};
pub use error::{Error, Result};
pub use redemption::{RedemptionRecord, RedemptionState};
pub use requester::RedeemOutcome;
pub use stream::Stream;
