//! Box-office walkthrough against in-memory collaborators
//!
//! Run with: cargo run --example box_office
//!
//! Set `RUST_LOG=boxoffice_rs=debug` to see feed and binding activity.
//!
//! The simulated redemption function writes the submitted code into the
//! user's redemption path as `pending`, then approves it shortly after,
//! the way the real backend does. The controller picks both changes up from
//! the feed; the request reply itself never grants access.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

use boxoffice_rs::controller::{BoxOfficeController, BoxOfficeObserver};
use boxoffice_rs::feed::{FeedPath, MemoryFeed};
use boxoffice_rs::identity::{MemoryIdentity, UserId};
use boxoffice_rs::observer::Priority;
use boxoffice_rs::redemption::RedemptionRecord;
use boxoffice_rs::requester::{CallError, CallableEndpoint};
use boxoffice_rs::Stream;

const USER: &str = "fan-001";

/// Backend stand-in that records redemptions in the feed
struct SimulatedFunctions {
    feed: Arc<MemoryFeed>,
}

impl SimulatedFunctions {
    fn path(&self) -> FeedPath {
        FeedPath::for_user("users/{user}/redemption-codes", USER)
    }

    fn write_state(feed: &MemoryFeed, path: &FeedPath, stream: &str, code: &str, state: &str) {
        let mut value = feed
            .get(path)
            .map(|s| s.value().clone())
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({}));
        let mut entry = Map::new();
        entry.insert(code.to_string(), Value::from(state));
        value[stream] = Value::Object(entry);
        feed.set(path, value);
    }
}

impl CallableEndpoint for SimulatedFunctions {
    async fn call(&self, function: &str, payload: Bytes) -> Result<Bytes, CallError> {
        if function != "redeemBoxOfficeCode" {
            return Err(CallError::Internal(format!("unknown function {}", function)));
        }

        let request: Value = serde_json::from_slice(&payload)
            .map_err(|e| CallError::Internal(e.to_string()))?;
        let stream = request["eventId"].as_str().unwrap_or_default().to_string();
        let code = request["code"].as_str().unwrap_or_default().to_string();

        if !code.starts_with("VIP-") {
            return Err(CallError::Function {
                message: format!("Code {} is not valid for this event", code),
            });
        }

        let path = self.path();
        Self::write_state(&self.feed, &path, &stream, &code, "pending");

        // Approval lands asynchronously, like a backend trigger
        let feed = Arc::clone(&self.feed);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Self::write_state(&feed, &path, &stream, &code, "applied");
        });

        Ok(Bytes::from_static(br#"{"state":"pending"}"#))
    }
}

/// Prints every update it receives
struct ConsoleObserver;

impl BoxOfficeObserver for ConsoleObserver {
    fn redemptions_updated(&self, redemptions: &[RedemptionRecord]) {
        println!("Redemptions updated ({}):", redemptions.len());
        for record in redemptions {
            println!("  {} -> {} [{}]", record.code, record.stream_id, record.state);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("boxoffice_rs=info".parse()?),
        )
        .init();

    let identity = Arc::new(MemoryIdentity::new(16));
    let feed = Arc::new(MemoryFeed::new());
    let functions = Arc::new(SimulatedFunctions {
        feed: Arc::clone(&feed),
    });

    let controller = BoxOfficeController::new(identity.clone(), feed.clone(), functions)?;
    controller.add_observer(Arc::new(ConsoleObserver), Priority::Low);

    identity.sign_in(UserId::new(USER));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stream = Stream {
        title: Some("Midnight Set".into()),
        is_box_office: true,
        ..Stream::with_id("stream-42")
    };

    println!("Can watch before redeeming: {}", controller.can_watch(&stream));

    let outcome = controller.redeem_code(&stream, "FREE-PASS").await;
    println!("Redeeming FREE-PASS: {}", outcome);

    let outcome = controller.redeem_code(&stream, "VIP-7781").await;
    println!("Redeeming VIP-7781: {}", outcome);
    println!("Can watch right after request: {}", controller.can_watch(&stream));

    tokio::time::sleep(Duration::from_millis(400)).await;
    println!("Can watch after approval: {}", controller.can_watch(&stream));

    Ok(())
}
