//! Box-office redemption controller
//!
//! Keeps the signed-in user's redemption records in sync with the remote
//! feed and answers whether a stream may be watched.
//!
//! # Lifecycle
//!
//! ```text
//!   IdentitySource ──SignedIn(user)──► rebind(user)
//!                                         │ cancel previous subscription
//!                                         │ subscribe users/{user}/redemption-codes
//!                                         ▼
//!   RedemptionFeed ──Snapshot──► subscription task ──parse──► records
//!                                                               │
//!                                     observers (High, then Low)◄┘
//! ```
//!
//! Each push replaces the record list wholesale. A generation counter tags
//! every binding: once a rebind has happened, whatever the previous
//! subscription still delivers is discarded.

pub mod config;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::feed::{FeedError, FeedEvent, FeedPath, RedemptionFeed, Subscription};
use crate::identity::{IdentityEvent, IdentitySource, UserId};
use crate::observer::{ObserverRegistry, Priority};
use crate::redemption::{parse_snapshot, RedemptionRecord};
use crate::requester::{CallableEndpoint, CodeRedeemer, RedeemOutcome};
use crate::stream::Stream;

pub use config::BoxOfficeConfig;

/// Receiver of redemption updates
pub trait BoxOfficeObserver: Send + Sync {
    /// Called with the full record list on registration and on every push
    fn redemptions_updated(&self, redemptions: &[RedemptionRecord]);

    /// Called when the feed reports an error; the record list is left as is
    fn feed_failed(&self, _error: &FeedError) {}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct State {
    records: Arc<[RedemptionRecord]>,
    generation: u64,
    user: Option<UserId>,
}

/// State shared with the subscription task
struct Shared {
    state: Mutex<State>,
    observers: ObserverRegistry<dyn BoxOfficeObserver>,
    /// Serializes notifications so observers see updates in feed order
    delivery: Mutex<()>,
}

impl Shared {
    /// Install `records` if `generation` is still current, then notify
    ///
    /// Returns `false` once the binding has been superseded.
    fn apply(&self, generation: u64, records: Vec<RedemptionRecord>) -> bool {
        let _delivery = lock(&self.delivery);
        let records: Arc<[RedemptionRecord]> = records.into();

        {
            let mut state = lock(&self.state);
            if state.generation != generation {
                return false;
            }
            state.records = Arc::clone(&records);
        }

        tracing::debug!(
            generation = generation,
            records = records.len(),
            observers = self.observers.len(),
            "Redemption snapshot applied"
        );

        self.observers
            .broadcast(|observer, _| observer.redemptions_updated(&records));
        true
    }

    fn report_failure(&self, generation: u64, error: &FeedError) -> bool {
        let _delivery = lock(&self.delivery);

        if lock(&self.state).generation != generation {
            return false;
        }

        self.observers
            .broadcast(|observer, _| observer.feed_failed(error));
        true
    }
}

/// The active subscription; dropping it stops the task and releases the feed listener
struct Binding {
    user: UserId,
    path: FeedPath,
    task: JoinHandle<()>,
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!(user = %self.user, path = %self.path, "Binding released");
    }
}

#[derive(Default)]
struct BindingSlot {
    current: Option<Binding>,
    closed: bool,
}

struct Core {
    shared: Arc<Shared>,
    feed: Arc<dyn RedemptionFeed>,
    path_template: String,
    binding: Mutex<BindingSlot>,
    /// Runtime the controller was created on; every task is spawned here
    runtime: Handle,
}

impl Core {
    fn rebind(&self, user: UserId) {
        let mut slot = lock(&self.binding);
        if slot.closed {
            return;
        }

        let generation = {
            let mut state = lock(&self.shared.state);
            state.generation += 1;
            if state.user.as_ref() != Some(&user) {
                state.records = Arc::from(Vec::new());
            }
            state.user = Some(user.clone());
            state.generation
        };

        // Release before subscribing so two bindings never overlap
        if let Some(previous) = slot.current.take() {
            tracing::info!(
                from = %previous.user,
                to = %user,
                "Rebinding redemption feed"
            );
            drop(previous);
        }

        let path = FeedPath::for_user(&self.path_template, user.as_str());
        let subscription = self.feed.subscribe(&path);
        let task = self.runtime.spawn(run_subscription(
            Arc::clone(&self.shared),
            generation,
            subscription,
        ));

        tracing::info!(
            user = %user,
            path = %path,
            generation = generation,
            "Bound to redemption feed"
        );

        slot.current = Some(Binding { user, path, task });
    }

    fn close(&self) {
        let mut slot = lock(&self.binding);
        slot.closed = true;
        slot.current.take();
    }
}

async fn run_subscription(shared: Arc<Shared>, generation: u64, mut subscription: Subscription) {
    while let Some(event) = subscription.next().await {
        let current = match event {
            FeedEvent::Value(snapshot) => shared.apply(generation, parse_snapshot(&snapshot)),
            FeedEvent::Error(error) => {
                tracing::warn!(
                    path = %subscription.path(),
                    error = %error,
                    "Redemption feed error, keeping last known records"
                );
                shared.report_failure(generation, &error)
            }
        };

        if !current {
            break;
        }
    }

    tracing::debug!(
        path = %subscription.path(),
        generation = generation,
        "Redemption subscription ended"
    );
}

async fn watch_identity(
    core: Arc<Core>,
    identity: Arc<dyn IdentitySource>,
    mut events: broadcast::Receiver<IdentityEvent>,
) {
    loop {
        match events.recv().await {
            Ok(IdentityEvent::SignedIn(user)) => core.rebind(user),
            Ok(IdentityEvent::SignedOut) => {
                tracing::debug!("Sign-out observed, keeping current binding");
            }
            Ok(IdentityEvent::AuthFailed(reason)) => {
                tracing::debug!(reason = %reason, "Authentication failure observed");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped = skipped, "Identity events lagged, resyncing");
                let bound = lock(&core.shared.state).user.clone();
                if let Some(user) = identity.current_user() {
                    if bound.as_ref() != Some(&user) {
                        core.rebind(user);
                    }
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Live view of the signed-in user's redemption codes
///
/// Must be created inside a tokio runtime. Its background tasks run on that
/// runtime, so the other methods may be called from any thread. Dropping the
/// controller stops watching identity changes and releases the feed
/// subscription.
pub struct BoxOfficeController<E> {
    core: Arc<Core>,
    redeemer: CodeRedeemer<E>,
    config: BoxOfficeConfig,
    identity_task: JoinHandle<()>,
}

impl<E: CallableEndpoint> BoxOfficeController<E> {
    /// Create a controller with default configuration
    pub fn new(
        identity: Arc<dyn IdentitySource>,
        feed: Arc<dyn RedemptionFeed>,
        endpoint: Arc<E>,
    ) -> Result<Self> {
        Self::with_config(identity, feed, endpoint, BoxOfficeConfig::default())
    }

    /// Create a controller with custom configuration
    ///
    /// Binds to the current user right away when one is signed in.
    pub fn with_config(
        identity: Arc<dyn IdentitySource>,
        feed: Arc<dyn RedemptionFeed>,
        endpoint: Arc<E>,
        config: BoxOfficeConfig,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                records: Arc::from(Vec::new()),
                generation: 0,
                user: None,
            }),
            observers: ObserverRegistry::new(),
            delivery: Mutex::new(()),
        });

        let core = Arc::new(Core {
            shared,
            feed,
            path_template: config.path_template.clone(),
            binding: Mutex::new(BindingSlot::default()),
            runtime: Handle::current(),
        });

        // Subscribe before reading the current user so no sign-in is missed
        let events = identity.subscribe();
        if let Some(user) = identity.current_user() {
            core.rebind(user);
        }

        let identity_task = core
            .runtime
            .spawn(watch_identity(Arc::clone(&core), identity, events));

        let redeemer = CodeRedeemer::new(
            endpoint,
            config.function_name.clone(),
            config.request_timeout,
        );

        Ok(Self {
            core,
            redeemer,
            config,
            identity_task,
        })
    }

    /// Get the controller configuration
    pub fn config(&self) -> &BoxOfficeConfig {
        &self.config
    }

    /// Point the controller at `user`'s redemption codes
    ///
    /// The previous subscription is cancelled first. Switching to a different
    /// user clears the records at once; observers hear about the new list
    /// when the new subscription delivers its first snapshot.
    pub fn rebind(&self, user: UserId) {
        self.core.rebind(user);
    }

    /// User the controller is currently bound to
    pub fn current_user(&self) -> Option<UserId> {
        lock(&self.core.shared.state).user.clone()
    }

    /// Current records, in feed order
    pub fn records(&self) -> Arc<[RedemptionRecord]> {
        Arc::clone(&lock(&self.core.shared.state).records)
    }

    /// Whether an applied code unlocks `stream_id`
    pub fn can_stream(&self, stream_id: Option<&str>) -> bool {
        let Some(stream_id) = stream_id else {
            return false;
        };

        lock(&self.core.shared.state)
            .records
            .iter()
            .any(|record| record.grants(stream_id))
    }

    /// Whether an applied code unlocks `stream`
    pub fn can_watch(&self, stream: &Stream) -> bool {
        self.can_stream(stream.id.as_deref())
    }

    /// Submit `code` for `stream`
    ///
    /// The outcome is feedback for the caller only; the record list changes
    /// when the feed reports the new state.
    pub async fn redeem_code(&self, stream: &Stream, code: &str) -> RedeemOutcome {
        match stream.id.as_deref() {
            Some(stream_id) => self.redeemer.redeem(stream_id, code).await,
            None => {
                tracing::warn!("Cannot redeem a code for a stream without an id");
                RedeemOutcome::Failure
            }
        }
    }

    /// Submit `code` for `stream` in the background and hand the outcome to `callback`
    pub fn redeem_code_with<F>(&self, stream: &Stream, code: &str, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(RedeemOutcome) + Send + 'static,
    {
        let redeemer = self.redeemer.clone();
        let stream_id = stream.id.clone();
        let code = code.to_string();

        self.core.runtime.spawn(async move {
            let outcome = match stream_id {
                Some(stream_id) => redeemer.redeem(&stream_id, &code).await,
                None => RedeemOutcome::Failure,
            };
            callback(outcome);
        })
    }

    /// Register `observer` and immediately hand it the current records
    ///
    /// Returns `false` if the observer was already registered; the current
    /// records are delivered either way. Must not be called from inside an
    /// observer callback.
    pub fn add_observer(&self, observer: Arc<dyn BoxOfficeObserver>, priority: Priority) -> bool {
        let shared = &self.core.shared;
        let _delivery = lock(&shared.delivery);

        let records = Arc::clone(&lock(&shared.state).records);
        observer.redemptions_updated(&records);

        shared.observers.add(observer, priority)
    }

    /// Unregister `observer`
    pub fn remove_observer(&self, observer: &Arc<dyn BoxOfficeObserver>) -> bool {
        self.core.shared.observers.remove(observer)
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.core.shared.observers.len()
    }
}

impl<E> Drop for BoxOfficeController<E> {
    fn drop(&mut self) {
        self.identity_task.abort();
        self.core.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::feed::MemoryFeed;
    use crate::identity::MemoryIdentity;
    use crate::redemption::RedemptionState;
    use crate::requester::test_support::ScriptedEndpoint;
    use crate::requester::CallError;

    enum Update {
        Records(Vec<RedemptionRecord>),
        Failed(FeedError),
    }

    struct Recorder {
        tx: mpsc::UnboundedSender<Update>,
    }

    impl BoxOfficeObserver for Recorder {
        fn redemptions_updated(&self, redemptions: &[RedemptionRecord]) {
            let _ = self.tx.send(Update::Records(redemptions.to_vec()));
        }

        fn feed_failed(&self, error: &FeedError) {
            let _ = self.tx.send(Update::Failed(error.clone()));
        }
    }

    fn recorder() -> (Arc<dyn BoxOfficeObserver>, mpsc::UnboundedReceiver<Update>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Recorder { tx }), rx)
    }

    fn codes_path(user: &str) -> FeedPath {
        FeedPath::for_user(config::DEFAULT_PATH_TEMPLATE, user)
    }

    async fn next_update(rx: &mut mpsc::UnboundedReceiver<Update>) -> Update {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("observer channel closed")
    }

    async fn wait_for_records<P>(
        rx: &mut mpsc::UnboundedReceiver<Update>,
        predicate: P,
    ) -> Vec<RedemptionRecord>
    where
        P: Fn(&[RedemptionRecord]) -> bool,
    {
        loop {
            if let Update::Records(records) = next_update(rx).await {
                if predicate(&records) {
                    return records;
                }
            }
        }
    }

    async fn wait_for_subscribers(feed: &MemoryFeed, path: &FeedPath, expected: u32) {
        for _ in 0..200 {
            if feed.subscriber_count(path) == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {} subscribers on {}, found {}",
            expected,
            path,
            feed.subscriber_count(path)
        );
    }

    struct Fixture {
        identity: Arc<MemoryIdentity>,
        feed: Arc<MemoryFeed>,
        endpoint: Arc<ScriptedEndpoint>,
        controller: BoxOfficeController<ScriptedEndpoint>,
    }

    fn fixture(user: Option<&str>, endpoint: ScriptedEndpoint) -> Fixture {
        let identity = Arc::new(match user {
            Some(user) => MemoryIdentity::signed_in(8, UserId::new(user)),
            None => MemoryIdentity::new(8),
        });
        let feed = Arc::new(MemoryFeed::new());
        let endpoint = Arc::new(endpoint);

        let controller = BoxOfficeController::new(
            Arc::clone(&identity) as Arc<dyn IdentitySource>,
            Arc::clone(&feed) as Arc<dyn RedemptionFeed>,
            Arc::clone(&endpoint),
        )
        .unwrap();

        Fixture {
            identity,
            feed,
            endpoint,
            controller,
        }
    }

    #[tokio::test]
    async fn test_binds_signed_in_user_on_construct() {
        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));

        assert_eq!(fx.controller.current_user(), Some(UserId::new("u1")));
        assert_eq!(fx.feed.subscriber_count(&codes_path("u1")), 1);
    }

    #[tokio::test]
    async fn test_snapshot_scenario() {
        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));
        let (observer, mut rx) = recorder();
        fx.controller.add_observer(observer, Priority::Low);

        fx.feed.set(
            &codes_path("u1"),
            json!({"stream42": {"codeA": "applied"}, "stream7": {}}),
        );

        let records = wait_for_records(&mut rx, |r| !r.is_empty()).await;
        assert_eq!(
            records,
            vec![RedemptionRecord::new(
                "codeA",
                "stream42",
                RedemptionState::Applied
            )]
        );

        assert!(fx.controller.can_stream(Some("stream42")));
        assert!(!fx.controller.can_stream(Some("stream7")));
        assert!(!fx.controller.can_stream(None));
        assert!(fx.controller.can_watch(&Stream::with_id("stream42")));
        assert!(!fx.controller.can_watch(&Stream::default()));
    }

    #[tokio::test]
    async fn test_can_stream_requires_applied() {
        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));
        let (observer, mut rx) = recorder();
        fx.controller.add_observer(observer, Priority::Low);

        fx.feed.set(
            &codes_path("u1"),
            json!({
                "s1": {"c1": "pending"},
                "s2": {"c2": "rejected"},
                "s3": {"c3": "mystery"}
            }),
        );
        wait_for_records(&mut rx, |r| r.len() == 3).await;

        for stream in ["s1", "s2", "s3", "s4"] {
            assert!(!fx.controller.can_stream(Some(stream)));
        }

        fx.feed
            .set(&codes_path("u1"), json!({"s1": {"c1": "APPLIED"}}));
        wait_for_records(&mut rx, |r| r.len() == 1).await;

        assert!(fx.controller.can_stream(Some("s1")));
        // Records are replaced, not merged
        assert!(!fx.controller.can_stream(Some("s2")));
    }

    #[tokio::test]
    async fn test_sign_in_binds() {
        let fx = fixture(None, ScriptedEndpoint::new(vec![]));
        assert!(fx.controller.current_user().is_none());
        assert_eq!(fx.feed.subscriber_count(&codes_path("u1")), 0);

        let (observer, mut rx) = recorder();
        fx.controller.add_observer(observer, Priority::Low);

        fx.feed
            .set(&codes_path("u1"), json!({"s1": {"c1": "applied"}}));
        fx.identity.sign_in(UserId::new("u1"));

        wait_for_records(&mut rx, |r| r.len() == 1).await;
        assert_eq!(fx.controller.current_user(), Some(UserId::new("u1")));
        assert!(fx.controller.can_stream(Some("s1")));
    }

    #[tokio::test]
    async fn test_sign_out_keeps_binding() {
        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));
        let (observer, mut rx) = recorder();
        fx.controller.add_observer(observer, Priority::Low);

        fx.feed
            .set(&codes_path("u1"), json!({"s1": {"c1": "applied"}}));
        wait_for_records(&mut rx, |r| r.len() == 1).await;

        fx.identity.sign_out();
        fx.identity.fail("expired token");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(fx.controller.current_user(), Some(UserId::new("u1")));
        assert!(fx.controller.can_stream(Some("s1")));
    }

    #[tokio::test]
    async fn test_lagged_identity_resyncs() {
        let identity = Arc::new(MemoryIdentity::new(1));
        let feed = Arc::new(MemoryFeed::new());
        let controller = BoxOfficeController::new(
            Arc::clone(&identity) as Arc<dyn IdentitySource>,
            Arc::clone(&feed) as Arc<dyn RedemptionFeed>,
            Arc::new(ScriptedEndpoint::new(vec![])),
        )
        .unwrap();

        // The watcher has not run yet, so its receiver overflows
        for user in ["u1", "u2", "u3"] {
            identity.sign_in(UserId::new(user));
        }

        wait_for_subscribers(&feed, &codes_path("u3"), 1).await;
        assert_eq!(controller.current_user(), Some(UserId::new("u3")));
        assert_eq!(feed.subscriber_count(&codes_path("u1")), 0);
        assert_eq!(feed.subscriber_count(&codes_path("u2")), 0);
    }

    #[tokio::test]
    async fn test_rebind_exclusivity() {
        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));
        let (observer, mut rx) = recorder();
        fx.controller.add_observer(observer, Priority::Low);

        fx.feed
            .set(&codes_path("u1"), json!({"s1": {"c1": "applied"}}));
        wait_for_records(&mut rx, |r| r.len() == 1).await;

        fx.controller.rebind(UserId::new("u2"));
        // u2 has no data yet; its first snapshot is empty
        wait_for_records(&mut rx, |r| r.is_empty()).await;

        fx.feed.set(
            &codes_path("u1"),
            json!({"s1": {"c1": "applied"}, "s9": {"c9": "applied"}}),
        );
        fx.feed
            .set(&codes_path("u2"), json!({"s2": {"c2": "pending"}}));

        let records = wait_for_records(&mut rx, |r| !r.is_empty()).await;
        assert_eq!(
            records,
            vec![RedemptionRecord::new("c2", "s2", RedemptionState::Pending)]
        );
        assert!(!fx.controller.can_stream(Some("s1")));
        assert!(!fx.controller.can_stream(Some("s9")));

        wait_for_subscribers(&fx.feed, &codes_path("u1"), 0).await;
        assert_eq!(fx.feed.subscriber_count(&codes_path("u2")), 1);
    }

    /// Serves one path through a channel that only ever reports errors
    struct SplitFeed {
        memory: MemoryFeed,
        denied: FeedPath,
        tx: broadcast::Sender<FeedEvent>,
    }

    impl SplitFeed {
        fn denying(denied: FeedPath) -> Self {
            let (tx, _) = broadcast::channel(4);
            Self {
                memory: MemoryFeed::new(),
                denied,
                tx,
            }
        }
    }

    impl RedemptionFeed for SplitFeed {
        fn subscribe(&self, path: &FeedPath) -> Subscription {
            if *path != self.denied {
                return self.memory.subscribe(path);
            }

            Subscription::new(path.clone(), self.tx.subscribe()).with_catchup(FeedEvent::Error(
                FeedError::PermissionDenied(path.clone()),
            ))
        }
    }

    #[tokio::test]
    async fn test_rebind_clears_previous_user_records() {
        let feed = Arc::new(SplitFeed::denying(codes_path("u2")));
        feed.memory
            .set(&codes_path("u1"), json!({"s1": {"c1": "applied"}}));

        let controller = BoxOfficeController::new(
            Arc::new(MemoryIdentity::signed_in(8, UserId::new("u1"))),
            Arc::clone(&feed) as Arc<dyn RedemptionFeed>,
            Arc::new(ScriptedEndpoint::new(vec![])),
        )
        .unwrap();
        let (observer, mut rx) = recorder();
        controller.add_observer(observer, Priority::Low);
        wait_for_records(&mut rx, |r| r.len() == 1).await;

        // Same user keeps its records
        controller.rebind(UserId::new("u1"));
        assert!(controller.can_stream(Some("s1")));

        controller.rebind(UserId::new("u2"));
        assert!(!controller.can_stream(Some("s1")));
        assert!(controller.records().is_empty());

        loop {
            if let Update::Failed(error) = next_update(&mut rx).await {
                assert_eq!(error, FeedError::PermissionDenied(codes_path("u2")));
                break;
            }
        }
        assert!(!controller.can_stream(Some("s1")));
        assert_eq!(controller.current_user(), Some(UserId::new("u2")));
    }

    #[tokio::test]
    async fn test_observer_replay() {
        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));
        let (first, mut first_rx) = recorder();
        fx.controller.add_observer(first, Priority::Low);

        fx.feed.set(
            &codes_path("u1"),
            json!({"s1": {"c1": "applied"}, "s2": {"c2": "pending"}}),
        );
        wait_for_records(&mut first_rx, |r| r.len() == 2).await;

        let (late, mut late_rx) = recorder();
        fx.controller.add_observer(late, Priority::Low);

        // Delivered synchronously, before any new push
        match late_rx.try_recv() {
            Ok(Update::Records(records)) => assert_eq!(records.len(), 2),
            _ => panic!("late observer was not replayed the current records"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_observer() {
        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));
        let (observer, mut rx) = recorder();

        assert!(fx.controller.add_observer(Arc::clone(&observer), Priority::Low));
        assert!(!fx.controller.add_observer(Arc::clone(&observer), Priority::High));
        assert_eq!(fx.controller.observer_count(), 1);

        fx.feed
            .set(&codes_path("u1"), json!({"s1": {"c1": "applied"}}));
        wait_for_records(&mut rx, |r| r.len() == 1).await;

        // One registration means one notification per push
        fx.feed.set(&codes_path("u1"), json!({}));
        wait_for_records(&mut rx, |r| r.is_empty()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        assert!(fx.controller.remove_observer(&observer));
        assert_eq!(fx.controller.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_priority_order() {
        struct Tagged {
            tag: &'static str,
            log: Arc<Mutex<Vec<&'static str>>>,
        }

        impl BoxOfficeObserver for Tagged {
            fn redemptions_updated(&self, _: &[RedemptionRecord]) {
                self.log.lock().unwrap().push(self.tag);
            }
        }

        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));
        let log = Arc::new(Mutex::new(Vec::new()));
        let (done, mut done_rx) = recorder();

        fx.controller.add_observer(done, Priority::Low);
        for (tag, priority) in [("low", Priority::Low), ("high", Priority::High)] {
            fx.controller.add_observer(
                Arc::new(Tagged {
                    tag,
                    log: Arc::clone(&log),
                }),
                priority,
            );
        }

        fx.feed
            .set(&codes_path("u1"), json!({"s1": {"c1": "applied"}}));
        wait_for_records(&mut done_rx, |r| r.len() == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let log = log.lock().unwrap();
        // Registration replays first, then the push in priority order
        assert_eq!(&log[..2], &["low", "high"]);
        let pushes = &log[2..];
        let high = pushes.iter().position(|t| *t == "high").unwrap();
        let low = pushes.iter().position(|t| *t == "low").unwrap();
        assert!(high < low);
    }

    #[tokio::test]
    async fn test_feed_error_keeps_records() {
        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));
        let (observer, mut rx) = recorder();
        fx.controller.add_observer(observer, Priority::Low);

        let path = codes_path("u1");
        fx.feed.set(&path, json!({"s1": {"c1": "applied"}}));
        wait_for_records(&mut rx, |r| r.len() == 1).await;

        fx.feed
            .fail(&path, FeedError::Disconnected("network lost".into()));

        loop {
            if let Update::Failed(error) = next_update(&mut rx).await {
                assert_eq!(error, FeedError::Disconnected("network lost".into()));
                break;
            }
        }
        assert!(fx.controller.can_stream(Some("s1")));

        // The subscription survives the error
        fx.feed.set(&path, json!({}));
        wait_for_records(&mut rx, |r| r.is_empty()).await;
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));
        let path = codes_path("u1");
        assert_eq!(fx.feed.subscriber_count(&path), 1);

        let Fixture {
            feed, controller, ..
        } = fx;
        drop(controller);

        wait_for_subscribers(&feed, &path, 0).await;
    }

    #[tokio::test]
    async fn test_redeem_does_not_touch_records() {
        let fx = fixture(
            Some("u1"),
            ScriptedEndpoint::replying(r#"{"state":"applied"}"#),
        );

        let outcome = fx
            .controller
            .redeem_code(&Stream::with_id("s1"), "CODE")
            .await;

        assert_eq!(outcome, RedeemOutcome::Applied);
        assert_eq!(fx.endpoint.call_count(), 1);
        // Access only follows the feed
        assert!(!fx.controller.can_stream(Some("s1")));
    }

    #[tokio::test]
    async fn test_redeem_without_stream_id() {
        let fx = fixture(Some("u1"), ScriptedEndpoint::new(vec![]));

        let outcome = fx.controller.redeem_code(&Stream::default(), "CODE").await;

        assert_eq!(outcome, RedeemOutcome::Failure);
        assert_eq!(fx.endpoint.call_count(), 0);
    }

    #[tokio::test]
    async fn test_redeem_with_callback() {
        let fx = fixture(
            Some("u1"),
            ScriptedEndpoint::new(vec![Err(CallError::Function {
                message: "Code expired".into(),
            })]),
        );
        let (tx, rx) = tokio::sync::oneshot::channel();

        fx.controller
            .redeem_code_with(&Stream::with_id("s1"), "BADCODE", move |outcome| {
                let _ = tx.send(outcome);
            })
            .await
            .unwrap();

        assert_eq!(
            rx.await.unwrap(),
            RedeemOutcome::InvalidCode("Code expired".into())
        );
    }

    #[tokio::test]
    async fn test_custom_config() {
        let identity = Arc::new(MemoryIdentity::signed_in(8, UserId::new("u1")));
        let feed = Arc::new(MemoryFeed::new());
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(Bytes::from_static(
            br#"{"state":"pending"}"#,
        ))]));

        let controller = BoxOfficeController::with_config(
            identity,
            Arc::clone(&feed) as Arc<dyn RedemptionFeed>,
            Arc::clone(&endpoint),
            BoxOfficeConfig::default()
                .path_template("accounts/{user}/codes")
                .function_name("redeemCode"),
        )
        .unwrap();

        assert_eq!(feed.subscriber_count(&FeedPath::new("accounts/u1/codes")), 1);

        controller.redeem_code(&Stream::with_id("s1"), "C").await;
        assert_eq!(endpoint.calls.lock().unwrap()[0].0, "redeemCode");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = BoxOfficeController::with_config(
            Arc::new(MemoryIdentity::new(8)),
            Arc::new(MemoryFeed::new()),
            Arc::new(ScriptedEndpoint::new(vec![])),
            BoxOfficeConfig::default().path_template("codes"),
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_calls_from_plain_thread() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let feed = Arc::new(MemoryFeed::new());
        feed.set(&codes_path("u1"), json!({"s1": {"c1": "applied"}}));

        let controller = runtime.block_on(async {
            BoxOfficeController::new(
                Arc::new(MemoryIdentity::new(8)),
                Arc::clone(&feed) as Arc<dyn RedemptionFeed>,
                Arc::new(ScriptedEndpoint::replying(r#"{"state":"pending"}"#)),
            )
            .unwrap()
        });
        let (tx, outcomes) = std::sync::mpsc::channel();

        let redeem = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    controller.rebind(UserId::new("u1"));
                    controller.redeem_code_with(&Stream::with_id("s1"), "C", move |outcome| {
                        let _ = tx.send(outcome);
                    })
                })
                .join()
                .unwrap()
        });

        assert_eq!(feed.subscriber_count(&codes_path("u1")), 1);
        runtime.block_on(redeem).unwrap();
        assert_eq!(outcomes.recv().unwrap(), RedeemOutcome::Pending);

        runtime.block_on(async {
            let (observer, mut rx) = recorder();
            controller.add_observer(observer, Priority::Low);
            wait_for_records(&mut rx, |r| r.len() == 1).await;
        });
        assert!(controller.can_stream(Some("s1")));
    }
}
