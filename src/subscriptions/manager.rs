//! Subscription registry and change dispatch.

use crate::types::{Path, StateChange};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::any::Any;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{
    ChannelSubscription, DropReason, Listener, Paths, StoreEvent, SubscriptionId,
};

/// Default nesting limit for notification passes.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Where a subscription's changes go.
#[derive(Clone)]
enum Sink {
    Callback(Listener),
    Channel(Sender<StoreEvent>),
}

/// Internal subscription state.
struct Subscription {
    /// Parsed prefixes. Malformed prefixes are dropped here and never match.
    prefixes: Vec<Path>,
    sink: Sink,
}

impl Subscription {
    fn matches(&self, path: &Path) -> bool {
        self.prefixes.iter().any(|prefix| prefix.is_prefix_of(path))
    }
}

/// Why a delivery did not reach its subscriber.
enum DeliveryFailure {
    Overflow,
    Disconnected,
}

thread_local! {
    /// Dispatch passes currently running on this thread.
    static DISPATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks one dispatch pass on the current thread. The depth is restored
/// when the pass ends, including on unwind.
struct DepthGuard {
    depth: usize,
}

impl DepthGuard {
    fn enter() -> Self {
        let depth = DISPATCH_DEPTH.with(|d| {
            let depth = d.get() + 1;
            d.set(depth);
            depth
        });
        Self { depth }
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DISPATCH_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Manages subscriptions and dispatches changes to them.
///
/// No lock is held while a listener runs, so listeners may write to the
/// store that notified them.
pub struct SubscriptionManager {
    /// Active subscriptions, ordered by creation.
    subscriptions: RwLock<BTreeMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    max_depth: usize,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Create a manager that stops dispatching past `max_depth` nested passes.
    ///
    /// Nesting is counted per thread: passes running concurrently on
    /// different threads never count against each other.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            max_depth,
        }
    }

    /// Register a callback listener.
    pub fn subscribe(&self, paths: &Paths, listener: Listener) -> SubscriptionId {
        self.insert(paths, Sink::Callback(listener))
    }

    /// Register a queued listener with a bounded buffer.
    pub fn subscribe_channel(&self, paths: &Paths, buffer_size: usize) -> ChannelSubscription {
        let (sender, receiver) = bounded(buffer_size.max(1));
        let id = self.insert(paths, Sink::Channel(sender));
        ChannelSubscription { id, receiver }
    }

    fn insert(&self, paths: &Paths, sink: Sink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));

        let prefixes = paths
            .iter()
            .filter_map(|raw| match Path::parse(raw) {
                Ok(path) => Some(path),
                Err(_) => {
                    tracing::warn!(
                        listener = %id,
                        path = raw,
                        "Subscribed path is malformed and will never match"
                    );
                    None
                }
            })
            .collect();

        self.subscriptions
            .write()
            .insert(id, Subscription { prefixes, sink });

        tracing::debug!(listener = %id, paths = ?paths.0, "Subscription created");
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.write().remove(&id);
        match removed {
            Some(sub) => {
                if let Sink::Channel(sender) = sub.sink {
                    // Best effort; the buffer may be full.
                    let _ = sender.try_send(StoreEvent::Dropped {
                        reason: DropReason::Unsubscribed,
                    });
                }
                tracing::debug!(listener = %id, "Subscription removed");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.read().contains_key(&id)
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Deliver `change` to every subscription with a prefix matching `path`,
    /// in creation order.
    pub fn dispatch(&self, path: &Path, change: &StateChange) {
        let guard = DepthGuard::enter();
        let depth = guard.depth;

        if depth > self.max_depth {
            tracing::warn!(
                path = %path,
                depth,
                max_depth = self.max_depth,
                "Notification nesting limit reached, skipping dispatch"
            );
            return;
        }

        let targets: Vec<(SubscriptionId, Sink)> = {
            let subs = self.subscriptions.read();
            subs.iter()
                .filter(|(_, sub)| sub.matches(path))
                .map(|(id, sub)| (*id, sub.sink.clone()))
                .collect()
        };

        for (id, sink) in targets {
            // An earlier listener in this pass may have removed this one.
            if !self.contains(id) {
                continue;
            }
            self.deliver_to(id, &sink, change);
        }
    }

    /// Deliver `change` to a single subscription, bypassing prefix matching.
    /// Returns false if the subscription does not exist or was dropped.
    pub fn send_to(&self, id: SubscriptionId, change: &StateChange) -> bool {
        let sink = match self.subscriptions.read().get(&id) {
            Some(sub) => sub.sink.clone(),
            None => return false,
        };
        self.deliver_to(id, &sink, change)
    }

    fn deliver_to(&self, id: SubscriptionId, sink: &Sink, change: &StateChange) -> bool {
        match sink {
            Sink::Callback(listener) => {
                invoke_isolated(id, listener, change);
                true
            }
            Sink::Channel(sender) => match try_send(sender, change) {
                Ok(()) => true,
                Err(failure) => {
                    self.drop_channel(id, failure);
                    false
                }
            },
        }
    }

    fn drop_channel(&self, id: SubscriptionId, failure: DeliveryFailure) {
        let removed = self.subscriptions.write().remove(&id);
        let reason = match failure {
            DeliveryFailure::Overflow => DropReason::BufferOverflow,
            DeliveryFailure::Disconnected => DropReason::Disconnected,
        };
        tracing::warn!(listener = %id, ?reason, "Dropping channel subscription");

        if let Some(Subscription {
            sink: Sink::Channel(sender),
            ..
        }) = removed
        {
            // Might fail, that's ok.
            let _ = sender.try_send(StoreEvent::Dropped { reason });
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn try_send(sender: &Sender<StoreEvent>, change: &StateChange) -> Result<(), DeliveryFailure> {
    match sender.try_send(StoreEvent::Changed {
        change: change.clone(),
    }) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => Err(DeliveryFailure::Overflow),
        Err(TrySendError::Disconnected(_)) => Err(DeliveryFailure::Disconnected),
    }
}

/// Run a listener, logging (not propagating) its errors and panics.
fn invoke_isolated(id: SubscriptionId, listener: &Listener, change: &StateChange) {
    match panic::catch_unwind(AssertUnwindSafe(|| listener(change))) {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::error!(listener = %id, path = %change.path, %error, "Error in state listener");
        }
        Err(payload) => {
            tracing::error!(
                listener = %id,
                path = %change.path,
                panic = panic_message(payload.as_ref()),
                "State listener panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::ListenerResult;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn change(path: &str, value: serde_json::Value) -> StateChange {
        StateChange {
            path: path.to_string(),
            new_value: Some(value),
            old_value: None,
        }
    }

    fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Listener {
        let log = Arc::clone(log);
        Arc::new(move |change: &StateChange| -> ListenerResult {
            log.lock().push(format!("{tag}:{}", change.path));
            Ok(())
        })
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let manager = SubscriptionManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let id = manager.subscribe(&"date".into(), recording(&log, "a"));
        assert_eq!(manager.subscription_count(), 1);

        assert!(manager.unsubscribe(id));
        assert!(!manager.unsubscribe(id));
        assert_eq!(manager.subscription_count(), 0);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let manager = SubscriptionManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = manager.subscribe(&"a".into(), recording(&log, "a"));
        manager.unsubscribe(first);
        let second = manager.subscribe(&"a".into(), recording(&log, "a"));
        assert!(second > first);
        assert_eq!(first.to_string(), "listener_1");
    }

    #[test]
    fn test_dispatch_matches_prefixes_in_creation_order() {
        let manager = SubscriptionManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        manager.subscribe(&"date".into(), recording(&log, "date"));
        manager.subscribe(&"dateType".into(), recording(&log, "dateType"));
        manager.subscribe(&["time", "date.selectedDate"].into(), recording(&log, "multi"));

        let path = Path::parse("date.selectedDate").unwrap();
        manager.dispatch(&path, &change("date.selectedDate", json!("2025-01-01")));

        assert_eq!(
            *log.lock(),
            vec!["date:date.selectedDate", "multi:date.selectedDate"]
        );
    }

    #[test]
    fn test_malformed_prefix_never_matches() {
        let manager = SubscriptionManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        manager.subscribe(&"a..b".into(), recording(&log, "bad"));
        let path = Path::parse("a.b").unwrap();
        manager.dispatch(&path, &change("a.b", json!(1)));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let manager = SubscriptionManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        manager.subscribe(
            &"x".into(),
            Arc::new(|_change: &StateChange| -> ListenerResult { Err("boom".into()) }),
        );
        manager.subscribe(
            &"x".into(),
            Arc::new(|_change: &StateChange| -> ListenerResult { panic!("listener panic") }),
        );
        manager.subscribe(&"x".into(), recording(&log, "ok"));

        let path = Path::parse("x").unwrap();
        manager.dispatch(&path, &change("x", json!(1)));
        assert_eq!(*log.lock(), vec!["ok:x"]);
    }

    #[test]
    fn test_channel_subscription_receives() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe_channel(&"repeat".into(), 8);

        let path = Path::parse("repeat.type").unwrap();
        manager.dispatch(&path, &change("repeat.type", json!("daily")));

        match handle.try_recv().unwrap() {
            StoreEvent::Changed { change } => {
                assert_eq!(change.path, "repeat.type");
                assert_eq!(change.new_value, Some(json!("daily")));
            }
            other => panic!("Expected Changed event, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_slow_channel_subscriber() {
        let manager = SubscriptionManager::new();
        let _handle = manager.subscribe_channel(&"x".into(), 2);

        let path = Path::parse("x").unwrap();
        for i in 0..10 {
            manager.dispatch(&path, &change("x", json!(i)));
        }

        assert_eq!(manager.subscription_count(), 0);
    }

    #[test]
    fn test_disconnected_channel_is_dropped() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe_channel(&"x".into(), 4);
        drop(handle);

        let path = Path::parse("x").unwrap();
        manager.dispatch(&path, &change("x", json!(1)));
        assert_eq!(manager.subscription_count(), 0);
    }

    #[test]
    fn test_unsubscribe_sends_dropped() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe_channel(&"x".into(), 4);
        manager.unsubscribe(handle.id);

        assert_eq!(
            handle.try_recv().unwrap(),
            StoreEvent::Dropped {
                reason: DropReason::Unsubscribed
            }
        );
    }

    #[test]
    fn test_depth_limit_stops_dispatch() {
        let manager = SubscriptionManager::with_max_depth(0);
        let log = Arc::new(Mutex::new(Vec::new()));
        manager.subscribe(&"x".into(), recording(&log, "a"));

        let path = Path::parse("x").unwrap();
        manager.dispatch(&path, &change("x", json!(1)));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_depth_is_tracked_per_thread() {
        let manager = Arc::new(SubscriptionManager::with_max_depth(1));
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();

        // Each pass stays open until released, so both threads are inside
        // a listener at the same time.
        manager.subscribe(
            &"k".into(),
            Arc::new(move |change: &StateChange| -> ListenerResult {
                let _ = entered_tx.send(change.path.clone());
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
                Ok(())
            }),
        );

        let handles: Vec<_> = ["k.t0", "k.t1"]
            .into_iter()
            .map(|raw| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    let path = Path::parse(raw).unwrap();
                    manager.dispatch(&path, &change(raw, json!(1)));
                })
            })
            .collect();

        let mut entered = vec![
            entered_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            entered_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ];
        drop(release_tx);
        for handle in handles {
            handle.join().unwrap();
        }

        entered.sort();
        assert_eq!(entered, vec!["k.t0", "k.t1"]);
    }

    #[test]
    fn test_depth_restored_after_listener_panic() {
        let manager = SubscriptionManager::with_max_depth(1);
        let log = Arc::new(Mutex::new(Vec::new()));
        manager.subscribe(
            &"x".into(),
            Arc::new(|_change: &StateChange| -> ListenerResult { panic!("listener panic") }),
        );
        manager.subscribe(&"x".into(), recording(&log, "ok"));

        let path = Path::parse("x").unwrap();
        manager.dispatch(&path, &change("x", json!(1)));
        manager.dispatch(&path, &change("x", json!(2)));
        assert_eq!(*log.lock(), vec!["ok:x", "ok:x"]);
    }
}
