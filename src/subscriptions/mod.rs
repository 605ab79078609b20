//! Change subscriptions for the path store.
//!
//! A subscription registers one or more path prefixes. A write to a path
//! notifies every subscription holding a prefix that equals the path or is a
//! segment-wise ancestor of it.
//!
//! Two delivery styles are supported:
//! - callbacks, invoked synchronously during the write
//! - bounded channels, drained by the subscriber at its own pace
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new();
//!
//! let handle = manager.subscribe_channel(&"date".into(), 64);
//! manager.dispatch(&Path::parse("date.selectedDate")?, &change);
//!
//! for change in handle.drain_changes() {
//!     println!("{} changed", change.path);
//! }
//! ```

mod manager;
mod types;

pub use manager::{SubscriptionManager, DEFAULT_MAX_DEPTH};
pub use types::{
    ChannelSubscription, DropReason, Listener, ListenerResult, Paths, StoreEvent, SubscriptionId,
};
