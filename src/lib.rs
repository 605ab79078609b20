//! # todobro
//!
//! State layer for the ToDoBro to-do list popup.
//!
//! ## Core Concepts
//!
//! - **Path store**: one nested document addressed by dotted paths
//!   (`date.selectedDate`), with subscriptions on path prefixes
//! - **No-op suppression**: writing an equal value changes nothing and
//!   notifies no one
//! - **Batched updates**: related fields land together, then each changed
//!   path is notified once, in input order
//! - **Storage**: sections and the to-do list persist through a key-value
//!   backend
//!
//! ## Example
//!
//! ```ignore
//! use todobro::{PathStore, SetOptions, StateChange, SubscribeOptions};
//!
//! let store = PathStore::new().shared();
//!
//! store.subscribe("date", |change: &StateChange| {
//!     println!("{} -> {:?}", change.path, change.new_value);
//!     Ok(())
//! }, SubscribeOptions::default());
//!
//! assert!(store.set("date.selectedDate", "2025-03-20", SetOptions::default()));
//! assert!(!store.set("date.selectedDate", "2025-03-20", SetOptions::default()));
//! ```

pub mod calendar;
pub mod error;
pub mod form;
pub mod repeat;
pub mod state;
pub mod storage;
pub mod store;
pub mod subscriptions;
pub mod todos;
pub mod types;

// Re-exports
pub use calendar::{CalendarDay, DateType, MonthGrid};
pub use error::{Result, StoreError};
pub use form::{DateTimeData, FormState, Popup, TaskFormData, TimeData, View};
pub use repeat::{CustomRepeat, RepeatBasis, RepeatData, RepeatEnds, RepeatKind, RepeatUnit};
pub use storage::{
    initialize_storage, restore_section, save_section, JsonFileBackend, KvBackend, MemoryBackend,
    Settings,
};
pub use store::{PathStore, StoreConfig};
pub use subscriptions::{
    ChannelSubscription, DropReason, ListenerResult, Paths, StoreEvent, SubscriptionId,
};
pub use todos::{TaskInput, Todo, TodoKind, TodoList, WebsiteInput};
pub use types::*;
