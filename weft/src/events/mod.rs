//! Unified workflow event system: bus, subscribers, and execution records.
//!
//! One event type covers the whole lifecycle (see the `workflow-event`
//! crate); the bus distributes events to type-specific and global
//! subscribers; the stock subscribers persist execution records, maintain
//! in-memory metrics, and accumulate per-execution debug logs.
//!
//! The bus is the only process-wide singleton in the system. It is exposed
//! through a lazily-initialized accessor with a reset hook for tests; nothing
//! captures the bus at import time.

mod bus;
mod record;
mod subscribers;

pub use bus::{EventBus, EventHandler, SubscriberError, SubscriptionHandle};
pub use record::{
    ExecutionRecord, ExecutionStatus, InMemoryRecordStore, RecordStore, SqliteRecordStore,
    StoreError,
};
pub use subscribers::{
    register_subscribers, DatabaseSubscriber, LoggingSubscriber, MetricsSnapshot,
    MetricsSubscriber,
};

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

static GLOBAL_BUS: Lazy<RwLock<Option<Arc<EventBus>>>> = Lazy::new(|| RwLock::new(None));

/// Process-wide event bus, created on first access.
pub fn event_bus() -> Arc<EventBus> {
    if let Some(bus) = GLOBAL_BUS.read().expect("bus lock poisoned").as_ref() {
        return bus.clone();
    }
    let mut slot = GLOBAL_BUS.write().expect("bus lock poisoned");
    slot.get_or_insert_with(|| Arc::new(EventBus::new())).clone()
}

/// Drops the process-wide bus so the next access creates a fresh one. Test
/// hook; executions already holding an `Arc` keep publishing to the old bus.
pub fn reset_event_bus() {
    GLOBAL_BUS.write().expect("bus lock poisoned").take();
}
