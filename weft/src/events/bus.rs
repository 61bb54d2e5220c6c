//! In-process event bus: type-specific and global subscriptions, synchronous
//! fan-out.
//!
//! `publish` awaits every registered handler; handler failures are logged and
//! never propagate to the publisher. Ordering: type-specific handlers before
//! global handlers, registration order within each group. Delivery is
//! at-most-once per subscription, synchronous with publication; there is no
//! queue and no retry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::error;
use workflow_event::{EventType, WorkflowEvent};

/// Error returned by a subscriber; logged by the bus, invisible to the
/// publisher.
#[derive(Debug, Error)]
#[error("subscriber error: {0}")]
pub struct SubscriberError(pub String);

impl SubscriberError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An event subscriber.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &WorkflowEvent) -> Result<(), SubscriberError>;
}

/// Handle returned by `subscribe`; pass to `unsubscribe` to detach.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: u64,
    event_type: Option<EventType>,
}

#[derive(Default)]
struct Handlers {
    by_type: HashMap<EventType, Vec<(u64, Arc<dyn EventHandler>)>>,
    global: Vec<(u64, Arc<dyn EventHandler>)>,
}

/// Event bus for workflow events.
///
/// **Interaction**: The engine and node executors publish; the database,
/// metrics, and logging subscribers consume. Handler lists are read-mostly
/// and guarded by a lock that is never held across an await.
pub struct EventBus {
    handlers: RwLock<Handlers>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Handlers::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribes to one event type, or to all events when `event_type` is
    /// `None`.
    pub fn subscribe(
        &self,
        event_type: Option<EventType>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut handlers = self.handlers.write().expect("bus handlers poisoned");
        match event_type {
            Some(event_type) => handlers
                .by_type
                .entry(event_type)
                .or_default()
                .push((id, handler)),
            None => handlers.global.push((id, handler)),
        }
        SubscriptionHandle { id, event_type }
    }

    /// Removes one subscription; unknown handles are a no-op.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut handlers = self.handlers.write().expect("bus handlers poisoned");
        match handle.event_type {
            Some(event_type) => {
                if let Some(list) = handlers.by_type.get_mut(&event_type) {
                    list.retain(|(id, _)| *id != handle.id);
                }
            }
            None => handlers.global.retain(|(id, _)| *id != handle.id),
        }
    }

    /// Publishes one event to all subscribers. Handler errors are logged and
    /// swallowed; the publisher never observes them.
    pub async fn publish(&self, event: WorkflowEvent) {
        let (typed, global) = {
            let handlers = self.handlers.read().expect("bus handlers poisoned");
            let typed: Vec<_> = handlers
                .by_type
                .get(&event.event_type)
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default();
            let global: Vec<_> = handlers.global.iter().map(|(_, h)| h.clone()).collect();
            (typed, global)
        };

        for handler in typed.into_iter().chain(global) {
            if let Err(e) = handler.handle(&event).await {
                error!(
                    event_type = event.event_type.as_str(),
                    execution_id = %event.execution_id,
                    error = %e,
                    "event handler failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, _event: &WorkflowEvent) -> Result<(), SubscriberError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(SubscriberError::new("boom"));
            }
            Ok(())
        }
    }

    fn event(event_type: EventType) -> WorkflowEvent {
        WorkflowEvent::new(event_type, "exec-1", "user-1", None)
    }

    /// **Scenario**: Type-specific handlers run before globals, in
    /// registration order.
    #[tokio::test]
    async fn delivery_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            None,
            Arc::new(Recorder {
                name: "global",
                log: log.clone(),
                fail: false,
            }),
        );
        bus.subscribe(
            Some(EventType::Started),
            Arc::new(Recorder {
                name: "typed-1",
                log: log.clone(),
                fail: false,
            }),
        );
        bus.subscribe(
            Some(EventType::Started),
            Arc::new(Recorder {
                name: "typed-2",
                log: log.clone(),
                fail: false,
            }),
        );

        bus.publish(event(EventType::Started)).await;
        assert_eq!(*log.lock().unwrap(), vec!["typed-1", "typed-2", "global"]);
    }

    /// **Scenario**: A failing handler never propagates to the publisher and
    /// later handlers still run.
    #[tokio::test]
    async fn handler_errors_are_swallowed() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            Some(EventType::Started),
            Arc::new(Recorder {
                name: "fails",
                log: log.clone(),
                fail: true,
            }),
        );
        bus.subscribe(
            Some(EventType::Started),
            Arc::new(Recorder {
                name: "after",
                log: log.clone(),
                fail: false,
            }),
        );
        bus.publish(event(EventType::Started)).await;
        assert_eq!(*log.lock().unwrap(), vec!["fails", "after"]);
    }

    /// **Scenario**: Unsubscribed handlers stop receiving events; events of
    /// other types never reach type-specific handlers.
    #[tokio::test]
    async fn unsubscribe_and_type_filtering() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = bus.subscribe(
            Some(EventType::Started),
            Arc::new(Recorder {
                name: "typed",
                log: log.clone(),
                fail: false,
            }),
        );

        bus.publish(event(EventType::NodeExecuted)).await;
        assert!(log.lock().unwrap().is_empty());

        bus.unsubscribe(handle);
        bus.publish(event(EventType::Started)).await;
        assert!(log.lock().unwrap().is_empty());
    }
}
