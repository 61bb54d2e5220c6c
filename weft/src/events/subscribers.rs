//! Stock event subscribers: database persistence, metrics, debug logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;
use workflow_event::{EventType, WorkflowEvent};

use super::bus::{EventBus, EventHandler, SubscriberError};
use super::record::{ExecutionStatus, RecordStore};

/// Updates execution records from lifecycle events.
///
/// Each write is one short transaction against the record store; a failed
/// write is logged by the bus and never affects delivery to other
/// subscribers.
pub struct DatabaseSubscriber {
    store: Arc<dyn RecordStore>,
}

impl DatabaseSubscriber {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for DatabaseSubscriber {
    async fn handle(&self, event: &WorkflowEvent) -> Result<(), SubscriberError> {
        let id = event.execution_id.as_str();
        let result = match event.event_type {
            EventType::Started => self.store.mark_running(id, event.timestamp).await,
            EventType::ExecutionCompleted => {
                self.store
                    .mark_completed(
                        id,
                        event.timestamp,
                        event.data.get("tokens_used").and_then(Value::as_u64).unwrap_or(0),
                        event.data.get("cost").and_then(Value::as_f64).unwrap_or(0.0),
                        event
                            .data
                            .get("execution_time_ms")
                            .and_then(Value::as_u64)
                            .unwrap_or(0),
                    )
                    .await
            }
            EventType::ExecutionFailed => {
                let status = match event.data.get("error_type").and_then(Value::as_str) {
                    Some("Cancelled") => ExecutionStatus::Cancelled,
                    _ => ExecutionStatus::Failed,
                };
                self.store
                    .mark_finished(
                        id,
                        status,
                        event.timestamp,
                        event
                            .data
                            .get("error")
                            .and_then(Value::as_str)
                            .map(String::from),
                    )
                    .await
            }
            EventType::TokenUsage => {
                self.store
                    .update_usage(
                        id,
                        event.data.get("tokens_used").and_then(Value::as_u64).unwrap_or(0),
                        event.data.get("cost").and_then(Value::as_f64).unwrap_or(0.0),
                    )
                    .await
            }
            _ => return Ok(()),
        };
        result.map_err(|e| SubscriberError::new(e.to_string()))?;
        debug!(execution_id = id, event = event.event_type.as_str(), "record updated");
        Ok(())
    }
}

/// Snapshot of the in-memory execution metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub total_executions: u64,
    pub running_executions: u64,
    pub completed_executions: u64,
    pub failed_executions: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub tool_calls: u64,
}

/// Tracks real-time counters across all executions. Subscribe globally.
#[derive(Default)]
pub struct MetricsSubscriber {
    total_executions: AtomicU64,
    running_executions: AtomicU64,
    completed_executions: AtomicU64,
    failed_executions: AtomicU64,
    total_tokens: AtomicU64,
    /// Cost in micro-units to keep the counter atomic.
    total_cost_micros: AtomicU64,
    tool_calls: AtomicU64,
}

impl MetricsSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_executions: self.total_executions.load(Ordering::SeqCst),
            running_executions: self.running_executions.load(Ordering::SeqCst),
            completed_executions: self.completed_executions.load(Ordering::SeqCst),
            failed_executions: self.failed_executions.load(Ordering::SeqCst),
            total_tokens: self.total_tokens.load(Ordering::SeqCst),
            total_cost: self.total_cost_micros.load(Ordering::SeqCst) as f64 / 1_000_000.0,
            tool_calls: self.tool_calls.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl EventHandler for MetricsSubscriber {
    async fn handle(&self, event: &WorkflowEvent) -> Result<(), SubscriberError> {
        match event.event_type {
            EventType::Started => {
                self.total_executions.fetch_add(1, Ordering::SeqCst);
                self.running_executions.fetch_add(1, Ordering::SeqCst);
            }
            EventType::ExecutionCompleted => {
                saturating_dec(&self.running_executions);
                self.completed_executions.fetch_add(1, Ordering::SeqCst);
                let tokens = event.data.get("tokens_used").and_then(Value::as_u64).unwrap_or(0);
                self.total_tokens.fetch_add(tokens, Ordering::SeqCst);
                let cost = event.data.get("cost").and_then(Value::as_f64).unwrap_or(0.0);
                self.total_cost_micros
                    .fetch_add((cost * 1_000_000.0) as u64, Ordering::SeqCst);
            }
            EventType::ExecutionFailed => {
                saturating_dec(&self.running_executions);
                self.failed_executions.fetch_add(1, Ordering::SeqCst);
            }
            EventType::ToolCalled => {
                self.tool_calls.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
        Ok(())
    }
}

fn saturating_dec(counter: &AtomicU64) {
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1));
}

/// One debug log entry.
#[derive(Clone, Debug, serde::Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub event_type: &'static str,
    pub data: serde_json::Map<String, Value>,
}

/// Accumulates per-execution debug logs, capped per execution id.
pub struct LoggingSubscriber {
    logs: DashMap<String, Vec<LogEntry>>,
    max_entries: usize,
}

impl LoggingSubscriber {
    pub fn new(max_entries: usize) -> Self {
        Self {
            logs: DashMap::new(),
            max_entries,
        }
    }

    /// Logs for one execution, cloned.
    pub fn logs(&self, execution_id: &str) -> Vec<LogEntry> {
        self.logs
            .get(execution_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default()
    }

    pub fn clear(&self, execution_id: &str) {
        self.logs.remove(execution_id);
    }
}

impl Default for LoggingSubscriber {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl EventHandler for LoggingSubscriber {
    async fn handle(&self, event: &WorkflowEvent) -> Result<(), SubscriberError> {
        let mut entries = self.logs.entry(event.execution_id.clone()).or_default();
        if entries.len() < self.max_entries {
            entries.push(LogEntry {
                timestamp: event.timestamp.to_rfc3339(),
                event_type: event.event_type.as_str(),
                data: event.data.clone(),
            });
        }
        debug!(
            execution_id = %event.execution_id,
            event = event.event_type.as_str(),
            "workflow event"
        );
        Ok(())
    }
}

/// Wires the three stock subscribers onto a bus. Call once at startup.
pub fn register_subscribers(
    bus: &EventBus,
    store: Arc<dyn RecordStore>,
    max_log_entries: usize,
) -> (
    Arc<DatabaseSubscriber>,
    Arc<MetricsSubscriber>,
    Arc<LoggingSubscriber>,
) {
    let database = Arc::new(DatabaseSubscriber::new(store));
    for event_type in [
        EventType::Started,
        EventType::ExecutionCompleted,
        EventType::ExecutionFailed,
        EventType::TokenUsage,
    ] {
        bus.subscribe(Some(event_type), database.clone());
    }

    let metrics = Arc::new(MetricsSubscriber::new());
    bus.subscribe(None, metrics.clone());

    let logging = Arc::new(LoggingSubscriber::new(max_log_entries));
    bus.subscribe(None, logging.clone());

    (database, metrics, logging)
}
