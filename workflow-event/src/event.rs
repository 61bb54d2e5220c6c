//! Event type enumeration and the unified workflow event.
//!
//! One event type covers the whole execution lifecycle: start/finish, resource
//! loading, per-node execution, tool calls, token usage, message persistence.
//! Consumers must tolerate additive `data` fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Types of workflow events, covering the entire execution lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Execution accepted; record exists, graph not yet entered.
    #[serde(rename = "workflow_started")]
    Started,
    /// Graph walk is about to begin.
    ExecutionStarted,
    /// Graph walk finished without fatal errors.
    ExecutionCompleted,
    /// Graph walk aborted (validation, preparation, runtime, or cancellation).
    ExecutionFailed,

    /// Model provider resolved for this execution.
    LlmLoaded,
    /// Tool registry subset resolved for this execution.
    ToolsLoaded,
    /// Retriever constructed for this execution.
    RetrieverLoaded,

    /// One node finished (`data`: node_id, kind, duration_ms, outcome).
    NodeExecuted,
    /// One tool invocation finished (`data`: tool_name, duration_ms, ...).
    ToolCalled,
    /// Token usage reported by a model call (`data`: delta or running totals).
    TokenUsage,
    /// A message was persisted by a collaborator.
    MessageSaved,
}

impl EventType {
    /// Wire name, matching the serde rename (e.g. `"execution_completed"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Started => "workflow_started",
            EventType::ExecutionStarted => "execution_started",
            EventType::ExecutionCompleted => "execution_completed",
            EventType::ExecutionFailed => "execution_failed",
            EventType::LlmLoaded => "llm_loaded",
            EventType::ToolsLoaded => "tools_loaded",
            EventType::RetrieverLoaded => "retriever_loaded",
            EventType::NodeExecuted => "node_executed",
            EventType::ToolCalled => "tool_called",
            EventType::TokenUsage => "token_usage",
            EventType::MessageSaved => "message_saved",
        }
    }
}

/// Unified workflow event: type + execution envelope + payload. Immutable.
///
/// **Interaction**: Built by the engine and node executors; published through
/// the event bus; consumed by the database, metrics, and logging subscribers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub execution_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl WorkflowEvent {
    /// Creates an event with an automatic UTC timestamp and empty payload.
    pub fn new(
        event_type: EventType,
        execution_id: impl Into<String>,
        user_id: impl Into<String>,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            event_type,
            execution_id: execution_id.into(),
            user_id: user_id.into(),
            conversation_id,
            timestamp: Utc::now(),
            data: Map::new(),
        }
    }

    /// Adds one payload entry. Chainable; later keys overwrite earlier ones.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Replaces the whole payload map.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Serializes this event to a JSON object (the transport wire shape).
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Wire names use snake_case and STARTED keeps the legacy
    /// `workflow_started` spelling.
    #[test]
    fn event_type_wire_names() {
        assert_eq!(EventType::Started.as_str(), "workflow_started");
        assert_eq!(
            EventType::ExecutionCompleted.as_str(),
            "execution_completed"
        );
        let json = serde_json::to_string(&EventType::Started).unwrap();
        assert_eq!(json, "\"workflow_started\"");
    }

    /// **Scenario**: `with` accumulates payload entries and `to_json` emits
    /// the envelope fields plus the payload.
    #[test]
    fn event_builder_and_json_shape() {
        let event = WorkflowEvent::new(EventType::NodeExecuted, "exec-1", "user-1", None)
            .with("node_id", "llm")
            .with("duration_ms", 12);
        let value = event.to_json().unwrap();
        assert_eq!(value["type"], "node_executed");
        assert_eq!(value["execution_id"], "exec-1");
        assert_eq!(value["data"]["node_id"], "llm");
        assert_eq!(value["data"]["duration_ms"], 12);
        assert!(value.get("conversation_id").is_none());
    }

    /// **Scenario**: Events round-trip through serde including the payload map.
    #[test]
    fn event_serde_roundtrip() {
        let event = WorkflowEvent::new(
            EventType::TokenUsage,
            "exec-2",
            "user-2",
            Some("conv-1".into()),
        )
        .with("tokens_used", 42);
        let json = serde_json::to_string(&event).unwrap();
        let back: WorkflowEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type, EventType::TokenUsage);
        assert_eq!(back.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(back.data["tokens_used"], 42);
    }
}
