//! Workflow error taxonomy.
//!
//! Every error path maps to a stage (`preparation`, `runtime`,
//! `result_processing`, `unknown`) that rides along on the
//! `EXECUTION_FAILED` event, and to a stable type name for persistence.

use thiserror::Error;

use crate::condition::ConditionError;
use crate::llm::ProviderError;
use crate::retrieval::RetrieverError;
use crate::template::TemplateError;
use crate::tools::ToolError;

/// Unified error for workflow execution.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Graph rejected by the validator; execution never started.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Model/tool/retriever initialization failed.
    #[error("workflow preparation failed: {0}")]
    Preparation(String),

    /// A node raised during execution.
    #[error("workflow execution failed: {0}")]
    Runtime(String),

    /// Result assembly or persistence failed; the raw context is still
    /// salvageable.
    #[error("result processing failed: {0}")]
    ResultProcessing(String),

    /// A declared limit was reached.
    #[error("resource limit exceeded: {resource} (limit {limit})")]
    ResourceLimitExceeded { resource: String, limit: u64 },

    /// Client or watchdog signaled cancellation.
    #[error("execution cancelled")]
    Cancelled,

    /// A per-node or per-execution deadline passed.
    #[error("{scope} timed out after {elapsed_ms}ms")]
    Timeout { scope: String, elapsed_ms: u64 },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Retriever(#[from] RetrieverError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("condition error: {0}")]
    Condition(#[from] ConditionError),
}

impl WorkflowError {
    /// Stage tag for the `EXECUTION_FAILED` event payload.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_)
            | WorkflowError::Preparation(_)
            | WorkflowError::Template(_) => "preparation",
            WorkflowError::Runtime(_)
            | WorkflowError::ResourceLimitExceeded { .. }
            | WorkflowError::Cancelled
            | WorkflowError::Timeout { .. }
            | WorkflowError::Retriever(_)
            | WorkflowError::Tool(_)
            | WorkflowError::Provider(_) => "runtime",
            WorkflowError::ResultProcessing(_) => "result_processing",
            WorkflowError::Condition(_) => "unknown",
        }
    }

    /// Stable type name for persistence and event payloads.
    pub fn type_name(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "ValidationError",
            WorkflowError::Preparation(_) => "PreparationError",
            WorkflowError::Runtime(_) => "RuntimeError",
            WorkflowError::ResultProcessing(_) => "ResultProcessingError",
            WorkflowError::ResourceLimitExceeded { .. } => "ResourceLimitExceeded",
            WorkflowError::Cancelled => "Cancelled",
            WorkflowError::Timeout { .. } => "Timeout",
            WorkflowError::Template(_) => "TemplateError",
            WorkflowError::Retriever(_) => "RetrieverError",
            WorkflowError::Tool(_) => "ToolError",
            WorkflowError::Provider(_) => "ProviderError",
            WorkflowError::Condition(_) => "ConditionError",
        }
    }

    /// True for cancellation, either explicit or via the shared token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkflowError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Stage mapping covers the four documented stages.
    #[test]
    fn stage_mapping() {
        assert_eq!(WorkflowError::Validation("x".into()).stage(), "preparation");
        assert_eq!(WorkflowError::Runtime("x".into()).stage(), "runtime");
        assert_eq!(WorkflowError::Cancelled.stage(), "runtime");
        assert_eq!(
            WorkflowError::ResultProcessing("x".into()).stage(),
            "result_processing"
        );
    }

    /// **Scenario**: Display formats carry the limit for resource errors.
    #[test]
    fn resource_limit_display() {
        let err = WorkflowError::ResourceLimitExceeded {
            resource: "max_tool_calls".into(),
            limit: 0,
        };
        let s = err.to_string();
        assert!(s.contains("max_tool_calls"));
        assert!(s.contains("limit 0"));
        assert_eq!(err.type_name(), "ResourceLimitExceeded");
    }
}
