//! Per-kind node executors.
//!
//! An executor receives the node spec and the execution context (state-in,
//! state-out), performs its effect against the injected services, and returns
//! the mutated context plus a routing step. Dispatch is a closed switch over
//! [`NodeKind`]; the registry is catalog data, not a dispatch table.

mod conditional;
mod delay;
mod error_handler;
mod looping;
mod memory;
mod model;
mod retrieval;
mod tools;
mod variable;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use workflow_event::{EventType, WorkflowEvent};

use crate::capability::CapabilitySet;
use crate::context::ExecutionContext;
use crate::error::WorkflowError;
use crate::events::EventBus;
use crate::graph::NodeSpec;
use crate::llm::ModelProvider;
use crate::registry::NodeKind;
use crate::retrieval::Retriever;
use crate::tools::ToolRegistry;

/// Routing step returned by an executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeStep {
    /// Follow the first matching outgoing edge.
    Continue,
    /// Follow the outgoing edge with this label (loop body/exit, fallback).
    Label(&'static str),
    /// Terminal node; the engine stops after this.
    Halt,
}

/// Services injected into executors for one execution.
pub struct NodeServices {
    pub model: Arc<dyn ModelProvider>,
    pub tools: Option<Arc<dyn ToolRegistry>>,
    pub retriever: Option<Arc<Retriever>>,
    pub bus: Arc<EventBus>,
    pub capabilities: CapabilitySet,
    pub cancel: CancellationToken,
    pub execution_id: String,
}

impl NodeServices {
    /// Builds an event with this execution's envelope.
    pub fn event(&self, ctx: &ExecutionContext, event_type: EventType) -> WorkflowEvent {
        WorkflowEvent::new(
            event_type,
            self.execution_id.clone(),
            ctx.user_id.clone(),
            ctx.conversation_id.clone(),
        )
    }
}

/// Runs one node. The caller enforces the per-node timeout and emits
/// `NODE_EXECUTED`; executors emit their own `TOOL_CALLED`/`TOKEN_USAGE`
/// events.
pub async fn run_node(
    spec: &NodeSpec,
    ctx: ExecutionContext,
    services: &NodeServices,
) -> Result<(ExecutionContext, NodeStep), WorkflowError> {
    match spec.kind {
        NodeKind::Start => Ok((ctx, NodeStep::Continue)),
        NodeKind::End => Ok((ctx, NodeStep::Halt)),
        NodeKind::Model | NodeKind::Llm => model::execute(spec, ctx, services).await,
        NodeKind::Tool | NodeKind::Tools => tools::execute(spec, ctx, services).await,
        NodeKind::Retrieval => retrieval::execute(spec, ctx, services).await,
        NodeKind::Memory => memory::execute(spec, ctx, services).await,
        NodeKind::Conditional => conditional::execute(spec, ctx),
        NodeKind::Loop => looping::execute(spec, ctx),
        NodeKind::Variable => variable::execute(spec, ctx),
        NodeKind::ErrorHandler => error_handler::execute(spec, ctx),
        NodeKind::Delay => delay::execute(spec, ctx, services).await,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::default_services;
    use super::*;

    /// **Scenario**: Start is the identity and continues; end halts.
    #[tokio::test]
    async fn start_and_end_steps() {
        let services = default_services();
        let ctx = ExecutionContext::new("user-1", None);
        let (ctx, step) = run_node(&NodeSpec::new("start", NodeKind::Start), ctx, &services)
            .await
            .unwrap();
        assert_eq!(step, NodeStep::Continue);
        let (_, step) = run_node(&NodeSpec::new("end", NodeKind::End), ctx, &services)
            .await
            .unwrap();
        assert_eq!(step, NodeStep::Halt);
    }
}
