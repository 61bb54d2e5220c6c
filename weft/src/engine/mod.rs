//! Execution engine: request resolution, graph walk, limits, timeouts,
//! cancellation.
//!
//! One execution runs as one cooperative task; the process may run many in
//! parallel. Between nodes the engine checks the cancellation token and the
//! execution deadline; each node runs under its own timeout. Routing follows
//! the first matching outgoing edge (conditional edges by evaluation, default
//! edges always), with loop and fallback edges selected by label.

mod request;
mod settings;

pub use request::{
    DefinitionStore, ExecutionRequest, InMemoryDefinitionStore, InMemoryTemplateStore,
    RequestSource, TemplateStore, WorkflowDefinition,
};
pub use settings::EngineSettings;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;
use workflow_event::{EventType, WorkflowEvent};

use crate::capability::CapabilitySet;
use crate::condition::{self, ConditionExpr};
use crate::context::ExecutionContext;
use crate::error::WorkflowError;
use crate::events::{EventBus, ExecutionRecord, ExecutionStatus, RecordStore};
use crate::graph::{EdgeKind, EdgeSpec, NodeSpec, WorkflowGraph};
use crate::llm::ModelProvider;
use crate::nodes::{self, NodeServices, NodeStep};
use crate::registry::NodeKind;
use crate::result::ExecutionResult;
use crate::retrieval::{EmbeddingProvider, Retriever, VectorStore};
use crate::template;
use crate::tools::ToolRegistry;
use crate::validation::{self, ValidationContext};

/// The workflow execution engine.
///
/// **Interaction**: Transports build an [`ExecutionRequest`] and call
/// [`ExecutionEngine::execute`]; subscribers on the event bus observe the
/// lifecycle; the result maps to the API response shape.
pub struct ExecutionEngine {
    model: Arc<dyn ModelProvider>,
    tools: Option<Arc<dyn ToolRegistry>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    templates: Arc<dyn TemplateStore>,
    definitions: Arc<dyn DefinitionStore>,
    records: Arc<dyn RecordStore>,
    bus: Arc<EventBus>,
    settings: EngineSettings,
}

impl ExecutionEngine {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        templates: Arc<dyn TemplateStore>,
        definitions: Arc<dyn DefinitionStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            model,
            tools: None,
            embedder: None,
            vector_store: None,
            templates,
            definitions,
            records,
            bus: crate::events::event_bus(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_retrieval(
        mut self,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        self.embedder = Some(embedder);
        self.vector_store = Some(vector_store);
        self
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs one request to completion with a fresh cancellation token.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        self.execute_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Runs one request; cancelling the token aborts the current suspension
    /// point and finishes with a cancelled result.
    pub async fn execute_with_cancellation(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let execution_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let (definition_id, template_id) = request.source_ids();

        if let Err(e) = self
            .records
            .insert(ExecutionRecord::new(
                execution_id.clone(),
                request.user_id.clone(),
                definition_id.clone(),
                template_id.clone(),
            ))
            .await
        {
            warn!(execution_id = %execution_id, error = %e, "failed to insert execution record");
        }

        self.bus
            .publish(
                self.event(&execution_id, &request, EventType::Started)
                    .with("definition_id", definition_id.clone().unwrap_or_default())
                    .with("template_id", template_id.clone().unwrap_or_default()),
            )
            .await;

        let prepared = self.prepare(&request).await;
        let (graph, capabilities) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                return self
                    .finish_failed(
                        &request,
                        &execution_id,
                        started,
                        ExecutionContext::new(request.user_id.clone(), request.conversation_id.clone()),
                        None,
                        definition_id,
                        template_id,
                        &e,
                        ExecutionStatus::Failed,
                    )
                    .await;
            }
        };

        let allowed_tools: Vec<String> = self
            .tools
            .as_ref()
            .map(|t| t.list_tools().into_iter().map(|s| s.name).collect())
            .unwrap_or_default();
        let validation_ctx = ValidationContext::new(&capabilities)
            .with_allowed_tools(allowed_tools)
            .with_limits(self.settings.validation_limits());
        let report = validation::validate(&graph, &validation_ctx);
        if !report.is_valid() {
            let error = WorkflowError::Validation(report.to_string());
            let mut ctx =
                ExecutionContext::new(request.user_id.clone(), request.conversation_id.clone());
            ctx.errors = report.errors();
            return self
                .finish_failed(
                    &request,
                    &execution_id,
                    started,
                    ctx,
                    Some(&capabilities),
                    definition_id,
                    template_id,
                    &error,
                    ExecutionStatus::Failed,
                )
                .await;
        }

        let mut ctx =
            ExecutionContext::new(request.user_id.clone(), request.conversation_id.clone());
        if let Some(ref message) = request.input_message {
            ctx.messages.push(crate::message::Message::user(message));
        }

        self.bus
            .publish(self.event(&execution_id, &request, EventType::ExecutionStarted))
            .await;

        let services = self
            .build_services(&request, &execution_id, &capabilities, cancel.clone())
            .await;

        let walked = self
            .walk(&graph, &mut ctx, &services, started)
            .await;

        let workflow_type = capabilities.workflow_type_of();
        match walked {
            Ok(()) if ctx.errors.is_empty() => {
                let result = crate::result::assemble(
                    &ctx,
                    ExecutionStatus::Completed,
                    execution_id.clone(),
                    started.elapsed().as_millis() as u64,
                    Some(workflow_type),
                    definition_id,
                    template_id,
                );
                self.bus
                    .publish(
                        self.event(&execution_id, &request, EventType::ExecutionCompleted)
                            .with_data(result.to_event_data()),
                    )
                    .await;
                result
            }
            Ok(()) => {
                // Walked to an end node with recorded errors.
                let error = WorkflowError::Runtime(
                    ctx.errors.first().cloned().unwrap_or_else(|| "unknown".into()),
                );
                self.finish_failed(
                    &request,
                    &execution_id,
                    started,
                    ctx,
                    Some(&capabilities),
                    definition_id,
                    template_id,
                    &error,
                    ExecutionStatus::Failed,
                )
                .await
            }
            Err(e) => {
                let status = if e.is_cancelled() {
                    ExecutionStatus::Cancelled
                } else {
                    ExecutionStatus::Failed
                };
                if !e.is_cancelled() {
                    ctx.errors.push(e.to_string());
                }
                self.finish_failed(
                    &request,
                    &execution_id,
                    started,
                    ctx,
                    Some(&capabilities),
                    definition_id,
                    template_id,
                    &e,
                    status,
                )
                .await
            }
        }
    }

    fn event(
        &self,
        execution_id: &str,
        request: &ExecutionRequest,
        event_type: EventType,
    ) -> WorkflowEvent {
        WorkflowEvent::new(
            event_type,
            execution_id,
            request.user_id.clone(),
            request.conversation_id.clone(),
        )
    }

    /// Resolves the request's graph and effective capabilities. Template
    /// execution materializes nothing in the definition store.
    async fn prepare(
        &self,
        request: &ExecutionRequest,
    ) -> Result<(WorkflowGraph, CapabilitySet), WorkflowError> {
        match &request.source {
            RequestSource::Template {
                template_id,
                params,
            } => {
                let stored = self
                    .templates
                    .get_template(template_id)
                    .await
                    .map_err(|e| WorkflowError::Preparation(e.to_string()))?
                    .ok_or_else(|| {
                        WorkflowError::Template(crate::template::TemplateError::UnknownTemplate(
                            template_id.clone(),
                        ))
                    })?;
                let (nodes, edges) = template::compile_template(&stored, params)?;
                let capabilities = template::effective_capabilities(&stored, params);
                Ok((WorkflowGraph::new(nodes, edges), capabilities))
            }
            RequestSource::Definition {
                definition_id,
                params: _,
            } => {
                let stored = self
                    .definitions
                    .get_definition(definition_id)
                    .await
                    .map_err(|e| WorkflowError::Preparation(e.to_string()))?
                    .ok_or_else(|| {
                        WorkflowError::Preparation(format!(
                            "unknown definition: {definition_id}"
                        ))
                    })?;
                let capabilities = stored
                    .capabilities
                    .clone()
                    .unwrap_or_else(|| analyze_node_capabilities(&stored.nodes));
                Ok((WorkflowGraph::new(stored.nodes, stored.edges), capabilities))
            }
            RequestSource::Inline {
                nodes,
                edges,
                capabilities,
            } => {
                let capabilities = capabilities
                    .clone()
                    .unwrap_or_else(|| analyze_node_capabilities(nodes));
                Ok((
                    WorkflowGraph::new(nodes.clone(), edges.clone()),
                    capabilities,
                ))
            }
        }
    }

    /// Resolves providers for this execution and announces them.
    async fn build_services(
        &self,
        request: &ExecutionRequest,
        execution_id: &str,
        capabilities: &CapabilitySet,
        cancel: CancellationToken,
    ) -> NodeServices {
        self.bus
            .publish(self.event(execution_id, request, EventType::LlmLoaded))
            .await;

        let tools = match (&self.tools, capabilities.enable_tools) {
            (Some(tools), true) => {
                self.bus
                    .publish(
                        self.event(execution_id, request, EventType::ToolsLoaded)
                            .with("tool_count", tools.list_tools().len()),
                    )
                    .await;
                Some(tools.clone())
            }
            _ => None,
        };

        let retriever = match (&self.vector_store, capabilities.enable_retrieval) {
            (Some(store), true) => {
                let params = match &request.source {
                    RequestSource::Template { params, .. }
                    | RequestSource::Definition { params, .. } => params.clone(),
                    RequestSource::Inline { .. } => Default::default(),
                };
                let document_ids = params.get("document_ids").and_then(|v| {
                    v.as_array().map(|items| {
                        items
                            .iter()
                            .filter_map(|item| item.as_str().map(String::from))
                            .collect::<Vec<_>>()
                    })
                });
                let retriever = Arc::new(Retriever::new(
                    self.embedder.clone(),
                    store.clone(),
                    None,
                    document_ids,
                    params
                        .get("collection")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("documents"),
                    capabilities.max_documents as usize,
                    params
                        .get("score_threshold")
                        .and_then(serde_json::Value::as_f64)
                        .unwrap_or(0.5) as f32,
                ));
                self.bus
                    .publish(
                        self.event(execution_id, request, EventType::RetrieverLoaded)
                            .with("collection", retriever.collection_name().to_string()),
                    )
                    .await;
                Some(retriever)
            }
            _ => None,
        };

        NodeServices {
            model: self.model.clone(),
            tools,
            retriever,
            bus: self.bus.clone(),
            capabilities: capabilities.clone(),
            cancel,
            execution_id: execution_id.to_string(),
        }
    }

    /// Walks the graph from `start` until an end node, a fatal error, or
    /// cancellation. Non-cancellation node errors either rewind into an
    /// active error-handler region or are recorded and routed to the first
    /// end node.
    async fn walk(
        &self,
        graph: &WorkflowGraph,
        ctx: &mut ExecutionContext,
        services: &NodeServices,
        started: Instant,
    ) -> Result<(), WorkflowError> {
        let plan = ExecutionPlan::new(graph);
        let mut current = graph
            .start_node()
            .map(|n| n.id.clone())
            .ok_or_else(|| WorkflowError::Runtime("graph has no start node".into()))?;
        // Error-handler regions in visit order; most recent wins.
        let mut active_handlers: Vec<String> = Vec::new();

        loop {
            if services.cancel.is_cancelled() {
                return Err(WorkflowError::Cancelled);
            }
            if started.elapsed() > self.settings.execution_timeout {
                return Err(WorkflowError::Timeout {
                    scope: "execution".into(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }

            let node = graph
                .node(&current)
                .ok_or_else(|| WorkflowError::Runtime(format!("unknown node: {current}")))?;
            let entered_at = Utc::now();
            let node_started = Instant::now();
            debug!(execution_id = %services.execution_id, node_id = %node.id, kind = %node.kind, "node start");

            let outcome = tokio::time::timeout(
                self.settings.node_timeout,
                nodes::run_node(node, ctx.clone(), services),
            )
            .await
            .unwrap_or_else(|_| {
                Err(WorkflowError::Timeout {
                    scope: format!("node {}", node.id),
                    elapsed_ms: node_started.elapsed().as_millis() as u64,
                })
            });

            let duration_ms = node_started.elapsed().as_millis() as u64;
            match outcome {
                Ok((new_ctx, step)) => {
                    *ctx = new_ctx;
                    ctx.record_history(node.id.clone(), entered_at, "ok");
                    self.publish_node_executed(services, ctx, node, duration_ms, "ok").await;

                    if node.kind == NodeKind::ErrorHandler
                        && !active_handlers.contains(&node.id)
                    {
                        active_handlers.push(node.id.clone());
                    }

                    match step {
                        NodeStep::Halt => return Ok(()),
                        NodeStep::Label(label) => {
                            current = select_labelled_edge(graph, &node.id, label)?;
                        }
                        NodeStep::Continue => {
                            match plan.select_edge(graph, &node.id, ctx) {
                                Some(target) => current = target,
                                None => {
                                    return Err(WorkflowError::Runtime(format!(
                                        "no matching outgoing edge from {}",
                                        node.id
                                    )))
                                }
                            }
                        }
                    }
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    ctx.record_history(node.id.clone(), entered_at, "error");
                    self.publish_node_executed(services, ctx, node, duration_ms, "error").await;

                    match resolve_error(graph, ctx, &mut active_handlers, &e) {
                        ErrorResolution::Retry(target) => {
                            debug!(node_id = %node.id, error = %e, "retrying via error handler");
                            current = target;
                        }
                        ErrorResolution::Fallback(target) => {
                            debug!(node_id = %node.id, error = %e, "taking fallback edge");
                            current = target;
                        }
                        ErrorResolution::Fatal => {
                            ctx.errors.push(e.to_string());
                            match graph.first_end_node() {
                                Some(end) => current = end.id.clone(),
                                None => return Err(e),
                            }
                        }
                    }
                }
            }
        }
    }

    async fn publish_node_executed(
        &self,
        services: &NodeServices,
        ctx: &ExecutionContext,
        node: &NodeSpec,
        duration_ms: u64,
        outcome: &str,
    ) {
        services
            .bus
            .publish(
                services
                    .event(ctx, EventType::NodeExecuted)
                    .with("node_id", node.id.clone())
                    .with("kind", node.kind.as_str())
                    .with("duration_ms", duration_ms)
                    .with("outcome", outcome),
            )
            .await;
    }

    /// Publishes `EXECUTION_FAILED` and assembles the failed/cancelled
    /// result.
    #[allow(clippy::too_many_arguments)]
    async fn finish_failed(
        &self,
        request: &ExecutionRequest,
        execution_id: &str,
        started: Instant,
        mut ctx: ExecutionContext,
        capabilities: Option<&CapabilitySet>,
        definition_id: Option<String>,
        template_id: Option<String>,
        error: &WorkflowError,
        status: ExecutionStatus,
    ) -> ExecutionResult {
        if ctx.errors.is_empty() {
            ctx.errors.push(error.to_string());
        }
        self.bus
            .publish(
                self.event(execution_id, request, EventType::ExecutionFailed)
                    .with("error", error.to_string())
                    .with("error_type", error.type_name())
                    .with("error_stage", error.stage()),
            )
            .await;
        crate::result::assemble(
            &ctx,
            status,
            execution_id.to_string(),
            started.elapsed().as_millis() as u64,
            capabilities.map(CapabilitySet::workflow_type_of),
            definition_id,
            template_id,
        )
    }
}

/// Pre-parsed edge conditions for one validated graph.
struct ExecutionPlan {
    edge_conditions: HashMap<String, ConditionExpr>,
}

impl ExecutionPlan {
    fn new(graph: &WorkflowGraph) -> Self {
        let mut edge_conditions = HashMap::new();
        for edge in &graph.edges {
            if let Some(expr) = edge.condition.as_deref() {
                if let Ok(parsed) = condition::parse(expr) {
                    edge_conditions.insert(edge.id.clone(), parsed);
                }
            }
        }
        Self { edge_conditions }
    }

    /// First matching outgoing edge: conditional edges by evaluation, default
    /// edges always; earliest declared wins.
    fn select_edge(
        &self,
        graph: &WorkflowGraph,
        node_id: &str,
        ctx: &ExecutionContext,
    ) -> Option<String> {
        for edge in graph.outgoing(node_id) {
            match edge.kind {
                EdgeKind::Default => return Some(edge.target.clone()),
                EdgeKind::Conditional => {
                    if let Some(parsed) = self.edge_conditions.get(&edge.id) {
                        if parsed.evaluate(&ctx.condition_scope()) {
                            return Some(edge.target.clone());
                        }
                    }
                }
            }
        }
        None
    }
}

/// Outgoing edge selected by label. Loop nodes fall back to first-declared
/// (`body`) / last-declared (`exit`) when edges are unlabelled.
fn select_labelled_edge(
    graph: &WorkflowGraph,
    node_id: &str,
    label: &str,
) -> Result<String, WorkflowError> {
    let outgoing = graph.outgoing(node_id);
    if let Some(edge) = outgoing.iter().find(|e| e.label.as_deref() == Some(label)) {
        return Ok(edge.target.clone());
    }
    let fallback: Option<&&EdgeSpec> = match label {
        "body" => outgoing.first(),
        "exit" => outgoing.last(),
        _ => None,
    };
    fallback
        .map(|edge| edge.target.clone())
        .ok_or_else(|| {
            WorkflowError::Runtime(format!("no `{label}` edge from {node_id}"))
        })
}

enum ErrorResolution {
    Retry(String),
    Fallback(String),
    Fatal,
}

/// Consumes a retry from the innermost active handler, then its fallback
/// edge, then gives up.
fn resolve_error(
    graph: &WorkflowGraph,
    ctx: &mut ExecutionContext,
    active_handlers: &mut Vec<String>,
    error: &WorkflowError,
) -> ErrorResolution {
    while let Some(handler_id) = active_handlers.last().cloned() {
        let Some(handler) = graph.node(&handler_id) else {
            active_handlers.pop();
            continue;
        };
        let retry_count = handler.config_u64("retry_count").unwrap_or(0) as u32;
        let state = ctx.error_state.entry(handler_id.clone()).or_default();
        if state.attempts < retry_count {
            state.attempts += 1;
            state.last_error = Some(error.to_string());
            let resume = graph
                .outgoing(&handler_id)
                .iter()
                .find(|e| e.label.as_deref() != Some("fallback"))
                .map(|e| e.target.clone());
            if let Some(resume) = resume {
                return ErrorResolution::Retry(resume);
            }
        }
        let fallback = graph
            .outgoing(&handler_id)
            .iter()
            .find(|e| e.label.as_deref() == Some("fallback"))
            .map(|e| e.target.clone());
        active_handlers.pop();
        if let Some(fallback) = fallback {
            return ErrorResolution::Fallback(fallback);
        }
    }
    ErrorResolution::Fatal
}

/// Flags inferred from an inline node list, for requests that supply no
/// capability set.
fn analyze_node_capabilities(nodes: &[NodeSpec]) -> CapabilitySet {
    let mut caps = CapabilitySet::default();
    for node in nodes {
        if node.kind == NodeKind::Retrieval {
            caps.enable_retrieval = true;
        }
        if node.kind.is_tool() {
            caps.enable_tools = true;
        }
    }
    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeSpec;
    use serde_json::Value;

    /// **Scenario**: Inline capability analysis flips flags from node kinds.
    #[test]
    fn analyze_capabilities_from_nodes() {
        let nodes = vec![
            NodeSpec::new("start", NodeKind::Start),
            NodeSpec::new("fetch", NodeKind::Retrieval),
            NodeSpec::new("end", NodeKind::End),
        ];
        let caps = analyze_node_capabilities(&nodes);
        assert!(caps.enable_retrieval);
        assert!(!caps.enable_tools);
    }

    /// **Scenario**: Labelled selection prefers explicit labels and falls
    /// back to declaration order for loops.
    #[test]
    fn labelled_edge_selection() {
        let mut looper = NodeSpec::new("again", NodeKind::Loop);
        looper
            .config
            .insert("max_iterations".into(), Value::from(2));
        let graph = WorkflowGraph::new(
            vec![
                NodeSpec::new("start", NodeKind::Start),
                looper,
                NodeSpec::new("work", NodeKind::Variable),
                NodeSpec::new("end", NodeKind::End),
            ],
            vec![
                EdgeSpec::direct("start", "again"),
                EdgeSpec::direct("again", "work"),
                EdgeSpec::direct("again", "end"),
                EdgeSpec::direct("work", "again"),
            ],
        );
        assert_eq!(select_labelled_edge(&graph, "again", "body").unwrap(), "work");
        assert_eq!(select_labelled_edge(&graph, "again", "exit").unwrap(), "end");

        let mut graph = graph;
        graph.edges[1].label = Some("body".into());
        graph.edges[2].label = Some("exit".into());
        assert_eq!(select_labelled_edge(&graph, "again", "exit").unwrap(), "end");
        assert!(select_labelled_edge(&graph, "missing", "body").is_err());
    }

    /// **Scenario**: Edge selection takes the first conditional edge whose
    /// guard holds, else the first default edge.
    #[test]
    fn conditional_edge_selection() {
        let graph = WorkflowGraph::new(
            vec![
                NodeSpec::new("check", NodeKind::Conditional),
                NodeSpec::new("yes", NodeKind::Variable),
                NodeSpec::new("no", NodeKind::Variable),
            ],
            vec![
                EdgeSpec::conditional("check", "yes", "has_tool_calls"),
                EdgeSpec::conditional("check", "no", "no_tool_calls"),
            ],
        );
        let plan = ExecutionPlan::new(&graph);
        let mut ctx = ExecutionContext::new("user-1", None);
        ctx.has_tool_calls = true;
        assert_eq!(plan.select_edge(&graph, "check", &ctx), Some("yes".into()));
        ctx.has_tool_calls = false;
        assert_eq!(plan.select_edge(&graph, "check", &ctx), Some("no".into()));
    }
}
