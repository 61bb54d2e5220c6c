//! # Weft
//!
//! A workflow execution and monitoring engine for conversational AI. A
//! workflow is a directed graph of typed nodes (model calls, tool calls,
//! retrieval, memory, conditionals, loops, variables, delays, error
//! handlers); the engine compiles templates into graphs, validates them,
//! walks them against backing providers, streams lifecycle events, and
//! returns a standardized result.
//!
//! ## Design principles
//!
//! - **Capabilities over workflow types**: a [`CapabilitySet`] describes what
//!   a workflow may do and how much; presets cover the classic
//!   plain/rag/tools/full shapes.
//! - **State-in, state-out**: one [`ExecutionContext`] flows through node
//!   executors; exactly one writer at any time.
//! - **Closed dispatch**: node behavior is a switch over [`NodeKind`]; the
//!   registry is catalog data, not a dispatch table.
//! - **Events over direct calls**: the engine publishes lifecycle events to
//!   an in-process [`EventBus`]; persistence, metrics, and debug logs are
//!   subscribers.
//!
//! ## Main modules
//!
//! - [`capability`]: [`CapabilitySet`], [`WorkflowType`].
//! - [`registry`]: the node-kind catalog (pure data).
//! - [`graph`]: [`NodeSpec`], [`EdgeSpec`], [`WorkflowGraph`].
//! - [`template`]: [`WorkflowTemplate`] and the template-to-graph compiler.
//! - [`validation`]: the four-layer validator and [`ValidationReport`].
//! - [`condition`]: the routing expression language.
//! - [`retrieval`]: [`Retriever`], vector store and embedder contracts.
//! - [`llm`]: [`ModelProvider`], [`MockModel`], [`ChatOpenAI`].
//! - [`tools`]: [`ToolRegistry`], [`StaticToolRegistry`].
//! - [`nodes`]: per-kind executors.
//! - [`engine`]: [`ExecutionEngine`], [`ExecutionRequest`], [`EngineSettings`].
//! - [`events`]: [`EventBus`], subscribers, execution records.
//! - [`result`]: [`ExecutionResult`] and the API response shape.

pub mod capability;
pub mod condition;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod llm;
pub mod message;
pub mod nodes;
pub mod registry;
pub mod result;
pub mod retrieval;
pub mod template;
pub mod tools;
pub mod validation;

pub use capability::{CapabilitySet, WorkflowType};
pub use context::ExecutionContext;
pub use engine::{
    EngineSettings, ExecutionEngine, ExecutionRequest, InMemoryDefinitionStore,
    InMemoryTemplateStore, RequestSource, WorkflowDefinition,
};
pub use error::WorkflowError;
pub use events::{
    event_bus, reset_event_bus, EventBus, ExecutionRecord, ExecutionStatus, InMemoryRecordStore,
    LoggingSubscriber, MetricsSubscriber, SqliteRecordStore,
};
pub use graph::{EdgeKind, EdgeSpec, NodeSpec, WorkflowGraph};
pub use llm::{ChatOpenAI, MockModel, ModelProvider};
pub use message::{Message, TokenUsage, ToolCall};
pub use registry::{NodeCategory, NodeKind};
pub use result::{ApiExecutionResponse, ExecutionResult};
pub use retrieval::{Document, InMemoryVectorStore, MockEmbedder, Retriever};
pub use template::{compile_template, TemplateCategory, WorkflowTemplate};
pub use tools::{MockToolRegistry, StaticToolRegistry, ToolRegistry, ToolSpec};
pub use validation::{validate, ValidationContext, ValidationReport};

// Re-exported so downstream crates and tests use one event vocabulary.
pub use workflow_event::{EventType, WorkflowEvent};

// The cancellation token is part of the public execute signature.
pub use tokio_util::sync::CancellationToken;
