//! Capability set: feature flags and numeric limits shaping execution.
//!
//! Replaces hardcoded workflow types: a workflow is described by what it may
//! do (retrieval, tools, memory, web search) and how much (tool calls,
//! documents, memory window). Pure data; no I/O.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Workflow type as reported to clients and stored on templates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    Plain,
    Rag,
    Tools,
    Full,
    UniversalChat,
    Custom,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::Plain => "plain",
            WorkflowType::Rag => "rag",
            WorkflowType::Tools => "tools",
            WorkflowType::Full => "full",
            WorkflowType::UniversalChat => "universal_chat",
            WorkflowType::Custom => "custom",
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowType {
    type Err = std::convert::Infallible;

    /// Unknown names parse as `Custom`; capability derivation treats those
    /// like `plain`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "plain" => WorkflowType::Plain,
            "rag" => WorkflowType::Rag,
            "tools" => WorkflowType::Tools,
            "full" => WorkflowType::Full,
            "universal_chat" => WorkflowType::UniversalChat,
            _ => WorkflowType::Custom,
        })
    }
}

/// Defines what a workflow can do: feature flags plus resource limits.
///
/// **Interaction**: Derived from templates or workflow types by the compiler,
/// consulted by the validator (capability layer) and enforced by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySet {
    // Core capabilities
    pub enable_retrieval: bool,
    pub enable_tools: bool,
    pub enable_memory: bool,
    pub enable_web_search: bool,

    // Advanced capabilities
    pub enable_streaming: bool,
    pub enable_caching: bool,
    pub enable_tracing: bool,

    // Resource limits
    pub max_tool_calls: u32,
    pub max_documents: u32,
    pub memory_window: u32,

    /// Custom capabilities for extensibility. BTreeMap keeps serialization
    /// deterministic.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, Value>,
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self {
            enable_retrieval: false,
            enable_tools: false,
            enable_memory: true,
            enable_web_search: false,
            enable_streaming: true,
            enable_caching: true,
            enable_tracing: false,
            max_tool_calls: 10,
            max_documents: 10,
            memory_window: 50,
            extensions: BTreeMap::new(),
        }
    }
}

impl CapabilitySet {
    /// Preset for a workflow type. Unknown/custom types get the plain preset.
    pub fn from_workflow_type(workflow_type: WorkflowType) -> Self {
        match workflow_type {
            WorkflowType::Plain => Self::default(),
            WorkflowType::Rag => Self {
                enable_retrieval: true,
                max_documents: 10,
                memory_window: 30,
                ..Self::default()
            },
            WorkflowType::Tools => Self {
                enable_tools: true,
                max_tool_calls: 10,
                memory_window: 100,
                ..Self::default()
            },
            WorkflowType::Full => Self {
                enable_retrieval: true,
                enable_tools: true,
                max_tool_calls: 5,
                max_documents: 10,
                memory_window: 50,
                ..Self::default()
            },
            WorkflowType::UniversalChat | WorkflowType::Custom => Self::default(),
        }
    }

    /// Infers flags from a template's required-tools / required-retrievers
    /// lists: a non-empty list flips the matching flag.
    pub fn from_template_configuration(
        required_tools: Option<&[String]>,
        required_retrievers: Option<&[String]>,
    ) -> Self {
        let enable_tools = required_tools.map(|t| !t.is_empty()).unwrap_or(false);
        let enable_retrieval = required_retrievers.map(|r| !r.is_empty()).unwrap_or(false);
        Self {
            enable_tools,
            enable_retrieval,
            ..Self::default()
        }
    }

    /// Merges with another set: union of boolean flags, max of numeric
    /// limits. Extensions overlay; `other` wins on key conflict.
    pub fn merge_with(&self, other: &CapabilitySet) -> CapabilitySet {
        let mut extensions = self.extensions.clone();
        for (k, v) in &other.extensions {
            extensions.insert(k.clone(), v.clone());
        }
        CapabilitySet {
            enable_retrieval: self.enable_retrieval || other.enable_retrieval,
            enable_tools: self.enable_tools || other.enable_tools,
            enable_memory: self.enable_memory || other.enable_memory,
            enable_web_search: self.enable_web_search || other.enable_web_search,
            enable_streaming: self.enable_streaming || other.enable_streaming,
            enable_caching: self.enable_caching || other.enable_caching,
            enable_tracing: self.enable_tracing || other.enable_tracing,
            max_tool_calls: self.max_tool_calls.max(other.max_tool_calls),
            max_documents: self.max_documents.max(other.max_documents),
            memory_window: self.memory_window.max(other.memory_window),
            extensions,
        }
    }

    /// The workflow type these capabilities amount to. Single source of truth
    /// for reporting.
    pub fn workflow_type_of(&self) -> WorkflowType {
        match (self.enable_retrieval, self.enable_tools) {
            (true, true) => WorkflowType::Full,
            (false, true) => WorkflowType::Tools,
            (true, false) => WorkflowType::Rag,
            (false, false) => WorkflowType::Plain,
        }
    }

    pub fn requires_tools(&self) -> bool {
        self.enable_tools
    }

    pub fn requires_retriever(&self) -> bool {
        self.enable_retrieval
    }

    pub fn supports_streaming(&self) -> bool {
        self.enable_streaming
    }
}
