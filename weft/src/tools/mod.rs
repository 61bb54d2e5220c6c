//! Tool registry abstraction: list tools and call a tool.
//!
//! Node executors depend on [`ToolRegistry`] instead of a concrete registry;
//! implementations include [`StaticToolRegistry`] (handlers registered in
//! process) and [`MockToolRegistry`] (tests). Tool specs double as the
//! function bindings offered to the model provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Tool specification: name, description, and JSON Schema for arguments.
///
/// **Interaction**: Returned by [`ToolRegistry::list_tools`]; consumed by the
/// model executor to build tool bindings and by the validator's security
/// layer to check references.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema for the arguments object.
    pub input_schema: Value,
    /// When true, a failing call degrades to a synthetic error result instead
    /// of failing the node.
    #[serde(default)]
    pub bypass_when_unavailable: bool,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: serde_json::json!({"type": "object"}),
            bypass_when_unavailable: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_bypass(mut self) -> Self {
        self.bypass_when_unavailable = true;
        self
    }
}

/// Result text of one tool call.
#[derive(Clone, Debug)]
pub struct ToolOutput {
    pub text: String,
}

/// Errors from listing or calling tools.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidInput(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// Tool registry: named callable tools for one caller.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Tools available to this caller.
    fn list_tools(&self) -> Vec<ToolSpec>;

    /// Spec for one tool, if registered.
    fn tool(&self, name: &str) -> Option<ToolSpec> {
        self.list_tools().into_iter().find(|t| t.name == name)
    }

    /// Executes one tool with parsed JSON arguments.
    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ToolError>;
}

/// Handler for one registered tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &Value) -> Result<String, ToolError>;
}

/// In-process registry: specs plus handler closures, registered at startup.
#[derive(Default)]
pub struct StaticToolRegistry {
    tools: Vec<(ToolSpec, Arc<dyn ToolHandler>)>,
}

impl StaticToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool; replaces an existing registration of the same name.
    pub fn register(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) {
        self.tools.retain(|(existing, _)| existing.name != spec.name);
        self.tools.push((spec, handler));
    }
}

#[async_trait]
impl ToolRegistry for StaticToolRegistry {
    fn list_tools(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|(spec, _)| spec.clone()).collect()
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let handler = self
            .tools
            .iter()
            .find(|(spec, _)| spec.name == name)
            .map(|(_, handler)| handler.clone())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let text = handler.call(arguments).await?;
        Ok(ToolOutput { text })
    }
}

/// Test registry: fixed result text per tool, with call counting and an
/// optional always-failing tool.
#[derive(Default)]
pub struct MockToolRegistry {
    results: HashMap<String, String>,
    failing: HashMap<String, bool>, // name -> bypass_when_unavailable
    calls: AtomicUsize,
}

impl MockToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, name: impl Into<String>, result: impl Into<String>) -> Self {
        self.results.insert(name.into(), result.into());
        self
    }

    /// Registers a tool whose calls always fail; `bypass` marks it
    /// degradable.
    pub fn with_failing_tool(mut self, name: impl Into<String>, bypass: bool) -> Self {
        self.failing.insert(name.into(), bypass);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolRegistry for MockToolRegistry {
    fn list_tools(&self) -> Vec<ToolSpec> {
        let mut tools: Vec<ToolSpec> = self
            .results
            .keys()
            .map(|name| ToolSpec::new(name.clone()))
            .collect();
        for (name, bypass) in &self.failing {
            let mut spec = ToolSpec::new(name.clone());
            spec.bypass_when_unavailable = *bypass;
            tools.push(spec);
        }
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    async fn call_tool(&self, name: &str, _arguments: &Value) -> Result<ToolOutput, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains_key(name) {
            return Err(ToolError::Execution(format!("{name} is unavailable")));
        }
        match self.results.get(name) {
            Some(text) => Ok(ToolOutput { text: text.clone() }),
            None => Err(ToolError::NotFound(name.to_string())),
        }
    }
}
