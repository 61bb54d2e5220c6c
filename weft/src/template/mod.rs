//! Workflow templates and the template-to-graph compiler.
//!
//! A template is a stored, parameterized description of a workflow. The
//! compiler expands a template plus a runtime parameter map into concrete
//! `(nodes, edges)`:
//!
//! - **Universal-chat mode** emits a fixed 12-node topology with conditional
//!   branches for memory, retrieval, tools, and tool-loop finalization.
//! - **Capability-based mode** derives a [`CapabilitySet`] from the template's
//!   required tools/retrievers and emits the minimal linear graph
//!   `start → [retrieval?] → llm ⇄ [tools?] → end`.
//!
//! Compilation is pure: identical inputs produce identical graphs, node ids
//! are stable strings, and every terminal edge targets the lowercase id
//! `end`.

mod capability_based;
mod universal;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::capability::{CapabilitySet, WorkflowType};
use crate::graph::{EdgeSpec, NodeSpec};

/// Template category for catalog browsing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    #[default]
    General,
    CustomerSupport,
    Programming,
    Research,
    DataAnalysis,
    Creative,
    Educational,
    Business,
    Custom,
}

/// A stored workflow template. Persisted by a collaborator; read-only to the
/// engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    /// ULID string id, assigned by the persistence layer.
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub workflow_type: WorkflowType,
    #[serde(default)]
    pub category: TemplateCategory,
    /// Parameter defaults; runtime params overlay these at compile time.
    #[serde(default)]
    pub default_params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_retrievers: Option<Vec<String>>,
    #[serde(default)]
    pub is_builtin: bool,
    /// Must stay ≥ 1; bumped by the persistence layer on edit.
    pub version: u32,
    /// 64-hex SHA-256 of the canonical template configuration.
    #[serde(default)]
    pub config_hash: String,
}

impl WorkflowTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, workflow_type: WorkflowType) -> Self {
        let mut template = Self {
            id: id.into(),
            name: name.into(),
            description: None,
            workflow_type,
            category: TemplateCategory::General,
            default_params: Map::new(),
            required_tools: None,
            required_retrievers: None,
            is_builtin: false,
            version: 1,
            config_hash: String::new(),
        };
        template.config_hash = template.compute_config_hash();
        template
    }

    pub fn with_default_params(mut self, params: Map<String, Value>) -> Self {
        self.default_params = params;
        self.config_hash = self.compute_config_hash();
        self
    }

    pub fn with_required_tools(mut self, tools: Vec<String>) -> Self {
        self.required_tools = Some(tools);
        self.config_hash = self.compute_config_hash();
        self
    }

    pub fn with_required_retrievers(mut self, retrievers: Vec<String>) -> Self {
        self.required_retrievers = Some(retrievers);
        self.config_hash = self.compute_config_hash();
        self
    }

    /// 64-hex SHA-256 over the configuration that affects compilation:
    /// workflow type, defaults, and required tools/retrievers.
    pub fn compute_config_hash(&self) -> String {
        let canonical = serde_json::json!({
            "workflow_type": self.workflow_type,
            "default_params": self.default_params,
            "required_tools": self.required_tools,
            "required_retrievers": self.required_retrievers,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Capabilities this template implies, from its required lists.
    pub fn derived_capabilities(&self) -> CapabilitySet {
        CapabilitySet::from_template_configuration(
            self.required_tools.as_deref(),
            self.required_retrievers.as_deref(),
        )
    }
}

/// Error from template lookup or compilation.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("invalid template parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// Expands a template plus runtime parameters into `(nodes, edges)`.
///
/// Runtime parameters overlay the template's `default_params`; the merged map
/// drives node configuration. Universal-chat mode is selected when the
/// template's name or `workflow_type` is `universal_chat`.
pub fn compile_template(
    template: &WorkflowTemplate,
    params: &Map<String, Value>,
) -> Result<(Vec<NodeSpec>, Vec<EdgeSpec>), TemplateError> {
    let merged = merge_params(&template.default_params, params);
    if is_universal(template, &merged) {
        return Ok(universal::emit(template, &merged));
    }
    let capabilities = effective_capabilities(template, params);
    Ok(capability_based::emit(template, &merged, &capabilities))
}

fn is_universal(template: &WorkflowTemplate, merged: &Map<String, Value>) -> bool {
    template.name == "universal_chat"
        || template.workflow_type == WorkflowType::UniversalChat
        || merged.get("workflow_type").and_then(Value::as_str) == Some("universal_chat")
}

/// The capability set a compiled template executes under.
///
/// Capability-based templates derive flags from their required lists and take
/// limit overrides from the params. The universal topology always contains
/// the memory/retrieval/tools branches, so its capability set enables all
/// three; the runtime variables seeded by `set_capabilities` gate what
/// actually runs.
pub fn effective_capabilities(
    template: &WorkflowTemplate,
    params: &Map<String, Value>,
) -> CapabilitySet {
    let merged = merge_params(&template.default_params, params);
    if is_universal(template, &merged) {
        let mut caps = CapabilitySet {
            enable_retrieval: true,
            enable_tools: true,
            ..CapabilitySet::default()
        };
        caps.max_tool_calls = param_u64(&merged, "max_tool_calls", 10) as u32;
        caps.max_documents = param_u64(&merged, "max_documents", 5) as u32;
        caps.memory_window = param_u64(&merged, "memory_window", 10) as u32;
        return caps;
    }
    let mut caps = template.derived_capabilities();
    caps.max_tool_calls =
        param_u64(&merged, "max_tool_calls", caps.max_tool_calls as u64) as u32;
    caps.max_documents = param_u64(&merged, "max_documents", caps.max_documents as u64) as u32;
    caps.memory_window = param_u64(&merged, "memory_window", caps.memory_window as u64) as u32;
    caps
}

/// Overlays runtime params onto template defaults; runtime wins.
fn merge_params(defaults: &Map<String, Value>, params: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.clone();
    for (k, v) in params {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

pub(crate) fn param_str<'a>(params: &'a Map<String, Value>, key: &str, default: &'a str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or(default)
}

pub(crate) fn param_f64(params: &Map<String, Value>, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}

pub(crate) fn param_u64(params: &Map<String, Value>, key: &str, default: u64) -> u64 {
    params.get(key).and_then(Value::as_u64).unwrap_or(default)
}

pub(crate) fn param_bool(params: &Map<String, Value>, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeKind;

    fn plain_template() -> WorkflowTemplate {
        WorkflowTemplate::new("tpl_plain", "plain_chat", WorkflowType::Plain)
    }

    /// **Scenario**: Compilation is pure; identical inputs produce identical
    /// graphs including node-id order.
    #[test]
    fn compilation_is_deterministic() {
        let template = plain_template();
        let params = Map::new();
        let (nodes_a, edges_a) = compile_template(&template, &params).unwrap();
        let (nodes_b, edges_b) = compile_template(&template, &params).unwrap();
        let ids_a: Vec<_> = nodes_a.iter().map(|n| n.id.clone()).collect();
        let ids_b: Vec<_> = nodes_b.iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(edges_a.len(), edges_b.len());
    }

    /// **Scenario**: Every emitted graph has exactly one `start` node and at
    /// least one `end` node, and no edge targets the uppercase `END`.
    #[test]
    fn emitted_graphs_use_lowercase_end() {
        let universal = WorkflowTemplate::new("tpl_u", "universal_chat", WorkflowType::UniversalChat);
        let full = WorkflowTemplate::new("tpl_f", "assistant", WorkflowType::Full)
            .with_required_tools(vec!["calculator".into()])
            .with_required_retrievers(vec!["kb".into()]);
        for template in [plain_template(), universal, full] {
            let (nodes, edges) = compile_template(&template, &Map::new()).unwrap();
            let starts = nodes.iter().filter(|n| n.id == "start").count();
            assert_eq!(starts, 1, "template {}", template.name);
            assert!(nodes.iter().any(|n| n.id == "end"));
            assert!(
                edges.iter().all(|e| e.target != "END"),
                "uppercase END emitted by {}",
                template.name
            );
            for edge in &edges {
                assert!(
                    nodes.iter().any(|n| n.id == edge.source)
                        && nodes.iter().any(|n| n.id == edge.target),
                    "dangling edge {} in {}",
                    edge.id,
                    template.name
                );
            }
        }
    }

    /// **Scenario**: Runtime params overlay template defaults; the default
    /// survives when not overridden.
    #[test]
    fn params_overlay_defaults() {
        let mut defaults = Map::new();
        defaults.insert("model".into(), Value::from("gpt-4"));
        defaults.insert("temperature".into(), Value::from(0.2));
        let template = plain_template().with_default_params(defaults);

        let mut params = Map::new();
        params.insert("model".into(), Value::from("m1"));
        let (nodes, _) = compile_template(&template, &params).unwrap();
        let llm = nodes.iter().find(|n| n.kind == NodeKind::Llm).unwrap();
        assert_eq!(llm.config_str("model"), Some("m1"));
        assert_eq!(llm.config_f64("temperature"), Some(0.2));
    }

    /// **Scenario**: The config hash is 64 hex chars and changes when the
    /// configuration changes.
    #[test]
    fn config_hash_shape_and_sensitivity() {
        let a = plain_template();
        assert_eq!(a.config_hash.len(), 64);
        assert!(a.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
        let b = plain_template().with_required_tools(vec!["calculator".into()]);
        assert_ne!(a.config_hash, b.config_hash);
    }
}
