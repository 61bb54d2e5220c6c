//! Central catalog of workflow node kinds.
//!
//! Single source of truth for the supported node kinds, their display
//! metadata, and their property schemas. The registry is pure data: required
//! key enforcement happens in the validator, dispatch happens in the node
//! executors. The modern per-kind details (`required_config`,
//! `optional_config`, `examples`) are exposed for editor consumption and are
//! not consulted by the engine.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Closed set of node kinds. `Model`/`Llm` and `Tool`/`Tools` are legacy and
/// modern spellings of the same behavior; they share an executor but keep
/// distinct property schemas in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    End,
    Model,
    Llm,
    Tool,
    Tools,
    Retrieval,
    Memory,
    Conditional,
    Loop,
    Variable,
    ErrorHandler,
    Delay,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Model => "model",
            NodeKind::Llm => "llm",
            NodeKind::Tool => "tool",
            NodeKind::Tools => "tools",
            NodeKind::Retrieval => "retrieval",
            NodeKind::Memory => "memory",
            NodeKind::Conditional => "conditional",
            NodeKind::Loop => "loop",
            NodeKind::Variable => "variable",
            NodeKind::ErrorHandler => "error_handler",
            NodeKind::Delay => "delay",
        }
    }

    /// True for the two spellings of the model-call node.
    pub fn is_model(&self) -> bool {
        matches!(self, NodeKind::Model | NodeKind::Llm)
    }

    /// True for the two spellings of the tool-execution node.
    pub fn is_tool(&self) -> bool {
        matches!(self, NodeKind::Tool | NodeKind::Tools)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "start" => NodeKind::Start,
            "end" => NodeKind::End,
            "model" => NodeKind::Model,
            "llm" => NodeKind::Llm,
            "tool" => NodeKind::Tool,
            "tools" => NodeKind::Tools,
            "retrieval" => NodeKind::Retrieval,
            "memory" => NodeKind::Memory,
            "conditional" => NodeKind::Conditional,
            "loop" => NodeKind::Loop,
            "variable" => NodeKind::Variable,
            "error_handler" => NodeKind::ErrorHandler,
            "delay" => NodeKind::Delay,
            other => return Err(format!("unknown node kind: {other}")),
        })
    }
}

/// Node category for editor grouping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Control,
    Processing,
    Data,
    Storage,
    Utility,
}

/// Property value type in a node schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    String,
    Text,
    Number,
    Boolean,
    Select,
    Array,
    Object,
    Any,
}

/// One config property of a node kind.
#[derive(Clone, Debug, Serialize)]
pub struct PropertyDef {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: PropertyType,
    pub required: bool,
    pub options: &'static [&'static str],
    pub description: &'static str,
}

impl PropertyDef {
    const fn new(
        name: &'static str,
        ty: PropertyType,
        required: bool,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            ty,
            required,
            options: &[],
            description,
        }
    }

    const fn select(
        name: &'static str,
        required: bool,
        options: &'static [&'static str],
        description: &'static str,
    ) -> Self {
        Self {
            name,
            ty: PropertyType::Select,
            required,
            options,
            description,
        }
    }
}

/// One node kind definition: display metadata plus property schema.
#[derive(Clone, Debug, Serialize)]
pub struct NodeTypeDef {
    pub kind: NodeKind,
    pub name: &'static str,
    pub description: &'static str,
    pub category: NodeCategory,
    pub properties: Vec<PropertyDef>,
}

/// Enhanced per-kind details for the modern workflow runtime; editor-facing.
#[derive(Clone, Debug, Serialize)]
pub struct ModernNodeDetails {
    pub kind: NodeKind,
    pub description: &'static str,
    pub required_config: &'static [&'static str],
    pub optional_config: &'static [&'static str],
    pub examples: &'static [&'static str],
}

static NODE_TYPES: Lazy<Vec<NodeTypeDef>> = Lazy::new(|| {
    use PropertyType::*;
    vec![
        NodeTypeDef {
            kind: NodeKind::Start,
            name: "Start",
            description: "Starting point of the workflow",
            category: NodeCategory::Control,
            properties: vec![],
        },
        NodeTypeDef {
            kind: NodeKind::Model,
            name: "Model",
            description: "Language model processing node",
            category: NodeCategory::Processing,
            properties: vec![
                PropertyDef::new("model", String, true, "Model name"),
                PropertyDef::new("system_message", Text, false, "System prompt"),
                PropertyDef::new("temperature", Number, false, "Temperature (0-2)"),
                PropertyDef::new("max_tokens", Number, false, "Maximum tokens"),
            ],
        },
        NodeTypeDef {
            kind: NodeKind::Llm,
            name: "LLM",
            description: "Language model processing node (capability-based)",
            category: NodeCategory::Processing,
            properties: vec![
                PropertyDef::new(
                    "provider",
                    String,
                    false,
                    "Model provider (openai, anthropic, etc.)",
                ),
                PropertyDef::new("model", String, false, "Model name"),
                PropertyDef::new("temperature", Number, false, "Temperature (0-2)"),
                PropertyDef::new("max_tokens", Number, false, "Maximum tokens"),
                PropertyDef::new("system_prompt", Text, false, "System prompt"),
            ],
        },
        NodeTypeDef {
            kind: NodeKind::Tool,
            name: "Tool",
            description: "Tool execution node",
            category: NodeCategory::Processing,
            properties: vec![
                PropertyDef::new("tool_name", String, true, "Tool name"),
                PropertyDef::new("parameters", Object, false, "Tool parameters"),
            ],
        },
        NodeTypeDef {
            kind: NodeKind::Tools,
            name: "Tools",
            description: "Multi-tool execution node",
            category: NodeCategory::Processing,
            properties: vec![
                PropertyDef::new("available_tools", Array, false, "List of available tools"),
                PropertyDef::new("tool_timeout_ms", Number, false, "Tool execution timeout"),
            ],
        },
        NodeTypeDef {
            kind: NodeKind::Retrieval,
            name: "Retrieval",
            description: "Document retrieval node",
            category: NodeCategory::Data,
            properties: vec![
                PropertyDef::new("query", String, false, "Search query"),
                PropertyDef::new("limit", Number, false, "Result limit"),
                PropertyDef::new("score_threshold", Number, false, "Minimum similarity score"),
                PropertyDef::new("collection", String, false, "Collection name"),
            ],
        },
        NodeTypeDef {
            kind: NodeKind::Memory,
            name: "Memory",
            description: "Memory management and summarization node",
            category: NodeCategory::Storage,
            properties: vec![PropertyDef::new(
                "memory_window",
                Number,
                false,
                "Messages kept verbatim; older ones are summarized",
            )],
        },
        NodeTypeDef {
            kind: NodeKind::Conditional,
            name: "Conditional",
            description: "Conditional logic node",
            category: NodeCategory::Control,
            properties: vec![PropertyDef::new(
                "condition",
                String,
                true,
                "Condition expression",
            )],
        },
        NodeTypeDef {
            kind: NodeKind::Loop,
            name: "Loop",
            description: "Loop iteration node",
            category: NodeCategory::Control,
            properties: vec![
                PropertyDef::new("max_iterations", Number, false, "Maximum iterations"),
                PropertyDef::new("condition", String, false, "Loop condition"),
            ],
        },
        NodeTypeDef {
            kind: NodeKind::Variable,
            name: "Variable",
            description: "Variable manipulation node",
            category: NodeCategory::Data,
            properties: vec![
                PropertyDef::select(
                    "operation",
                    true,
                    &["set", "get", "append", "increment", "decrement"],
                    "Variable operation",
                ),
                PropertyDef::new("variable_name", String, true, "Variable name"),
                PropertyDef::new("value", Any, false, "Variable value"),
            ],
        },
        NodeTypeDef {
            kind: NodeKind::ErrorHandler,
            name: "Error Handler",
            description: "Error handling and recovery node",
            category: NodeCategory::Control,
            properties: vec![
                PropertyDef::new("retry_count", Number, false, "Number of retries"),
                PropertyDef::new("fallback_action", String, false, "Fallback action"),
            ],
        },
        NodeTypeDef {
            kind: NodeKind::Delay,
            name: "Delay",
            description: "Time delay node",
            category: NodeCategory::Utility,
            properties: vec![
                PropertyDef::select(
                    "delay_type",
                    true,
                    &["fixed", "random", "exponential", "dynamic"],
                    "Delay mode",
                ),
                PropertyDef::new("duration", Number, true, "Delay duration (ms)"),
                PropertyDef::new(
                    "max_duration",
                    Number,
                    false,
                    "Maximum duration for random/exponential",
                ),
            ],
        },
        NodeTypeDef {
            kind: NodeKind::End,
            name: "End",
            description: "End point of the workflow",
            category: NodeCategory::Control,
            properties: vec![],
        },
    ]
});

static MODERN_DETAILS: Lazy<Vec<ModernNodeDetails>> = Lazy::new(|| {
    vec![
        ModernNodeDetails {
            kind: NodeKind::Conditional,
            description: "Conditional logic and branching node",
            required_config: &["condition"],
            optional_config: &[],
            examples: &[
                "variable enable_memory equals true",
                "tool_calls > 3",
                "variable user_type equals 'premium'",
            ],
        },
        ModernNodeDetails {
            kind: NodeKind::Loop,
            description: "Loop iteration and repetitive execution node",
            required_config: &[],
            optional_config: &["max_iterations", "condition"],
            examples: &["max_iterations: 5", "condition: 'variable counter < 10'"],
        },
        ModernNodeDetails {
            kind: NodeKind::Variable,
            description: "Variable manipulation and state management node",
            required_config: &["operation"],
            optional_config: &["variable_name", "value"],
            examples: &["set counter to 0", "increment counter", "get user_preference"],
        },
        ModernNodeDetails {
            kind: NodeKind::ErrorHandler,
            description: "Error handling and recovery node",
            required_config: &[],
            optional_config: &["retry_count", "fallback_action"],
            examples: &["retry_count: 3", "fallback_action: 'continue'"],
        },
        ModernNodeDetails {
            kind: NodeKind::Delay,
            description: "Time delay and pacing node",
            required_config: &["duration"],
            optional_config: &["delay_type", "max_duration"],
            examples: &["duration: 1000 (ms)", "delay_type: 'exponential'"],
        },
        ModernNodeDetails {
            kind: NodeKind::Memory,
            description: "Memory management and summarization node",
            required_config: &[],
            optional_config: &["memory_window"],
            examples: &["memory_window: 20"],
        },
        ModernNodeDetails {
            kind: NodeKind::Retrieval,
            description: "Document retrieval and context gathering node",
            required_config: &[],
            optional_config: &["limit", "collection", "score_threshold"],
            examples: &["limit: 5", "collection: 'knowledge_base'"],
        },
    ]
});

/// All registered node kind definitions, in catalog order.
pub fn all_node_types() -> &'static [NodeTypeDef] {
    &NODE_TYPES
}

/// Definition for one kind, if registered.
pub fn node_type(kind: NodeKind) -> Option<&'static NodeTypeDef> {
    NODE_TYPES.iter().find(|def| def.kind == kind)
}

/// All supported kind identifiers.
pub fn supported_node_kinds() -> Vec<NodeKind> {
    NODE_TYPES.iter().map(|def| def.kind).collect()
}

/// All kinds in a category.
pub fn node_types_by_category(category: NodeCategory) -> Vec<&'static NodeTypeDef> {
    NODE_TYPES
        .iter()
        .filter(|def| def.category == category)
        .collect()
}

/// Required properties for one kind; empty when the kind has none (or is
/// unregistered, which cannot happen for `NodeKind` values).
pub fn required_properties(kind: NodeKind) -> Vec<&'static PropertyDef> {
    node_type(kind)
        .map(|def| def.properties.iter().filter(|p| p.required).collect())
        .unwrap_or_default()
}

/// Property definition by name for one kind.
pub fn property(kind: NodeKind, name: &str) -> Option<&'static PropertyDef> {
    node_type(kind)?.properties.iter().find(|p| p.name == name)
}

/// Enhanced details for the modern workflow system (editor-facing).
pub fn modern_node_type_details() -> &'static [ModernNodeDetails] {
    &MODERN_DETAILS
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: The catalog covers every NodeKind variant exactly once.
    #[test]
    fn catalog_covers_all_kinds() {
        let kinds = supported_node_kinds();
        assert_eq!(kinds.len(), 13);
        for kind in [
            NodeKind::Start,
            NodeKind::End,
            NodeKind::Model,
            NodeKind::Llm,
            NodeKind::Tool,
            NodeKind::Tools,
            NodeKind::Retrieval,
            NodeKind::Memory,
            NodeKind::Conditional,
            NodeKind::Loop,
            NodeKind::Variable,
            NodeKind::ErrorHandler,
            NodeKind::Delay,
        ] {
            assert!(node_type(kind).is_some(), "missing catalog entry: {kind}");
        }
    }

    /// **Scenario**: FromStr accepts every catalog spelling and round-trips
    /// through as_str; unknown kinds are rejected.
    #[test]
    fn kind_parse_roundtrip() {
        for def in all_node_types() {
            let parsed: NodeKind = def.kind.as_str().parse().unwrap();
            assert_eq!(parsed, def.kind);
        }
        assert!("websearch".parse::<NodeKind>().is_err());
    }

    /// **Scenario**: Required properties match the declared schema (model
    /// requires `model`, conditional requires `condition`, llm requires
    /// nothing).
    #[test]
    fn required_properties_per_kind() {
        let names: Vec<_> = required_properties(NodeKind::Model)
            .iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["model"]);
        assert!(required_properties(NodeKind::Llm).is_empty());
        let names: Vec<_> = required_properties(NodeKind::Variable)
            .iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["operation", "variable_name"]);
        assert!(required_properties(NodeKind::End).is_empty());
    }

    /// **Scenario**: Category filtering returns control nodes including
    /// start/end/conditional/loop/error_handler.
    #[test]
    fn category_filtering() {
        let control = node_types_by_category(NodeCategory::Control);
        let kinds: Vec<_> = control.iter().map(|d| d.kind).collect();
        assert!(kinds.contains(&NodeKind::Start));
        assert!(kinds.contains(&NodeKind::Conditional));
        assert!(!kinds.contains(&NodeKind::Model));
    }

    /// **Scenario**: Modern details expose required/optional config for the
    /// editor; the delay entry requires `duration`.
    #[test]
    fn modern_details_shape() {
        let delay = modern_node_type_details()
            .iter()
            .find(|d| d.kind == NodeKind::Delay)
            .unwrap();
        assert!(delay.required_config.contains(&"duration"));
        assert!(delay.optional_config.contains(&"max_duration"));
    }
}
