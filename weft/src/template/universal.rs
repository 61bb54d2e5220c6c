//! Universal-chat emission: one fixed topology that handles every chat
//! pattern dynamically.
//!
//! Twelve nodes thread conditional branches for memory, retrieval, tools, and
//! tool-loop finalization. A `set_capabilities` variable node seeds the
//! execution variables with the effective flags and limits at graph entry, so
//! the edge conditions can route on them at runtime.

use serde_json::{json, Map, Value};

use crate::graph::{EdgeSpec, NodeSpec};
use crate::registry::NodeKind;

use super::{param_bool, param_f64, param_str, param_u64, WorkflowTemplate};

pub(super) fn emit(
    template: &WorkflowTemplate,
    params: &Map<String, Value>,
) -> (Vec<NodeSpec>, Vec<EdgeSpec>) {
    let mut nodes = Vec::new();

    nodes.push(
        NodeSpec::new("start", NodeKind::Start)
            .with_label("Start")
            .with_position(100.0, 100.0),
    );

    let mut config = Map::new();
    config.insert("operation".into(), Value::from("set"));
    config.insert("variable_name".into(), Value::from("capabilities"));
    config.insert(
        "value".into(),
        json!({
            "enable_memory": param_bool(params, "enable_memory", false),
            "enable_retrieval": param_bool(params, "enable_retrieval", false),
            "enable_tools": param_bool(params, "enable_tools", false),
            "memory_window": param_u64(params, "memory_window", 10),
            "max_tool_calls": param_u64(params, "max_tool_calls", 10),
            "max_documents": param_u64(params, "max_documents", 5),
        }),
    );
    nodes.push(
        NodeSpec::new("set_capabilities", NodeKind::Variable)
            .with_label("Set Capabilities")
            .with_position(300.0, 100.0)
            .with_config(config),
    );

    let mut config = Map::new();
    config.insert(
        "condition".into(),
        Value::from("variable enable_memory equals true"),
    );
    nodes.push(
        NodeSpec::new("conditional_memory", NodeKind::Conditional)
            .with_label("Memory Check")
            .with_position(500.0, 100.0)
            .with_config(config),
    );

    let mut config = Map::new();
    config.insert(
        "memory_window".into(),
        Value::from(param_u64(params, "memory_window", 10)),
    );
    nodes.push(
        NodeSpec::new("manage_memory", NodeKind::Memory)
            .with_label("Manage Memory")
            .with_position(500.0, 200.0)
            .with_config(config),
    );

    let mut config = Map::new();
    config.insert(
        "condition".into(),
        Value::from("variable enable_retrieval equals true"),
    );
    nodes.push(
        NodeSpec::new("conditional_retrieval", NodeKind::Conditional)
            .with_label("Retrieval Check")
            .with_position(700.0, 100.0)
            .with_config(config),
    );

    let mut config = Map::new();
    config.insert(
        "limit".into(),
        Value::from(param_u64(params, "max_documents", 5)),
    );
    config.insert(
        "score_threshold".into(),
        Value::from(param_f64(params, "score_threshold", 0.5)),
    );
    nodes.push(
        NodeSpec::new("retrieve_context", NodeKind::Retrieval)
            .with_label("Retrieve Context")
            .with_position(700.0, 200.0)
            .with_config(config),
    );

    let default_system = template
        .default_params
        .get("system_message")
        .and_then(Value::as_str)
        .unwrap_or("You are a helpful assistant.");
    nodes.push(
        NodeSpec::new("call_model", NodeKind::Llm)
            .with_label("LLM Response")
            .with_position(900.0, 100.0)
            .with_config(llm_config(params, param_str(params, "system_message", default_system))),
    );

    let mut config = Map::new();
    config.insert(
        "condition".into(),
        Value::from("variable enable_tools equals true AND has_tool_calls"),
    );
    nodes.push(
        NodeSpec::new("conditional_tools", NodeKind::Conditional)
            .with_label("Tools Check")
            .with_position(1100.0, 100.0)
            .with_config(config),
    );

    let mut config = Map::new();
    config.insert(
        "max_tool_calls".into(),
        Value::from(param_u64(params, "max_tool_calls", 10)),
    );
    config.insert(
        "tool_timeout_ms".into(),
        Value::from(param_u64(params, "tool_timeout_ms", 30_000)),
    );
    nodes.push(
        NodeSpec::new("execute_tools", NodeKind::Tools)
            .with_label("Execute Tools")
            .with_position(1100.0, 200.0)
            .with_config(config),
    );

    let mut config = Map::new();
    config.insert(
        "condition".into(),
        Value::from("tool_calls >= variable max_tool_calls"),
    );
    nodes.push(
        NodeSpec::new("conditional_finalize", NodeKind::Conditional)
            .with_label("Finalize Check")
            .with_position(1300.0, 100.0)
            .with_config(config),
    );

    nodes.push(
        NodeSpec::new("finalize_response", NodeKind::Llm)
            .with_label("Finalize Response")
            .with_position(1300.0, 200.0)
            .with_config(llm_config(
                params,
                "Provide a final response based on the tool results.",
            )),
    );

    nodes.push(
        NodeSpec::new("end", NodeKind::End)
            .with_label("End")
            .with_position(1500.0, 100.0),
    );

    let edges = vec![
        EdgeSpec::direct("start", "set_capabilities"),
        EdgeSpec::direct("set_capabilities", "conditional_memory"),
        // Memory branch
        EdgeSpec::conditional(
            "conditional_memory",
            "manage_memory",
            "variable enable_memory equals true",
        ),
        EdgeSpec::conditional(
            "conditional_memory",
            "conditional_retrieval",
            "variable enable_memory equals false",
        ),
        EdgeSpec::direct("manage_memory", "conditional_retrieval"),
        // Retrieval branch
        EdgeSpec::conditional(
            "conditional_retrieval",
            "retrieve_context",
            "variable enable_retrieval equals true",
        ),
        EdgeSpec::conditional(
            "conditional_retrieval",
            "call_model",
            "variable enable_retrieval equals false",
        ),
        EdgeSpec::direct("retrieve_context", "call_model"),
        // Model to tools check
        EdgeSpec::direct("call_model", "conditional_tools"),
        // Tools branch
        EdgeSpec::conditional(
            "conditional_tools",
            "execute_tools",
            "variable enable_tools equals true AND has_tool_calls",
        ),
        EdgeSpec::conditional(
            "conditional_tools",
            "end",
            "variable enable_tools equals false OR no_tool_calls",
        ),
        // Tool execution loop and finalization
        EdgeSpec::direct("execute_tools", "conditional_finalize"),
        EdgeSpec::conditional(
            "conditional_finalize",
            "call_model",
            "tool_calls < variable max_tool_calls",
        ),
        EdgeSpec::conditional(
            "conditional_finalize",
            "finalize_response",
            "tool_calls >= variable max_tool_calls",
        ),
        EdgeSpec::direct("finalize_response", "end"),
    ];

    (nodes, edges)
}

/// Model-call config shared by the main and finalize llm nodes. The two
/// differ only in their system message; the memory/retrieval branches feed
/// context through the execution state, not through node config.
fn llm_config(params: &Map<String, Value>, system_message: &str) -> Map<String, Value> {
    let mut config = Map::new();
    config.insert(
        "provider".into(),
        Value::from(param_str(params, "provider", "openai")),
    );
    config.insert(
        "model".into(),
        Value::from(param_str(params, "model", "gpt-4")),
    );
    config.insert(
        "temperature".into(),
        Value::from(param_f64(params, "temperature", 0.7)),
    );
    config.insert(
        "max_tokens".into(),
        Value::from(param_u64(params, "max_tokens", 1000)),
    );
    config.insert("system_message".into(), Value::from(system_message));
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::WorkflowType;

    fn emit_universal(params: Map<String, Value>) -> (Vec<NodeSpec>, Vec<EdgeSpec>) {
        let template =
            WorkflowTemplate::new("tpl_u", "universal_chat", WorkflowType::UniversalChat);
        emit(&template, &params)
    }

    /// **Scenario**: The universal topology has the fixed 12 nodes with
    /// stable ids, ending at lowercase `end`.
    #[test]
    fn twelve_fixed_nodes() {
        let (nodes, edges) = emit_universal(Map::new());
        assert_eq!(nodes.len(), 12);
        let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "start",
                "set_capabilities",
                "conditional_memory",
                "manage_memory",
                "conditional_retrieval",
                "retrieve_context",
                "call_model",
                "conditional_tools",
                "execute_tools",
                "conditional_finalize",
                "finalize_response",
                "end",
            ]
        );
        assert!(edges.iter().all(|e| e.target != "END"));
        assert_eq!(edges.len(), 15);
    }

    /// **Scenario**: set_capabilities seeds the variable map with the
    /// effective flags and limits from the input params.
    #[test]
    fn set_capabilities_seeds_params() {
        let mut params = Map::new();
        params.insert("enable_tools".into(), Value::from(true));
        params.insert("max_tool_calls".into(), Value::from(2));
        let (nodes, _) = emit_universal(params);
        let set = nodes.iter().find(|n| n.id == "set_capabilities").unwrap();
        let value = set.config.get("value").unwrap();
        assert_eq!(value["enable_tools"], Value::from(true));
        assert_eq!(value["max_tool_calls"], Value::from(2));
        assert_eq!(value["enable_memory"], Value::from(false));
    }

    /// **Scenario**: Conditional edges carry the routing expressions for both
    /// branches of every check.
    #[test]
    fn conditional_edges_cover_both_branches() {
        let (_, edges) = emit_universal(Map::new());
        let from_memory: Vec<_> = edges
            .iter()
            .filter(|e| e.source == "conditional_memory")
            .collect();
        assert_eq!(from_memory.len(), 2);
        assert!(from_memory
            .iter()
            .all(|e| e.condition.as_deref().is_some_and(|c| !c.is_empty())));
        let finalize: Vec<_> = edges
            .iter()
            .filter(|e| e.source == "conditional_finalize")
            .collect();
        assert_eq!(finalize.len(), 2);
        assert_eq!(
            finalize[0].condition.as_deref(),
            Some("tool_calls < variable max_tool_calls")
        );
    }

    /// **Scenario**: The finalize llm node pins the tool-results system
    /// message; the main llm node honors the params override.
    #[test]
    fn llm_system_messages() {
        let mut params = Map::new();
        params.insert("system_message".into(), Value::from("Be terse."));
        let (nodes, _) = emit_universal(params);
        let call = nodes.iter().find(|n| n.id == "call_model").unwrap();
        assert_eq!(call.config_str("system_message"), Some("Be terse."));
        let finalize = nodes.iter().find(|n| n.id == "finalize_response").unwrap();
        assert_eq!(
            finalize.config_str("system_message"),
            Some("Provide a final response based on the tool results.")
        );
    }
}
