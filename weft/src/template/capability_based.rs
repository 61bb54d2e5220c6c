//! Capability-based emission: the minimal linear graph for a template.
//!
//! `start → [retrieval?] → llm ⇄ [tools?] → end`, with the tools node forming
//! a two-edge cycle with the llm node labelled `tool_call` / `tool_result`.
//! Node ids are the stable strings `start`, `retrieval`, `llm`, `tools`,
//! `end`; layout runs left to right in emission order.

use serde_json::{Map, Value};

use crate::capability::CapabilitySet;
use crate::graph::{EdgeSpec, NodeSpec};
use crate::registry::NodeKind;

use super::{param_bool, param_f64, param_str, param_u64, WorkflowTemplate};

pub(super) fn emit(
    _template: &WorkflowTemplate,
    params: &Map<String, Value>,
    capabilities: &CapabilitySet,
) -> (Vec<NodeSpec>, Vec<EdgeSpec>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    nodes.push(
        NodeSpec::new("start", NodeKind::Start)
            .with_label("Start")
            .with_position(100.0, 100.0),
    );

    let mut current_x = 300.0;
    let mut previous = "start";

    if capabilities.enable_retrieval {
        let mut config = Map::new();
        config.insert(
            "retriever".into(),
            Value::from(param_str(params, "retriever", "default")),
        );
        config.insert("limit".into(), Value::from(capabilities.max_documents));
        config.insert(
            "score_threshold".into(),
            Value::from(param_f64(params, "score_threshold", 0.5)),
        );
        nodes.push(
            NodeSpec::new("retrieval", NodeKind::Retrieval)
                .with_label("Document Retrieval")
                .with_position(current_x, 100.0)
                .with_config(config),
        );
        edges.push(EdgeSpec::direct(previous, "retrieval"));
        previous = "retrieval";
        current_x += 200.0;
    }

    let llm_label = match (capabilities.enable_tools, capabilities.enable_retrieval) {
        (true, true) => "LLM with Tools & Context",
        (true, false) => "LLM with Tools",
        (false, true) => "LLM with Context",
        (false, false) => "LLM Response",
    };
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
    config.insert(
        "system_prompt".into(),
        Value::from(param_str(
            params,
            "system_prompt",
            "You are a helpful assistant.",
        )),
    );
    config.insert(
        "use_context".into(),
        Value::from(capabilities.enable_retrieval),
    );
    config.insert("enable_tools".into(), Value::from(capabilities.enable_tools));
    config.insert(
        "max_tool_calls".into(),
        Value::from(if capabilities.enable_tools {
            capabilities.max_tool_calls
        } else {
            0
        }),
    );
    nodes.push(
        NodeSpec::new("llm", NodeKind::Llm)
            .with_label(llm_label)
            .with_position(current_x, 100.0)
            .with_config(config),
    );
    edges.push(EdgeSpec::direct(previous, "llm"));
    current_x += 200.0;

    if capabilities.enable_tools {
        let mut config = Map::new();
        config.insert(
            "max_tool_calls".into(),
            Value::from(capabilities.max_tool_calls),
        );
        config.insert(
            "parallel_calls".into(),
            Value::from(param_bool(params, "parallel_tool_calls", false)),
        );
        config.insert(
            "tool_timeout_ms".into(),
            Value::from(param_u64(params, "tool_timeout_ms", 30_000)),
        );
        nodes.push(
            NodeSpec::new("tools", NodeKind::Tools)
                .with_label("Tool Execution")
                .with_position(current_x, 200.0)
                .with_config(config),
        );

        // Bidirectional flow: the model requests calls, the results loop
        // back. The capability's call budget is compiled into the guards so
        // an always-calling model finalizes instead of spinning.
        edges.push(
            EdgeSpec::conditional(
                "llm",
                "tools",
                format!(
                    "has_tool_calls AND tool_calls < {}",
                    capabilities.max_tool_calls
                ),
            )
            .with_label("tool_call"),
        );
        edges.push(EdgeSpec::direct("tools", "llm").with_label("tool_result"));
    }

    nodes.push(
        NodeSpec::new("end", NodeKind::End)
            .with_label("End")
            .with_position(current_x + 200.0, 100.0),
    );

    if capabilities.enable_tools {
        edges.push(EdgeSpec::conditional(
            "llm",
            "end",
            format!(
                "no_tool_calls OR tool_calls >= {}",
                capabilities.max_tool_calls
            ),
        ));
    } else {
        edges.push(EdgeSpec::direct("llm", "end"));
    }

    (nodes, edges)
}
