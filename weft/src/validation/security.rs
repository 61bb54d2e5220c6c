//! Security layer: tool references, dangerous literals, and size caps on
//! user-provided configuration.

use serde_json::Value;

use crate::graph::WorkflowGraph;

use super::{LayerReport, ValidationContext};

const MAX_STRING_LEN: usize = 200;
const MAX_KEY_LEN: usize = 50;
const MAX_ARRAY_ITEMS: usize = 10;
const DANGEROUS_PATTERNS: [&str; 3] = ["<script", "javascript:", "`"];

pub(super) fn check(
    graph: &WorkflowGraph,
    ctx: &ValidationContext<'_>,
    report: &mut LayerReport,
) {
    for node in &graph.nodes {
        if node.kind.is_tool() {
            check_tool_references(node, ctx, report);
        }
        for (key, value) in &node.config {
            check_key(&node.id, key, report);
            check_value(&node.id, key, value, ctx, report);
        }
    }
}

fn check_tool_references(
    node: &crate::graph::NodeSpec,
    ctx: &ValidationContext<'_>,
    report: &mut LayerReport,
) {
    let mut referenced: Vec<&str> = Vec::new();
    if let Some(name) = node.config_str("tool_name") {
        referenced.push(name);
    }
    if let Some(Value::Array(tools)) = node.config.get("available_tools") {
        referenced.extend(tools.iter().filter_map(Value::as_str));
    }
    for name in referenced {
        if !ctx.allowed_tools.contains(name) {
            report.error(format!(
                "node {} references unregistered tool: {name}",
                node.id
            ));
        }
    }
}

fn check_key(node_id: &str, key: &str, report: &mut LayerReport) {
    if key.len() > MAX_KEY_LEN {
        report.error(format!(
            "node {node_id} config key exceeds {MAX_KEY_LEN} chars: {key}"
        ));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        report.error(format!(
            "node {node_id} config key has invalid characters: {key}"
        ));
    }
}

/// Walks a config value recursively, checking strings, arrays, and nested
/// object keys.
fn check_value(
    node_id: &str,
    key: &str,
    value: &Value,
    ctx: &ValidationContext<'_>,
    report: &mut LayerReport,
) {
    match value {
        Value::String(s) => {
            if s.len() > MAX_STRING_LEN {
                report.error(format!(
                    "node {node_id} config {key}: string exceeds {MAX_STRING_LEN} chars"
                ));
            }
            if s.contains('\u{0}') {
                report.error(format!(
                    "node {node_id} config {key}: contains NUL byte"
                ));
            }
            let lowered = s.to_lowercase();
            for pattern in DANGEROUS_PATTERNS {
                if lowered.contains(pattern) {
                    report.error(format!(
                        "node {node_id} config {key}: dangerous pattern `{pattern}`"
                    ));
                }
            }
            if !ctx.capabilities.enable_web_search
                && (lowered.contains("http://") || lowered.contains("https://"))
            {
                report.error(format!(
                    "node {node_id} config {key}: inline HTTP disallowed without web search capability"
                ));
            }
        }
        Value::Array(items) => {
            if items.len() > MAX_ARRAY_ITEMS {
                report.error(format!(
                    "node {node_id} config {key}: array exceeds {MAX_ARRAY_ITEMS} items"
                ));
            }
            for item in items {
                check_value(node_id, key, item, ctx, report);
            }
        }
        Value::Object(map) => {
            for (nested_key, nested) in map {
                check_key(node_id, nested_key, report);
                check_value(node_id, nested_key, nested, ctx, report);
            }
        }
        _ => {}
    }
}
