//! Structure layer: graph shape, id integrity, reachability, and per-kind
//! config schema.

use std::collections::{HashSet, VecDeque};

use serde_json::Value;

use crate::condition;
use crate::graph::{EdgeKind, NodeSpec, WorkflowGraph};
use crate::registry::{self, NodeKind, PropertyType};

use super::LayerReport;

pub(super) fn check(graph: &WorkflowGraph, report: &mut LayerReport) {
    check_ids(graph, report);
    check_start_end(graph, report);
    check_edge_endpoints(graph, report);
    check_reachability(graph, report);
    check_outgoing(graph, report);
    check_self_loops(graph, report);
    for node in &graph.nodes {
        check_node_config(node, report);
    }
    check_edge_conditions(graph, report);
}

fn check_ids(graph: &WorkflowGraph, report: &mut LayerReport) {
    let mut seen = HashSet::new();
    for node in &graph.nodes {
        if node.id.is_empty() {
            report.error("node with empty id");
        } else if !seen.insert(node.id.as_str()) {
            report.error(format!("duplicate node id: {}", node.id));
        }
    }
}

fn check_start_end(graph: &WorkflowGraph, report: &mut LayerReport) {
    let starts = graph
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Start)
        .count();
    match starts {
        0 => report.error("graph has no start node"),
        1 => {}
        n => report.error(format!("graph has {n} start nodes; exactly one required")),
    }
    if !graph.nodes.iter().any(|n| n.kind == NodeKind::End) {
        report.error("graph has no end node");
    }
}

fn check_edge_endpoints(graph: &WorkflowGraph, report: &mut LayerReport) {
    for edge in &graph.edges {
        for endpoint in [&edge.source, &edge.target] {
            if graph.node(endpoint).is_none() {
                report.error(format!(
                    "edge {} references unknown node: {endpoint}",
                    edge.id
                ));
            }
        }
    }
}

fn check_reachability(graph: &WorkflowGraph, report: &mut LayerReport) {
    let Some(start) = graph.start_node() else {
        return;
    };
    let adjacency = graph.adjacency();
    let mut reachable = HashSet::new();
    let mut queue = VecDeque::from([start.id.as_str()]);
    reachable.insert(start.id.as_str());
    while let Some(current) = queue.pop_front() {
        for edge in adjacency.get(current).into_iter().flatten() {
            if reachable.insert(edge.target.as_str()) {
                queue.push_back(edge.target.as_str());
            }
        }
    }
    for node in &graph.nodes {
        if node.kind != NodeKind::Start && !reachable.contains(node.id.as_str()) {
            report.error(format!("node not reachable from start: {}", node.id));
        }
    }
}

fn check_outgoing(graph: &WorkflowGraph, report: &mut LayerReport) {
    for node in &graph.nodes {
        if node.kind == NodeKind::End {
            continue;
        }
        if graph.outgoing(&node.id).is_empty() {
            report.error(format!("non-end node has no outgoing edge: {}", node.id));
        }
    }
}

fn check_self_loops(graph: &WorkflowGraph, report: &mut LayerReport) {
    for edge in &graph.edges {
        if edge.source == edge.target {
            let is_loop_node = graph
                .node(&edge.source)
                .map(|n| n.kind == NodeKind::Loop)
                .unwrap_or(false);
            if !is_loop_node {
                report.error(format!(
                    "self-loop on non-loop node: {} (edge {})",
                    edge.source, edge.id
                ));
            }
        }
    }
}

/// Required keys present and every provided value typed per the registry
/// schema, plus the documented numeric ranges.
fn check_node_config(node: &NodeSpec, report: &mut LayerReport) {
    for property in registry::required_properties(node.kind) {
        if !node.config.contains_key(property.name) {
            report.error(format!(
                "node {} ({}) missing required config key: {}",
                node.id, node.kind, property.name
            ));
        }
    }
    for (key, value) in &node.config {
        if let Some(property) = registry::property(node.kind, key) {
            if !type_matches(property.ty, value) {
                report.error(format!(
                    "node {} config {key}: expected {:?} value",
                    node.id, property.ty
                ));
                continue;
            }
            if property.ty == PropertyType::Select {
                if let Some(s) = value.as_str() {
                    if !property.options.contains(&s) {
                        report.error(format!(
                            "node {} config {key}: `{s}` not in {:?}",
                            node.id, property.options
                        ));
                    }
                }
            }
        }
    }
    check_ranges(node, report);
    if node.kind == NodeKind::Conditional {
        match node.config_str("condition") {
            None | Some("") => {} // covered by required-key check
            Some(expr) => {
                if let Err(e) = condition::parse(expr) {
                    report.error(format!("node {} condition does not parse: {e}", node.id));
                }
            }
        }
    }
    if node.kind == NodeKind::Loop {
        if let Some(expr) = node.config_str("condition") {
            if let Err(e) = condition::parse(expr) {
                report.error(format!("node {} loop condition does not parse: {e}", node.id));
            }
        }
    }
}

fn type_matches(ty: PropertyType, value: &Value) -> bool {
    match ty {
        PropertyType::String | PropertyType::Text | PropertyType::Select => value.is_string(),
        PropertyType::Number => value.is_number(),
        PropertyType::Boolean => value.is_boolean(),
        PropertyType::Array => value.is_array(),
        PropertyType::Object => value.is_object(),
        PropertyType::Any => true,
    }
}

fn check_ranges(node: &NodeSpec, report: &mut LayerReport) {
    if node.kind.is_model() {
        if let Some(t) = node.config_f64("temperature") {
            if !(0.0..=2.0).contains(&t) {
                report.error(format!("node {} temperature out of [0,2]: {t}", node.id));
            }
        }
        if let Some(m) = node.config_f64("max_tokens") {
            if m <= 0.0 {
                report.error(format!("node {} max_tokens must be positive", node.id));
            }
        }
    }
    if node.kind == NodeKind::Retrieval {
        if let Some(limit) = node.config_f64("limit") {
            if limit <= 0.0 {
                report.error(format!("node {} limit must be positive", node.id));
            }
        }
        if let Some(threshold) = node.config_f64("score_threshold") {
            if !(0.0..=1.0).contains(&threshold) {
                report.error(format!(
                    "node {} score_threshold out of [0,1]: {threshold}",
                    node.id
                ));
            }
        }
    }
    if node.kind == NodeKind::Delay {
        if let Some(duration) = node.config_f64("duration") {
            if duration <= 0.0 {
                report.error(format!("node {} duration must be positive", node.id));
            }
        }
    }
}

fn check_edge_conditions(graph: &WorkflowGraph, report: &mut LayerReport) {
    for edge in &graph.edges {
        if edge.kind != EdgeKind::Conditional {
            continue;
        }
        match edge.condition.as_deref() {
            None | Some("") => {
                report.error(format!("conditional edge {} has no condition", edge.id));
            }
            Some(expr) => {
                if let Err(e) = condition::parse(expr) {
                    report.error(format!("edge {} condition does not parse: {e}", edge.id));
                }
            }
        }
    }
}
