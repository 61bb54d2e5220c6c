//! Resource layer: graph-size ceilings, loop caps, and the per-execution
//! token budget.

use crate::graph::WorkflowGraph;
use crate::registry::NodeKind;

use super::{LayerReport, ValidationContext};

pub(super) fn check(
    graph: &WorkflowGraph,
    ctx: &ValidationContext<'_>,
    report: &mut LayerReport,
) {
    let limits = &ctx.limits;

    let node_count = graph.nodes.len() as u32;
    if node_count > limits.max_nodes {
        report.error(format!(
            "graph has {node_count} nodes; maximum is {}",
            limits.max_nodes
        ));
    }

    let edge_ceiling = node_count as u64 * limits.max_edges_per_node as u64;
    if graph.edges.len() as u64 > edge_ceiling {
        report.error(format!(
            "graph has {} edges; maximum is {edge_ceiling} ({} per node)",
            graph.edges.len(),
            limits.max_edges_per_node
        ));
    }

    for node in &graph.nodes {
        if node.kind != NodeKind::Loop {
            continue;
        }
        match node.config_u64("max_iterations") {
            None => report.error(format!(
                "loop node {} must declare max_iterations",
                node.id
            )),
            Some(0) => report.error(format!(
                "loop node {} max_iterations must be positive",
                node.id
            )),
            Some(n) if n > limits.max_loop_iterations as u64 => report.error(format!(
                "loop node {} max_iterations {n} exceeds hard cap {}",
                node.id, limits.max_loop_iterations
            )),
            Some(_) => {}
        }
    }

    let token_sum: u64 = graph
        .nodes
        .iter()
        .filter(|n| n.kind.is_model())
        .filter_map(|n| n.config_u64("max_tokens"))
        .sum();
    if token_sum > limits.token_budget {
        report.error(format!(
            "aggregate max_tokens {token_sum} exceeds per-execution budget {}",
            limits.token_budget
        ));
    }
}
