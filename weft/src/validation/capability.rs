//! Capability layer: node kinds and config limits against the effective
//! capability set.

use crate::graph::WorkflowGraph;
use crate::registry::NodeKind;

use super::{LayerReport, ValidationContext};

pub(super) fn check(
    graph: &WorkflowGraph,
    ctx: &ValidationContext<'_>,
    report: &mut LayerReport,
) {
    let caps = ctx.capabilities;
    for node in &graph.nodes {
        if node.kind == NodeKind::Retrieval && !caps.enable_retrieval {
            report.error(format!(
                "node {} requires the retrieval capability",
                node.id
            ));
        }
        if node.kind.is_tool() && !caps.enable_tools {
            report.error(format!("node {} requires the tools capability", node.id));
        }
        if node.config_bool("streaming").unwrap_or(false) && !caps.enable_streaming {
            report.error(format!(
                "node {} requires streaming, which is disabled",
                node.id
            ));
        }

        if let Some(requested) = node.config_u64("max_tool_calls") {
            if requested > caps.max_tool_calls as u64 {
                report.error(format!(
                    "node {} max_tool_calls {requested} exceeds capability limit {}",
                    node.id, caps.max_tool_calls
                ));
            }
        }
        if let Some(requested) = node.config_u64("memory_window") {
            if requested > caps.memory_window as u64 {
                report.error(format!(
                    "node {} memory_window {requested} exceeds capability limit {}",
                    node.id, caps.memory_window
                ));
            }
        }
        let document_request = node
            .config_u64("max_documents")
            .or_else(|| (node.kind == NodeKind::Retrieval).then(|| node.config_u64("limit")).flatten());
        if let Some(requested) = document_request {
            if requested > caps.max_documents as u64 {
                report.error(format!(
                    "node {} requests {requested} documents, capability limit is {}",
                    node.id, caps.max_documents
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use crate::graph::{EdgeSpec, NodeSpec};
    use crate::validation::Layer;
    use serde_json::Value;

    fn fresh_report() -> LayerReport {
        LayerReport {
            layer: Layer::Capability,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn wrap(node: NodeSpec) -> WorkflowGraph {
        let id = node.id.clone();
        WorkflowGraph::new(
            vec![
                NodeSpec::new("start", NodeKind::Start),
                node,
                NodeSpec::new("end", NodeKind::End),
            ],
            vec![EdgeSpec::direct("start", id.clone()), EdgeSpec::direct(id, "end")],
        )
    }

    /// **Scenario**: Retrieval and tool nodes require their capabilities.
    #[test]
    fn kind_capability_gates() {
        let caps = CapabilitySet::default(); // retrieval and tools both off
        let ctx = ValidationContext::new(&caps);
        let mut report = fresh_report();
        check(&wrap(NodeSpec::new("r", NodeKind::Retrieval)), &ctx, &mut report);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("requires the retrieval capability")));

        let mut report = fresh_report();
        check(&wrap(NodeSpec::new("t", NodeKind::Tools)), &ctx, &mut report);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("requires the tools capability")));
    }

    /// **Scenario**: Config limits above the capability ceilings are
    /// rejected; at the ceiling they pass.
    #[test]
    fn limit_ceilings() {
        let mut caps = CapabilitySet::default();
        caps.enable_tools = true;
        caps.max_tool_calls = 5;
        let ctx = ValidationContext::new(&caps);

        let mut node = NodeSpec::new("t", NodeKind::Tools);
        node.config
            .insert("max_tool_calls".into(), Value::from(6));
        let mut report = fresh_report();
        check(&wrap(node), &ctx, &mut report);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("exceeds capability limit 5")));

        let mut node = NodeSpec::new("t", NodeKind::Tools);
        node.config
            .insert("max_tool_calls".into(), Value::from(5));
        let mut report = fresh_report();
        check(&wrap(node), &ctx, &mut report);
        assert!(report.errors.is_empty());
    }

    /// **Scenario**: A retrieval `limit` counts against max_documents.
    #[test]
    fn retrieval_limit_counts_as_documents() {
        let mut caps = CapabilitySet::default();
        caps.enable_retrieval = true;
        caps.max_documents = 3;
        let ctx = ValidationContext::new(&caps);
        let mut node = NodeSpec::new("r", NodeKind::Retrieval);
        node.config.insert("limit".into(), Value::from(9));
        let mut report = fresh_report();
        check(&wrap(node), &ctx, &mut report);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("capability limit is 3")));
    }

    /// **Scenario**: Streaming-only nodes are rejected when streaming is
    /// disabled.
    #[test]
    fn streaming_gate() {
        let mut caps = CapabilitySet::default();
        caps.enable_streaming = false;
        let ctx = ValidationContext::new(&caps);
        let mut node = NodeSpec::new("m", NodeKind::Llm);
        node.config.insert("streaming".into(), Value::from(true));
        let mut report = fresh_report();
        check(&wrap(node), &ctx, &mut report);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("requires streaming")));
    }
}
