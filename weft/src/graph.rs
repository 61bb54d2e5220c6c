//! Workflow graph: nodes plus explicit edges, with computed adjacency.
//!
//! Nodes live in a flat array keyed by string ids; edges store endpoint ids.
//! Adjacency is computed, never stored as owning pointers; the engine
//! traverses by id. A graph is created by the template compiler or supplied
//! inline, validated once, and discarded after execution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry::NodeKind;

/// Advisory editor position; the engine ignores it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One node of a workflow graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique within the graph.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    /// Per-kind configuration; keys per the registry schema.
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub label: String,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            position: Position::default(),
            config: Map::new(),
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    /// Config string by key.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Config number by key, accepting any JSON number.
    pub fn config_f64(&self, key: &str) -> Option<f64> {
        self.config.get(key).and_then(Value::as_f64)
    }

    /// Config non-negative integer by key.
    pub fn config_u64(&self, key: &str) -> Option<u64> {
        self.config.get(key).and_then(Value::as_u64)
    }

    pub fn config_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key).and_then(Value::as_bool)
    }
}

/// Edge kind: `default` always matches during routing; `conditional` matches
/// when its condition evaluates true.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    #[default]
    Default,
    Conditional,
}

/// One directed edge of a workflow graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default)]
    pub kind: EdgeKind,
    /// Condition expression; required for conditional edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl EdgeSpec {
    /// Default edge `source -> target` with the conventional `source-target` id.
    pub fn direct(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}-{target}"),
            source,
            target,
            kind: EdgeKind::Default,
            condition: None,
            label: None,
        }
    }

    /// Conditional edge guarded by an expression.
    pub fn conditional(
        source: impl Into<String>,
        target: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}-{target}"),
            source,
            target,
            kind: EdgeKind::Conditional,
            condition: Some(condition.into()),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Workflow graph: flat node list, edge list, free-form metadata.
///
/// **Interaction**: Produced by the template compiler or supplied inline;
/// checked by the validator; walked by the engine. Immutable after
/// validation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl WorkflowGraph {
    pub fn new(nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> Self {
        Self {
            nodes,
            edges,
            metadata: Map::new(),
        }
    }

    /// Node by id.
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The single `start` node, if present.
    pub fn start_node(&self) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Start)
    }

    /// First `end` node in declaration order, if present.
    pub fn first_end_node(&self) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.kind == NodeKind::End)
    }

    /// Outgoing edges of one node, in declaration order.
    pub fn outgoing(&self, id: &str) -> Vec<&EdgeSpec> {
        self.edges.iter().filter(|e| e.source == id).collect()
    }

    /// node id -> outgoing edges, declaration order preserved.
    pub fn adjacency(&self) -> HashMap<&str, Vec<&EdgeSpec>> {
        let mut map: HashMap<&str, Vec<&EdgeSpec>> = HashMap::new();
        for edge in &self.edges {
            map.entry(edge.source.as_str()).or_default().push(edge);
        }
        map
    }

    /// node id -> incoming edges, declaration order preserved.
    pub fn reverse_adjacency(&self) -> HashMap<&str, Vec<&EdgeSpec>> {
        let mut map: HashMap<&str, Vec<&EdgeSpec>> = HashMap::new();
        for edge in &self.edges {
            map.entry(edge.target.as_str()).or_default().push(edge);
        }
        map
    }
}
