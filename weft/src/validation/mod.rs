//! Four-layer graph validation: structure, security, capability, resource.
//!
//! One entry point, [`validate`], runs every layer in order and returns a
//! [`ValidationReport`] with per-layer errors and warnings. A fatal finding
//! in an earlier layer does not skip later layers; the report surfaces
//! everything. Validation is pure and deterministic: the same graph and
//! context always produce the same report, down to finding order.

mod capability;
mod resource;
mod security;
mod structure;

use std::collections::HashSet;

use serde::Serialize;

use crate::capability::CapabilitySet;
use crate::graph::WorkflowGraph;

/// Validation layer identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Structure,
    Security,
    Capability,
    Resource,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Structure => "structure",
            Layer::Security => "security",
            Layer::Capability => "capability",
            Layer::Resource => "resource",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Findings of one layer.
#[derive(Clone, Debug, Serialize)]
pub struct LayerReport {
    pub layer: Layer,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl LayerReport {
    fn new(layer: Layer) -> Self {
        Self {
            layer,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Full report over all four layers.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
    pub layers: Vec<LayerReport>,
}

impl ValidationReport {
    /// True when no layer recorded an error.
    pub fn is_valid(&self) -> bool {
        self.layers.iter().all(|layer| layer.errors.is_empty())
    }

    /// All errors, each prefixed with its layer name, in layer order.
    pub fn errors(&self) -> Vec<String> {
        self.layers
            .iter()
            .flat_map(|layer| {
                layer
                    .errors
                    .iter()
                    .map(move |e| format!("{} layer: {e}", layer.layer))
            })
            .collect()
    }

    /// All warnings, each prefixed with its layer name.
    pub fn warnings(&self) -> Vec<String> {
        self.layers
            .iter()
            .flat_map(|layer| {
                layer
                    .warnings
                    .iter()
                    .map(move |w| format!("{} layer: {w}", layer.layer))
            })
            .collect()
    }

    /// First error, if any.
    pub fn first_error(&self) -> Option<String> {
        self.errors().into_iter().next()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let errors = self.errors();
        write!(f, "{} error(s)", errors.len())?;
        if let Some(first) = errors.first() {
            write!(f, ": {first}")?;
        }
        Ok(())
    }
}

/// Resource ceilings the validator enforces; defaults mirror the engine
/// settings.
#[derive(Clone, Debug)]
pub struct ValidationLimits {
    /// Maximum node count per graph.
    pub max_nodes: u32,
    /// Edge count ceiling as a multiple of node count.
    pub max_edges_per_node: u32,
    /// Hard cap on loop `max_iterations`.
    pub max_loop_iterations: u32,
    /// Per-execution budget for the sum of model-node `max_tokens`.
    pub token_budget: u64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_nodes: 500,
            max_edges_per_node: 4,
            max_loop_iterations: 1000,
            token_budget: 100_000,
        }
    }
}

/// Caller-scoped inputs to validation.
pub struct ValidationContext<'a> {
    pub capabilities: &'a CapabilitySet,
    /// Tool names registered for the caller.
    pub allowed_tools: HashSet<String>,
    pub limits: ValidationLimits,
}

impl<'a> ValidationContext<'a> {
    pub fn new(capabilities: &'a CapabilitySet) -> Self {
        Self {
            capabilities,
            allowed_tools: HashSet::new(),
            limits: ValidationLimits::default(),
        }
    }

    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Runs all four layers over the graph. Never fails; findings land in the
/// report.
pub fn validate(graph: &WorkflowGraph, ctx: &ValidationContext<'_>) -> ValidationReport {
    let mut layers = Vec::with_capacity(4);

    let mut report = LayerReport::new(Layer::Structure);
    structure::check(graph, &mut report);
    layers.push(report);

    let mut report = LayerReport::new(Layer::Security);
    security::check(graph, ctx, &mut report);
    layers.push(report);

    let mut report = LayerReport::new(Layer::Capability);
    capability::check(graph, ctx, &mut report);
    layers.push(report);

    let mut report = LayerReport::new(Layer::Resource);
    resource::check(graph, ctx, &mut report);
    layers.push(report);

    ValidationReport { layers }
}
