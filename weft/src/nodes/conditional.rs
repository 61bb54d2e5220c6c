//! Conditional node executor: evaluates the node's condition and records the
//! branch outcome.
//!
//! Edge selection happens in the engine: it evaluates each outgoing
//! conditional edge against the updated context and takes the first match,
//! earliest declared wins.

use crate::condition;
use crate::context::ExecutionContext;
use crate::error::WorkflowError;
use crate::graph::NodeSpec;
use crate::nodes::NodeStep;

pub(super) fn execute(
    spec: &NodeSpec,
    mut ctx: ExecutionContext,
) -> Result<(ExecutionContext, NodeStep), WorkflowError> {
    let expr = spec
        .config_str("condition")
        .ok_or_else(|| WorkflowError::Runtime(format!("node {} has no condition", spec.id)))?;
    // Validation parsed this already; a failure here means the graph skipped
    // validation.
    let parsed = condition::parse(expr)?;
    let outcome = parsed.evaluate(&ctx.condition_scope());
    ctx.conditional_results.insert(spec.id.clone(), outcome);
    Ok((ctx, NodeStep::Continue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeKind;
    use serde_json::Value;

    /// **Scenario**: The boolean outcome lands in conditional_results under
    /// the node id.
    #[test]
    fn records_outcome() {
        let mut spec = NodeSpec::new("check", NodeKind::Conditional);
        spec.config.insert(
            "condition".into(),
            Value::from("variable enable_memory equals true"),
        );
        let mut ctx = ExecutionContext::new("user-1", None);
        ctx.variables
            .insert("enable_memory".into(), Value::from(true));
        let (ctx, step) = execute(&spec, ctx).unwrap();
        assert_eq!(step, NodeStep::Continue);
        assert_eq!(ctx.conditional_results.get("check"), Some(&true));
    }

    /// **Scenario**: A missing condition is a runtime error (unvalidated
    /// graph).
    #[test]
    fn missing_condition_errors() {
        let spec = NodeSpec::new("check", NodeKind::Conditional);
        let ctx = ExecutionContext::new("user-1", None);
        assert!(execute(&spec, ctx).is_err());
    }
}
