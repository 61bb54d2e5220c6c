//! Error-handler node executor.
//!
//! The node itself only opens the protected region: it seeds the retry state
//! for its id and continues into the region. The engine catches downstream
//! errors, consumes retries by rewinding to this node's successor, and takes
//! the `fallback` edge once retries are exhausted. The region is identified
//! by graph position, not call stack.

use crate::context::{ErrorState, ExecutionContext};
use crate::error::WorkflowError;
use crate::graph::NodeSpec;
use crate::nodes::NodeStep;

pub(super) fn execute(
    spec: &NodeSpec,
    mut ctx: ExecutionContext,
) -> Result<(ExecutionContext, NodeStep), WorkflowError> {
    ctx.error_state
        .entry(spec.id.clone())
        .or_insert_with(ErrorState::default);
    Ok((ctx, NodeStep::Continue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeKind;

    /// **Scenario**: Entering the handler seeds its retry state once and
    /// preserves attempts on re-entry.
    #[test]
    fn seeds_state_once() {
        let spec = NodeSpec::new("guard", NodeKind::ErrorHandler);
        let ctx = ExecutionContext::new("user-1", None);
        let (mut ctx, step) = execute(&spec, ctx).unwrap();
        assert_eq!(step, NodeStep::Continue);
        assert_eq!(ctx.error_state["guard"].attempts, 0);

        ctx.error_state.get_mut("guard").unwrap().attempts = 2;
        let (ctx, _) = execute(&spec, ctx).unwrap();
        assert_eq!(ctx.error_state["guard"].attempts, 2);
    }
}
