//! Loop node executor: iteration bookkeeping and body/exit routing.
//!
//! First entry seeds the loop state at iteration 0; each re-entry
//! increments. The loop exits when the iteration count reaches
//! `max_iterations` or the optional condition turns false. Routing is by
//! edge label: `body` re-enters, `exit` leaves.

use chrono::Utc;

use crate::condition;
use crate::context::{ExecutionContext, LoopState};
use crate::error::WorkflowError;
use crate::graph::NodeSpec;
use crate::nodes::NodeStep;

pub(super) fn execute(
    spec: &NodeSpec,
    mut ctx: ExecutionContext,
) -> Result<(ExecutionContext, NodeStep), WorkflowError> {
    let iteration = match ctx.loop_state.get_mut(&spec.id) {
        Some(state) => {
            state.iteration += 1;
            state.iteration
        }
        None => {
            ctx.loop_state.insert(
                spec.id.clone(),
                LoopState {
                    iteration: 0,
                    started_at: Utc::now(),
                },
            );
            0
        }
    };

    let max_iterations = spec.config_u64("max_iterations").ok_or_else(|| {
        WorkflowError::Runtime(format!("loop node {} has no max_iterations", spec.id))
    })? as u32;

    let condition_holds = match spec.config_str("condition") {
        Some(expr) => condition::parse(expr)?.evaluate(&ctx.condition_scope()),
        None => true,
    };

    let step = if iteration < max_iterations && condition_holds {
        NodeStep::Label("body")
    } else {
        NodeStep::Label("exit")
    };
    Ok((ctx, step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeKind;
    use serde_json::Value;

    fn loop_spec(max_iterations: u64) -> NodeSpec {
        let mut spec = NodeSpec::new("again", NodeKind::Loop);
        spec.config
            .insert("max_iterations".into(), Value::from(max_iterations));
        spec
    }

    /// **Scenario**: max_iterations=1 takes the body exactly once before
    /// exiting.
    #[test]
    fn single_iteration_boundary() {
        let spec = loop_spec(1);
        let ctx = ExecutionContext::new("user-1", None);
        let (ctx, step) = execute(&spec, ctx).unwrap();
        assert_eq!(step, NodeStep::Label("body"));
        assert_eq!(ctx.loop_state["again"].iteration, 0);
        let (ctx, step) = execute(&spec, ctx).unwrap();
        assert_eq!(step, NodeStep::Label("exit"));
        assert_eq!(ctx.loop_state["again"].iteration, 1);
    }

    /// **Scenario**: A false condition exits even with iterations remaining.
    #[test]
    fn condition_exits_early() {
        let mut spec = loop_spec(100);
        spec.config.insert(
            "condition".into(),
            Value::from("variable keep_going equals true"),
        );
        let ctx = ExecutionContext::new("user-1", None);
        let (_, step) = execute(&spec, ctx).unwrap();
        assert_eq!(step, NodeStep::Label("exit"));
    }

    /// **Scenario**: Three iterations under max_iterations=3, then exit.
    #[test]
    fn runs_to_cap() {
        let spec = loop_spec(3);
        let mut ctx = ExecutionContext::new("user-1", None);
        let mut bodies = 0;
        loop {
            let (next, step) = execute(&spec, ctx).unwrap();
            ctx = next;
            match step {
                NodeStep::Label("body") => bodies += 1,
                NodeStep::Label("exit") => break,
                other => panic!("unexpected step {other:?}"),
            }
        }
        assert_eq!(bodies, 3);
    }
}
