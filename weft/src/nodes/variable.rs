//! Variable node executor: set/get/append/increment/decrement over the
//! execution variables.
//!
//! `set` with an object value also flattens the object's top-level keys into
//! individual variables, so a seeded capabilities object is addressable as
//! `variable enable_tools ...` in conditions. A string value of the form
//! `variable NAME` (or `$NAME`) reads another variable.

use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::WorkflowError;
use crate::graph::NodeSpec;
use crate::nodes::NodeStep;

pub(super) fn execute(
    spec: &NodeSpec,
    mut ctx: ExecutionContext,
) -> Result<(ExecutionContext, NodeStep), WorkflowError> {
    let operation = spec
        .config_str("operation")
        .ok_or_else(|| WorkflowError::Runtime(format!("node {} has no operation", spec.id)))?
        .to_string();
    let name = spec
        .config_str("variable_name")
        .ok_or_else(|| WorkflowError::Runtime(format!("node {} has no variable_name", spec.id)))?
        .to_string();
    let value = spec.config.get("value").map(|v| resolve(&ctx, v));

    match operation.as_str() {
        "set" => {
            let value = value.unwrap_or(Value::Null);
            if let Value::Object(ref map) = value {
                for (k, v) in map {
                    ctx.variables.insert(k.clone(), v.clone());
                }
            }
            ctx.variables.insert(name, value);
        }
        "get" => {
            let current = ctx.variables.get(&name).cloned().unwrap_or(Value::Null);
            ctx.metadata.insert(format!("variable_{name}"), current);
        }
        "append" => {
            let value = value.unwrap_or(Value::Null);
            match ctx.variables.get_mut(&name) {
                Some(Value::Array(items)) => items.push(value),
                Some(Value::String(s)) => {
                    if let Value::String(suffix) = value {
                        s.push_str(&suffix);
                    } else {
                        s.push_str(&value.to_string());
                    }
                }
                Some(other) => {
                    let prior = other.take();
                    ctx.variables
                        .insert(name, Value::Array(vec![prior, value]));
                }
                None => {
                    ctx.variables.insert(name, Value::Array(vec![value]));
                }
            }
        }
        "increment" | "decrement" => {
            let amount = value.as_ref().and_then(Value::as_f64).unwrap_or(1.0);
            let current = ctx
                .variables
                .get(&name)
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let next = if operation == "increment" {
                current + amount
            } else {
                current - amount
            };
            // Keep integers integral so conditions compare cleanly.
            let next_value = if next.fract() == 0.0 {
                Value::from(next as i64)
            } else {
                Value::from(next)
            };
            ctx.variables.insert(name, next_value);
        }
        other => {
            return Err(WorkflowError::Runtime(format!(
                "node {} has unknown variable operation: {other}",
                spec.id
            )))
        }
    }

    Ok((ctx, NodeStep::Continue))
}

/// Resolves variable references: `variable NAME` or `$NAME` strings read the
/// named variable; everything else is a literal.
fn resolve(ctx: &ExecutionContext, value: &Value) -> Value {
    if let Value::String(s) = value {
        let referenced = s
            .strip_prefix("variable ")
            .or_else(|| s.strip_prefix('$'));
        if let Some(name) = referenced {
            return ctx.variables.get(name.trim()).cloned().unwrap_or(Value::Null);
        }
    }
    value.clone()
}
