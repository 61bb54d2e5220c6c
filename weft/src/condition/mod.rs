//! Condition expression language for conditional nodes and edges.
//!
//! A deliberately small grammar, parsed eagerly at graph-compile time by a
//! hand-written recursive-descent parser and evaluated by an interpreter over
//! the AST:
//!
//! ```text
//! condition := term (("AND" | "OR") term)*
//! term      := "variable" IDENT ("equals" | "not_equals") VALUE
//!            | "tool_calls" CMP (NUMBER | "variable" IDENT)
//!            | "has_tool_calls"
//!            | "no_tool_calls"
//! CMP       := "<" | "<=" | ">=" | ">" | "=="
//! VALUE     := "true" | "false" | NUMBER | quoted string | bare word
//! ```
//!
//! `AND`/`OR` have equal precedence and associate left. Evaluation reads the
//! execution context's variables, tool-call count, and the synthetic
//! has-tool-calls flag set by the model executor. A malformed condition is a
//! structure-layer validation error, never a runtime one.

mod parser;

pub use parser::parse;

use serde_json::{Map, Value};
use thiserror::Error;

/// Parse error for a condition expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("empty condition")]
    Empty,
    #[error("unexpected token `{0}` at position {1}")]
    UnexpectedToken(String, usize),
    #[error("expected {expected} at position {position}, found `{found}`")]
    Expected {
        expected: &'static str,
        found: String,
        position: usize,
    },
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("trailing input after expression: `{0}`")]
    TrailingInput(String),
}

/// Comparison operator for `tool_calls`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Ge,
    Gt,
    Eq,
}

impl CmpOp {
    fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Eq => (lhs - rhs).abs() < f64::EPSILON,
        }
    }
}

/// Literal on the right-hand side of a variable comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Str(String),
}

impl Literal {
    /// Compares against a JSON value from the variable map. A missing
    /// variable arrives as `None` and never equals any literal.
    fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else { return false };
        match self {
            Literal::Bool(b) => value.as_bool() == Some(*b),
            Literal::Number(n) => value.as_f64().map(|v| (v - n).abs() < f64::EPSILON) == Some(true),
            Literal::Str(s) => value.as_str() == Some(s.as_str()),
        }
    }
}

/// Right-hand side of a `tool_calls` comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum CountRhs {
    Number(f64),
    Variable(String),
}

/// One atomic term of a condition.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    /// `variable NAME equals|not_equals VALUE`
    Variable {
        name: String,
        negated: bool,
        value: Literal,
    },
    /// `tool_calls CMP rhs`
    ToolCalls { op: CmpOp, rhs: CountRhs },
    /// `has_tool_calls`
    HasToolCalls,
    /// `no_tool_calls`
    NoToolCalls,
}

/// Logical connective between terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Logical {
    And,
    Or,
}

/// Parsed condition: terms joined left-to-right by AND/OR.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionExpr {
    pub first: Term,
    pub rest: Vec<(Logical, Term)>,
}

/// Read-only view of the execution state a condition can observe.
pub struct ConditionScope<'a> {
    pub variables: &'a Map<String, Value>,
    pub tool_call_count: u32,
    pub has_tool_calls: bool,
}

impl ConditionExpr {
    /// Evaluates left to right with equal AND/OR precedence.
    pub fn evaluate(&self, scope: &ConditionScope<'_>) -> bool {
        let mut acc = eval_term(&self.first, scope);
        for (op, term) in &self.rest {
            let rhs = eval_term(term, scope);
            acc = match op {
                Logical::And => acc && rhs,
                Logical::Or => acc || rhs,
            };
        }
        acc
    }
}

fn eval_term(term: &Term, scope: &ConditionScope<'_>) -> bool {
    match term {
        Term::Variable {
            name,
            negated,
            value,
        } => {
            let matched = value.matches(scope.variables.get(name));
            if *negated {
                !matched
            } else {
                matched
            }
        }
        Term::ToolCalls { op, rhs } => {
            let rhs = match rhs {
                CountRhs::Number(n) => *n,
                // A missing numeric variable counts as 0; the validator has
                // no visibility into runtime variables.
                CountRhs::Variable(name) => scope
                    .variables
                    .get(name)
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
            };
            op.apply(scope.tool_call_count as f64, rhs)
        }
        Term::HasToolCalls => scope.has_tool_calls,
        Term::NoToolCalls => !scope.has_tool_calls,
    }
}
