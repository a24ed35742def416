//! Expression evaluation as seen by the output nodes.
//!
//! The real expression engine is an external collaborator. Nodes reach it
//! only through the [`Evaluator`] trait, bundled with the value store and
//! change set in an [`EvalContext`].

mod context;
mod fixed;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::{Diagnostics, SourceRange};
use crate::value::{Value, ValueType};

pub use context::EvalContext;
pub use fixed::StaticEvaluator;

/// A configuration expression and where it was written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expression {
    /// Source text of the expression.
    pub text: String,
    /// Location in the configuration, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
}

impl Expression {
    /// Creates an expression with no source location.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            range: None,
        }
    }

    /// Attaches a source location.
    #[must_use]
    pub fn with_range(mut self, range: SourceRange) -> Self {
        self.range = Some(range);
        self
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Turns configuration expressions into dynamic values.
///
/// Evaluation either yields a value, possibly containing unknowns or null,
/// together with non-blocking diagnostics, or yields error diagnostics and
/// no usable value. Callers must check [`Diagnostics::has_errors`] before
/// looking at the value.
///
/// Implementations may block, for example while waiting on results of other
/// nodes in the same walk.
pub trait Evaluator: Send + Sync {
    /// Evaluates `expr`, requiring the result to conform to `want`.
    fn evaluate_expr(&self, expr: &Expression, want: &ValueType) -> (Value, Diagnostics);
}
