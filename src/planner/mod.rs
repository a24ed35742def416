//! The three phase drivers for output values.
//!
//! Each driver is one node of a graph walk and handles a single output:
//!
//! - [`PlanOutput`] decides the change for the plan walk;
//! - [`ApplyOutput`] commits a previously planned change;
//! - [`RefreshOutput`] resynchronizes stored state outside plan and apply.
//!
//! All of them implement [`OutputNode`] so a walk driver can run them
//! uniformly. Failures are reported as diagnostics, never as panics.

mod apply;
mod plan;
mod refresh;

use serde::{Deserialize, Serialize};

use crate::addrs::AbsOutputAddr;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::eval::{EvalContext, Expression};

pub use apply::ApplyOutput;
pub use plan::PlanOutput;
pub use refresh::RefreshOutput;

/// The configuration of one output value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDecl {
    /// Value expression.
    pub expr: Expression,
    /// Whether the output was declared sensitive.
    #[serde(default)]
    pub sensitive: bool,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OutputDecl {
    /// Creates a non-sensitive declaration.
    #[must_use]
    pub fn new(expr: Expression) -> Self {
        Self {
            expr,
            sensitive: false,
            description: None,
        }
    }

    /// Marks the output sensitive.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// A graph node that handles one output value in one phase.
pub trait OutputNode: Send + Sync {
    /// Returns the output this node handles.
    fn addr(&self) -> &AbsOutputAddr;

    /// Runs the node, returning the diagnostics it produced.
    fn eval(&self, ctx: &EvalContext) -> Diagnostics;
}

/// Reports a result that still contains unknowns in a phase where none are
/// allowed. This always points at a missing dependency somewhere else.
fn unknown_result(addr: &AbsOutputAddr, expr: &Expression) -> Diagnostic {
    Diagnostic::error(
        "Invalid output value result",
        format!(
            "The result of {addr} contains unknown values. This is a bug in the engine; please report it!"
        ),
    )
    .with_subject(expr.range.clone())
}

#[cfg(test)]
pub(crate) mod testing {
    use mockall::mock;

    use crate::diagnostics::Diagnostics;
    use crate::eval::{Evaluator, Expression};
    use crate::value::{Value, ValueType};

    mock! {
        pub Eval {}

        impl Evaluator for Eval {
            fn evaluate_expr(&self, expr: &Expression, want: &ValueType) -> (Value, Diagnostics);
        }
    }
}
