//! Refreshing one output value outside the plan/apply protocol.

use tracing::trace;

use crate::addrs::AbsOutputAddr;
use crate::diagnostics::Diagnostics;
use crate::eval::{EvalContext, Expression};
use crate::value::ValueType;

use super::{unknown_result, OutputNode};

/// Refresh-walk node for one output.
///
/// Only for walks where no user-directed change is expected. Writes the
/// store directly and never touches the change set.
#[derive(Debug, Clone)]
pub struct RefreshOutput {
    /// Output address.
    pub addr: AbsOutputAddr,
    /// Sensitivity to store the value with.
    pub sensitive: bool,
    /// Value expression.
    pub expr: Expression,
}

impl RefreshOutput {
    /// Creates a refresh node.
    #[must_use]
    pub const fn new(addr: AbsOutputAddr, sensitive: bool, expr: Expression) -> Self {
        Self {
            addr,
            sensitive,
            expr,
        }
    }

    /// Re-evaluates the output and stores the result.
    pub fn refresh(&self, ctx: &EvalContext) -> Diagnostics {
        let addr = &self.addr;

        // Evaluation reads the store, so it runs before the store is used.
        let (value, mut diags) = ctx.evaluate_expr(&self.expr, &ValueType::Dynamic);

        let Some(state) = ctx.state() else {
            return Diagnostics::new();
        };

        if diags.has_errors() {
            return diags;
        }

        if !value.is_wholly_known() {
            diags.push(unknown_result(addr, &self.expr));
            return diags;
        }

        if value.is_null() {
            trace!("Removing {addr} from state (it is now null)");
            state.remove_output_value(addr);
        } else {
            trace!("Saving value for {addr} in state");
            state.set_output_value(addr, value, self.sensitive);
        }

        diags
    }
}

impl OutputNode for RefreshOutput {
    fn addr(&self) -> &AbsOutputAddr {
        &self.addr
    }

    fn eval(&self, ctx: &EvalContext) -> Diagnostics {
        self.refresh(ctx)
    }
}
