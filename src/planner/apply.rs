//! Applying a planned change to one output value.

use tracing::{trace, warn};

use crate::addrs::AbsOutputAddr;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ChangeError;
use crate::eval::{EvalContext, Expression};
use crate::plans::Action;
use crate::value::{assert_compatible, ValueType};

use super::{unknown_result, OutputNode};

const INCONSISTENT_SUMMARY: &str = "Output has inconsistent result during apply";
const INCONSISTENT_HINT: &str =
    "This usually indicates a bug in a provider whose results are used in this output's value expression.";

/// Apply-walk node for one output.
#[derive(Debug, Clone)]
pub struct ApplyOutput {
    /// Output address.
    pub addr: AbsOutputAddr,
    /// Value expression, re-evaluated at apply time.
    pub expr: Expression,
}

impl ApplyOutput {
    /// Creates an apply node.
    #[must_use]
    pub const fn new(addr: AbsOutputAddr, expr: Expression) -> Self {
        Self { addr, expr }
    }

    /// Commits the planned change for this output.
    ///
    /// The expression is evaluated again rather than reusing the planned
    /// value, since unknowns from the plan may have been resolved by now.
    /// The fresh value is stored even when it is inconsistent with the
    /// plan; the inconsistency is only reported.
    pub fn apply(&self, ctx: &EvalContext) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let addr = &self.addr;

        let Some(changes) = ctx.changes() else {
            warn!("Applying {addr} with no active change set is a no-op");
            return diags;
        };

        let src = match changes.get_output_change(addr) {
            Some(src) if src.action != Action::NoOp => src,
            _ => {
                warn!("{addr} has no change planned");
                return diags;
            }
        };

        let change = match src.decode() {
            Ok(change) => change,
            Err(e) => {
                diags.push(decode_failure(addr, &e, src.sensitive));
                return diags;
            }
        };

        trace!("Applying {} change for {addr}", change.action);

        if change.action == Action::Delete {
            if let Some(state) = ctx.state() {
                state.remove_output_value(addr);
            }
            return diags;
        }

        let (value, more) = ctx.evaluate_expr(&self.expr, &ValueType::Dynamic);
        let failed = more.has_errors();
        diags.append(more);
        if failed {
            return diags;
        }

        if !value.is_wholly_known() {
            diags.push(unknown_result(addr, &self.expr));
            return diags;
        }

        let errors = assert_compatible(&change.after, &value);
        if !errors.is_empty() {
            let severity = ctx.inconsistent_result();
            if change.sensitive {
                diags.push(
                    Diagnostic::new(
                        severity,
                        INCONSISTENT_SUMMARY,
                        format!(
                            "When updating {addr} to include new values learned so far during apply, the value changed unexpectedly.\n\n{INCONSISTENT_HINT}"
                        ),
                    )
                    .with_subject(self.expr.range.clone()),
                );
            } else {
                diags.extend(errors.iter().map(|err| {
                    Diagnostic::new(
                        severity,
                        INCONSISTENT_SUMMARY,
                        format!(
                            "When updating {addr} to include new values learned so far during apply, the value changed unexpectedly: {err}.\n\n{INCONSISTENT_HINT}"
                        ),
                    )
                    .with_subject(self.expr.range.clone())
                }));
            }
        }

        let Some(state) = ctx.state() else {
            return diags;
        };
        if value.is_null() {
            trace!("Removing {addr} from state (it is now null)");
            state.remove_output_value(addr);
        } else {
            trace!("Saving new value for {addr} in state");
            state.set_output_value(addr, value, change.sensitive);
        }

        diags
    }
}

impl OutputNode for ApplyOutput {
    fn addr(&self) -> &AbsOutputAddr {
        &self.addr
    }

    fn eval(&self, ctx: &EvalContext) -> Diagnostics {
        self.apply(ctx)
    }
}

fn decode_failure(addr: &AbsOutputAddr, err: &ChangeError, sensitive: bool) -> Diagnostic {
    let detail = match err {
        ChangeError::Decode { .. } if sensitive => {
            format!("failed to decode plan for {addr}: the recorded change is malformed")
        }
        other => other.to_string(),
    };
    Diagnostic::error("Failed to read planned change", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Severity, SourceRange};
    use crate::eval::StaticEvaluator;
    use crate::planner::testing::MockEval;
    use crate::plans::{ChangeSet, OutputChange};
    use crate::state::SyncState;
    use crate::value::Value;
    use std::sync::Arc;

    fn record(changes: &ChangeSet, change: &OutputChange) {
        changes.append_output_change(change.encode().expect("encode"));
    }

    fn update(name: &str, before: Value, after: Value, sensitive: bool) -> OutputChange {
        OutputChange {
            addr: AbsOutputAddr::root(name),
            action: Action::Update,
            before,
            after,
            sensitive,
        }
    }

    fn context(eval: Arc<StaticEvaluator>, state: &Arc<SyncState>, changes: &Arc<ChangeSet>) -> EvalContext {
        EvalContext::new(eval)
            .with_state(Arc::clone(state))
            .with_changes(Arc::clone(changes))
    }

    fn node(name: &str) -> ApplyOutput {
        ApplyOutput::new(
            AbsOutputAddr::root(name),
            Expression::new(name).with_range(SourceRange::single_line("outputs.tf", 1, 9, 20)),
        )
    }

    #[test]
    fn test_resolves_unknown_to_concrete() {
        let state = Arc::new(SyncState::new());
        let changes = Arc::new(ChangeSet::new());
        let addr = AbsOutputAddr::root("count");
        state.set_output_value(&addr, Value::from(5), false);
        record(
            &changes,
            &update("count", Value::from(5), Value::unknown(ValueType::Number), false),
        );

        let eval = Arc::new(StaticEvaluator::new());
        eval.set("count", Value::from(7));
        let diags = node("count").apply(&context(eval, &state, &changes));

        assert!(diags.is_empty(), "{diags:?}");
        let stored = state.output_value(&addr).expect("value stored");
        assert_eq!(stored.value, Value::from(7));
    }

    #[test]
    fn test_inconsistent_result_is_reported_and_stored() {
        let state = Arc::new(SyncState::new());
        let changes = Arc::new(ChangeSet::new());
        let addr = AbsOutputAddr::root("count");
        record(
            &changes,
            &update("count", Value::from(5), Value::unknown(ValueType::Number), false),
        );

        let eval = Arc::new(StaticEvaluator::new());
        eval.set("count", Value::from("seven"));
        let diags = node("count").apply(&context(eval, &state, &changes));

        assert_eq!(diags.len(), 1);
        assert!(!diags.has_errors());
        let diag = diags.iter().next().expect("one diagnostic");
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.summary, INCONSISTENT_SUMMARY);
        assert!(diag
            .detail
            .contains("the value changed unexpectedly: wrong final value type: planned number, but got string."));
        assert!(diag.subject.is_some());

        let stored = state.output_value(&addr).expect("value stored anyway");
        assert_eq!(stored.value, Value::from("seven"));
    }

    #[test]
    fn test_inconsistent_sensitive_result_hides_values() {
        let state = Arc::new(SyncState::new());
        let changes = Arc::new(ChangeSet::new());
        record(
            &changes,
            &update(
                "token",
                Value::Null,
                Value::list(vec![Value::from("planned-secret"), Value::unknown(ValueType::String)]),
                true,
            ),
        );

        let eval = Arc::new(StaticEvaluator::new());
        eval.set(
            "token",
            Value::list(vec![Value::from("actual-secret"), Value::from("other-secret")]),
        );
        let ctx = context(eval, &state, &changes).with_inconsistent_result(Severity::Error);
        let diags = node("token").apply(&ctx);

        assert_eq!(diags.len(), 1);
        assert!(diags.has_errors());
        let text = diags.iter().map(ToString::to_string).collect::<String>();
        assert!(!text.contains("secret"), "{text}");
        assert!(text.contains("the value changed unexpectedly.\n"));

        let stored = state
            .output_value(&AbsOutputAddr::root("token"))
            .expect("value stored anyway");
        assert!(stored.sensitive);
    }

    #[test]
    fn test_delete_removes_without_evaluation() {
        let state = Arc::new(SyncState::new());
        let changes = Arc::new(ChangeSet::new());
        let addr = AbsOutputAddr::root("old");
        state.set_output_value(&addr, Value::from("x"), false);
        record(
            &changes,
            &OutputChange {
                addr: addr.clone(),
                action: Action::Delete,
                before: Value::from("x"),
                after: Value::Null,
                sensitive: false,
            },
        );

        let mut mock = MockEval::new();
        mock.expect_evaluate_expr().never();
        let ctx = EvalContext::new(Arc::new(mock))
            .with_state(Arc::clone(&state))
            .with_changes(changes);

        assert!(node("old").apply(&ctx).is_empty());
        assert!(state.output_value(&addr).is_none());
    }

    #[test]
    fn test_unknown_at_apply_is_fatal_and_leaves_state() {
        let state = Arc::new(SyncState::new());
        let changes = Arc::new(ChangeSet::new());
        let addr = AbsOutputAddr::root("count");
        state.set_output_value(&addr, Value::from(5), false);
        record(
            &changes,
            &update("count", Value::from(5), Value::unknown(ValueType::Number), false),
        );

        let eval = Arc::new(StaticEvaluator::new());
        eval.set("count", Value::unknown(ValueType::Number));
        let diags = node("count").apply(&context(eval, &state, &changes));

        assert!(diags.has_errors());
        let diag = diags.iter().next().expect("one diagnostic");
        assert_eq!(diag.summary, "Invalid output value result");
        assert!(diag.detail.contains("output.count"));
        assert_eq!(
            state.output_value(&addr).expect("untouched").value,
            Value::from(5)
        );
    }

    #[test]
    fn test_null_result_removes_entry() {
        let state = Arc::new(SyncState::new());
        let changes = Arc::new(ChangeSet::new());
        let addr = AbsOutputAddr::root("maybe");
        state.set_output_value(&addr, Value::from("x"), false);
        record(
            &changes,
            &update("maybe", Value::from("x"), Value::unknown(ValueType::String), false),
        );

        let eval = Arc::new(StaticEvaluator::new());
        eval.set("maybe", Value::Null);
        let diags = node("maybe").apply(&context(eval, &state, &changes));

        assert!(diags.is_empty());
        assert!(state.output_value(&addr).is_none());
    }

    #[test]
    fn test_degenerate_cases_are_noops() {
        let state = Arc::new(SyncState::new());
        let changes = Arc::new(ChangeSet::new());
        record(
            &changes,
            &OutputChange {
                action: Action::NoOp,
                ..update("same", Value::from(1), Value::from(1), false)
            },
        );

        let mut mock = MockEval::new();
        mock.expect_evaluate_expr().never();
        let mock = Arc::new(mock);

        let without_changes = EvalContext::new(mock.clone()).with_state(Arc::clone(&state));
        assert!(node("same").apply(&without_changes).is_empty());

        let ctx = EvalContext::new(mock)
            .with_state(Arc::clone(&state))
            .with_changes(changes);
        assert!(node("same").apply(&ctx).is_empty());
        assert!(node("unplanned").apply(&ctx).is_empty());
        assert!(state.is_empty());
    }

    #[test]
    fn test_tampered_change_is_fatal() {
        let state = Arc::new(SyncState::new());
        let changes = Arc::new(ChangeSet::new());
        let mut src = update("count", Value::from(5), Value::from(6), true)
            .encode()
            .expect("encode");
        src.after.bytes = b"{\"string\":\"secret\"}".to_vec();
        changes.append_output_change(src);

        let eval = Arc::new(StaticEvaluator::new());
        let diags = node("count").apply(&context(eval.clone(), &state, &changes));

        assert!(diags.has_errors());
        assert_eq!(eval.calls(), 0);
        let text = diags.iter().map(ToString::to_string).collect::<String>();
        assert!(text.contains("failed to decode plan for output.count"));
        assert!(!text.contains("secret"));
    }
}
