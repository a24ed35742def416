//! Planning the change for one output value.

use tracing::{trace, warn};

use crate::addrs::AbsOutputAddr;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::eval::EvalContext;
use crate::plans::{Action, OutputChange};
use crate::value::{Value, ValueType};

use super::{OutputDecl, OutputNode};

/// Plan-walk node for one output.
#[derive(Debug, Clone)]
pub struct PlanOutput {
    /// Output address.
    pub addr: AbsOutputAddr,
    /// Current configuration; `None` when the output was removed.
    pub config: Option<OutputDecl>,
    /// Plan deletion even if the output is still configured.
    pub force_delete: bool,
}

impl PlanOutput {
    /// Creates a node for a configured output.
    #[must_use]
    pub const fn new(addr: AbsOutputAddr, config: OutputDecl) -> Self {
        Self {
            addr,
            config: Some(config),
            force_delete: false,
        }
    }

    /// Creates a node for an output that is no longer configured.
    #[must_use]
    pub const fn removed(addr: AbsOutputAddr) -> Self {
        Self {
            addr,
            config: None,
            force_delete: false,
        }
    }

    /// Requests deletion regardless of configuration.
    #[must_use]
    pub const fn with_force_delete(mut self, force_delete: bool) -> Self {
        self.force_delete = force_delete;
        self
    }

    /// Computes and records the planned change.
    ///
    /// The change goes into the context's change set. The store receives
    /// the planned value with unknowns collapsed to null so that later
    /// evaluation in the same walk sees a best-effort current value.
    ///
    /// Returns `None` when evaluation failed or the change could not be
    /// encoded; the diagnostics say why.
    pub fn plan(&self, ctx: &EvalContext) -> (Option<OutputChange>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let addr = &self.addr;

        let prior = ctx.state().and_then(|state| state.output_value(addr));
        let before = prior.as_ref().map_or(Value::Null, |o| o.value.clone());
        let sensitive = prior.as_ref().is_some_and(|o| o.sensitive)
            || self.config.as_ref().is_some_and(|c| c.sensitive);

        let change = match &self.config {
            Some(config) if !self.force_delete => {
                let (after, more) = ctx.evaluate_expr(&config.expr, &ValueType::Dynamic);
                let failed = more.has_errors();
                diags.append(more);
                if failed {
                    return (None, diags);
                }

                let action = if after.equals(&before) == Some(true) {
                    Action::NoOp
                } else if prior.is_none() {
                    Action::Create
                } else {
                    Action::Update
                };

                OutputChange {
                    addr: addr.clone(),
                    action,
                    before,
                    after,
                    sensitive,
                }
            }
            _ => OutputChange {
                addr: addr.clone(),
                action: Action::Delete,
                before,
                after: Value::Null,
                sensitive,
            },
        };

        let src = match change.encode() {
            Ok(src) => src,
            Err(e) => {
                diags.push(Diagnostic::error("Failed to record planned change", e.to_string()));
                return (None, diags);
            }
        };

        match ctx.changes() {
            Some(changes) => {
                trace!("Recording {} change for {addr}", src.action);
                changes.append_output_change(src);
            }
            None => warn!("Planning {addr} with no active change set; change not recorded"),
        }

        if let Some(state) = ctx.state() {
            state.set_output_value(addr, change.after.unknown_as_null(), change.sensitive);
        }

        (Some(change), diags)
    }
}

impl OutputNode for PlanOutput {
    fn addr(&self) -> &AbsOutputAddr {
        &self.addr
    }

    fn eval(&self, ctx: &EvalContext) -> Diagnostics {
        self.plan(ctx).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Expression, StaticEvaluator};
    use crate::planner::testing::MockEval;
    use crate::plans::ChangeSet;
    use crate::state::SyncState;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        eval: Arc<StaticEvaluator>,
        state: Arc<SyncState>,
        changes: Arc<ChangeSet>,
        ctx: EvalContext,
    }

    fn fixture() -> Fixture {
        let eval = Arc::new(StaticEvaluator::new());
        let state = Arc::new(SyncState::new());
        let changes = Arc::new(ChangeSet::new());
        let ctx = EvalContext::new(eval.clone())
            .with_state(Arc::clone(&state))
            .with_changes(Arc::clone(&changes));
        Fixture {
            eval,
            state,
            changes,
            ctx,
        }
    }

    fn node(name: &str) -> PlanOutput {
        PlanOutput::new(AbsOutputAddr::root(name), OutputDecl::new(Expression::new(name)))
    }

    fn planned_action(f: &Fixture, name: &str) -> Action {
        let (change, diags) = node(name).plan(&f.ctx);
        assert!(!diags.has_errors(), "{diags:?}");
        change.expect("change should be planned").action
    }

    #[test]
    fn test_action_classification() {
        let f = fixture();
        let cases = [
            (None, Value::from("hello"), Action::Create),
            (Some(Value::from("hello")), Value::from("hello"), Action::NoOp),
            (Some(Value::from(5)), Value::from(6), Action::Update),
            (Some(Value::from(json!([1, 2]))), Value::from(json!([1, 2])), Action::NoOp),
            (Some(Value::from(1)), Value::from(json!(1.0)), Action::NoOp),
        ];

        for (i, (prior, after, expected)) in cases.into_iter().enumerate() {
            let name = format!("case{i}");
            if let Some(prior) = prior {
                f.state
                    .set_output_value(&AbsOutputAddr::root(name.as_str()), prior, false);
            }
            f.eval.set(name.as_str(), after);
            assert_eq!(planned_action(&f, &name), expected, "case {i}");
        }
    }

    #[test]
    fn test_unknown_after_is_never_noop() {
        let f = fixture();
        let addr = AbsOutputAddr::root("count");
        f.state.set_output_value(&addr, Value::from(5), false);
        f.eval.set("count", Value::unknown(ValueType::Number));

        assert_eq!(planned_action(&f, "count"), Action::Update);

        f.eval.set("fresh", Value::unknown(ValueType::Number));
        assert_eq!(planned_action(&f, "fresh"), Action::Create);
    }

    #[test]
    fn test_records_change_and_collapsed_state() {
        let f = fixture();
        let addr = AbsOutputAddr::root("endpoint");
        f.eval.set(
            "endpoint",
            Value::map([
                ("host", Value::unknown(ValueType::String)),
                ("port", Value::from(443)),
            ]),
        );

        let (change, _) = node("endpoint").plan(&f.ctx);
        let change = change.expect("change should be planned");

        let recorded = f
            .changes
            .get_output_change(&addr)
            .expect("change should be recorded")
            .decode()
            .expect("decode");
        assert_eq!(recorded, change);
        assert!(!recorded.after.is_wholly_known());

        let stored = f.state.output_value(&addr).expect("collapsed value stored");
        assert_eq!(
            stored.value,
            Value::map([("host", Value::Null), ("port", Value::from(443))])
        );
    }

    #[test]
    fn test_removed_or_forced_is_delete_without_evaluation() {
        let addr = AbsOutputAddr::root("old");
        for plan_node in [
            PlanOutput::removed(addr.clone()),
            node("old").with_force_delete(true),
        ] {
            let mut mock = MockEval::new();
            mock.expect_evaluate_expr().never();
            let state = Arc::new(SyncState::new());
            state.set_output_value(&addr, Value::from("x"), false);
            let ctx = EvalContext::new(Arc::new(mock))
                .with_state(Arc::clone(&state))
                .with_changes(Arc::new(ChangeSet::new()));

            let (change, diags) = plan_node.plan(&ctx);
            assert!(diags.is_empty());
            let change = change.expect("change should be planned");
            assert_eq!(change.action, Action::Delete);
            assert_eq!(change.before, Value::from("x"));
            assert_eq!(change.after, Value::Null);
            assert!(state.output_value(&addr).is_none());
        }
    }

    #[test]
    fn test_sensitivity_is_inherited_from_prior_state() {
        let f = fixture();
        let addr = AbsOutputAddr::root("token");
        f.state.set_output_value(&addr, Value::from("abc"), true);
        f.eval.set("token", Value::from("def"));

        let (change, _) = node("token").plan(&f.ctx);
        assert!(change.expect("change should be planned").sensitive);

        let decl = OutputDecl::new(Expression::new("token")).sensitive();
        let (change, _) = PlanOutput::new(AbsOutputAddr::root("other"), decl).plan(&f.ctx);
        assert!(change.expect("change should be planned").sensitive);
    }

    #[test]
    fn test_evaluation_error_records_nothing() {
        let f = fixture();
        f.eval.fail("bad", "unsupported operator");

        let (change, diags) = node("bad").plan(&f.ctx);
        assert!(change.is_none());
        assert!(diags.has_errors());
        assert!(f.changes.is_empty());
        assert!(f.state.is_empty());
    }

    #[test]
    fn test_encode_failure_is_fatal() {
        let f = fixture();
        let mut deep = Value::from(1);
        for _ in 0..=crate::plans::MAX_VALUE_DEPTH {
            deep = Value::list(vec![deep]);
        }
        f.eval.set("deep", deep);

        let (change, diags) = node("deep").plan(&f.ctx);
        assert!(change.is_none());
        assert!(diags.has_errors());
        assert!(f.changes.is_empty());
        assert!(f.state.is_empty());
    }

    #[test]
    fn test_missing_collaborators_are_tolerated() {
        let eval = Arc::new(StaticEvaluator::new());
        eval.set("x", Value::from("v"));
        let ctx = EvalContext::new(eval);

        let (change, diags) = node("x").plan(&ctx);
        assert!(diags.is_empty());
        assert_eq!(change.expect("change should be planned").action, Action::Create);
    }
}
