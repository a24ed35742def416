//! Drives the walks described by a scenario.
//!
//! Each output's expression is its own address; the scenario supplies what
//! that expression evaluates to in each phase. Every walk starts from the
//! scenario's prior state, as it would when plan and apply run as separate
//! processes.

use std::sync::Arc;
use tracing::info;

use crate::addrs::AbsOutputAddr;
use crate::config::{ScenarioConfig, Settings};
use crate::error::Result;
use crate::eval::{EvalContext, Expression, StaticEvaluator};
use crate::planner::{ApplyOutput, OutputDecl, OutputNode, PlanOutput, RefreshOutput};
use crate::plans::ChangeSet;
use crate::state::{StateSnapshot, SyncState};
use crate::value::Value;
use crate::walker::{Phase, WalkResult, Walker};

/// Result of a plan walk.
#[derive(Debug)]
pub struct PlanReport {
    /// The recorded changes.
    pub changes: Arc<ChangeSet>,
    /// Walk outcome.
    pub result: WalkResult,
}

/// Result of an apply or refresh walk.
#[derive(Debug)]
pub struct WalkReport {
    /// Walk outcome.
    pub result: WalkResult,
    /// Stored outputs after the walk.
    pub state: StateSnapshot,
}

/// One configured output with its per-phase values resolved.
#[derive(Debug)]
struct Output {
    addr: AbsOutputAddr,
    decl: OutputDecl,
    plan: Value,
    apply: Value,
    refresh: Value,
}

/// A scenario ready to be walked.
#[derive(Debug)]
pub struct Session {
    prior: StateSnapshot,
    outputs: Vec<Output>,
    removed: Vec<AbsOutputAddr>,
    settings: Settings,
    walker: Walker,
}

impl Session {
    /// Resolves every address and value in a scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if an address or value in the scenario is invalid.
    pub fn new(config: &ScenarioConfig) -> Result<Self> {
        let outputs = config
            .outputs
            .iter()
            .map(|scenario| {
                let addr = scenario.addr()?;
                let decl = OutputDecl {
                    expr: Expression::new(addr.to_string()),
                    sensitive: scenario.sensitive,
                    description: scenario.description.clone(),
                };
                Ok(Output {
                    addr,
                    decl,
                    plan: scenario.plan_value()?,
                    apply: scenario.apply_value()?,
                    refresh: scenario.refresh_value()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            prior: config.prior_snapshot()?,
            outputs,
            removed: config.removed_addresses()?,
            settings: config.settings.clone(),
            walker: Walker::new(config.settings.parallelism),
        })
    }

    /// Returns the stored outputs the walks start from.
    #[must_use]
    pub const fn prior_state(&self) -> &StateSnapshot {
        &self.prior
    }

    /// Runs the plan walk.
    pub async fn plan(&self, destroy: bool) -> PlanReport {
        let eval = self.evaluator(|o| &o.plan);
        let changes = Arc::new(ChangeSet::new());
        let (ctx, _state) = self.context(eval, Some(Arc::clone(&changes)));
        info!("Planning {} outputs (plan {})", self.outputs.len(), changes.id());

        let mut nodes: Vec<Arc<dyn OutputNode>> = self
            .outputs
            .iter()
            .map(|o| {
                Arc::new(PlanOutput::new(o.addr.clone(), o.decl.clone()).with_force_delete(destroy))
                    as Arc<dyn OutputNode>
            })
            .collect();
        nodes.extend(
            self.removed
                .iter()
                .map(|addr| Arc::new(PlanOutput::removed(addr.clone())) as Arc<dyn OutputNode>),
        );

        let result = self.walker.walk(Phase::Plan, &ctx, nodes).await;
        PlanReport { changes, result }
    }

    /// Runs the apply walk for a plan produced by [`Session::plan`].
    pub async fn apply(&self, changes: Arc<ChangeSet>) -> WalkReport {
        let eval = self.evaluator(|o| &o.apply);
        let (ctx, state) = self.context(eval, Some(changes));

        let nodes = self
            .outputs
            .iter()
            .map(|o| (&o.addr, o.decl.expr.clone()))
            .chain(
                self.removed
                    .iter()
                    .map(|addr| (addr, Expression::new(addr.to_string()))),
            )
            .map(|(addr, expr)| Arc::new(ApplyOutput::new(addr.clone(), expr)) as Arc<dyn OutputNode>)
            .collect();

        let result = self.walker.walk(Phase::Apply, &ctx, nodes).await;
        WalkReport {
            result,
            state: state.snapshot(),
        }
    }

    /// Runs the refresh walk.
    pub async fn refresh(&self) -> WalkReport {
        let eval = self.evaluator(|o| &o.refresh);
        let (ctx, state) = self.context(eval, None);

        let nodes = self
            .outputs
            .iter()
            .map(|o| {
                Arc::new(RefreshOutput::new(
                    o.addr.clone(),
                    o.decl.sensitive,
                    o.decl.expr.clone(),
                )) as Arc<dyn OutputNode>
            })
            .collect();

        let result = self.walker.walk(Phase::Refresh, &ctx, nodes).await;
        WalkReport {
            result,
            state: state.snapshot(),
        }
    }

    fn evaluator(&self, value_of: impl Fn(&Output) -> &Value) -> Arc<StaticEvaluator> {
        let eval = StaticEvaluator::new();
        for output in &self.outputs {
            eval.set(output.decl.expr.text.clone(), value_of(output).clone());
        }
        Arc::new(eval)
    }

    fn context(
        &self,
        eval: Arc<StaticEvaluator>,
        changes: Option<Arc<ChangeSet>>,
    ) -> (EvalContext, Arc<SyncState>) {
        let state = Arc::new(SyncState::from_snapshot(self.prior.clone()));
        let mut ctx = EvalContext::new(eval)
            .with_state(Arc::clone(&state))
            .with_inconsistent_result(self.settings.inconsistent_result);
        if let Some(changes) = changes {
            ctx = ctx.with_changes(changes);
        }
        (ctx, state)
    }
}
