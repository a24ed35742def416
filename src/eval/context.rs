//! The capabilities passed to every output node.

use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{Diagnostics, Severity};
use crate::plans::ChangeSet;
use crate::state::SyncState;
use crate::value::{Value, ValueType};

use super::{Evaluator, Expression};

/// Ambient evaluation context for one walk.
///
/// Cloning is cheap; all clones share the same evaluator, store, and change
/// set. The store and change set are optional so that nodes can run in
/// reduced contexts, such as a refresh without persisted state.
#[derive(Clone)]
pub struct EvalContext {
    evaluator: Arc<dyn Evaluator>,
    state: Option<Arc<SyncState>>,
    changes: Option<Arc<ChangeSet>>,
    inconsistent_result: Severity,
}

impl EvalContext {
    /// Creates a context with no store and no change set.
    #[must_use]
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            state: None,
            changes: None,
            inconsistent_result: Severity::Warning,
        }
    }

    /// Sets the value store.
    #[must_use]
    pub fn with_state(mut self, state: Arc<SyncState>) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the change set.
    #[must_use]
    pub fn with_changes(mut self, changes: Arc<ChangeSet>) -> Self {
        self.changes = Some(changes);
        self
    }

    /// Sets the severity used when an applied value is inconsistent with
    /// its plan.
    #[must_use]
    pub const fn with_inconsistent_result(mut self, severity: Severity) -> Self {
        self.inconsistent_result = severity;
        self
    }

    /// Evaluates an expression with the context's evaluator.
    #[must_use]
    pub fn evaluate_expr(&self, expr: &Expression, want: &ValueType) -> (Value, Diagnostics) {
        self.evaluator.evaluate_expr(expr, want)
    }

    /// Returns the value store, if any.
    #[must_use]
    pub fn state(&self) -> Option<&SyncState> {
        self.state.as_deref()
    }

    /// Returns the change set, if any.
    #[must_use]
    pub fn changes(&self) -> Option<&ChangeSet> {
        self.changes.as_deref()
    }

    /// Returns the severity for inconsistent apply results.
    #[must_use]
    pub const fn inconsistent_result(&self) -> Severity {
        self.inconsistent_result
    }
}

impl fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalContext")
            .field("state", &self.state.is_some())
            .field("changes", &self.changes.is_some())
            .field("inconsistent_result", &self.inconsistent_result)
            .finish_non_exhaustive()
    }
}
