//! The change set for an in-progress plan.
//!
//! Populated by the plan walk and read back, unmodified, by the apply walk.
//! Holds at most one change per output address; recording a second change
//! for the same address replaces the first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;
use uuid::Uuid;

use crate::addrs::AbsOutputAddr;

use super::action::Action;
use super::change::OutputChangeSrc;

/// Internally synchronized collection of planned output changes.
#[derive(Debug)]
pub struct ChangeSet {
    /// Identifier of the plan this change set belongs to.
    id: Uuid,
    /// When the plan was started.
    created_at: DateTime<Utc>,
    /// Recorded changes by address.
    outputs: Mutex<BTreeMap<AbsOutputAddr, OutputChangeSrc>>,
}

/// Counts of planned changes by action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    /// Outputs to be created.
    pub creates: usize,
    /// Outputs to be updated.
    pub updates: usize,
    /// Outputs to be deleted.
    pub deletes: usize,
    /// Outputs left unchanged.
    pub unchanged: usize,
}

impl ChangeSet {
    /// Creates an empty change set for a new plan.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            outputs: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the plan identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns when the plan was started.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Records a planned change, replacing any earlier change for the same
    /// address.
    pub fn append_output_change(&self, change: OutputChangeSrc) {
        let addr = change.addr.clone();
        if self.lock().insert(addr.clone(), change).is_some() {
            warn!("Replaced previously recorded change for {addr}");
        }
    }

    /// Returns a copy of the recorded change for `addr`.
    #[must_use]
    pub fn get_output_change(&self, addr: &AbsOutputAddr) -> Option<OutputChangeSrc> {
        self.lock().get(addr).cloned()
    }

    /// Returns copies of all recorded changes, ordered by address.
    #[must_use]
    pub fn output_changes(&self) -> Vec<OutputChangeSrc> {
        self.lock().values().cloned().collect()
    }

    /// Counts recorded changes by action.
    #[must_use]
    pub fn summary(&self) -> ChangeSummary {
        let outputs = self.lock();
        let count = |action: Action| outputs.values().filter(|c| c.action == action).count();

        ChangeSummary {
            creates: count(Action::Create),
            updates: count(Action::Update),
            deletes: count(Action::Delete),
            unchanged: count(Action::NoOp),
        }
    }

    /// Returns the number of recorded changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<AbsOutputAddr, OutputChangeSrc>> {
        self.outputs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ChangeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSummary {
    /// Returns true if any output changes.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.creates > 0 || self.updates > 0 || self.deletes > 0
    }

    /// Returns the total number of changing outputs.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

impl std::fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.has_changes() {
            return write!(f, "No changes.");
        }
        write!(
            f,
            "{} to add, {} to change, {} to destroy.",
            self.creates, self.updates, self.deletes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::OutputChange;
    use crate::value::Value;

    fn change(name: &str, action: Action, after: Value) -> OutputChangeSrc {
        OutputChange {
            addr: AbsOutputAddr::root(name),
            action,
            before: Value::Null,
            after,
            sensitive: false,
        }
        .encode()
        .expect("encode")
    }

    #[test]
    fn test_append_and_get() {
        let changes = ChangeSet::new();
        assert!(changes.is_empty());

        changes.append_output_change(change("a", Action::Create, Value::from("x")));
        let got = changes
            .get_output_change(&AbsOutputAddr::root("a"))
            .expect("change should be recorded");
        assert_eq!(got.action, Action::Create);
        assert!(changes.get_output_change(&AbsOutputAddr::root("b")).is_none());
    }

    #[test]
    fn test_duplicate_address_last_write_wins() {
        let changes = ChangeSet::new();
        changes.append_output_change(change("a", Action::Create, Value::from("first")));
        changes.append_output_change(change("a", Action::Delete, Value::Null));

        assert_eq!(changes.len(), 1);
        let got = changes
            .get_output_change(&AbsOutputAddr::root("a"))
            .expect("change should be recorded");
        assert_eq!(got.action, Action::Delete);
    }

    #[test]
    fn test_summary() {
        let changes = ChangeSet::new();
        changes.append_output_change(change("a", Action::Create, Value::from(1)));
        changes.append_output_change(change("b", Action::Update, Value::from(2)));
        changes.append_output_change(change("c", Action::NoOp, Value::from(3)));
        changes.append_output_change(change("d", Action::Delete, Value::Null));

        let summary = changes.summary();
        assert_eq!(
            summary,
            ChangeSummary {
                creates: 1,
                updates: 1,
                deletes: 1,
                unchanged: 1,
            }
        );
        assert_eq!(summary.total_changes(), 3);
        assert_eq!(summary.to_string(), "1 to add, 1 to change, 1 to destroy.");
        assert_eq!(ChangeSummary::default().to_string(), "No changes.");
    }

    #[test]
    fn test_plans_have_distinct_ids() {
        assert_ne!(ChangeSet::new().id(), ChangeSet::new().id());
    }
}
