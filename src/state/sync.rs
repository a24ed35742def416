//! Concurrently shared store of current output values.
//!
//! Many output nodes of the same walk read and write the store at once, so
//! every operation takes the lock for its own duration only. Callers never
//! see a reference into the map; reads return copies.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{trace, warn};

use crate::addrs::AbsOutputAddr;
use crate::value::Value;

use super::types::{OutputValue, StateSnapshot, STATE_VERSION};

/// Internally synchronized store of output values.
#[derive(Debug)]
pub struct SyncState {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    outputs: BTreeMap<AbsOutputAddr, OutputValue>,
    last_updated: DateTime<Utc>,
}

impl SyncState {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                outputs: BTreeMap::new(),
                last_updated: Utc::now(),
            }),
        }
    }

    /// Creates a store holding the outputs of a snapshot.
    ///
    /// Unknown positions become null, and null entries are dropped.
    #[must_use]
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let outputs = snapshot
            .outputs
            .into_iter()
            .map(|o| OutputValue {
                value: o.value.unknown_as_null(),
                ..o
            })
            .filter(|o| !o.value.is_null())
            .map(|o| (o.addr.clone(), o))
            .collect();

        Self {
            inner: RwLock::new(Inner {
                outputs,
                last_updated: snapshot.last_updated,
            }),
        }
    }

    /// Returns a copy of the stored entry for `addr`.
    #[must_use]
    pub fn output_value(&self, addr: &AbsOutputAddr) -> Option<OutputValue> {
        self.read().outputs.get(addr).cloned()
    }

    /// Records the value of an output.
    ///
    /// A null value removes the entry, so an entry exists exactly when the
    /// last recorded value was non-null. Unknown positions are stored as null.
    pub fn set_output_value(&self, addr: &AbsOutputAddr, value: Value, sensitive: bool) {
        let value = if value.is_wholly_known() {
            value
        } else {
            warn!("Unknown positions in the value for {addr} were stored as null");
            value.unknown_as_null()
        };

        if value.is_null() {
            self.remove_output_value(addr);
            return;
        }

        let mut inner = self.write();
        inner
            .outputs
            .insert(addr.clone(), OutputValue::new(addr.clone(), value, sensitive));
        inner.last_updated = Utc::now();
        trace!("Stored value for {addr}");
    }

    /// Removes the entry for an output, returning it if present.
    pub fn remove_output_value(&self, addr: &AbsOutputAddr) -> Option<OutputValue> {
        let mut inner = self.write();
        let removed = inner.outputs.remove(addr);
        if removed.is_some() {
            inner.last_updated = Utc::now();
            trace!("Removed value for {addr}");
        }
        removed
    }

    /// Returns the number of stored outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().outputs.len()
    }

    /// Returns true if no outputs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().outputs.is_empty()
    }

    /// Copies the whole store under a single read lock.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.read();
        StateSnapshot {
            version: STATE_VERSION.to_string(),
            outputs: inner.outputs.values().cloned().collect(),
            last_updated: inner.last_updated,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_get_remove() {
        let state = SyncState::new();
        let addr = AbsOutputAddr::root("greeting");
        assert!(state.output_value(&addr).is_none());

        state.set_output_value(&addr, Value::from("hello"), false);
        let entry = state.output_value(&addr).expect("entry should exist");
        assert_eq!(entry.value, Value::from("hello"));
        assert!(!entry.sensitive);

        state.set_output_value(&addr, Value::from("bye"), true);
        let entry = state.output_value(&addr).expect("entry should exist");
        assert_eq!(entry.value, Value::from("bye"));
        assert!(entry.sensitive);
        assert_eq!(state.len(), 1);

        assert!(state.remove_output_value(&addr).is_some());
        assert!(state.remove_output_value(&addr).is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_null_removes_entry() {
        let state = SyncState::new();
        let addr = AbsOutputAddr::root("maybe");
        state.set_output_value(&addr, Value::from(1), false);
        state.set_output_value(&addr, Value::Null, false);

        assert!(state.output_value(&addr).is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_unknowns_are_stored_as_null() {
        use crate::value::ValueType;

        let state = SyncState::new();
        let whole = AbsOutputAddr::root("whole");
        state.set_output_value(&whole, Value::from(1), false);
        state.set_output_value(&whole, Value::unknown(ValueType::Number), false);
        assert!(state.output_value(&whole).is_none());

        let partial = AbsOutputAddr::root("partial");
        state.set_output_value(
            &partial,
            Value::list(vec![Value::from("a"), Value::unknown(ValueType::String)]),
            true,
        );
        let entry = state.output_value(&partial).expect("entry should exist");
        assert_eq!(entry.value, Value::list(vec![Value::from("a"), Value::Null]));
        assert!(entry.value.is_wholly_known());
        assert!(entry.sensitive);

        let mut snapshot = state.snapshot();
        snapshot.outputs.push(OutputValue::new(
            AbsOutputAddr::root("pending"),
            Value::unknown(ValueType::Dynamic),
            false,
        ));
        let restored = SyncState::from_snapshot(snapshot);
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn test_snapshot_round_trip_drops_nulls() {
        let state = SyncState::new();
        state.set_output_value(&AbsOutputAddr::root("b"), Value::from(2), false);
        state.set_output_value(&AbsOutputAddr::root("a"), Value::from(1), true);

        let mut snapshot = state.snapshot();
        let names: Vec<String> = snapshot.addresses().iter().map(ToString::to_string).collect();
        assert_eq!(names, ["output.a", "output.b"]);

        snapshot
            .outputs
            .push(OutputValue::new(AbsOutputAddr::root("c"), Value::Null, false));
        let restored = SyncState::from_snapshot(snapshot);
        assert_eq!(restored.len(), 2);
        assert!(restored.output_value(&AbsOutputAddr::root("c")).is_none());
    }

    #[test]
    fn test_concurrent_writers_on_distinct_addresses() {
        let state = Arc::new(SyncState::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    let addr = AbsOutputAddr::root(format!("out{i}"));
                    for n in 0..100 {
                        state.set_output_value(&addr, Value::from(n), false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread panicked");
        }

        assert_eq!(state.len(), 8);
        for i in 0..8 {
            let entry = state
                .output_value(&AbsOutputAddr::root(format!("out{i}")))
                .expect("entry should exist");
            assert_eq!(entry.value, Value::from(99));
        }
    }
}
