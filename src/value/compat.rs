//! Compatibility checking between a planned value and its applied result.
//!
//! A planned value may contain unknowns. The applied value is a legal
//! refinement of it when every known position is unchanged and every unknown
//! position was filled with something of the promised type.

use std::fmt;
use thiserror::Error;

use super::path::ValuePath;
use super::types::{Value, ValueType};

/// The kind of divergence found at one position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Mismatch {
    /// A known value changed.
    #[error("was {old}, but now {new}")]
    ValueChanged {
        /// Planned value.
        old: Value,
        /// Applied value.
        new: Value,
    },

    /// An unknown was resolved to a value of the wrong type.
    #[error("wrong final value type: planned {expected}, but got {found}")]
    TypeChanged {
        /// Type promised at plan time.
        expected: ValueType,
        /// Type of the applied value.
        found: ValueType,
    },

    /// A list changed length.
    #[error("length changed from {old} to {new}")]
    LengthChanged {
        /// Planned length.
        old: usize,
        /// Applied length.
        new: usize,
    },

    /// A planned map key is missing from the result.
    #[error("element {key:?} has vanished")]
    KeyRemoved {
        /// The missing key.
        key: String,
    },

    /// The result has a map key the plan did not.
    #[error("new element {key:?} has appeared")]
    KeyAdded {
        /// The unexpected key.
        key: String,
    },

    /// A known position became unknown.
    #[error("was known, but now unknown")]
    BecameUnknown,
}

/// A mismatch located at a path within the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatError {
    /// Where the mismatch was found.
    pub path: ValuePath,
    /// What went wrong there.
    pub mismatch: Mismatch,
}

impl fmt::Display for CompatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}", self.mismatch)
        } else {
            write!(f, "{}: {}", self.path, self.mismatch)
        }
    }
}

impl std::error::Error for CompatError {}

/// Checks that `new` is a legal refinement of `old`.
///
/// Returns one error per structural divergence; an empty list means the
/// values are compatible.
#[must_use]
pub fn assert_compatible(old: &Value, new: &Value) -> Vec<CompatError> {
    let mut errors = Vec::new();
    check(old, new, &ValuePath::root(), &mut errors);
    errors
}

fn check(old: &Value, new: &Value, path: &ValuePath, errors: &mut Vec<CompatError>) {
    match old {
        Value::Unknown(expected) => {
            // Any shape is acceptable in place of a wholly unknown value, as
            // long as it keeps the promised type.
            if !new.conforms_to(expected) {
                report(
                    errors,
                    path,
                    Mismatch::TypeChanged {
                        expected: expected.clone(),
                        found: new.ty(),
                    },
                );
            }
        }
        _ if !new.is_known() => report(errors, path, Mismatch::BecameUnknown),
        Value::List(olds) => {
            let Value::List(news) = new else {
                report(errors, path, value_changed(old, new));
                return;
            };
            if olds.len() != news.len() {
                let mismatch = Mismatch::LengthChanged {
                    old: olds.len(),
                    new: news.len(),
                };
                report(errors, path, mismatch);
                return;
            }
            for (i, (o, n)) in olds.iter().zip(news).enumerate() {
                check(o, n, &path.index(i), errors);
            }
        }
        Value::Map(olds) => {
            let Value::Map(news) = new else {
                report(errors, path, value_changed(old, new));
                return;
            };
            for key in olds.keys().filter(|k| !news.contains_key(*k)) {
                report(errors, path, Mismatch::KeyRemoved { key: key.clone() });
            }
            for key in news.keys().filter(|k| !olds.contains_key(*k)) {
                report(errors, path, Mismatch::KeyAdded { key: key.clone() });
            }
            for (key, o) in olds {
                if let Some(n) = news.get(key) {
                    check(o, n, &path.key(key), errors);
                }
            }
        }
        _ => {
            if old.equals(new) != Some(true) {
                report(errors, path, value_changed(old, new));
            }
        }
    }
}

fn report(errors: &mut Vec<CompatError>, path: &ValuePath, mismatch: Mismatch) {
    errors.push(CompatError {
        path: path.clone(),
        mismatch,
    });
}

fn value_changed(old: &Value, new: &Value) -> Mismatch {
    Mismatch::ValueChanged {
        old: old.clone(),
        new: new.clone(),
    }
}
