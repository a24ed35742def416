//! Dynamic values and their types.
//!
//! A [`Value`] is an ordinary structured value in which any position may be
//! [`Value::Unknown`]: its type is known but its content is not determined
//! until apply. Unknowns are only legal during planning.

use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Type constraint carried by unknown values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Any type; the value's own shape decides.
    Dynamic,
    /// Boolean.
    Bool,
    /// Number.
    Number,
    /// String.
    String,
    /// List whose elements conform to the inner type.
    List(Box<ValueType>),
    /// Map whose values conform to the inner type.
    Map(Box<ValueType>),
}

/// A dynamic value that may be null or contain unknown positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Not yet determined; will conform to the given type.
    Unknown(ValueType),
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(Number),
    /// String.
    String(String),
    /// Ordered list.
    List(Vec<Value>),
    /// String-keyed map.
    Map(BTreeMap<String, Value>),
}

/// Returned when a type name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value type {0:?}")]
pub struct ParseTypeError(pub String);

impl Value {
    /// Creates a string value.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Creates a number value.
    #[must_use]
    pub fn number(n: impl Into<Number>) -> Self {
        Self::Number(n.into())
    }

    /// Creates a list value.
    #[must_use]
    pub const fn list(items: Vec<Self>) -> Self {
        Self::List(items)
    }

    /// Creates a map value.
    #[must_use]
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Self)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Creates an unknown value of the given type.
    #[must_use]
    pub const fn unknown(ty: ValueType) -> Self {
        Self::Unknown(ty)
    }

    /// Returns true if the value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true unless the value itself is unknown. Nested unknowns are
    /// not considered; see [`Value::is_wholly_known`].
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Returns true if no position in the value is unknown.
    #[must_use]
    pub fn is_wholly_known(&self) -> bool {
        match self {
            Self::Unknown(_) => false,
            Self::List(items) => items.iter().all(Self::is_wholly_known),
            Self::Map(entries) => entries.values().all(Self::is_wholly_known),
            _ => true,
        }
    }

    /// Replaces every unknown position with null.
    ///
    /// Stored state cannot represent unknowns, so this is the collapse rule
    /// applied when a planned value is written to the value store.
    #[must_use]
    pub fn unknown_as_null(&self) -> Self {
        match self {
            Self::Unknown(_) => Self::Null,
            Self::List(items) => Self::List(items.iter().map(Self::unknown_as_null).collect()),
            Self::Map(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.unknown_as_null()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Returns the type of the value. Null is dynamic; collections with
    /// mixed element types have dynamic element type.
    #[must_use]
    pub fn ty(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Dynamic,
            Self::Unknown(ty) => ty.clone(),
            Self::Bool(_) => ValueType::Bool,
            Self::Number(_) => ValueType::Number,
            Self::String(_) => ValueType::String,
            Self::List(items) => ValueType::List(Box::new(common_type(items.iter()))),
            Self::Map(entries) => ValueType::Map(Box::new(common_type(entries.values()))),
        }
    }

    /// Returns true if the value is acceptable where `ty` is required.
    #[must_use]
    pub fn conforms_to(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (_, ValueType::Dynamic) | (Self::Null, _) => true,
            (Self::Unknown(own), _) => own == ty || *own == ValueType::Dynamic,
            (Self::Bool(_), ValueType::Bool)
            | (Self::Number(_), ValueType::Number)
            | (Self::String(_), ValueType::String) => true,
            (Self::List(items), ValueType::List(elem)) => items.iter().all(|v| v.conforms_to(elem)),
            (Self::Map(entries), ValueType::Map(elem)) => {
                entries.values().all(|v| v.conforms_to(elem))
            }
            _ => false,
        }
    }

    /// Compares two values for known-value equality.
    ///
    /// Returns `None` when the answer depends on an unknown position.
    /// Collections are unequal as soon as any pair of elements is definitely
    /// unequal, even if other elements are unknown.
    #[must_use]
    pub fn equals(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Self::Unknown(_), _) | (_, Self::Unknown(_)) => None,
            (Self::Null, Self::Null) => Some(true),
            (Self::Bool(a), Self::Bool(b)) => Some(a == b),
            (Self::Number(a), Self::Number(b)) => Some(numbers_equal(a, b)),
            (Self::String(a), Self::String(b)) => Some(a == b),
            (Self::List(a), Self::List(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                all_equal(a.iter().zip(b))
            }
            (Self::Map(a), Self::Map(b)) => {
                if a.len() != b.len() || a.keys().ne(b.keys()) {
                    return Some(false);
                }
                all_equal(a.values().zip(b.values()))
            }
            _ => Some(false),
        }
    }

    /// Returns the nesting depth of the value. Known scalars have depth one;
    /// an unknown adds one to the depth of its type.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Unknown(ty) => 1 + ty.depth(),
            Self::List(items) => 1 + items.iter().map(Self::depth).max().unwrap_or(0),
            Self::Map(entries) => 1 + entries.values().map(Self::depth).max().unwrap_or(0),
            _ => 1,
        }
    }

    /// Converts to plain JSON. Unknown positions become null.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null | Self::Unknown(_) => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => serde_json::Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Folds element types into one, falling back to dynamic on disagreement.
fn common_type<'a>(mut values: impl Iterator<Item = &'a Value>) -> ValueType {
    let Some(first) = values.next() else {
        return ValueType::Dynamic;
    };
    let ty = first.ty();
    if values.all(|v| v.ty() == ty) {
        ty
    } else {
        ValueType::Dynamic
    }
}

fn all_equal<'a>(pairs: impl Iterator<Item = (&'a Value, &'a Value)>) -> Option<bool> {
    let mut decided = true;
    for (a, b) in pairs {
        match a.equals(b) {
            Some(false) => return Some(false),
            None => decided = false,
            Some(true) => {}
        }
    }
    decided.then_some(true)
}

/// Numeric equality across integer and float representations.
#[allow(clippy::float_cmp)]
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Unknown(ty) => write!(f, "(unknown {ty})"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl ValueType {
    /// Returns the nesting depth of the type. Primitive types have depth one.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::List(elem) | Self::Map(elem) => 1 + elem.depth(),
            _ => 1,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic => write!(f, "dynamic"),
            Self::Bool => write!(f, "bool"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::List(elem) => write!(f, "list({elem})"),
            Self::Map(elem) => write!(f, "map({elem})"),
        }
    }
}

impl FromStr for ValueType {
    type Err = ParseTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed {
            "" | "dynamic" | "any" => Ok(Self::Dynamic),
            "bool" => Ok(Self::Bool),
            "number" => Ok(Self::Number),
            "string" => Ok(Self::String),
            _ => {
                if let Some(inner) = type_argument(trimmed, "list(") {
                    Ok(Self::List(Box::new(inner.parse()?)))
                } else if let Some(inner) = type_argument(trimmed, "map(") {
                    Ok(Self::Map(Box::new(inner.parse()?)))
                } else {
                    Err(ParseTypeError(s.to_string()))
                }
            }
        }
    }
}

/// Returns the text between `prefix` and a closing parenthesis.
fn type_argument<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    s.strip_prefix(prefix).and_then(|rest| rest.strip_suffix(')'))
}
