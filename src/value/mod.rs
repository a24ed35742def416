//! Dynamic values, known-value equality, and compatibility checking.

mod compat;
mod path;
mod types;

pub use compat::{assert_compatible, CompatError, Mismatch};
pub use path::{PathStep, ValuePath};
pub use types::{ParseTypeError, Value, ValueType};
