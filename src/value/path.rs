//! Paths into nested values, used to locate compatibility mismatches.

use std::fmt;

/// One step into a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// List element index.
    Index(usize),
    /// Map key.
    Key(String),
}

/// Path from the root of a value to a nested position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ValuePath(Vec<PathStep>);

impl ValuePath {
    /// Returns the empty path.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns this path extended by a list index.
    #[must_use]
    pub fn index(&self, i: usize) -> Self {
        self.with(PathStep::Index(i))
    }

    /// Returns this path extended by a map key.
    #[must_use]
    pub fn key(&self, key: &str) -> Self {
        self.with(PathStep::Key(key.to_string()))
    }

    /// Returns true for the empty path.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the steps of the path.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    fn with(&self, step: PathStep) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.0 {
            match step {
                PathStep::Index(i) => write!(f, "[{i}]")?,
                PathStep::Key(k) => write!(f, "[{k:?}]")?,
            }
        }
        Ok(())
    }
}
