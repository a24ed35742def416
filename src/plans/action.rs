//! Planned change actions.

use serde::{Deserialize, Serialize};

/// What a planned change does to an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The value is unchanged.
    NoOp,
    /// The output has no prior value.
    Create,
    /// The output's value changes.
    Update,
    /// The output is removed.
    Delete,
}

impl Action {
    /// Returns the one-character marker used in plan listings.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::NoOp => ' ',
            Self::Create => '+',
            Self::Update => '~',
            Self::Delete => '-',
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}
