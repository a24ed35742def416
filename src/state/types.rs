//! State types for recorded output values.
//!
//! Stored state never contains unknowns and never contains null entries: an
//! output whose value becomes null is removed instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::addrs::AbsOutputAddr;
use crate::value::Value;

/// Current version of the snapshot format.
pub const STATE_VERSION: &str = "1.0";

/// The recorded value of a single output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputValue {
    /// Output address.
    pub addr: AbsOutputAddr,
    /// Current value. Never null and never unknown.
    pub value: Value,
    /// Whether the value must be redacted from user-facing text.
    pub sensitive: bool,
}

/// A point-in-time copy of every stored output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Snapshot format version.
    pub version: String,
    /// Stored outputs, ordered by address.
    pub outputs: Vec<OutputValue>,
    /// When the state was last mutated.
    pub last_updated: DateTime<Utc>,
}

impl OutputValue {
    /// Creates a new state entry.
    #[must_use]
    pub const fn new(addr: AbsOutputAddr, value: Value, sensitive: bool) -> Self {
        Self {
            addr,
            value,
            sensitive,
        }
    }
}

impl StateSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            outputs: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Gets an output by address.
    #[must_use]
    pub fn get(&self, addr: &AbsOutputAddr) -> Option<&OutputValue> {
        self.outputs.iter().find(|o| &o.addr == addr)
    }

    /// Returns the addresses of all stored outputs.
    #[must_use]
    pub fn addresses(&self) -> Vec<&AbsOutputAddr> {
        self.outputs.iter().map(|o| &o.addr).collect()
    }

    /// Returns true if no outputs are stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
