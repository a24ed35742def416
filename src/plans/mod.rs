//! Planned changes and the change set that records them.
//!
//! The plan walk records one [`OutputChange`] per output; the apply walk
//! reads it back and reconciles it against freshly evaluated values.

mod action;
mod change;
mod changes;

pub use action::Action;
pub use change::{EncodedValue, OutputChange, OutputChangeSrc, MAX_ENCODED_BYTES, MAX_VALUE_DEPTH};
pub use changes::{ChangeSet, ChangeSummary};
