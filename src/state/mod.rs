//! Output value store.
//!
//! [`SyncState`] is the live, shared record of current output values. A
//! [`StateSnapshot`] is its serializable copy.

mod sync;
mod types;

pub use sync::SyncState;
pub use types::{OutputValue, StateSnapshot, STATE_VERSION};
