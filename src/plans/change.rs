//! Planned output changes and their encoded form.
//!
//! The change set stores [`OutputChangeSrc`] records rather than decoded
//! values so that what the apply walk reads back is exactly what the plan
//! walk recorded. Each payload carries a SHA-256 digest taken at encode time.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::addrs::AbsOutputAddr;
use crate::error::ChangeError;
use crate::value::Value;

use super::action::Action;

/// Deepest value nesting accepted by the encoder, counting the nesting of
/// unknown types. Each level encodes to at most two levels of JSON, which
/// keeps every accepted payload well inside the decoder's recursion limit.
pub const MAX_VALUE_DEPTH: usize = 32;

/// Largest encoded payload accepted by the encoder, in bytes.
pub const MAX_ENCODED_BYTES: usize = 16 * 1024 * 1024;

/// A planned change to one output value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChange {
    /// Output address.
    pub addr: AbsOutputAddr,
    /// Planned action.
    pub action: Action,
    /// Value before the change; null if there was none.
    pub before: Value,
    /// Value after the change; may contain unknowns.
    pub after: Value,
    /// Whether the output is sensitive.
    pub sensitive: bool,
}

/// An encoded value payload with its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedValue {
    /// Serialized value.
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`.
    pub digest: String,
}

/// The encoded form of an [`OutputChange`], as held by the change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChangeSrc {
    /// Output address.
    pub addr: AbsOutputAddr,
    /// Planned action.
    pub action: Action,
    /// Encoded value before the change.
    pub before: EncodedValue,
    /// Encoded value after the change.
    pub after: EncodedValue,
    /// Whether the output is sensitive.
    pub sensitive: bool,
}

impl OutputChange {
    /// Encodes the change for recording.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is nested too deeply or too large
    /// to be recorded.
    pub fn encode(&self) -> Result<OutputChangeSrc, ChangeError> {
        Ok(OutputChangeSrc {
            addr: self.addr.clone(),
            action: self.action,
            before: EncodedValue::encode(&self.addr, &self.before)?,
            after: EncodedValue::encode(&self.addr, &self.after)?,
            sensitive: self.sensitive,
        })
    }
}

impl OutputChangeSrc {
    /// Decodes the recorded change.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload fails digest verification or cannot be
    /// deserialized.
    pub fn decode(&self) -> Result<OutputChange, ChangeError> {
        Ok(OutputChange {
            addr: self.addr.clone(),
            action: self.action,
            before: self.before.decode(&self.addr, "before")?,
            after: self.after.decode(&self.addr, "after")?,
            sensitive: self.sensitive,
        })
    }
}

impl EncodedValue {
    fn encode(addr: &AbsOutputAddr, value: &Value) -> Result<Self, ChangeError> {
        let depth = value.depth();
        if depth > MAX_VALUE_DEPTH {
            return Err(ChangeError::Encode {
                addr: addr.clone(),
                message: format!("value is nested {depth} levels deep, the limit is {MAX_VALUE_DEPTH}"),
            });
        }

        let bytes = serde_json::to_vec(value).map_err(|e| ChangeError::Encode {
            addr: addr.clone(),
            message: e.to_string(),
        })?;

        if bytes.len() > MAX_ENCODED_BYTES {
            return Err(ChangeError::Encode {
                addr: addr.clone(),
                message: format!(
                    "encoded value is {} bytes, the limit is {MAX_ENCODED_BYTES}",
                    bytes.len()
                ),
            });
        }

        let digest = digest_of(&bytes);
        Ok(Self { bytes, digest })
    }

    fn decode(&self, addr: &AbsOutputAddr, field: &'static str) -> Result<Value, ChangeError> {
        if !digests_match(&digest_of(&self.bytes), &self.digest) {
            return Err(ChangeError::DigestMismatch {
                addr: addr.clone(),
                field,
            });
        }

        serde_json::from_slice(&self.bytes).map_err(|e| ChangeError::Decode {
            addr: addr.clone(),
            message: format!("{field}: {e}"),
        })
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for an empty payload.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn digest_of(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Compares two digests in constant time.
fn digests_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
