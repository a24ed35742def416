//! Error types for the output reconciliation core.
//!
//! Phase drivers report problems through [`crate::diagnostics::Diagnostics`];
//! the types here cover the fallible plumbing underneath them: scenario
//! configuration, change encoding and decoding, and address parsing.

use std::path::PathBuf;
use thiserror::Error;

use crate::addrs::AbsOutputAddr;
use crate::walker::Phase;

/// The main error type for the crate.
#[derive(Debug, Error)]
pub enum OutcoreError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Change encoding or decoding errors.
    #[error("Change error: {0}")]
    Change(#[from] ChangeError),

    /// Address parsing errors.
    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    /// A walk finished with errors in some nodes.
    #[error("{phase} failed for {failed} output(s)")]
    WalkFailed {
        /// Phase that failed.
        phase: Phase,
        /// Number of nodes that reported errors.
        failed: usize,
    },

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A value in the scenario could not be converted to a dynamic value.
    #[error("Invalid value at {field}: {message}")]
    InvalidValue {
        /// Field holding the value.
        field: String,
        /// Why the value was rejected.
        message: String,
    },

    /// An environment override held an unusable value.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// Errors raised while encoding or decoding a planned output change.
///
/// Both directions are fatal and never retried: an encoding failure means the
/// value cannot be represented in a plan, and a decoding failure means the
/// recorded plan was corrupted or written by an incompatible encoder.
#[derive(Debug, Error)]
pub enum ChangeError {
    /// The change could not be serialized.
    #[error("failed to encode plan for {addr}: {message}")]
    Encode {
        /// Output whose change failed to encode.
        addr: AbsOutputAddr,
        /// Description of the failure.
        message: String,
    },

    /// The recorded change could not be deserialized.
    #[error("failed to decode plan for {addr}: {message}")]
    Decode {
        /// Output whose change failed to decode.
        addr: AbsOutputAddr,
        /// Description of the failure.
        message: String,
    },

    /// A recorded payload no longer matches the digest taken at encode time.
    #[error("failed to decode plan for {addr}: {field} payload does not match its digest")]
    DigestMismatch {
        /// Output whose change was altered.
        addr: AbsOutputAddr,
        /// Which payload failed verification (`before` or `after`).
        field: &'static str,
    },
}

/// Errors raised while parsing an output address.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The address text does not follow the address syntax.
    #[error("invalid output address {address:?}: {reason}")]
    Invalid {
        /// The rejected address text.
        address: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, OutcoreError>;

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates an invalid-value error for a specific field.
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl AddressError {
    /// Creates an invalid-address error.
    #[must_use]
    pub fn invalid(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            address: address.into(),
            reason: reason.into(),
        }
    }
}
