//! Crate-wide error hierarchy.
//!
//! Module-local errors ([`crate::field::FieldError`], [`crate::shuffle::ShuffleError`])
//! convert into [`ProtocolError`] via `#[from]`, so call sites that cross a module
//! boundary can use `?` without manual mapping.

use thiserror::Error;

use crate::field::FieldError;
use crate::shuffle::ShuffleError;

/// Top-level error type returned by the party engine, client engine, and CLI.
///
/// Maps onto the error kinds in the specification: Configuration, Decoding,
/// RoutingViolation, CryptoFailure, TransportFailure.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Malformed or inconsistent configuration (network map, party count, modulus).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A wire message's length did not match its expected per-hop size.
    #[error("decoding error: expected {expected} bytes, got {actual}")]
    Decoding { expected: usize, actual: usize },

    /// The shuffler received a message from an unexpected machine, or a bucket
    /// overflowed past its batch size. Fatal: the batch is poisoned.
    #[error("routing violation: {0}")]
    RoutingViolation(#[from] ShuffleError),

    /// A field element arrived or was produced outside the valid range.
    #[error("crypto failure: {0}")]
    CryptoFailure(#[from] FieldError),

    /// The transport closed or returned garbage mid-batch.
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

impl ProtocolError {
    /// Exit code this error should map to on the CLI, per the external interface contract:
    /// 1 for usage/configuration failures, 2 for in-protocol fatal errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProtocolError::Configuration(_) => 1,
            ProtocolError::Decoding { .. }
            | ProtocolError::RoutingViolation(_)
            | ProtocolError::CryptoFailure(_)
            | ProtocolError::TransportFailure(_) => 2,
        }
    }
}
