use std::{fmt, io};
use thiserror::Error;

/// Unified error type for all tilestore operations.
///
/// Errors propagate upward through the call stack using Rust's `?` operator.
/// Internal code can match on specific variants for fine-grained handling;
/// at API boundaries they are typically rendered as messages.
///
/// A fragment-originated failure observed mid-tile aborts the in-progress
/// tile: the read state drops every queued and already-emitted coordinate
/// range and is afterwards only safe to destroy. No error is retried
/// internally.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error surfaced by a fragment collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid user input or API parameter: malformed subarray bounds,
    /// wrong buffer arity, unknown attribute ids, and similar.
    ///
    /// These errors are recoverable: fix the input and retry the call.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// A requested entity (attribute, fragment, tile) does not exist.
    #[error("Not found")]
    NotFound,

    /// The schema's coordinate type is outside the set this code path
    /// supports. Raised by the dispatch shim before any state is mutated.
    #[error("unsupported coordinate type: {0}")]
    UnsupportedCoordType(&'static str),

    /// A typed accessor was handed a coordinate buffer of another scalar
    /// kind. Indicates mismatched schema/fragment construction.
    #[error("coordinate type mismatch: expected {expected}, found {found}")]
    CoordTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A declared extension point that is not implemented: reads on sparse
    /// arrays and variable-size attribute materialization.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Failure reported by a fragment collaborator call.
    #[error("fragment error: {0}")]
    Fragment(String),

    /// Internal error indicating a bug or violated invariant. Should never
    /// occur during normal operation.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a fragment error from any displayable error.
    #[inline]
    pub fn fragment<E: fmt::Display>(err: E) -> Self {
        Error::Fragment(err.to_string())
    }
}
