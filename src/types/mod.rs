#![forbid(unsafe_code)]
//! Shared identifiers and the crate-wide error type.

use std::fmt;

use serde::Serialize;

/// Identifier of a transaction as recorded in row headers.
///
/// Zero is reserved for "no transaction" (committed rows written by a merge).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize)]
pub struct TransId(pub u64);

impl TransId {
    /// The "no transaction" identifier.
    pub const NONE: TransId = TransId(0);

    /// Returns `true` when the identifier references a real transaction.
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TransId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced by micro block readers.
#[derive(thiserror::Error, Debug)]
pub enum MicroBlockError {
    /// Malformed block, out of range position, or a missing collaborator.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// An operation was invoked before the reader was initialized.
    #[error("reader not initialized")]
    NotInitialized,
    /// `init` was called on a reader that already holds a block.
    #[error("reader already initialized")]
    AlreadyInitialized,
    /// The requested key is not present in the block.
    #[error("row not found")]
    NotFound,
    /// The capability is not available on this reader variant.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    /// Row bytes or block metadata do not decode.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// The transaction-state authority rejected a lock check.
    #[error("transaction state: {0}")]
    TransState(String),
}

impl MicroBlockError {
    /// Returns `true` for the expected key-miss outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MicroBlockError::NotFound)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MicroBlockError>;
