#![forbid(unsafe_code)]

//! Error type for producer-side contract checks.
//!
//! Consumers never see an error: cursor operations either return a value or
//! block. The only checked contract is on the producer side, where a state
//! node may be linked to a successor at most once.

use thiserror::Error;

/// Errors raised by the chain's producer-side primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserverError {
    /// A state node already has a successor; links are write-once.
    #[error("state node at version {version} is already linked to a successor")]
    AlreadyLinked {
        /// Version of the node that was linked twice.
        version: u64,
    },
}

/// Convenience alias for results carrying an [`ObserverError`].
pub type Result<T> = std::result::Result<T, ObserverError>;
