//! Error type for accumulator operations.

use thiserror::Error;

/// Errors reported by accumulator operations.
///
/// Correct use of an accumulator cannot fail; the only reported condition is
/// mixing objects from different [`Pool`](crate::pool::Pool)s.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccumulatorError {
    /// The registry was created by a different pool than the accumulator.
    ///
    /// Registry slots are indexed by pool-local identifiers, so the slot for
    /// this accumulator could belong to an unrelated one.
    #[error("registry belongs to a different pool than accumulator {accumulator}")]
    ForeignRegistry {
        /// Identifier of the accumulator that was looked up.
        accumulator: usize,
    },
}

/// Result type for accumulator operations.
pub type Result<T> = std::result::Result<T, AccumulatorError>;
