//! Identifier allocation for accumulators.
//!
//! Each live accumulator owns a small integer that doubles as its slot index
//! in every thread's [`ThreadShardRegistry`](crate::registry::ThreadShardRegistry).
//! Identifiers of destroyed accumulators are handed out again, most recently
//! released first, so registry slot vectors stay dense.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Issues unique identifiers to accumulators and recycles released ones.
///
/// Allocation is rare compared to updates, so a mutex is enough here.
///
/// # Examples
///
/// ```rust
/// use accumulatori::identifier::IdentifierAllocator;
///
/// let ids = IdentifierAllocator::new();
/// assert_eq!(ids.allocate(), 0);
/// assert_eq!(ids.allocate(), 1);
/// ids.release(0);
/// assert_eq!(ids.allocate(), 0);
/// ```
#[derive(Debug, Default)]
pub struct IdentifierAllocator {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    upper_bound: usize,
    released: Vec<usize>,
}

impl IdentifierAllocator {
    /// Creates an allocator with no identifiers issued.
    pub fn new() -> Self {
        Self::default()
    }

    // The state is consistent after every statement, so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the most recently released identifier, or a fresh one if
    /// none is free.
    pub fn allocate(&self) -> usize {
        let mut state = self.lock();
        let id = match state.released.pop() {
            Some(id) => id,
            None => {
                let id = state.upper_bound;
                state.upper_bound += 1;
                id
            }
        };
        tracing::trace!(id, "identifier allocated");
        id
    }

    /// Makes `id` available for reuse.
    ///
    /// The caller guarantees no live accumulator still holds `id`.
    pub fn release(&self, id: usize) {
        let mut state = self.lock();
        debug_assert!(id < state.upper_bound, "identifier {id} was never issued");
        state.released.push(id);
        tracing::trace!(id, "identifier released");
    }

    /// Number of identifiers currently held by live accumulators.
    pub fn in_use(&self) -> usize {
        let state = self.lock();
        state.upper_bound - state.released.len()
    }

    /// One past the largest identifier ever issued.
    pub fn upper_bound(&self) -> usize {
        self.lock().upper_bound
    }
}
