//! Explicit identifier space shared by accumulators and thread registries.
//!
//! A [`Pool`] replaces a process-wide identifier allocator: accumulators and
//! registries built from the same pool agree on slot numbering, and
//! independent pools never interfere. The pool also keeps lifecycle
//! statistics so shard reclamation can be observed.
//!
//! ```rust
//! use accumulatori::pool::Pool;
//!
//! let pool = Pool::new();
//! let requests = pool.adder::<u64>().with_name("requests");
//! let mut registry = pool.registry::<u64>();
//!
//! requests.add(&mut registry, 3).unwrap();
//! assert_eq!(requests.sum(), 3);
//! assert_eq!(pool.stats().live_shards(), 1);
//! ```

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::accumulator::{Accumulator, Adder};
use crate::identifier::IdentifierAllocator;
use crate::operator::{Operator, Sum};
use crate::registry::ThreadShardRegistry;
use crate::value::Value;

/// A cloneable handle to an identifier space.
///
/// Clones share the same identifiers and statistics.
#[derive(Clone, Default)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

#[derive(Default)]
struct PoolInner {
    ids: IdentifierAllocator,
    shards_allocated: AtomicUsize,
    shards_recycled: AtomicUsize,
    shards_freed: AtomicUsize,
}

/// Point-in-time lifecycle statistics of a [`Pool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Accumulators currently alive.
    pub accumulators: usize,
    /// Shards allocated since the pool was created.
    pub shards_allocated: usize,
    /// Times a stale shard was reused for a new accumulator.
    pub shards_recycled: usize,
    /// Shards deallocated after both owners released them.
    pub shards_freed: usize,
}

impl PoolStats {
    /// Shards allocated and not yet freed.
    pub fn live_shards(&self) -> usize {
        self.shards_allocated.saturating_sub(self.shards_freed)
    }
}

impl Pool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an accumulator using operator `O`.
    pub fn accumulator<V: Value, O: Operator<V> + Default>(&self) -> Accumulator<V, O> {
        Accumulator::new_in(self)
    }

    /// Creates an addition accumulator.
    pub fn adder<V>(&self) -> Adder<V>
    where
        V: Value,
        Sum: Operator<V>,
    {
        Accumulator::new_in(self)
    }

    /// Creates the per-thread shard registry for values of type `V`.
    ///
    /// Call this once on each worker thread and pass the registry to every
    /// update made from that thread.
    pub fn registry<V: Value>(&self) -> ThreadShardRegistry<V> {
        ThreadShardRegistry::new_in(self)
    }

    /// Returns current lifecycle statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            accumulators: self.inner.ids.in_use(),
            shards_allocated: self.inner.shards_allocated.load(Ordering::Relaxed),
            shards_recycled: self.inner.shards_recycled.load(Ordering::Relaxed),
            shards_freed: self.inner.shards_freed.load(Ordering::Relaxed),
        }
    }

    /// Returns `true` if both handles refer to the same pool.
    pub fn same_pool(&self, other: &Pool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn allocate_id(&self) -> usize {
        self.inner.ids.allocate()
    }

    pub(crate) fn release_id(&self, id: usize) {
        self.inner.ids.release(id)
    }

    pub(crate) fn shard_allocated(&self) {
        self.inner.shards_allocated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn shard_recycled(&self) {
        self.inner.shards_recycled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn shards_freed(&self, count: usize) {
        if count > 0 {
            self.inner.shards_freed.fetch_add(count, Ordering::Relaxed);
        }
    }
}

impl Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("stats", &self.stats()).finish()
    }
}
