//! Per-thread shard registries.
//!
//! A [`ThreadShardRegistry`] is the explicit per-thread context: a worker
//! creates one from its [`Pool`] when it starts, passes it to every update,
//! and drops it when it exits. Slot `i` holds the shard this thread created
//! for the accumulator with identifier `i`.
//!
//! When an accumulator is destroyed its identifier is released, and the next
//! accumulator issued that identifier maps to the same slot. If the slot's
//! shard has already been retired by the old accumulator, the registry links
//! that same shard into the new accumulator instead of allocating another.

use std::fmt::{self, Debug};
use std::ptr::NonNull;

use crate::accumulator::Accumulator;
use crate::error::{AccumulatorError, Result};
use crate::operator::Operator;
use crate::pool::Pool;
use crate::shard::Shard;
use crate::value::Value;

/// The shards created by one thread, indexed by accumulator identifier.
///
/// The registry is neither `Send` nor `Sync`: it belongs to the thread that
/// created it.
///
/// # Examples
///
/// ```rust
/// use accumulatori::pool::Pool;
/// use accumulatori::registry::ThreadShardRegistry;
///
/// let pool = Pool::new();
/// let hits = pool.adder::<u32>();
/// let mut registry = ThreadShardRegistry::new_in(&pool);
///
/// assert_eq!(registry.get_or_create(&hits).unwrap().value(), 0);
/// hits.add(&mut registry, 2).unwrap();
/// assert_eq!(registry.get_or_create(&hits).unwrap().value(), 2);
/// assert_eq!(registry.len(), 1);
/// ```
pub struct ThreadShardRegistry<V: Value> {
    pool: Pool,
    slots: Vec<Option<NonNull<Shard<V>>>>,
}

impl<V: Value> ThreadShardRegistry<V> {
    /// Creates an empty registry for accumulators of `pool`.
    pub fn new_in(pool: &Pool) -> Self {
        Self::with_capacity(pool, 0)
    }

    /// Creates an empty registry with room for `capacity` slots.
    pub fn with_capacity(pool: &Pool, capacity: usize) -> Self {
        ThreadShardRegistry {
            pool: pool.clone(),
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Returns this thread's shard for `accumulator`.
    ///
    /// - A missing slot gets a fresh shard linked into `accumulator`.
    /// - A slot whose shard was retired by a previous accumulator with the
    ///   same identifier is reset to the operator's identity and relinked.
    /// - Otherwise the existing shard is returned unchanged.
    ///
    /// # Errors
    ///
    /// [`AccumulatorError::ForeignRegistry`] if `accumulator` belongs to a
    /// different pool.
    pub fn get_or_create<O: Operator<V>>(
        &mut self,
        accumulator: &Accumulator<V, O>,
    ) -> Result<&Shard<V>> {
        let id = accumulator.id();
        if !self.pool.same_pool(accumulator.pool()) {
            return Err(AccumulatorError::ForeignRegistry { accumulator: id });
        }
        if self.slots.len() <= id {
            self.slots.resize(id + 1, None);
        }

        let identity = accumulator.operator().identity();
        let slot = self.slots[id];
        let shard = match slot {
            Some(shard) => {
                // SAFETY: this registry holds a share of every shard in its
                // slots until it is dropped.
                let existing = unsafe { shard.as_ref() };
                if existing.owners() == 1 {
                    // SAFETY: the previous accumulator at this slot has
                    // retired, so this registry is the only owner.
                    unsafe { existing.relink(accumulator.head(), identity) };
                    self.pool.shard_recycled();
                    tracing::trace!(id, "shard recycled");
                }
                shard
            }
            None => {
                let shard = Shard::publish_new(accumulator.head(), identity);
                self.slots[id] = Some(shard);
                self.pool.shard_allocated();
                tracing::trace!(id, "shard created");
                shard
            }
        };

        // SAFETY: see above; the borrow of `self` keeps our share alive.
        Ok(unsafe { &*shard.as_ptr() })
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns `true` if this thread has not created any shard.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Value> Drop for ThreadShardRegistry<V> {
    fn drop(&mut self) {
        let mut retired = 0;
        let mut freed = 0;
        for shard in self.slots.drain(..).flatten() {
            // SAFETY: each slot holds exactly one share; the accumulator side
            // may already be gone, so the shard is not touched afterwards.
            if unsafe { Shard::retire(shard) } {
                freed += 1;
            }
            retired += 1;
        }
        self.pool.shards_freed(freed);
        if retired > 0 {
            tracing::debug!(retired, freed, "thread shard registry dropped");
        }
    }
}

impl<V: Value> Debug for ThreadShardRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadShardRegistry")
            .field("slots", &self.slots.len())
            .field("shards", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{Max, Sum};
    use std::thread;

    #[test]
    fn test_new_is_empty() {
        let pool = Pool::new();
        let registry = pool.registry::<u64>();
        assert!(registry.is_empty());
        assert_eq!(pool.stats().shards_allocated, 0);
    }

    #[test]
    fn test_same_shard_returned() {
        let pool = Pool::new();
        let acc = pool.adder::<u64>();
        let mut registry = pool.registry::<u64>();

        let first = registry.get_or_create(&acc).unwrap() as *const Shard<u64>;
        let second = registry.get_or_create(&acc).unwrap() as *const Shard<u64>;
        assert_eq!(first, second);
        assert_eq!(acc.shard_count(), 1);
        assert_eq!(pool.stats().shards_allocated, 1);
    }

    #[test]
    fn test_slots_grow_sparse() {
        let pool = Pool::new();
        let accs: Vec<_> = (0..4).map(|_| pool.adder::<u64>()).collect();
        let mut registry = pool.registry::<u64>();

        accs[3].add(&mut registry, 1).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            format!("{:?}", registry),
            "ThreadShardRegistry { slots: 4, shards: 1 }"
        );

        accs[1].add(&mut registry, 1).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(pool.stats().shards_allocated, 2);
    }

    #[test]
    fn test_with_capacity() {
        let pool = Pool::new();
        let acc = pool.accumulator::<i32, Max>();
        let mut registry = ThreadShardRegistry::with_capacity(&pool, 16);
        acc.update(&mut registry, -3).unwrap();
        assert_eq!(acc.result(), -3);
    }

    #[test]
    fn test_live_shard_not_recycled() {
        let pool = Pool::new();
        let acc = pool.adder::<u64>();
        let mut registry = pool.registry::<u64>();
        for _ in 0..10 {
            acc.add(&mut registry, 2).unwrap();
        }
        assert_eq!(acc.sum(), 20);
        assert_eq!(pool.stats().shards_recycled, 0);
    }

    #[test]
    fn test_stale_shard_recycled_not_reallocated() {
        let pool = Pool::new();
        let mut registry = pool.registry::<u64>();

        let old = pool.adder::<u64>();
        old.add(&mut registry, 99).unwrap();
        let old_shard = registry.get_or_create(&old).unwrap() as *const Shard<u64>;
        drop(old);

        let new = Accumulator::<u64, Sum>::new_in(&pool);
        let new_shard = registry.get_or_create(&new).unwrap() as *const Shard<u64>;
        assert_eq!(old_shard, new_shard);
        assert_eq!(new.sum(), 0);
        assert_eq!(new.shard_count(), 1);

        let stats = pool.stats();
        assert_eq!(stats.shards_allocated, 1);
        assert_eq!(stats.shards_recycled, 1);
    }

    #[test]
    fn test_untouched_identifier_reuse() {
        let pool = Pool::new();
        let mut registry = pool.registry::<u64>();

        let a = pool.adder::<u64>();
        a.add(&mut registry, 1).unwrap();
        drop(a);

        // Never touched by this thread, the stale shard waits for the next one.
        let b = pool.adder::<u64>();
        drop(b);

        let c = pool.adder::<u64>();
        c.add(&mut registry, 5).unwrap();
        assert_eq!(c.sum(), 5);
        assert_eq!(pool.stats().shards_recycled, 1);
    }

    #[test]
    fn test_drop_releases_share() {
        let pool = Pool::new();
        let acc = pool.adder::<u64>();
        thread::scope(|s| {
            s.spawn(|| {
                let mut registry = pool.registry::<u64>();
                acc.add(&mut registry, 8).unwrap();
            });
        });

        let stats = pool.stats();
        assert_eq!(stats.shards_allocated, 1);
        assert_eq!(stats.shards_freed, 0);
        assert_eq!(acc.sum(), 8);

        drop(acc);
        assert_eq!(pool.stats().shards_freed, 1);
    }

    #[test]
    fn test_drop_frees_stale_shards() {
        let pool = Pool::new();
        let mut registry = pool.registry::<u64>();
        let accs: Vec<_> = (0..3).map(|_| pool.adder::<u64>()).collect();
        for acc in &accs {
            acc.add(&mut registry, 1).unwrap();
        }
        drop(accs);

        // Only the registry's share is left on each shard.
        let stats = pool.stats();
        assert_eq!(stats.live_shards(), 3);
        assert_eq!(stats.shards_freed, 0);

        drop(registry);
        assert_eq!(pool.stats().live_shards(), 0);
    }
}
