//! The user-facing accumulator.
//!
//! An [`Accumulator`] owns an append-only, lock-free list of [`Shard`]s, one
//! per thread that ever updated it. Updates go straight to the calling
//! thread's shard; [`Accumulator::result`] folds every shard into the base
//! value.
//!
//! ```text
//!   head ──► [shard T3] ──► [shard T1] ──► [shard T0] ──► null
//!               ▲              ▲              ▲
//!     registry T3│    registry T1│    registry T0│   (one writer each)
//!
//!   result() = base ⊕ T3 ⊕ T1 ⊕ T0
//! ```
//!
//! # Examples
//!
//! ```rust
//! use accumulatori::pool::Pool;
//! use std::thread;
//!
//! let pool = Pool::new();
//! let bytes = pool.adder::<u64>().with_name("bytes");
//!
//! thread::scope(|s| {
//!     for _ in 0..4 {
//!         s.spawn(|| {
//!             let mut registry = pool.registry::<u64>();
//!             let mut local = bytes.local(&mut registry).unwrap();
//!             for _ in 0..1000 {
//!                 local.update(17);
//!             }
//!         });
//!     }
//! });
//!
//! assert_eq!(bytes.sum(), 68_000);
//! ```

use std::fmt::{self, Debug, Display};
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::error::Result;
use crate::operator::{Operator, Sum};
use crate::pool::Pool;
use crate::registry::ThreadShardRegistry;
use crate::shard::Shard;
use crate::value::{AccumulatedValue, Value};

/// An accumulator specialised for addition.
pub type Adder<V> = Accumulator<V, Sum>;

/// A fold over an associative operator, updated concurrently through
/// per-thread shards.
///
/// The accumulator is `Send + Sync` and is normally shared by reference
/// (scoped threads) or through an `Arc`. Each updating thread brings its own
/// [`ThreadShardRegistry`] created from the same [`Pool`].
///
/// Destruction is `Drop`. An accumulator cannot be destroyed twice:
///
/// ```compile_fail
/// use accumulatori::pool::Pool;
///
/// let pool = Pool::new();
/// let acc = pool.adder::<u64>();
/// drop(acc);
/// drop(acc);
/// ```
///
/// nor used once destroyed:
///
/// ```compile_fail
/// use accumulatori::pool::Pool;
///
/// let pool = Pool::new();
/// let acc = pool.adder::<u64>();
/// drop(acc);
/// acc.sum();
/// ```
///
/// nor destroyed while a thread holds its shard:
///
/// ```compile_fail
/// use accumulatori::pool::Pool;
///
/// let pool = Pool::new();
/// let acc = pool.adder::<u64>();
/// let mut registry = pool.registry::<u64>();
/// let mut local = acc.local(&mut registry).unwrap();
/// drop(acc);
/// local.update(1);
/// ```
pub struct Accumulator<V: Value, O: Operator<V> = Sum> {
    name: &'static str,
    id: usize,
    head: AtomicPtr<Shard<V>>,
    base: V::Atomic,
    operator: O,
    pool: Pool,
}

// SAFETY: the raw pointers reachable from `head` are shards this accumulator
// holds a share of. They are read by any thread and only written by their
// creating registry or by `Drop`, which has exclusive access.
unsafe impl<V: Value, O: Operator<V>> Send for Accumulator<V, O> {}
unsafe impl<V: Value, O: Operator<V>> Sync for Accumulator<V, O> {}

impl<V: Value, O: Operator<V> + Default> Accumulator<V, O> {
    /// Creates an accumulator in `pool`, starting at the operator's identity.
    pub fn new_in(pool: &Pool) -> Self {
        Self::with_operator(pool, O::default())
    }
}

impl<V: Value, O: Operator<V>> Accumulator<V, O> {
    /// Creates an accumulator in `pool` folding with `operator`.
    pub fn with_operator(pool: &Pool, operator: O) -> Self {
        let id = pool.allocate_id();
        tracing::debug!(id, "accumulator created");
        Accumulator {
            name: "",
            id,
            head: AtomicPtr::new(ptr::null_mut()),
            base: operator.identity().into_atomic(),
            operator,
            pool: pool.clone(),
        }
    }

    /// Sets the name of this accumulator, returning `self` for chaining.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Sets the base value the fold starts from.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use accumulatori::pool::Pool;
    ///
    /// let pool = Pool::new();
    /// let budget = pool.adder::<i64>().with_initial(100);
    /// let mut registry = pool.registry::<i64>();
    /// budget.add(&mut registry, -30).unwrap();
    /// assert_eq!(budget.sum(), 70);
    /// ```
    pub fn with_initial(self, initial: V) -> Self {
        initial.store(&self.base, Ordering::Relaxed);
        self
    }

    /// Name of this accumulator, or an empty string.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Identifier of this accumulator within its pool.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The operator this accumulator folds with.
    pub fn operator(&self) -> &O {
        &self.operator
    }

    pub(crate) fn pool(&self) -> &Pool {
        &self.pool
    }

    pub(crate) fn head(&self) -> &AtomicPtr<Shard<V>> {
        &self.head
    }

    /// Returns the calling thread's shard, creating or recycling it on first
    /// use.
    ///
    /// Keep the handle for a hot loop; it borrows `registry` so no other
    /// shard of that registry can be written meanwhile.
    ///
    /// # Errors
    ///
    /// [`AccumulatorError::ForeignRegistry`](crate::error::AccumulatorError::ForeignRegistry)
    /// if `registry` comes from a different pool.
    pub fn local<'a>(
        &'a self,
        registry: &'a mut ThreadShardRegistry<V>,
    ) -> Result<LocalShard<'a, V, O>> {
        let shard = registry.get_or_create(self)?;
        Ok(LocalShard {
            shard,
            operator: &self.operator,
        })
    }

    /// Applies one contribution from the calling thread.
    #[inline]
    pub fn update(&self, registry: &mut ThreadShardRegistry<V>, value: V) -> Result<()> {
        self.local(registry)?.update(value);
        Ok(())
    }

    /// Folds the base value and every shard with this accumulator's operator.
    ///
    /// This is a best-effort snapshot: updates racing with the traversal may
    /// or may not be included. Updates made earlier by the calling thread, or
    /// by threads it has joined, are always included.
    pub fn result(&self) -> V {
        self.result_with(|acc, value| self.operator.combine(acc, value))
    }

    /// Folds the base value and every shard with `op`.
    ///
    /// Shards are visited most-recently-linked first, an order that depends
    /// on thread timing. `op` must be associative and commutative for the
    /// result to be deterministic, and should have the same identity as this
    /// accumulator's operator.
    pub fn result_with<F: Fn(V, V) -> V>(&self, op: F) -> V {
        self.shards()
            .fold(V::load(&self.base, Ordering::Relaxed), |acc, shard| {
                op(acc, shard.value())
            })
    }

    /// Number of shards linked into this accumulator, one per thread that
    /// updated it.
    pub fn shard_count(&self) -> usize {
        self.shards().count()
    }

    fn shards(&self) -> Shards<'_, V> {
        Shards {
            cursor: self.head.load(Ordering::Acquire),
            _accumulator: PhantomData,
        }
    }
}

impl<V> Accumulator<V, Sum>
where
    V: Value,
    Sum: Operator<V>,
{
    /// Adds `value` from the calling thread.
    #[inline]
    pub fn add(&self, registry: &mut ThreadShardRegistry<V>, value: V) -> Result<()> {
        self.update(registry, value)
    }

    /// Returns the current total.
    pub fn sum(&self) -> V {
        self.result()
    }
}

impl<V: Value, O: Operator<V>> Drop for Accumulator<V, O> {
    fn drop(&mut self) {
        let identity = self.operator.identity();
        let mut walked = 0;
        let mut freed = 0;
        let mut cursor = *self.head.get_mut();
        while let Some(shard) = NonNull::new(cursor) {
            // SAFETY: every shard on the list holds our share until the
            // retire below; `next` is read before giving it up.
            unsafe {
                cursor = shard.as_ref().next();
                shard.as_ref().reset(identity);
                if Shard::retire(shard) {
                    freed += 1;
                }
            }
            walked += 1;
        }
        self.pool.shards_freed(freed);
        self.pool.release_id(self.id);
        tracing::debug!(id = self.id, walked, freed, "accumulator destroyed");
    }
}

/// Iterator over the shards of a live accumulator.
struct Shards<'a, V: Value> {
    cursor: *mut Shard<V>,
    _accumulator: PhantomData<&'a Shard<V>>,
}

impl<'a, V: Value> Iterator for Shards<'a, V> {
    type Item = &'a Shard<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let shard = NonNull::new(self.cursor)?;
        // SAFETY: the accumulator borrowed for 'a holds a share of every
        // shard on its list, and shards are never unlinked.
        let shard = unsafe { &*shard.as_ptr() };
        self.cursor = shard.next();
        Some(shard)
    }
}

/// The calling thread's shard of one accumulator.
///
/// Obtained from [`Accumulator::local`]. Holding it borrows the thread's
/// registry mutably, so it is the only writer of its shard.
pub struct LocalShard<'a, V: Value, O> {
    shard: &'a Shard<V>,
    operator: &'a O,
}

impl<V: Value, O: Operator<V>> LocalShard<'_, V, O> {
    /// Combines `value` into this thread's shard using the accumulator's
    /// operator.
    #[inline]
    pub fn update(&mut self, value: V) {
        let operator = self.operator;
        self.shard
            .update(value, |acc, value| operator.combine(acc, value));
    }

    /// Combines `value` into this thread's shard using `op`.
    #[inline]
    pub fn update_with<F: FnOnce(V, V) -> V>(&mut self, value: V, op: F) {
        self.shard.update(value, op);
    }

    /// This thread's contribution to the accumulator.
    #[inline]
    pub fn local_value(&self) -> V {
        self.shard.value()
    }
}

impl<V: Value, O> Debug for LocalShard<'_, V, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalShard").field(&self.shard.value()).finish()
    }
}

/// A named value that observers can report.
pub trait Observable: Debug {
    /// Name set with `with_name()`, or an empty string.
    fn name(&self) -> &str;

    /// Current folded value.
    fn value(&self) -> AccumulatedValue;
}

impl<V: Value, O: Operator<V>> Observable for Accumulator<V, O> {
    fn name(&self) -> &str {
        self.name
    }

    fn value(&self) -> AccumulatedValue {
        self.result().observe()
    }
}

impl Display for dyn Observable + '_ {
    /// Formats as `name:value` if named, or just `value` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name().is_empty() {
            write!(f, "{}:{}", self.name(), self.value())
        } else {
            write!(f, "{}", self.value())
        }
    }
}

impl<V: Value, O: Operator<V>> Debug for Accumulator<V, O> {
    /// Output format: `name#id{ base shard shard ... }`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}{{", self.name, self.id)?;
        write!(f, " {:?}", V::load(&self.base, Ordering::Relaxed))?;
        for shard in self.shards() {
            write!(f, " {:?}", shard.value())?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccumulatorError;
    use crate::operator::{Max, Min, Product};
    use std::sync::{mpsc, Arc, Barrier};
    use std::thread;

    #[test]
    fn test_new() {
        let pool = Pool::new();
        let acc = pool.adder::<u64>();
        assert_eq!(acc.sum(), 0);
        assert_eq!(acc.shard_count(), 0);
        assert_eq!(acc.name(), "");
    }

    #[test]
    fn test_single_thread_read_after_write() {
        let pool = Pool::new();
        let acc = pool.adder::<u32>();
        let mut registry = pool.registry::<u32>();
        let mut expected = 0;
        for v in [3, 9, 27, 1, 0, 40] {
            acc.add(&mut registry, v).unwrap();
            expected += v;
            assert_eq!(acc.sum(), expected);
        }
        assert_eq!(acc.shard_count(), 1);
    }

    #[test]
    fn test_local_handle() {
        let pool = Pool::new();
        let acc = pool.adder::<i64>();
        let mut registry = pool.registry::<i64>();
        let mut local = acc.local(&mut registry).unwrap();
        local.update(10);
        local.update(-4);
        assert_eq!(local.local_value(), 6);
        assert_eq!(acc.sum(), 6);
    }

    #[test]
    fn test_operators() {
        let pool = Pool::new();
        let mut registry = pool.registry::<u32>();
        let max = pool.accumulator::<u32, Max>();
        let min = pool.accumulator::<u32, Min>();
        let product = pool.accumulator::<u32, Product>();

        assert_eq!(max.result(), 0);
        assert_eq!(min.result(), u32::MAX);
        assert_eq!(product.result(), 1);

        for v in [5, 2, 9, 3] {
            max.update(&mut registry, v).unwrap();
            min.update(&mut registry, v).unwrap();
            product.update(&mut registry, v).unwrap();
        }
        assert_eq!(max.result(), 9);
        assert_eq!(min.result(), 2);
        assert_eq!(product.result(), 270);
    }

    #[test]
    fn test_update_with_and_result_with() {
        let pool = Pool::new();
        let acc = pool.adder::<u64>();
        let mut registry = pool.registry::<u64>();
        let mut local = acc.local(&mut registry).unwrap();
        local.update_with(0b0101, |a, b| a | b);
        local.update_with(0b1000, |a, b| a | b);
        assert_eq!(acc.result_with(|a, b| a | b), 0b1101);
    }

    #[test]
    fn test_float_sum() {
        let pool = Pool::new();
        let acc = pool.adder::<f64>();
        let mut registry = pool.registry::<f64>();
        acc.add(&mut registry, 0.5).unwrap();
        acc.add(&mut registry, 0.25).unwrap();
        assert_eq!(acc.sum(), 0.75);
    }

    #[test]
    fn test_with_initial() {
        let pool = Pool::new();
        let acc = pool.accumulator::<i32, Max>().with_initial(7);
        let mut registry = pool.registry::<i32>();
        assert_eq!(acc.result(), 7);
        acc.update(&mut registry, 3).unwrap();
        assert_eq!(acc.result(), 7);
        acc.update(&mut registry, 12).unwrap();
        assert_eq!(acc.result(), 12);
    }

    #[test]
    fn test_concurrent_example_scenario() {
        const THREADS: usize = 4;
        const ITERATIONS: usize = 1_000_000;
        const DELTA: u64 = 17;

        let pool = Pool::new();
        let acc = pool.adder::<u64>();
        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    let mut registry = pool.registry::<u64>();
                    let mut local = acc.local(&mut registry).unwrap();
                    for _ in 0..ITERATIONS {
                        local.update(DELTA);
                    }
                });
            }
        });

        assert_eq!(acc.sum(), 68_000_000);
        assert_eq!(acc.shard_count(), THREADS);

        drop(acc);
        let next = pool.adder::<u64>();
        assert_eq!(next.id(), 0);
        assert_eq!(next.sum(), 0);
    }

    #[test]
    fn test_concurrent_many_accumulators() {
        let pool = Pool::new();
        let narrow = pool.adder::<u32>();
        let wide = pool.adder::<u64>();
        let threads = 8;
        thread::scope(|s| {
            for t in 0..threads {
                let (pool, narrow, wide) = (&pool, &narrow, &wide);
                s.spawn(move || {
                    let mut narrow_registry = pool.registry::<u32>();
                    let mut wide_registry = pool.registry::<u64>();
                    for i in 0..10_000u64 {
                        narrow.add(&mut narrow_registry, 3).unwrap();
                        wide.add(&mut wide_registry, t * i).unwrap();
                    }
                });
            }
        });
        let per_thread: u64 = (0..10_000u64).sum();
        assert_eq!(narrow.sum(), 8 * 10_000 * 3);
        assert_eq!(wide.sum(), (0..threads).map(|t| t * per_thread).sum::<u64>());
    }

    #[test]
    fn test_results_during_updates() {
        let pool = Pool::new();
        let acc = pool.adder::<u64>();
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut registry = pool.registry::<u64>();
                    for _ in 0..50_000 {
                        acc.add(&mut registry, 1).unwrap();
                    }
                });
            }
            s.spawn(|| {
                let mut last = 0;
                for _ in 0..1_000 {
                    let now = acc.sum();
                    assert!(now >= last);
                    assert!(now <= 200_000);
                    last = now;
                }
            });
        });
        assert_eq!(acc.sum(), 200_000);
    }

    #[test]
    fn test_identifier_reuse_no_leakage() {
        let pool = Pool::new();
        let keep: Vec<_> = (0..5).map(|_| pool.adder::<u64>()).collect();
        let a = pool.adder::<u64>();
        assert_eq!(a.id(), 5);

        let mut registry = pool.registry::<u64>();
        a.add(&mut registry, 1234).unwrap();
        assert_eq!(a.sum(), 1234);
        drop(a);

        let b = pool.adder::<u64>();
        assert_eq!(b.id(), 5);
        assert_eq!(b.sum(), 0);
        b.add(&mut registry, 6).unwrap();
        assert_eq!(b.sum(), 6);
        assert_eq!(b.shard_count(), 1);

        let stats = pool.stats();
        assert_eq!(stats.shards_allocated, 1);
        assert_eq!(stats.shards_recycled, 1);
        drop(keep);
    }

    #[test]
    fn test_recycled_shard_takes_new_identity() {
        let pool = Pool::new();
        let mut registry = pool.registry::<u32>();

        let sum = pool.adder::<u32>();
        sum.add(&mut registry, 40).unwrap();
        let id = sum.id();
        drop(sum);

        let min = pool.accumulator::<u32, Min>();
        assert_eq!(min.id(), id);
        let local = min.local(&mut registry).unwrap();
        assert_eq!(local.local_value(), u32::MAX);
        min.update(&mut registry, 8).unwrap();
        assert_eq!(min.result(), 8);
    }

    #[test]
    fn test_foreign_registry_rejected() {
        let pool = Pool::new();
        let other = Pool::new();
        let acc = pool.adder::<u64>();
        let mut registry = other.registry::<u64>();
        assert_eq!(
            acc.add(&mut registry, 1),
            Err(AccumulatorError::ForeignRegistry { accumulator: 0 })
        );
        assert_eq!(acc.shard_count(), 0);
    }

    #[test]
    fn test_accumulator_dropped_first() {
        let pool = Pool::new();
        let mut registry = pool.registry::<u64>();
        let acc = pool.adder::<u64>();
        acc.add(&mut registry, 5).unwrap();
        drop(acc);

        let stats = pool.stats();
        assert_eq!(stats.live_shards(), 1);
        assert_eq!(stats.accumulators, 0);

        drop(registry);
        assert_eq!(pool.stats().live_shards(), 0);
    }

    #[test]
    fn test_registry_dropped_first() {
        let pool = Pool::new();
        let acc = pool.adder::<u64>();
        thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    let mut registry = pool.registry::<u64>();
                    acc.add(&mut registry, 100).unwrap();
                });
            }
        });

        // Threads are gone, their contributions are not.
        assert_eq!(acc.sum(), 300);
        assert_eq!(acc.shard_count(), 3);
        assert_eq!(pool.stats().live_shards(), 3);

        drop(acc);
        let stats = pool.stats();
        assert_eq!(stats.shards_freed, 3);
        assert_eq!(stats.live_shards(), 0);
    }

    #[test]
    fn test_racing_teardown() {
        let pool = Pool::new();
        for round in 0..200u64 {
            let acc = Arc::new(pool.adder::<u64>());
            let barrier = Arc::new(Barrier::new(2));

            let worker = {
                let pool = pool.clone();
                let acc = Arc::clone(&acc);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut registry = pool.registry::<u64>();
                    acc.add(&mut registry, round).unwrap();
                    drop(acc);
                    barrier.wait();
                    drop(registry);
                })
            };

            barrier.wait();
            // Last reference: races with the worker's registry teardown.
            drop(acc);
            worker.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.shards_allocated, 200);
        assert_eq!(stats.shards_freed, 200);
        assert_eq!(stats.accumulators, 0);
    }

    #[test]
    fn test_concurrent_recycling_with_long_lived_registries() {
        const WORKERS: usize = 6;
        const ROUNDS: u64 = 300;
        const ITERATIONS: u64 = 100;

        let pool = Pool::new();
        let barrier = Arc::new(Barrier::new(WORKERS + 1));
        let mut senders = Vec::new();
        let mut workers = Vec::new();
        for _ in 0..WORKERS {
            let (tx, rx) = mpsc::channel::<(u64, Arc<Adder<u64>>)>();
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            senders.push(tx);
            workers.push(thread::spawn(move || {
                let mut registry = pool.registry::<u64>();
                for (round, acc) in rx {
                    for _ in 0..ITERATIONS {
                        acc.add(&mut registry, round + 1).unwrap();
                    }
                    drop(acc);
                    barrier.wait();
                }
            }));
        }

        for round in 0..ROUNDS {
            let acc = Arc::new(pool.adder::<u64>());
            assert_eq!(acc.id(), 0);
            for tx in &senders {
                tx.send((round, Arc::clone(&acc))).unwrap();
            }
            barrier.wait();

            assert_eq!(acc.sum(), WORKERS as u64 * ITERATIONS * (round + 1));
            assert_eq!(acc.shard_count(), WORKERS);
            // Workers released their handles before the barrier.
            let acc = Arc::into_inner(acc).unwrap();
            drop(acc);
        }

        drop(senders);
        for worker in workers {
            worker.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.shards_allocated, WORKERS);
        assert_eq!(stats.shards_recycled, WORKERS * (ROUNDS as usize - 1));
        assert_eq!(stats.shards_freed, WORKERS);
        assert_eq!(stats.live_shards(), 0);
        assert_eq!(stats.accumulators, 0);
    }

    #[test]
    fn test_short_lived_accumulators_reuse_shards() {
        let pool = Pool::new();
        let mut registry = pool.registry::<u64>();
        for i in 0..1_000u64 {
            let acc = pool.adder::<u64>();
            acc.add(&mut registry, i).unwrap();
            assert_eq!(acc.sum(), i);
        }
        let stats = pool.stats();
        assert_eq!(stats.shards_allocated, 1);
        assert_eq!(stats.shards_recycled, 999);
        assert_eq!(stats.live_shards(), 1);
    }

    #[test]
    fn test_debug() {
        let pool = Pool::new();
        let acc = pool.adder::<u64>().with_name("hits");
        let mut registry = pool.registry::<u64>();
        acc.add(&mut registry, 5).unwrap();
        let debug_str = format!("{:?}", acc);
        assert_eq!(debug_str, "hits#0{ 0 5 }");
    }

    #[test]
    fn test_dyn_format() {
        let pool = Pool::new();
        let acc = pool.adder::<u64>().with_name("requests");
        let mut registry = pool.registry::<u64>();
        acc.add(&mut registry, 1).unwrap();
        assert_eq!(format!("{}", &acc as &dyn Observable), "requests:1");

        let unnamed = pool.adder::<i32>();
        assert_eq!(format!("{}", &unnamed as &dyn Observable), "0");
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Accumulator<u64, Sum>>();
        assert_send_sync::<Accumulator<f32, Max>>();
    }
}
