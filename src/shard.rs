//! Per-thread shards and their dual-ownership protocol.
//!
//! A [`Shard`] holds one thread's partial result for one accumulator. It has
//! exactly two owners: the [`Accumulator`](crate::accumulator::Accumulator)
//! whose discovery list links it, and the
//! [`ThreadShardRegistry`](crate::registry::ThreadShardRegistry) that created
//! it. Either owner may go away first, on any thread.
//!
//! ```text
//!   created ──► linked (owners = 2) ──► first owner retires (owners = 1)
//!                  ▲                              │
//!                  │ relink (registry, same slot) │ second owner retires
//!                  └──────────────────────────────┤
//!                                                 ▼
//!                                          freed (owners = 0)
//! ```
//!
//! The "who frees" decision is a single `fetch_sub` on the owner count, so two
//! owners retiring concurrently can never both observe themselves as last.
//! Shards are never unlinked from a discovery list; a list is only walked by
//! its accumulator, which holds one share of every shard on it.

use crossbeam_utils::CachePadded;
use std::fmt::{self, Debug};
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicPtr, AtomicUsize, Ordering};

use crate::value::Value;

/// Number of owners a linked shard has.
pub(crate) const OWNERS: usize = 2;

/// One thread's partial result for one accumulator.
///
/// The value cell is written only by the thread holding the registry that
/// created the shard, and read by any thread folding the accumulator. It is
/// cache-line padded so that shards of different threads never share a line.
pub struct Shard<V: Value> {
    value: CachePadded<V::Atomic>,
    next: AtomicPtr<Shard<V>>,
    owners: AtomicUsize,
}

impl<V: Value> Shard<V> {
    /// Allocates a shard holding `initial` and links it at the front of the
    /// list rooted at `head`.
    ///
    /// The returned shard is reachable from `head` and has two owners.
    pub(crate) fn publish_new(head: &AtomicPtr<Shard<V>>, initial: V) -> NonNull<Shard<V>> {
        let shard = NonNull::from(Box::leak(Box::new(Shard {
            value: CachePadded::new(initial.into_atomic()),
            next: AtomicPtr::new(ptr::null_mut()),
            owners: AtomicUsize::new(OWNERS),
        })));
        // SAFETY: freshly allocated, not shared with any other thread yet.
        unsafe { shard.as_ref() }.link(head);
        shard
    }

    /// Pushes this shard at the front of the list rooted at `head`.
    fn link(&self, head: &AtomicPtr<Shard<V>>) {
        let this = self as *const Self as *mut Self;
        let mut next = head.load(Ordering::Relaxed);
        loop {
            self.next.store(next, Ordering::Relaxed);
            match head.compare_exchange_weak(next, this, Ordering::Release, Ordering::Relaxed) {
                Ok(_) => break,
                Err(current) => next = current,
            }
        }
    }

    /// Reuses a stale shard for a new accumulator.
    ///
    /// # Safety
    ///
    /// The caller must be the registry owning this shard, and must have
    /// observed [`Shard::owners`] equal to 1: the previous accumulator has
    /// retired its share and nobody else references the shard.
    pub(crate) unsafe fn relink(&self, head: &AtomicPtr<Shard<V>>, initial: V) {
        initial.store(&self.value, Ordering::Relaxed);
        self.owners.store(OWNERS, Ordering::Relaxed);
        self.link(head);
    }

    /// Returns the current value of this shard.
    #[inline]
    pub fn value(&self) -> V {
        V::load(&self.value, Ordering::Relaxed)
    }

    /// Combines `value` into this shard.
    ///
    /// Only the creating thread writes a shard, so a load/store pair is
    /// enough; readers see either the old or the new value.
    #[inline]
    pub(crate) fn update(&self, value: V, op: impl FnOnce(V, V) -> V) {
        op(self.value(), value).store(&self.value, Ordering::Relaxed);
    }

    /// Overwrites the value. Used by the accumulator on teardown.
    #[inline]
    pub(crate) fn reset(&self, identity: V) {
        identity.store(&self.value, Ordering::Relaxed);
    }

    /// Next shard in the discovery list.
    #[inline]
    pub(crate) fn next(&self) -> *mut Shard<V> {
        self.next.load(Ordering::Acquire)
    }

    /// Current number of owners.
    ///
    /// Acquire pairs with the release in [`Shard::retire`], so an owner that
    /// reads 1 also sees the value written before the other share was dropped.
    #[inline]
    pub(crate) fn owners(&self) -> usize {
        self.owners.load(Ordering::Acquire)
    }

    /// Releases one ownership share, freeing the shard if it was the last.
    ///
    /// Returns `true` if the shard was deallocated.
    ///
    /// # Safety
    ///
    /// `shard` must have been returned by [`Shard::publish_new`], and each
    /// owner must call this exactly once per share it holds. The caller must
    /// not touch the shard afterwards.
    pub(crate) unsafe fn retire(shard: NonNull<Shard<V>>) -> bool {
        if shard.as_ref().owners.fetch_sub(1, Ordering::Release) != 1 {
            return false;
        }
        fence(Ordering::Acquire);
        drop(Box::from_raw(shard.as_ptr()));
        true
    }
}

impl<V: Value> Debug for Shard<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("value", &self.value())
            .field("owners", &self.owners.load(Ordering::Relaxed))
            .finish()
    }
}
