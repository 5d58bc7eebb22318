//! # Accumulatori - Thread-Cached Associative Accumulators
//!
//! A Rust library providing accumulators that fold an associative operator
//! (sum, product, max, min, ...) over values contributed concurrently by many
//! threads, without contended atomic read-modify-write on the hot path.
//!
//! ## The Problem
//!
//! A shared atomic updated with `fetch_add` from every thread is correct, but
//! every update makes the cache line holding it bounce between cores. With
//! many threads and frequent updates that bounce becomes the bottleneck.
//!
//! ## The Solution: Per-Thread Shards
//!
//! Every thread that updates an [`Accumulator`] gets its own [`Shard`] holding
//! a partial result. Only the owning thread writes a shard, so an update is a
//! plain relaxed load, a combine and a relaxed store. Reading the total folds
//! the partials of every shard the accumulator has ever seen.
//!
//! ### Design Principles
//!
//! 1. **Explicit Thread Context**: each worker owns a
//!    [`ThreadShardRegistry`] created from a [`Pool`]. The registry maps
//!    accumulator identifiers to the shards that thread created.
//!
//! 2. **Lock-Free Discovery**: shards are pushed onto an append-only list
//!    headed by the accumulator with a compare-and-swap loop, so readers can
//!    traverse it while writers publish new shards.
//!
//! 3. **Shared Ownership**: a shard is owned by both the accumulator and the
//!    registry. Whichever side lets go last frees it, so accumulators and
//!    threads may end in either order.
//!
//! 4. **Identifier Recycling**: identifiers of destroyed accumulators are
//!    reissued last released first, and a registry reuses the retired shard in
//!    that slot instead of allocating another one.
//!
//! 5. **Cache Line Padding**: each shard's value sits in a
//!    [`crossbeam_utils::CachePadded`] cell to avoid false sharing.
//!
//! ## Available Operators
//!
//! | Type | Identity | Use Case |
//! |------|----------|----------|
//! | [`Sum`] | `0` | Event counts, byte totals |
//! | [`Product`] | `1` | Compound factors |
//! | [`Max`] | `V::min_value()` | Peak values, latency maximums |
//! | [`Min`] | `V::max_value()` | Latency minimums |
//!
//! Custom operators implement [`Operator`]. The fold order across shards is
//! unspecified, so operators should be associative and commutative.
//!
//! ## Quick Start
//!
//! ```rust
//! use accumulatori::{Max, Pool};
//! use std::thread;
//!
//! let pool = Pool::new();
//! let requests = pool.adder::<u64>().with_name("requests");
//! let peak = pool.accumulator::<u32, Max>().with_name("peak_latency_ms");
//!
//! thread::scope(|s| {
//!     for worker in 0..4u32 {
//!         let (requests, peak, pool) = (&requests, &peak, &pool);
//!         s.spawn(move || {
//!             let mut counts = pool.registry::<u64>();
//!             let mut latencies = pool.registry::<u32>();
//!             for i in 0..1000 {
//!                 requests.add(&mut counts, 1).unwrap();
//!                 peak.update(&mut latencies, worker * 1000 + i).unwrap();
//!             }
//!         });
//!     }
//! });
//!
//! assert_eq!(requests.sum(), 4000);
//! assert_eq!(peak.result(), 3999);
//! ```
//!
//! ## Thread Safety
//!
//! Accumulators are `Send + Sync` and can be shared by reference or through
//! `Arc`. Registries are neither: each one belongs to the thread that created
//! it. Using a registry with an accumulator from a different pool returns
//! [`AccumulatorError::ForeignRegistry`].
//!
//! ## Memory Usage
//!
//! One cache-line-padded shard per (thread, accumulator) pair that ever saw an
//! update. Shards are never unlinked while their accumulator lives; they are
//! freed when both the accumulator and the registry are gone.
//!
//! ## Observers
//!
//! Optional observer modules export accumulator values. Each is gated behind
//! a feature flag:
//!
//! | Feature | Module | Description |
//! |---------|--------|-------------|
//! | `table` | [`observers::table`] | Pretty-print accumulators as tables |
//! | `json` | [`observers::json`] | Serialize accumulators to JSON |
//! | `serde` | [`snapshot`] | Serializable snapshot types |
//! | `full` | All observers | Enables all observer modules |
//!
//! ```rust,ignore
//! use accumulatori::accumulator::Observable;
//! use accumulatori::observers::table::TableObserver;
//!
//! let observed: Vec<&dyn Observable> = vec![&requests, &peak];
//! println!("{}", TableObserver::new().render(observed.into_iter()));
//! ```

pub mod accumulator;
pub mod error;
pub mod identifier;
pub mod observers;
pub mod operator;
pub mod pool;
pub mod registry;
pub mod shard;
pub mod value;

#[cfg(feature = "serde")]
pub mod snapshot;

pub use accumulator::{Accumulator, Adder, LocalShard, Observable};
pub use error::{AccumulatorError, Result};
pub use operator::{Max, Min, Operator, Product, Sum};
pub use pool::{Pool, PoolStats};
pub use registry::ThreadShardRegistry;
pub use shard::Shard;
pub use value::{AccumulatedValue, Value};
