//! Associative operators folded over shards.
//!
//! An [`Operator`] supplies the combining function and its identity element.
//! The identity is the starting value of every fresh shard and the value a
//! shard is reset to when its accumulator is destroyed, so a recycled shard
//! contributes nothing to the next accumulator that reuses it.
//!
//! Shards are folded in discovery-list order, which depends on which thread
//! linked its shard first. The result is only deterministic when the operator
//! is both associative and commutative.

use num_traits::{Bounded, One, Zero};

use crate::value::Value;

/// An associative (and, for deterministic results, commutative) binary
/// operator with an identity element.
///
/// # Examples
///
/// ```rust
/// use accumulatori::operator::{Max, Operator, Sum};
///
/// let zero: u32 = Sum.identity();
/// assert_eq!(Sum.combine(zero, 5u32), 5);
/// assert_eq!(Max.combine(3i64, 9i64), 9);
/// assert_eq!(<Max as Operator<u8>>::identity(&Max), 0);
/// ```
pub trait Operator<V: Value>: Send + Sync {
    /// The identity element: `combine(identity(), v) == v`.
    fn identity(&self) -> V;

    /// Combines the running result with one contribution.
    fn combine(&self, acc: V, value: V) -> V;
}

/// Addition. Standard overflow semantics of `V` apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sum;

impl<V: Value + Zero> Operator<V> for Sum {
    #[inline]
    fn identity(&self) -> V {
        V::zero()
    }

    #[inline]
    fn combine(&self, acc: V, value: V) -> V {
        acc + value
    }
}

/// Multiplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Product;

impl<V: Value + One> Operator<V> for Product {
    #[inline]
    fn identity(&self) -> V {
        V::one()
    }

    #[inline]
    fn combine(&self, acc: V, value: V) -> V {
        acc * value
    }
}

/// Largest observed value. Identity is `V::min_value()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Max;

impl<V: Value + Bounded + PartialOrd> Operator<V> for Max {
    #[inline]
    fn identity(&self) -> V {
        V::min_value()
    }

    #[inline]
    fn combine(&self, acc: V, value: V) -> V {
        if value > acc {
            value
        } else {
            acc
        }
    }
}

/// Smallest observed value. Identity is `V::max_value()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Min;

impl<V: Value + Bounded + PartialOrd> Operator<V> for Min {
    #[inline]
    fn identity(&self) -> V {
        V::max_value()
    }

    #[inline]
    fn combine(&self, acc: V, value: V) -> V {
        if value < acc {
            value
        } else {
            acc
        }
    }
}
