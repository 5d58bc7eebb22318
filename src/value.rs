//! Value types an accumulator can hold.
//!
//! Every shard stores its partial result in an atomic cell so that readers
//! folding the accumulator race with the owning writer in a well-defined way.
//! [`Value`] maps each supported primitive onto that atomic storage:
//! integers use their native atomic type, floats are stored as bit patterns
//! in the same-width unsigned atomic.

use atomic_traits::Atomic;
use std::fmt::{Debug, Display};
use std::sync::atomic::{
    AtomicI16, AtomicI32, AtomicI64, AtomicI8, AtomicIsize, AtomicU16, AtomicU32, AtomicU64,
    AtomicU8, AtomicUsize, Ordering,
};

/// A numeric type that can be accumulated across threads.
///
/// Implemented for all primitive integers and for `f32`/`f64`.
pub trait Value: Copy + PartialEq + Debug + Send + Sync + 'static {
    /// Atomic cell used by shards and by the accumulator base.
    type Atomic: Atomic + Send + Sync;

    /// Converts the value into the representation stored in [`Value::Atomic`].
    fn to_bits(self) -> <Self::Atomic as Atomic>::Type;

    /// Reconstructs the value from its stored representation.
    fn from_bits(bits: <Self::Atomic as Atomic>::Type) -> Self;

    /// Widens the value for observers.
    fn observe(self) -> AccumulatedValue;

    /// Creates a new atomic cell holding `self`.
    #[inline]
    fn into_atomic(self) -> Self::Atomic {
        Self::Atomic::new(self.to_bits())
    }

    /// Loads a value from an atomic cell.
    #[inline]
    fn load(cell: &Self::Atomic, order: Ordering) -> Self {
        Self::from_bits(cell.load(order))
    }

    /// Stores a value into an atomic cell.
    #[inline]
    fn store(self, cell: &Self::Atomic, order: Ordering) {
        cell.store(self.to_bits(), order)
    }
}

macro_rules! impl_integer_value {
    ($($ty:ty => $atomic:ty, $variant:ident as $wide:ty;)*) => {$(
        impl Value for $ty {
            type Atomic = $atomic;

            #[inline]
            fn to_bits(self) -> $ty {
                self
            }

            #[inline]
            fn from_bits(bits: $ty) -> Self {
                bits
            }

            #[inline]
            fn observe(self) -> AccumulatedValue {
                AccumulatedValue::$variant(self as $wide)
            }
        }
    )*};
}

impl_integer_value! {
    u8 => AtomicU8, Unsigned as u64;
    u16 => AtomicU16, Unsigned as u64;
    u32 => AtomicU32, Unsigned as u64;
    u64 => AtomicU64, Unsigned as u64;
    usize => AtomicUsize, Unsigned as u64;
    i8 => AtomicI8, Signed as i64;
    i16 => AtomicI16, Signed as i64;
    i32 => AtomicI32, Signed as i64;
    i64 => AtomicI64, Signed as i64;
    isize => AtomicIsize, Signed as i64;
}

macro_rules! impl_float_value {
    ($($ty:ty => $atomic:ty, $bits:ty;)*) => {$(
        impl Value for $ty {
            type Atomic = $atomic;

            #[inline]
            fn to_bits(self) -> $bits {
                bytemuck::cast(self)
            }

            #[inline]
            fn from_bits(bits: $bits) -> Self {
                bytemuck::cast(bits)
            }

            #[inline]
            fn observe(self) -> AccumulatedValue {
                AccumulatedValue::Float(self as f64)
            }
        }
    )*};
}

impl_float_value! {
    f32 => AtomicU32, u32;
    f64 => AtomicU64, u64;
}

/// The value of an accumulator, widened to a common representation.
///
/// This enum lets the [`Observable`](crate::accumulator::Observable) trait
/// report accumulators of different value types through one interface.
///
/// # Examples
///
/// ```rust
/// use accumulatori::value::AccumulatedValue;
///
/// assert!(AccumulatedValue::Unsigned(0).is_zero());
/// assert!(!AccumulatedValue::Signed(-10).is_zero());
/// assert_eq!(AccumulatedValue::Float(1.5).to_string(), "1.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum AccumulatedValue {
    /// An unsigned value, widened to 64 bits.
    Unsigned(u64),
    /// A signed value, widened to 64 bits.
    Signed(i64),
    /// A floating point value, widened to `f64`.
    Float(f64),
}

impl AccumulatedValue {
    /// Returns `true` if the value is zero.
    pub fn is_zero(&self) -> bool {
        match self {
            AccumulatedValue::Unsigned(v) => *v == 0,
            AccumulatedValue::Signed(v) => *v == 0,
            AccumulatedValue::Float(v) => *v == 0.0,
        }
    }

    /// Returns the value as an `f64`.
    pub fn as_f64(&self) -> f64 {
        match self {
            AccumulatedValue::Unsigned(v) => *v as f64,
            AccumulatedValue::Signed(v) => *v as f64,
            AccumulatedValue::Float(v) => *v,
        }
    }
}

impl Display for AccumulatedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccumulatedValue::Unsigned(v) => write!(f, "{}", v),
            AccumulatedValue::Signed(v) => write!(f, "{}", v),
            AccumulatedValue::Float(v) => write!(f, "{}", v),
        }
    }
}
