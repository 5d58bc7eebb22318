//! Snapshot types for serializing accumulator state.
//!
//! # Feature Flag
//!
//! This module requires the `serde` feature:
//!
//! ```toml
//! [dependencies]
//! accumulatori = { version = "0.1", features = ["serde"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use accumulatori::pool::Pool;
//! use accumulatori::snapshot::AccumulatorSnapshot;
//!
//! let pool = Pool::new();
//! let requests = pool.adder::<u64>().with_name("requests");
//!
//! let snapshot = AccumulatorSnapshot::from_observable(&requests);
//! let json = serde_json::to_string(&snapshot).unwrap();
//! ```

use crate::accumulator::Observable;
use crate::value::AccumulatedValue;
use serde::{Deserialize, Serialize};

/// A snapshot of a single accumulator's value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccumulatorSnapshot {
    /// The name of the accumulator.
    pub name: String,
    /// The folded value at the time of the snapshot.
    pub value: AccumulatedValue,
}

impl AccumulatorSnapshot {
    /// Creates a new snapshot.
    pub fn new(name: impl Into<String>, value: AccumulatedValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Creates a snapshot by folding an observable accumulator.
    pub fn from_observable(accumulator: &dyn Observable) -> Self {
        Self {
            name: if accumulator.name().is_empty() {
                "(unnamed)".to_string()
            } else {
                accumulator.name().to_string()
            },
            value: accumulator.value(),
        }
    }
}

/// A point-in-time capture of several accumulators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    /// Optional timestamp in milliseconds since Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    /// The accumulator snapshots.
    pub accumulators: Vec<AccumulatorSnapshot>,
}

impl MetricsSnapshot {
    /// Creates a new metrics snapshot.
    pub fn new(accumulators: Vec<AccumulatorSnapshot>) -> Self {
        Self {
            timestamp_ms: None,
            accumulators,
        }
    }

    /// Creates a new metrics snapshot with a timestamp.
    pub fn with_timestamp(accumulators: Vec<AccumulatorSnapshot>, timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms: Some(timestamp_ms),
            accumulators,
        }
    }

    /// Finds an accumulator by name.
    pub fn get(&self, name: &str) -> Option<&AccumulatorSnapshot> {
        self.accumulators.iter().find(|a| a.name == name)
    }

    /// Collects snapshots from observable accumulators.
    pub fn collect<'a>(accumulators: impl Iterator<Item = &'a dyn Observable>) -> Self {
        Self::new(
            accumulators
                .map(AccumulatorSnapshot::from_observable)
                .collect(),
        )
    }
}
