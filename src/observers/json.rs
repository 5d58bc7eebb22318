//! JSON observer for serializing accumulators.
//!
//! This module provides [`JsonObserver`], which serializes a collection of
//! [`Observable`] accumulators using the types from [`crate::snapshot`].
//!
//! # Feature Flag
//!
//! This module requires the `json` feature:
//!
//! ```toml
//! [dependencies]
//! accumulatori = { version = "0.1", features = ["json"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use accumulatori::accumulator::Observable;
//! use accumulatori::observers::json::JsonObserver;
//! use accumulatori::pool::Pool;
//!
//! let pool = Pool::new();
//! let requests = pool.adder::<u64>().with_name("http_requests");
//!
//! let observed: Vec<&dyn Observable> = vec![&requests];
//! let json = JsonObserver::new().to_json(observed.into_iter())?;
//! // [{"name":"http_requests","value":0}]
//! ```

use std::io::Write;

use crate::accumulator::Observable;
use crate::observers::Result;
use crate::snapshot::{AccumulatorSnapshot, MetricsSnapshot};

/// Configuration for the JSON observer.
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    /// Whether to pretty-print the JSON output.
    pub pretty: bool,
    /// Whether to include a timestamp in the output.
    pub include_timestamp: bool,
    /// Whether to wrap accumulators in a [`MetricsSnapshot`] object.
    pub wrap_in_snapshot: bool,
}

/// An observer that serializes accumulators to JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonObserver {
    config: JsonConfig,
}

impl JsonObserver {
    /// Creates a new JSON observer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new JSON observer with the specified configuration.
    pub fn with_config(config: JsonConfig) -> Self {
        Self { config }
    }

    /// Enables or disables pretty-printing.
    pub fn pretty(mut self, enabled: bool) -> Self {
        self.config.pretty = enabled;
        self
    }

    /// Enables or disables timestamp inclusion.
    ///
    /// Only has effect when `wrap_in_snapshot` is also enabled.
    pub fn include_timestamp(mut self, enabled: bool) -> Self {
        self.config.include_timestamp = enabled;
        self
    }

    /// Enables or disables wrapping the output in a [`MetricsSnapshot`].
    pub fn wrap_in_snapshot(mut self, enabled: bool) -> Self {
        self.config.wrap_in_snapshot = enabled;
        self
    }

    /// Folds every accumulator into a snapshot.
    pub fn collect<'a>(
        &self,
        accumulators: impl Iterator<Item = &'a dyn Observable>,
    ) -> Vec<AccumulatorSnapshot> {
        accumulators
            .map(AccumulatorSnapshot::from_observable)
            .collect()
    }

    /// Serializes accumulators to a JSON string.
    pub fn to_json<'a>(
        &self,
        accumulators: impl Iterator<Item = &'a dyn Observable>,
    ) -> Result<String> {
        let mut out = Vec::new();
        self.write_to(&mut out, accumulators)?;
        Ok(String::from_utf8(out)?)
    }

    /// Serializes accumulators as JSON into `writer`.
    pub fn write_to<'a, W: Write>(
        &self,
        writer: W,
        accumulators: impl Iterator<Item = &'a dyn Observable>,
    ) -> Result<()> {
        let snapshots = self.collect(accumulators);

        if self.config.wrap_in_snapshot {
            let snapshot = if self.config.include_timestamp {
                MetricsSnapshot::with_timestamp(snapshots, current_timestamp_ms())
            } else {
                MetricsSnapshot::new(snapshots)
            };
            self.serialize(writer, &snapshot)
        } else {
            self.serialize(writer, &snapshots)
        }
    }

    fn serialize<W: Write, T: serde::Serialize>(&self, writer: W, value: &T) -> Result<()> {
        if self.config.pretty {
            serde_json::to_writer_pretty(writer, value)?;
        } else {
            serde_json::to_writer(writer, value)?;
        }
        Ok(())
    }
}

/// Returns the current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
