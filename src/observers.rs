//! Observers for exporting accumulator values.
//!
//! - [`table`] - Pretty-print accumulators as tables using the `tabled` crate
//! - [`json`] - Serialize accumulators to JSON
//!
//! All observers report failures through [`ObserverError`].
//!
//! # Feature Flags
//!
//! - `table` - Enables the [`table`] module
//! - `json` - Enables the [`json`] module
//! - `full` - Enables all observer modules
//!
//! # Example
//!
//! ```rust,ignore
//! use accumulatori::accumulator::Observable;
//! use accumulatori::observers::Result;
//! use accumulatori::observers::table::TableObserver;
//!
//! fn report(accumulators: &[&dyn Observable]) -> Result<()> {
//!     TableObserver::new().write_to(std::io::stdout(), accumulators.iter().copied())
//! }
//! ```

mod error;

pub use error::{ObserverError, Result};

#[cfg(feature = "table")]
pub mod table;

#[cfg(feature = "json")]
pub mod json;
