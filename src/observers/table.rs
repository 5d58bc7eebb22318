//! Table observer for pretty-printing accumulators.
//!
//! This module provides [`TableObserver`], which renders a collection of
//! [`Observable`] accumulators as a formatted table using the `tabled` crate.
//!
//! # Feature Flag
//!
//! This module requires the `table` feature:
//!
//! ```toml
//! [dependencies]
//! accumulatori = { version = "0.1", features = ["table"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use accumulatori::observers::table::{TableObserver, TableStyle};
//!
//! let observer = TableObserver::new().with_style(TableStyle::Rounded);
//! println!("{}", observer.render(accumulators.into_iter()));
//! // ╭──────────┬──────────╮
//! // │ Name     │ Value    │
//! // ├──────────┼──────────┤
//! // │ u64_sum  │ 68000000 │
//! // │ u32_sum  │ 4000     │
//! // ╰──────────┴──────────╯
//! ```

use std::io::Write;

use crate::accumulator::Observable;
use crate::observers::Result;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

/// Available table styles for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    /// Sharp corners with box-drawing characters
    Sharp,
    /// Modern style with clean lines
    Modern,
    /// GitHub-flavored Markdown table
    Markdown,
    /// No borders, just spacing
    Blank,
}

/// Configuration for the table observer.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// The style to use for rendering.
    pub style: TableStyle,
    /// Whether to show the header row (only in non-compact mode).
    pub show_header: bool,
    /// Custom title printed above the table.
    pub title: Option<String>,
    /// Whether to use compact format (`name: value` cells).
    pub compact: bool,
    /// Number of columns in compact mode.
    pub columns: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            style: TableStyle::default(),
            show_header: true,
            title: None,
            compact: false,
            columns: 1,
        }
    }
}

#[derive(Tabled)]
struct AccumulatorRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// An observer that renders accumulators as a table.
///
/// Standard mode prints a Name/Value table; compact mode arranges
/// `name: value` cells in a grid.
#[derive(Debug, Clone, Default)]
pub struct TableObserver {
    config: TableConfig,
}

impl TableObserver {
    /// Creates a new table observer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new table observer with the specified configuration.
    pub fn with_config(config: TableConfig) -> Self {
        Self { config }
    }

    /// Sets the table style.
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.config.style = style;
        self
    }

    /// Sets whether to show the header row.
    pub fn with_header(mut self, show: bool) -> Self {
        self.config.show_header = show;
        self
    }

    /// Sets a title printed above the table.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    /// Enables or disables compact mode.
    pub fn compact(mut self, enabled: bool) -> Self {
        self.config.compact = enabled;
        self
    }

    /// Sets the number of columns in compact mode. Values below 1 become 1.
    pub fn columns(mut self, count: usize) -> Self {
        self.config.columns = count.max(1);
        self
    }

    fn apply_style(&self, table: &mut Table) {
        match self.config.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Modern => {
                table.with(Style::modern());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    fn display_name(accumulator: &dyn Observable) -> String {
        if accumulator.name().is_empty() {
            "(unnamed)".to_string()
        } else {
            accumulator.name().to_string()
        }
    }

    fn titled(&self, table: Table) -> String {
        match self.config.title {
            Some(ref title) => format!("{}\n{}", title, table),
            None => table.to_string(),
        }
    }

    fn render_compact<'a>(&self, accumulators: impl Iterator<Item = &'a dyn Observable>) -> String {
        let cells: Vec<String> = accumulators
            .map(|a| format!("{}: {}", Self::display_name(a), a.value()))
            .collect();

        if cells.is_empty() {
            return String::new();
        }

        let cols = self.config.columns;
        let mut builder = Builder::default();
        for chunk in cells.chunks(cols) {
            let mut row: Vec<String> = chunk.to_vec();
            row.resize(cols, String::new());
            builder.push_record(row);
        }

        let mut table = builder.build();
        self.apply_style(&mut table);
        self.titled(table)
    }

    fn render_standard<'a>(
        &self,
        accumulators: impl Iterator<Item = &'a dyn Observable>,
    ) -> String {
        let rows: Vec<AccumulatorRow> = accumulators
            .map(|a| AccumulatorRow {
                name: Self::display_name(a),
                value: a.value().to_string(),
            })
            .collect();

        let mut table = Table::new(&rows);
        self.apply_style(&mut table);

        if !self.config.show_header {
            table.with(tabled::settings::Remove::row(
                tabled::settings::object::Rows::first(),
            ));
        }
        self.titled(table)
    }

    /// Folds every accumulator and renders the results as a table.
    pub fn render<'a>(&self, accumulators: impl Iterator<Item = &'a dyn Observable>) -> String {
        if self.config.compact {
            self.render_compact(accumulators)
        } else {
            self.render_standard(accumulators)
        }
    }

    /// Renders the table followed by a newline into `writer`.
    pub fn write_to<'a, W: Write>(
        &self,
        mut writer: W,
        accumulators: impl Iterator<Item = &'a dyn Observable>,
    ) -> Result<()> {
        writeln!(writer, "{}", self.render(accumulators))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Max;
    use crate::pool::Pool;

    #[test]
    fn test_render_empty_compact() {
        let observed: Vec<&dyn Observable> = vec![];
        let output = TableObserver::new()
            .compact(true)
            .columns(3)
            .render(observed.into_iter());
        assert!(output.is_empty());
    }

    #[test]
    fn test_render_standard() {
        let pool = Pool::new();
        let requests = pool.adder::<u64>().with_name("requests");
        let peak = pool.accumulator::<u32, Max>();
        let mut unsigned = pool.registry::<u64>();
        let mut narrow = pool.registry::<u32>();
        requests.add(&mut unsigned, 42).unwrap();
        peak.update(&mut narrow, 9).unwrap();

        let observed: Vec<&dyn Observable> = vec![&requests, &peak];
        let output = TableObserver::new()
            .with_style(TableStyle::Ascii)
            .render(observed.into_iter());

        assert!(output.contains("Name"));
        assert!(output.contains("requests"));
        assert!(output.contains("42"));
        assert!(output.contains("(unnamed)"));
    }

    #[test]
    fn test_render_without_header_with_title() {
        let pool = Pool::new();
        let bytes = pool.adder::<u64>().with_name("bytes");
        let observed: Vec<&dyn Observable> = vec![&bytes];
        let output = TableObserver::new()
            .with_header(false)
            .with_title("Totals")
            .render(observed.into_iter());

        assert!(output.starts_with("Totals\n"));
        assert!(!output.contains("Name"));
        assert!(output.contains("bytes"));
    }

    #[test]
    fn test_render_compact_columns() {
        let pool = Pool::new();
        let a = pool.adder::<u64>().with_name("a");
        let b = pool.adder::<u64>().with_name("b");
        let c = pool.adder::<u64>().with_name("c");
        let observed: Vec<&dyn Observable> = vec![&a, &b, &c];

        let output = TableObserver::new()
            .compact(true)
            .columns(2)
            .with_style(TableStyle::Markdown)
            .render(observed.into_iter());

        assert!(output.contains("a: 0"));
        assert!(output.contains("c: 0"));
        assert_eq!(output.lines().filter(|l| l.contains(": 0")).count(), 2);
    }

    #[test]
    fn test_write_to() {
        let pool = Pool::new();
        let bytes = pool.adder::<u64>().with_name("bytes");
        let observed: Vec<&dyn Observable> = vec![&bytes];
        let mut out = Vec::new();
        TableObserver::new()
            .write_to(&mut out, observed.into_iter())
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.ends_with('\n'));
        assert!(out.contains("bytes"));
    }
}
