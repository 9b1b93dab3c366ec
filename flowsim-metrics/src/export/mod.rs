//! Export of collected statistics.
//!
//! Exporters consume a [`SimulationStats`] and write its tables somewhere
//! useful: [`CsvExporter`] produces one CSV file per table for spreadsheet
//! or pandas analysis, [`JsonExporter`] a single structured document.

pub mod csv;
pub mod json;

pub use csv::CsvExporter;
pub use json::JsonExporter;

use crate::error::MetricsError;
use crate::stats::SimulationStats;

/// Writes collected statistics to an external destination.
pub trait StatsExporter {
    fn export(&self, stats: &SimulationStats) -> Result<(), MetricsError>;
}
