//! Statistics collection and export for flowsim simulations.
//!
//! [`SimulationStats`] implements the engine's `Monitor` trait and records
//! everything the core pushes at it: per-arrival flow records, per-resource
//! occupancy time series, and attribute writes. Attach it with
//! `Simulator::set_monitor`, keep a clone of the handle, and query it after
//! the run:
//!
//! ```no_run
//! use flowsim_core::Simulator;
//! use flowsim_metrics::SimulationStats;
//!
//! let stats = SimulationStats::shared();
//! let mut sim = Simulator::new("demo", false);
//! sim.set_monitor(stats.clone());
//! // ... build and run the model ...
//! let stats = stats.lock().unwrap();
//! println!("finished: {}", stats.finished_count());
//! ```
//!
//! The [`export`] module writes the collected tables as CSV or JSON.

pub mod error;
pub mod export;
pub mod stats;

pub use error::MetricsError;
pub use export::{CsvExporter, JsonExporter, StatsExporter};
pub use stats::{ArrivalRecord, AttributeRecord, ResourceSample, SimulationStats, StatsSnapshot};
