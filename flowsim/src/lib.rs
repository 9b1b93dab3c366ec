//! # flowsim — trajectory-based discrete-event simulation
//!
//! flowsim simulates queueing systems: *arrivals* flow through a
//! user-defined *trajectory* of activities, contending for bounded
//! *resources* with priority queueing and optional preemption, all driven by
//! a single virtual-time event loop.
//!
//! ## Quick start
//!
//! ```toml
//! [dependencies]
//! flowsim = "0.1"
//! ```
//!
//! ```
//! use flowsim::prelude::*;
//!
//! let stats = SimulationStats::shared();
//! let mut sim = Simulator::new("clinic", false);
//! sim.set_monitor(stats.clone());
//!
//! sim.add_trajectory(
//!     Trajectory::builder("visit")
//!         .seize("doctor", 1)
//!         .timeout(10.0)
//!         .release("doctor", 1)
//!         .build(),
//! );
//! sim.add_resource("doctor", 1, -1, true, Preemption::Disabled);
//! sim.add_generator("patient", "visit", dists::every(vec![0.0, 5.0]), MonitorLevel::Arrivals)
//!     .unwrap();
//!
//! sim.run(SimTime::from_secs(120)).unwrap();
//! assert_eq!(stats.lock().unwrap().finished_count(), 2);
//! ```
//!
//! ## Crates
//!
//! - [`core`]: the engine — clock, event queue, trajectories, resources,
//!   generators, managers.
//! - [`metrics`]: the statistics sink and CSV/JSON export.

pub use flowsim_core as core;
pub use flowsim_metrics as metrics;

pub mod prelude {
    //! Commonly used types and traits.

    pub use flowsim_core::{
        dists, Dynamic, ManagedParam, Monitor, MonitorLevel, PreemptOrder, Preemption, SeizePolicy,
        SimConfig, SimError, SimTime, Simulator, Trajectory, TrajectoryBuilder,
    };

    pub use flowsim_metrics::{CsvExporter, JsonExporter, SimulationStats, StatsExporter};
}
