//! Core discrete-event simulation engine for queueing systems.
//!
//! The engine advances virtual time by dispatching events from a priority
//! queue. Entities called *arrivals* flow through a user-built *trajectory*
//! of activities (timeouts, attribute writes, branches, rollbacks), and
//! contend for bounded *resources* with priority queueing and optional
//! preemption. *Generators* feed arrivals in on a schedule supplied by the
//! host, and *managers* reshape resource capacity over time.
//!
//! # Overview
//!
//! - [`Simulator`]: the façade. Owns the clock, the event queue, and the
//!   registries; drives everything through [`step`](Simulator::step) /
//!   [`run`](Simulator::run).
//! - [`Trajectory`]: the activity graph, built front-to-back with
//!   [`TrajectoryBuilder`].
//! - [`Monitor`]: the push-style statistics sink the engine reports arrival
//!   and resource events to (see the `flowsim-metrics` crate for a real
//!   implementation).
//! - [`dists`]: ready-made inter-arrival callbacks.
//!
//! # Example
//!
//! An M/D/1-style queue with two eager customers:
//!
//! ```
//! use flowsim_core::{dists, MonitorLevel, SimTime, Simulator, Trajectory};
//!
//! let mut sim = Simulator::new("shop", false);
//! sim.add_trajectory(
//!     Trajectory::builder("service")
//!         .seize("clerk", 1)
//!         .timeout(5.0)
//!         .release("clerk", 1)
//!         .build(),
//! );
//! sim.add_resource("clerk", 1, -1, false, Default::default());
//! sim.add_generator(
//!     "customer",
//!     "service",
//!     dists::every(vec![0.0, 0.0]),
//!     MonitorLevel::Off,
//! )
//! .unwrap();
//!
//! sim.run(SimTime::from_secs(60)).unwrap();
//! assert_eq!(sim.created_arrivals(), 2);
//! assert_eq!(sim.ended_arrivals(), 2);
//! ```
//!
//! # Time model
//!
//! All timing uses [`SimTime`], a nanosecond-precision virtual clock that
//! only moves at event dispatch. Host callbacks exchange delays as `f64`
//! seconds.

pub mod arrival;
pub mod dists;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod process;
pub mod resource;
pub mod scheduler;
pub mod simulator;
pub mod time;
pub mod trajectory;

pub use arrival::{Arrival, Attributes, MonitorLevel};
pub use dists::SimConfig;
pub use error::SimError;
pub use logging::{init_logging, init_logging_with_level};
pub use monitor::{null_monitor, Monitor, MonitorHandle, NullMonitor};
pub use process::{DistFn, Generator, ManagedParam, Manager};
pub use resource::{PreemptOrder, Resource, SeizePolicy, SeizeResult, UNBOUNDED};
pub use scheduler::{priority, ArrivalId, ClockRef, ProcessRef, Scheduler};
pub use simulator::{Preemption, Simulator};
pub use time::SimTime;
pub use trajectory::{Dynamic, Trajectory, TrajectoryBuilder};
