//! Monitoring sink interface.
//!
//! The engine pushes lifecycle and state-change notifications to a
//! [`Monitor`] at fixed points: arrival creation and termination, every
//! resource state change, and attribute writes. A [`NullMonitor`] is
//! attached by default so the call sites are unconditional; swap in a real
//! sink (e.g. `flowsim-metrics`) with
//! [`Simulator::set_monitor`](crate::Simulator::set_monitor).

use crate::time::SimTime;
use std::sync::{Arc, Mutex};

/// Push-style, fire-and-forget statistics sink.
pub trait Monitor: Send {
    /// An arrival entered the simulation.
    fn on_arrival_start(&mut self, name: &str, time: SimTime);

    /// An arrival left the simulation. `finished` is `false` when it was
    /// dropped by policy (e.g. a full queue) rather than reaching the end of
    /// its trajectory.
    fn on_arrival_end(&mut self, name: &str, time: SimTime, finished: bool);

    /// A resource's server, queue, or capacity changed.
    fn on_resource_change(
        &mut self,
        resource: &str,
        time: SimTime,
        server: i32,
        queue: i32,
        capacity: i32,
    );

    /// An arrival wrote an attribute.
    fn on_attribute(&mut self, name: &str, time: SimTime, key: &str, value: f64);
}

/// Shared handle to the attached sink.
pub type MonitorHandle = Arc<Mutex<dyn Monitor>>;

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMonitor;

impl Monitor for NullMonitor {
    fn on_arrival_start(&mut self, _name: &str, _time: SimTime) {}
    fn on_arrival_end(&mut self, _name: &str, _time: SimTime, _finished: bool) {}
    fn on_resource_change(
        &mut self,
        _resource: &str,
        _time: SimTime,
        _server: i32,
        _queue: i32,
        _capacity: i32,
    ) {
    }
    fn on_attribute(&mut self, _name: &str, _time: SimTime, _key: &str, _value: f64) {}
}

pub fn null_monitor() -> MonitorHandle {
    Arc::new(Mutex::new(NullMonitor))
}
