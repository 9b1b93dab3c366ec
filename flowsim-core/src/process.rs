//! Self-rescheduling processes: arrival generators and resource managers.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::arrival::{ArrivalArena, MonitorLevel};
use crate::monitor::MonitorHandle;
use crate::resource::Resource;
use crate::scheduler::{priority, ArrivalId, ProcessRef, Scheduler};
use crate::time::SimTime;
use crate::trajectory::ActivityId;

/// Host callback yielding inter-arrival delays in seconds. A negative value
/// ends the generator.
pub type DistFn = Box<dyn FnMut() -> f64>;

/// Registry entry for a named process.
pub(crate) enum Process {
    Generator(Generator),
    Manager(Manager),
}

/// Periodic source of arrivals into a trajectory.
///
/// Each run creates one arrival at the current instant, named
/// `"{prefix}{counter}"`, then sleeps for whatever the inter-arrival
/// callback returns.
pub struct Generator {
    prefix: String,
    trajectory: String,
    first: Option<ActivityId>,
    dist: DistFn,
    monitoring: MonitorLevel,
    count: u64,
}

impl Generator {
    pub(crate) fn new(
        prefix: String,
        trajectory: String,
        first: Option<ActivityId>,
        dist: DistFn,
        monitoring: MonitorLevel,
    ) -> Self {
        Self {
            prefix,
            trajectory,
            first,
            dist,
            monitoring,
            count: 0,
        }
    }

    /// Arrivals produced so far.
    pub fn generated(&self) -> u64 {
        self.count
    }

    /// Name of the trajectory this generator feeds.
    pub fn trajectory(&self) -> &str {
        &self.trajectory
    }

    pub(crate) fn reset(&mut self) {
        self.count = 0;
    }

    pub(crate) fn run(
        &mut self,
        arrivals: &mut ArrivalArena,
        scheduler: &mut Scheduler,
        monitor: &MonitorHandle,
    ) {
        let delta = (self.dist)();
        if !delta.is_finite() {
            warn!(generator = %self.prefix, delta, "non-finite inter-arrival delay, stopping");
            return;
        }
        if delta < 0.0 {
            debug!(generator = %self.prefix, "generator finished");
            return;
        }

        let now = scheduler.time();
        let name = format!("{}{}", self.prefix, self.count);
        self.count += 1;
        let id = arrivals.create(
            name.clone(),
            now,
            self.trajectory.clone(),
            self.first,
            self.monitoring,
        );
        if self.monitoring >= MonitorLevel::Arrivals {
            monitor.lock().unwrap().on_arrival_start(&name, now);
        }
        scheduler.schedule(SimTime::zero(), ProcessRef::Arrival(id), priority::NORMAL);
        scheduler.schedule(
            SimTime::from_secs_f64(delta),
            ProcessRef::Named(self.prefix.clone()),
            priority::NORMAL,
        );
    }
}

/// Which resource parameter a manager drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedParam {
    Capacity,
    QueueSize,
}

impl ManagedParam {
    pub(crate) fn label(self) -> &'static str {
        match self {
            ManagedParam::Capacity => "capacity",
            ManagedParam::QueueSize => "queue_size",
        }
    }
}

/// Time-series driver for a resource parameter.
///
/// Applies `values[i]` now, sleeps `durations[i]`, and moves to the next
/// pair modulo the schedule length. A negative duration stops the manager
/// after its value is applied.
pub struct Manager {
    name: String,
    resource: String,
    param: ManagedParam,
    durations: Vec<f64>,
    values: Vec<i32>,
    index: usize,
}

impl Manager {
    pub(crate) fn new(
        name: String,
        resource: String,
        param: ManagedParam,
        durations: Vec<f64>,
        values: Vec<i32>,
    ) -> Self {
        assert_eq!(
            durations.len(),
            values.len(),
            "durations and values must be the same length"
        );
        Self {
            name,
            resource,
            param,
            durations,
            values,
            index: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.index = 0;
    }

    /// Apply the current value, returning any queued arrivals the change
    /// rejected (queue shrinks); the caller terminates them.
    #[must_use]
    pub(crate) fn run(
        &mut self,
        resources: &mut HashMap<String, Resource>,
        arrivals: &mut ArrivalArena,
        scheduler: &mut Scheduler,
        monitor: &MonitorHandle,
    ) -> Vec<ArrivalId> {
        if self.durations.is_empty() {
            return Vec::new();
        }
        let Some(resource) = resources.get_mut(&self.resource) else {
            warn!(manager = %self.name, resource = %self.resource, "managed resource is gone");
            return Vec::new();
        };

        let value = self.values[self.index];
        let dropped = match self.param {
            ManagedParam::Capacity => {
                resource.set_capacity(value, arrivals, scheduler, monitor);
                Vec::new()
            }
            ManagedParam::QueueSize => resource.set_queue_size(value, scheduler, monitor),
        };

        let duration = self.durations[self.index];
        if duration >= 0.0 && duration.is_finite() {
            scheduler.schedule(
                SimTime::from_secs_f64(duration),
                ProcessRef::Named(self.name.clone()),
                priority::NORMAL,
            );
            self.index = (self.index + 1) % self.durations.len();
        } else {
            debug!(manager = %self.name, "schedule exhausted");
        }
        dropped
    }
}
