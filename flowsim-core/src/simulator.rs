//! The simulator façade: registries, event dispatch, and run control.

use std::collections::HashMap;

use tracing::{debug, info, trace, warn};

use crate::arrival::{Arrival, ArrivalArena, MonitorLevel};
use crate::error::SimError;
use crate::monitor::{null_monitor, MonitorHandle};
use crate::process::{DistFn, Generator, ManagedParam, Manager, Process};
use crate::resource::{PreemptOrder, Resource};
use crate::scheduler::{priority, ArrivalId, ClockRef, ProcessRef, Scheduler};
use crate::time::SimTime;
use crate::trajectory::{Step, Trajectory};

/// How many steps [`Simulator::run`] takes between cancellation checks.
const INTERRUPT_CHECK_STEPS: u64 = 100_000;

/// Mutable engine state handed to resource and activity code during one
/// event. The arrival being executed is moved out of the arena first, so
/// these borrows never alias it.
pub(crate) struct SimCtx<'a> {
    pub(crate) resources: &'a mut HashMap<String, Resource>,
    pub(crate) arrivals: &'a mut ArrivalArena,
    pub(crate) scheduler: &'a mut Scheduler,
    pub(crate) monitor: &'a MonitorHandle,
}

/// A discrete-event simulation of a queueing system.
///
/// The simulator owns the clock and event queue, the arena of live
/// arrivals, and name-keyed registries of trajectories, resources, and
/// processes (generators and managers). Build the model with the `add_*`
/// methods, then drive it with [`run`](Self::run) or [`step`](Self::step).
///
/// ```
/// use flowsim_core::{dists, MonitorLevel, SimTime, Simulator, Trajectory};
///
/// let mut sim = Simulator::new("bank", false);
/// sim.add_trajectory(
///     Trajectory::builder("visit")
///         .seize("teller", 1)
///         .timeout(5.0)
///         .release("teller", 1)
///         .build(),
/// );
/// sim.add_resource("teller", 1, -1, true, Default::default());
/// sim.add_generator("customer", "visit", dists::every(vec![0.0, 0.0]), MonitorLevel::Arrivals)
///     .unwrap();
/// sim.run(SimTime::from_secs(100)).unwrap();
/// assert_eq!(sim.now(), SimTime::from_secs(10));
/// ```
pub struct Simulator {
    name: String,
    verbose: bool,
    scheduler: Scheduler,
    arrivals: ArrivalArena,
    trajectories: HashMap<String, Trajectory>,
    processes: HashMap<String, Process>,
    resources: HashMap<String, Resource>,
    monitor: MonitorHandle,
    interrupt: Option<Box<dyn FnMut() -> bool>>,
}

/// Preemption configuration for [`Simulator::add_resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preemption {
    Disabled,
    Enabled(PreemptOrder),
}

impl Default for Preemption {
    fn default() -> Self {
        Preemption::Disabled
    }
}

impl Simulator {
    pub fn new(name: &str, verbose: bool) -> Self {
        Self {
            name: name.to_string(),
            verbose,
            scheduler: Scheduler::new(),
            arrivals: ArrivalArena::default(),
            trajectories: HashMap::new(),
            processes: HashMap::new(),
            resources: HashMap::new(),
            monitor: null_monitor(),
            interrupt: None,
        }
    }

    /// Attach a monitoring sink. Replaces the default no-op sink.
    pub fn set_monitor(&mut self, monitor: MonitorHandle) {
        self.monitor = monitor;
    }

    /// Install a cancellation check polled every 100 000 steps of
    /// [`run`](Self::run). A `true` result aborts the run with
    /// [`SimError::Interrupted`], leaving all state inspectable.
    pub fn set_interrupt_check(&mut self, check: impl FnMut() -> bool + 'static) {
        self.interrupt = Some(Box::new(check));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.scheduler.time()
    }

    /// Lock-free reader for the clock.
    pub fn clock(&self) -> ClockRef {
        self.scheduler.clock()
    }

    /// Time of the next scheduled event, if any.
    pub fn peek(&mut self) -> Option<SimTime> {
        self.scheduler.peek()
    }

    /// Live arrivals (scheduled, queued, or preempted).
    pub fn active_arrivals(&self) -> usize {
        self.arrivals.len()
    }

    /// Arrivals created since the last reset.
    pub fn created_arrivals(&self) -> u64 {
        self.arrivals.created()
    }

    /// Arrivals finished or dropped since the last reset.
    pub fn ended_arrivals(&self) -> u64 {
        self.arrivals.ended()
    }

    /// Register a trajectory. Duplicate names warn and return `false`.
    pub fn add_trajectory(&mut self, trajectory: Trajectory) -> bool {
        if self.trajectories.contains_key(trajectory.name()) {
            warn!(trajectory = trajectory.name(), "trajectory already defined");
            return false;
        }
        if self.verbose {
            debug!(sim = %self.name, "{trajectory}");
        }
        self.trajectories
            .insert(trajectory.name().to_string(), trajectory);
        true
    }

    /// Register a resource. Duplicate names warn and return `false`.
    ///
    /// `capacity` and `queue_size` accept `-1` for unbounded.
    pub fn add_resource(
        &mut self,
        name: &str,
        capacity: i32,
        queue_size: i32,
        monitoring: bool,
        preemption: Preemption,
    ) -> bool {
        if self.resources.contains_key(name) {
            warn!(resource = name, "resource already defined");
            return false;
        }
        let (preemptive, order) = match preemption {
            Preemption::Disabled => (false, PreemptOrder::Fifo),
            Preemption::Enabled(order) => (true, order),
        };
        debug!(sim = %self.name, resource = name, capacity, queue_size, preemptive, "resource added");
        self.resources.insert(
            name.to_string(),
            Resource::new(
                name.to_string(),
                capacity,
                queue_size,
                monitoring,
                preemptive,
                order,
            ),
        );
        true
    }

    /// Register a generator feeding `trajectory` and run it once to seed the
    /// queue. Duplicate names warn and return `false`; an unknown trajectory
    /// is an error.
    pub fn add_generator(
        &mut self,
        prefix: &str,
        trajectory: &str,
        dist: DistFn,
        monitoring: MonitorLevel,
    ) -> Result<bool, SimError> {
        if self.processes.contains_key(prefix) {
            warn!(process = prefix, "process already defined");
            return Ok(false);
        }
        let first = self
            .trajectories
            .get(trajectory)
            .ok_or_else(|| SimError::UnknownTrajectory(trajectory.to_string()))?
            .head();
        let mut generator = Generator::new(
            prefix.to_string(),
            trajectory.to_string(),
            first,
            dist,
            monitoring,
        );
        debug!(sim = %self.name, generator = prefix, trajectory, "generator added");
        generator.run(&mut self.arrivals, &mut self.scheduler, &self.monitor);
        self.processes
            .insert(prefix.to_string(), Process::Generator(generator));
        Ok(true)
    }

    /// Register a manager driving `resource`'s capacity or queue size on a
    /// schedule, and run it once. The resource must already exist.
    pub fn add_resource_manager(
        &mut self,
        resource: &str,
        param: ManagedParam,
        durations: Vec<f64>,
        values: Vec<i32>,
    ) -> Result<bool, SimError> {
        if !self.resources.contains_key(resource) {
            return Err(SimError::UnknownResource(resource.to_string()));
        }
        let name = format!("{}_{}", resource, param.label());
        if self.processes.contains_key(&name) {
            warn!(process = %name, "process already defined");
            return Ok(false);
        }
        let mut manager = Manager::new(
            name.clone(),
            resource.to_string(),
            param,
            durations,
            values,
        );
        debug!(sim = %self.name, manager = %name, "resource manager added");
        let dropped = manager.run(
            &mut self.resources,
            &mut self.arrivals,
            &mut self.scheduler,
            &self.monitor,
        );
        self.drop_arrivals(dropped);
        self.processes.insert(name, Process::Manager(manager));
        Ok(true)
    }

    pub fn get_resource(&self, name: &str) -> Result<&Resource, SimError> {
        self.resources
            .get(name)
            .ok_or_else(|| SimError::UnknownResource(name.to_string()))
    }

    pub fn get_generator(&self, name: &str) -> Result<&Generator, SimError> {
        match self.processes.get(name) {
            Some(Process::Generator(generator)) => Ok(generator),
            _ => Err(SimError::UnknownGenerator(name.to_string())),
        }
    }

    /// Change a resource's capacity immediately.
    pub fn set_capacity(&mut self, resource: &str, value: i32) -> Result<(), SimError> {
        let Self {
            resources,
            arrivals,
            scheduler,
            monitor,
            ..
        } = self;
        resources
            .get_mut(resource)
            .ok_or_else(|| SimError::UnknownResource(resource.to_string()))?
            .set_capacity(value, arrivals, scheduler, monitor);
        Ok(())
    }

    /// Change a resource's queue bound immediately, dropping waiters that no
    /// longer fit.
    pub fn set_queue_size(&mut self, resource: &str, value: i32) -> Result<(), SimError> {
        let dropped = self
            .resources
            .get_mut(resource)
            .ok_or_else(|| SimError::UnknownResource(resource.to_string()))?
            .set_queue_size(value, &mut self.scheduler, &self.monitor);
        self.drop_arrivals(dropped);
        Ok(())
    }

    /// Dispatch the next event. Returns `false` when the queue is empty.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let Some((time, process)) = self.scheduler.pop() else {
            return Ok(false);
        };
        trace!(sim = %self.name, %time, ?process, "dispatch");
        match process {
            ProcessRef::Arrival(id) => self.run_arrival(id)?,
            ProcessRef::Named(name) => self.run_process(&name),
        }
        Ok(true)
    }

    /// Step until `now() >= until` or the queue drains, polling the
    /// cancellation check every 100 000 steps.
    pub fn run(&mut self, until: SimTime) -> Result<(), SimError> {
        let mut steps: u64 = 0;
        while self.now() < until {
            if !self.step()? {
                break;
            }
            steps += 1;
            if steps % INTERRUPT_CHECK_STEPS == 0 {
                if let Some(check) = self.interrupt.as_mut() {
                    if check() {
                        return Err(SimError::Interrupted { at: self.now() });
                    }
                }
            }
        }
        Ok(())
    }

    /// Rewind to a clean slate: time zero, no arrivals, empty resources,
    /// every generator and manager re-run so the queue is re-seeded.
    pub fn reset(&mut self) {
        info!(sim = %self.name, "reset");
        self.scheduler.clear();
        self.arrivals.clear();
        for resource in self.resources.values_mut() {
            resource.reset();
        }
        let names: Vec<String> = self.processes.keys().cloned().collect();
        for name in names {
            if let Some(process) = self.processes.get_mut(&name) {
                match process {
                    Process::Generator(g) => g.reset(),
                    Process::Manager(m) => m.reset(),
                }
            }
            self.run_process(&name);
        }
    }

    fn run_process(&mut self, name: &str) {
        let Some(mut process) = self.processes.remove(name) else {
            warn!(process = name, "event for unknown process dropped");
            return;
        };
        match &mut process {
            Process::Generator(generator) => {
                generator.run(&mut self.arrivals, &mut self.scheduler, &self.monitor);
            }
            Process::Manager(manager) => {
                let dropped = manager.run(
                    &mut self.resources,
                    &mut self.arrivals,
                    &mut self.scheduler,
                    &self.monitor,
                );
                self.drop_arrivals(dropped);
            }
        }
        self.processes.insert(name.to_string(), process);
    }

    fn run_arrival(&mut self, id: ArrivalId) -> Result<(), SimError> {
        let Some(mut arrival) = self.arrivals.take(id) else {
            warn!(%id, "event for unknown arrival dropped");
            return Ok(());
        };
        let resumed = std::mem::take(&mut arrival.resume);

        let Some(current) = arrival.current else {
            let now = self.scheduler.time();
            self.end_arrival(arrival, now, true);
            return Ok(());
        };

        let step = if resumed {
            // a resource admitted this arrival from its queue; continue past
            // the blocking seize
            Step::Advance {
                delay: SimTime::zero(),
                goto: None,
            }
        } else {
            let Self {
                trajectories,
                resources,
                arrivals,
                scheduler,
                monitor,
                verbose,
                ..
            } = self;
            let Some(trajectory) = trajectories.get_mut(&arrival.trajectory) else {
                let missing = arrival.trajectory.clone();
                arrivals.put_back(arrival);
                return Err(SimError::UnknownTrajectory(missing));
            };
            if *verbose {
                debug!(arrival = %arrival.name(), activity = current.0, "running activity");
            }
            let mut ctx = SimCtx {
                resources,
                arrivals,
                scheduler,
                monitor,
            };
            match trajectory.execute(current, &mut arrival, &mut ctx) {
                Ok(step) => step,
                Err(err) => {
                    self.arrivals.put_back(arrival);
                    return Err(err);
                }
            }
        };

        match step {
            Step::Wait => {
                self.arrivals.put_back(arrival);
            }
            Step::Drop => {
                let now = self.scheduler.time();
                self.end_arrival(arrival, now, false);
            }
            Step::Advance { delay, goto } => {
                let next = goto.or_else(|| {
                    self.trajectories
                        .get(&arrival.trajectory)
                        .and_then(|t| t.next_of(current))
                });
                arrival.current = next;
                if next.is_some() {
                    arrival.scheduled_from = Some(current);
                    self.scheduler
                        .schedule(delay, ProcessRef::Arrival(id), priority::NORMAL);
                    self.arrivals.put_back(arrival);
                } else {
                    let now = self.scheduler.time();
                    self.end_arrival(arrival, now, true);
                }
            }
        }
        Ok(())
    }

    fn drop_arrivals(&mut self, ids: Vec<ArrivalId>) {
        let now = self.scheduler.time();
        for id in ids {
            if let Some(arrival) = self.arrivals.take(id) {
                self.end_arrival(arrival, now, false);
            }
        }
    }

    fn end_arrival(&mut self, arrival: Arrival, now: SimTime, finished: bool) {
        if !arrival.held.is_empty() {
            warn!(arrival = %arrival.name(), "arrival ended while still holding resources");
        }
        if arrival.monitoring() >= MonitorLevel::Arrivals {
            self.monitor
                .lock()
                .unwrap()
                .on_arrival_end(arrival.name(), now, finished);
        }
        self.arrivals.note_ended();
        trace!(arrival = %arrival.name(), finished, "arrival ended");
    }
}
