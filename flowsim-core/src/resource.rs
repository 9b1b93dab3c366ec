//! Bounded resources with priority queueing and optional preemption.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::arrival::{Arrival, ArrivalArena};
use crate::error::SimError;
use crate::monitor::MonitorHandle;
use crate::scheduler::{priority, ArrivalId, ProcessRef, Scheduler};
use crate::time::SimTime;

/// Capacity or queue size without a bound.
pub const UNBOUNDED: i32 = -1;

/// Order in which victims are evicted from a preemptive resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreemptOrder {
    /// Oldest occupants first.
    Fifo,
    /// Newest occupants first.
    Lifo,
}

/// Per-seize parameters beyond the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeizePolicy {
    /// Queueing and preemption priority; higher wins.
    pub priority: i32,
    /// Whether a higher-priority seize may evict this occupant.
    pub preemptible: bool,
    /// After preemption, re-run the interrupted timeout from scratch instead
    /// of resuming the residual.
    pub restart: bool,
}

impl Default for SeizePolicy {
    fn default() -> Self {
        Self {
            priority: 0,
            preemptible: true,
            restart: false,
        }
    }
}

impl SeizePolicy {
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }
}

/// Outcome of a seize attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeizeResult {
    /// The arrival occupies the server and may advance immediately.
    Admitted,
    /// The arrival is parked in the queue; the resource reschedules it.
    Enqueued,
    /// No room in server or queue; the arrival is turned away.
    Rejected,
}

#[derive(Debug)]
struct ServerItem {
    id: ArrivalId,
    amount: i32,
    policy: SeizePolicy,
    /// Insertion order, used by the preempt-order policy.
    seq: u64,
}

#[derive(Debug)]
struct QueueItem {
    id: ArrivalId,
    amount: i32,
    policy: SeizePolicy,
}

#[derive(Debug)]
struct PreemptedItem {
    item: ServerItem,
    /// Residual timeout captured when the pending event was unscheduled.
    remaining: SimTime,
}

/// A bounded server with a priority queue.
///
/// `capacity` bounds the units occupying the server and `queue_size` bounds
/// the number of waiting arrivals; `-1` means unbounded for both. Waiters
/// are kept in descending priority order, stable within equal priority.
/// Preemptive resources may additionally evict lower-priority occupants to
/// admit a higher-priority seize; victims wait in a preempted set that is
/// drained ahead of the queue when room frees up.
pub struct Resource {
    name: String,
    capacity: i32,
    queue_size: i32,
    server_count: i32,
    server: Vec<ServerItem>,
    queue: VecDeque<QueueItem>,
    preempted: VecDeque<PreemptedItem>,
    monitoring: bool,
    preemptive: bool,
    preempt_order: PreemptOrder,
    next_seq: u64,
    rejected: u64,
}

impl Resource {
    pub(crate) fn new(
        name: String,
        capacity: i32,
        queue_size: i32,
        monitoring: bool,
        preemptive: bool,
        preempt_order: PreemptOrder,
    ) -> Self {
        Self {
            name,
            capacity,
            queue_size,
            server_count: 0,
            server: Vec::new(),
            queue: VecDeque::new(),
            preempted: VecDeque::new(),
            monitoring,
            preemptive,
            preempt_order,
            next_seq: 0,
            rejected: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server capacity; negative means unbounded.
    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    /// Queue bound; negative means unbounded.
    pub fn queue_size(&self) -> i32 {
        self.queue_size
    }

    /// Units currently occupying the server.
    pub fn server_count(&self) -> i32 {
        self.server_count
    }

    /// Arrivals currently waiting in the queue.
    pub fn queue_count(&self) -> usize {
        self.queue.len()
    }

    /// Arrivals evicted by preemption and waiting for room.
    pub fn preempted_count(&self) -> usize {
        self.preempted.len()
    }

    /// Seizes turned away because the queue was full.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Whether `arrival` currently occupies the server.
    pub fn in_server(&self, arrival: ArrivalId) -> bool {
        self.server.iter().any(|it| it.id == arrival)
    }

    /// Whether `arrival` is waiting in the queue.
    pub fn in_queue(&self, arrival: ArrivalId) -> bool {
        self.queue.iter().any(|it| it.id == arrival)
    }

    fn room_in_server(&self, amount: i32) -> bool {
        self.capacity < 0 || self.server_count + amount <= self.capacity
    }

    fn room_in_queue(&self) -> bool {
        self.queue_size < 0 || (self.queue.len() as i32) < self.queue_size
    }

    /// Try to acquire `amount` units for `arrival`.
    ///
    /// Admission order: straight into the server if it fits, by preemption
    /// if the resource allows it and enough lower-priority occupants can be
    /// evicted, into the queue if there is room, otherwise rejected.
    pub(crate) fn seize(
        &mut self,
        arrival: &mut Arrival,
        amount: i32,
        policy: SeizePolicy,
        arrivals: &mut ArrivalArena,
        scheduler: &mut Scheduler,
        monitor: &MonitorHandle,
    ) -> SeizeResult {
        if self.room_in_server(amount) {
            self.admit(arrival, amount, policy);
            self.observe(scheduler.time(), monitor);
            return SeizeResult::Admitted;
        }
        if self.preemptive && self.preempt(amount, policy.priority, arrivals, scheduler) {
            self.admit(arrival, amount, policy);
            self.observe(scheduler.time(), monitor);
            return SeizeResult::Admitted;
        }
        if self.room_in_queue() {
            self.enqueue(arrival.id(), amount, policy);
            debug!(
                resource = %self.name,
                arrival = %arrival.name(),
                amount,
                priority = policy.priority,
                "seize queued"
            );
            self.observe(scheduler.time(), monitor);
            return SeizeResult::Enqueued;
        }
        self.rejected += 1;
        warn!(
            resource = %self.name,
            arrival = %arrival.name(),
            amount,
            "seize rejected: queue is full"
        );
        SeizeResult::Rejected
    }

    fn admit(&mut self, arrival: &mut Arrival, amount: i32, policy: SeizePolicy) {
        self.server_count += amount;
        self.next_seq += 1;
        self.server.push(ServerItem {
            id: arrival.id(),
            amount,
            policy,
            seq: self.next_seq,
        });
        *arrival.held.entry(self.name.clone()).or_insert(0) += amount;
    }

    /// Evict enough lower-priority occupants to fit `amount` more units.
    /// Returns `false` (leaving the server untouched) if the eligible
    /// victims cannot free enough room.
    fn preempt(
        &mut self,
        amount: i32,
        incoming_priority: i32,
        arrivals: &mut ArrivalArena,
        scheduler: &mut Scheduler,
    ) -> bool {
        // room_in_server failed, so capacity is bounded here
        let needed = amount - (self.capacity - self.server_count);

        let mut order: Vec<usize> = (0..self.server.len())
            .filter(|&i| {
                self.server[i].policy.priority < incoming_priority
                    && self.server[i].policy.preemptible
            })
            .collect();
        match self.preempt_order {
            PreemptOrder::Fifo => order.sort_by_key(|&i| self.server[i].seq),
            PreemptOrder::Lifo => order.sort_by_key(|&i| std::cmp::Reverse(self.server[i].seq)),
        }

        let mut victims = Vec::new();
        let mut freed = 0;
        for &i in &order {
            if freed >= needed {
                break;
            }
            freed += self.server[i].amount;
            victims.push(self.server[i].id);
        }
        if freed < needed {
            return false;
        }

        let now = scheduler.time();
        for id in victims {
            let pos = self
                .server
                .iter()
                .position(|it| it.id == id)
                .expect("victim still occupies the server");
            let item = self.server.remove(pos);
            self.server_count -= item.amount;
            let remaining = scheduler
                .unschedule(item.id)
                .map(|at| SimTime::from_duration(at.duration_since(now)))
                .unwrap_or(SimTime::zero());
            if let Some(victim) = arrivals.get_mut(item.id) {
                if let Some(held) = victim.held.get_mut(&self.name) {
                    *held -= item.amount;
                    if *held <= 0 {
                        victim.held.remove(&self.name);
                    }
                }
                debug!(
                    resource = %self.name,
                    arrival = %victim.name(),
                    %remaining,
                    "preempted"
                );
            }
            self.preempted.push_back(PreemptedItem { item, remaining });
        }
        true
    }

    fn enqueue(&mut self, id: ArrivalId, amount: i32, policy: SeizePolicy) {
        // descending priority, stable within equal priority
        let pos = self
            .queue
            .iter()
            .position(|it| it.policy.priority < policy.priority)
            .unwrap_or(self.queue.len());
        self.queue.insert(pos, QueueItem { id, amount, policy });
    }

    /// Give back `amount` units held by `arrival`, then admit whoever fits,
    /// preempted arrivals first.
    ///
    /// Partial releases reduce the occupancy record in place. Admitted
    /// waiters are rescheduled at the current instant with
    /// [`priority::HANDOFF`] so they beat fresh seizes at the same time.
    pub(crate) fn release(
        &mut self,
        arrival: &mut Arrival,
        amount: i32,
        arrivals: &mut ArrivalArena,
        scheduler: &mut Scheduler,
        monitor: &MonitorHandle,
    ) -> Result<(), SimError> {
        let pos = self
            .server
            .iter()
            .position(|it| it.id == arrival.id())
            .ok_or_else(|| SimError::ReleaseWithoutSeize {
                arrival: arrival.name().to_string(),
                resource: self.name.clone(),
            })?;
        if amount > self.server[pos].amount {
            return Err(SimError::OverRelease {
                arrival: arrival.name().to_string(),
                resource: self.name.clone(),
                held: self.server[pos].amount,
                amount,
            });
        }

        self.server_count -= amount;
        self.server[pos].amount -= amount;
        if self.server[pos].amount == 0 {
            self.server.remove(pos);
        }
        if let Some(held) = arrival.held.get_mut(&self.name) {
            *held -= amount;
            if *held <= 0 {
                arrival.held.remove(&self.name);
            }
        }

        self.try_admit(arrivals, scheduler);
        self.observe(scheduler.time(), monitor);
        Ok(())
    }

    /// Admit waiters while they fit: first the preempted set (in eviction
    /// order), then the queue head.
    fn try_admit(&mut self, arrivals: &mut ArrivalArena, scheduler: &mut Scheduler) {
        while let Some(front) = self.preempted.front() {
            if !self.room_in_server(front.item.amount) {
                break;
            }
            let PreemptedItem { mut item, remaining } = self.preempted.pop_front().unwrap();
            self.server_count += item.amount;
            self.next_seq += 1;
            item.seq = self.next_seq;
            if let Some(victim) = arrivals.get_mut(item.id) {
                *victim.held.entry(self.name.clone()).or_insert(0) += item.amount;
                if item.policy.restart && !victim.resume {
                    // re-run the interrupted timeout from scratch
                    victim.current = victim.scheduled_from;
                    scheduler.schedule(
                        SimTime::zero(),
                        ProcessRef::Arrival(item.id),
                        priority::HANDOFF,
                    );
                } else {
                    scheduler.schedule(remaining, ProcessRef::Arrival(item.id), priority::HANDOFF);
                }
                debug!(resource = %self.name, arrival = %victim.name(), "readmitted after preemption");
            }
            self.server.push(item);
        }

        while let Some(front) = self.queue.front() {
            if !self.room_in_server(front.amount) {
                break;
            }
            let QueueItem { id, amount, policy } = self.queue.pop_front().unwrap();
            self.server_count += amount;
            self.next_seq += 1;
            self.server.push(ServerItem {
                id,
                amount,
                policy,
                seq: self.next_seq,
            });
            if let Some(waiter) = arrivals.get_mut(id) {
                *waiter.held.entry(self.name.clone()).or_insert(0) += amount;
                waiter.resume = true;
                scheduler.schedule(SimTime::zero(), ProcessRef::Arrival(id), priority::HANDOFF);
                debug!(resource = %self.name, arrival = %waiter.name(), "served from queue");
            }
        }
    }

    /// Change the server capacity. Growth drains admissible waiters; a
    /// shrink below the current occupancy evicts nobody, the overage drains
    /// through natural releases.
    pub(crate) fn set_capacity(
        &mut self,
        value: i32,
        arrivals: &mut ArrivalArena,
        scheduler: &mut Scheduler,
        monitor: &MonitorHandle,
    ) {
        debug!(resource = %self.name, old = self.capacity, new = value, "capacity changed");
        self.capacity = value;
        self.try_admit(arrivals, scheduler);
        self.observe(scheduler.time(), monitor);
    }

    /// Change the queue bound. Waiters beyond the new bound are rejected
    /// from the back of the queue; the caller terminates them.
    #[must_use]
    pub(crate) fn set_queue_size(
        &mut self,
        value: i32,
        scheduler: &mut Scheduler,
        monitor: &MonitorHandle,
    ) -> Vec<ArrivalId> {
        debug!(resource = %self.name, old = self.queue_size, new = value, "queue size changed");
        self.queue_size = value;
        let mut dropped = Vec::new();
        if value >= 0 {
            while self.queue.len() as i32 > value {
                let item = self.queue.pop_back().unwrap();
                self.rejected += 1;
                dropped.push(item.id);
            }
        }
        self.observe(scheduler.time(), monitor);
        dropped
    }

    /// Clear all occupancy state; counters restart from zero.
    pub(crate) fn reset(&mut self) {
        self.server.clear();
        self.queue.clear();
        self.preempted.clear();
        self.server_count = 0;
        self.next_seq = 0;
        self.rejected = 0;
    }

    fn observe(&self, now: SimTime, monitor: &MonitorHandle) {
        if self.monitoring {
            monitor.lock().unwrap().on_resource_change(
                &self.name,
                now,
                self.server_count,
                self.queue.len() as i32,
                self.capacity,
            );
        }
    }
}
