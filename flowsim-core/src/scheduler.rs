//! Event queue and clock.
//!
//! The scheduler owns a binary min-heap of future events keyed by
//! `(time asc, priority desc)`; within an equal key, events dispatch in FIFO
//! order via a monotone sequence number. Popping an event advances the clock
//! to the event's time, so virtual time is non-decreasing by construction.
//!
//! Arrivals appear in the queue at most once. That makes removal (needed
//! when a resource preempts an arrival mid-timeout) cheap: the pending entry
//! is recorded in a side map and cancelled with a tombstone instead of heap
//! surgery; tombstoned entries are skipped on pop without advancing time.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use std::sync::{
    atomic::{AtomicU64, Ordering as AtomicOrdering},
    Arc,
};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::time::SimTime;

/// Identifier of an arrival owned by the simulator's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArrivalId(pub u64);

impl fmt::Display for ArrivalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arrival#{}", self.0)
    }
}

/// Non-owning reference to something the event loop can wake up.
///
/// Arrivals live in the simulator's arena and are addressed by id;
/// generators and managers live in the process registry and are addressed by
/// name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessRef {
    Arrival(ArrivalId),
    Named(String),
}

/// Event priorities. Higher runs first at equal times.
pub mod priority {
    /// Ordinary arrival, generator, and manager events.
    pub const NORMAL: i32 = 0;
    /// Resource handoffs (admissions triggered by a release), so that a
    /// release and a fresh seize coinciding in time resolve release-first.
    pub const HANDOFF: i32 = 1;
}

#[derive(Debug)]
struct EventEntry {
    time: SimTime,
    priority: i32,
    seq: u64,
    process: ProcessRef,
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for EventEntry {}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse time and seq so the earliest
        // entry surfaces first, with higher priority winning inside a time
        // and FIFO order inside an equal (time, priority) key.
        other
            .time
            .cmp(&self.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

type Clock = Arc<AtomicU64>;

/// Lock-free reader for the simulation clock.
///
/// Cloneable and cheap; hand it to host callbacks or sinks that need the
/// current virtual time without access to the scheduler.
#[derive(Debug, Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl ClockRef {
    #[must_use]
    pub fn time(&self) -> SimTime {
        SimTime::from_nanos(self.clock.load(AtomicOrdering::Relaxed))
    }
}

/// The event queue and clock. Owned by [`Simulator`](crate::Simulator).
pub struct Scheduler {
    events: BinaryHeap<EventEntry>,
    clock: Clock,
    next_seq: u64,
    /// Pending event (seq, time) per scheduled arrival. An arrival is in the
    /// queue at most once, so this is a plain map.
    pending_arrivals: HashMap<ArrivalId, (u64, SimTime)>,
    /// Sequence numbers of unscheduled (removed) events, skipped on pop.
    cancelled: HashSet<u64>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            events: BinaryHeap::new(),
            clock: Arc::new(AtomicU64::new(0)),
            next_seq: 0,
            pending_arrivals: HashMap::new(),
            cancelled: HashSet::new(),
        }
    }

    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        SimTime::from_nanos(self.clock.load(AtomicOrdering::Relaxed))
    }

    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Arc::clone(&self.clock),
        }
    }

    /// Schedule `process` to run at `time() + delay`.
    ///
    /// Zero delays are legal and ubiquitous (immediate continuations).
    pub fn schedule(&mut self, delay: SimTime, process: ProcessRef, priority: i32) {
        let time = self.time() + delay;
        self.next_seq += 1;
        let seq = self.next_seq;
        if let ProcessRef::Arrival(id) = process {
            let stale = self.pending_arrivals.insert(id, (seq, time));
            debug_assert!(stale.is_none(), "{id} scheduled while already pending");
        }
        trace!(%time, priority, ?process, "event scheduled");
        self.events.push(EventEntry {
            time,
            priority,
            seq,
            process,
        });
    }

    /// Time of the next live event, or `None` if the queue is drained.
    pub fn peek(&mut self) -> Option<SimTime> {
        while let Some(top) = self.events.peek() {
            if self.cancelled.contains(&top.seq) {
                let seq = top.seq;
                self.events.pop();
                self.cancelled.remove(&seq);
                continue;
            }
            return Some(top.time);
        }
        None
    }

    /// Pop the next live event and advance the clock to its time.
    pub(crate) fn pop(&mut self) -> Option<(SimTime, ProcessRef)> {
        while let Some(entry) = self.events.pop() {
            if self.cancelled.remove(&entry.seq) {
                continue;
            }
            if let ProcessRef::Arrival(id) = entry.process {
                self.pending_arrivals.remove(&id);
            }
            self.clock
                .store(entry.time.as_nanos(), AtomicOrdering::Relaxed);
            return Some((entry.time, entry.process));
        }
        None
    }

    /// Remove an arrival's pending event, returning the time it would have
    /// fired. Used by preemption to compute the residual timeout.
    pub(crate) fn unschedule(&mut self, arrival: ArrivalId) -> Option<SimTime> {
        let (seq, time) = self.pending_arrivals.remove(&arrival)?;
        self.cancelled.insert(seq);
        trace!(%arrival, %time, "event unscheduled");
        Some(time)
    }

    /// Whether `arrival` has a pending event.
    pub fn is_scheduled(&self, arrival: ArrivalId) -> bool {
        self.pending_arrivals.contains_key(&arrival)
    }

    /// Number of live events still queued.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len() - self.cancelled.len()
    }

    /// Drop every queued event and rewind the clock to zero.
    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.pending_arrivals.clear();
        self.cancelled.clear();
        self.next_seq = 0;
        self.clock.store(0, AtomicOrdering::Relaxed);
    }
}
