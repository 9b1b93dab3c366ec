//! Arrivals: the entities that traverse a trajectory.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::scheduler::ArrivalId;
use crate::time::SimTime;
use crate::trajectory::ActivityId;

/// Attribute state carried by an arrival.
///
/// Keys absent from the map read as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes(HashMap<String, f64>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, key: &str, value: f64) -> f64 {
        self.0.insert(key.to_string(), value);
        value
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How much of an arrival's lifecycle is reported to the monitoring sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MonitorLevel {
    /// Report nothing.
    Off,
    /// Report arrival start/end.
    Arrivals,
    /// Also report attribute writes.
    Attributes,
}

/// An entity flowing through a trajectory.
///
/// Arrivals are created by generators, owned by the simulator's
/// [`ArrivalArena`], and destroyed when they run off the end of their
/// trajectory or are dropped by policy. While alive, an arrival is either
/// scheduled in the event queue or parked inside a single resource (queued
/// or preempted), never both.
pub struct Arrival {
    id: ArrivalId,
    name: String,
    created_at: SimTime,
    attributes: Attributes,
    monitoring: MonitorLevel,

    /// Name of the trajectory this arrival traverses.
    pub(crate) trajectory: String,
    /// Node to execute at the next wakeup; `None` once the trajectory ends.
    pub(crate) current: Option<ActivityId>,
    /// Node whose returned delay produced the pending event. Preemption with
    /// `restart` rewinds `current` here so the timeout is re-evaluated.
    pub(crate) scheduled_from: Option<ActivityId>,
    /// Set when a resource admitted this arrival from its queue: the next
    /// wakeup continues past the blocking seize instead of re-running it.
    pub(crate) resume: bool,
    /// Branch nodes this arrival has entered a merged sub-path of.
    pub(crate) branch_pending: HashSet<ActivityId>,
    /// Remaining iterations per bounded rollback node.
    pub(crate) rollback_left: HashMap<ActivityId, i32>,
    /// Units currently held per resource.
    pub(crate) held: HashMap<String, i32>,
}

impl Arrival {
    pub(crate) fn new(
        id: ArrivalId,
        name: String,
        created_at: SimTime,
        trajectory: String,
        first: Option<ActivityId>,
        monitoring: MonitorLevel,
    ) -> Self {
        Self {
            id,
            name,
            created_at,
            attributes: Attributes::new(),
            monitoring,
            trajectory,
            current: first,
            scheduled_from: None,
            resume: false,
            branch_pending: HashSet::new(),
            rollback_left: HashMap::new(),
            held: HashMap::new(),
        }
    }

    pub fn id(&self) -> ArrivalId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> SimTime {
        self.created_at
    }

    pub fn monitoring(&self) -> MonitorLevel {
        self.monitoring
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Write an attribute, returning the stored value.
    pub fn set_attribute(&mut self, key: &str, value: f64) -> f64 {
        self.attributes.set(key, value)
    }

    /// Units of `resource` this arrival currently occupies.
    pub fn holds(&self, resource: &str) -> i32 {
        self.held.get(resource).copied().unwrap_or(0)
    }
}

/// Owner of every live arrival.
///
/// The event queue and resources refer to arrivals by [`ArrivalId`] only;
/// the arena is the single place an `Arrival` can be borrowed from, which is
/// what makes the "one location only" invariant enforceable.
#[derive(Default)]
pub struct ArrivalArena {
    arrivals: HashMap<ArrivalId, Arrival>,
    next_id: u64,
    created: u64,
    ended: u64,
}

impl ArrivalArena {
    pub(crate) fn create(
        &mut self,
        name: String,
        created_at: SimTime,
        trajectory: String,
        first: Option<ActivityId>,
        monitoring: MonitorLevel,
    ) -> ArrivalId {
        self.next_id += 1;
        self.created += 1;
        let id = ArrivalId(self.next_id);
        self.arrivals.insert(
            id,
            Arrival::new(id, name, created_at, trajectory, first, monitoring),
        );
        id
    }

    /// Temporarily move an arrival out for execution; pair with
    /// [`put_back`](Self::put_back) unless the arrival terminates.
    pub(crate) fn take(&mut self, id: ArrivalId) -> Option<Arrival> {
        self.arrivals.remove(&id)
    }

    pub(crate) fn put_back(&mut self, arrival: Arrival) {
        self.arrivals.insert(arrival.id, arrival);
    }

    pub fn get(&self, id: ArrivalId) -> Option<&Arrival> {
        self.arrivals.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ArrivalId) -> Option<&mut Arrival> {
        self.arrivals.get_mut(&id)
    }

    /// Number of live arrivals.
    pub fn len(&self) -> usize {
        self.arrivals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty()
    }

    /// Total arrivals ever created (monotone until reset).
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Total arrivals finished or dropped (monotone until reset).
    pub fn ended(&self) -> u64 {
        self.ended
    }

    pub(crate) fn note_ended(&mut self) {
        self.ended += 1;
    }

    pub(crate) fn clear(&mut self) {
        self.arrivals.clear();
        self.next_id = 0;
        self.created = 0;
        self.ended = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_attributes_read_as_zero() {
        let mut attrs = Attributes::new();
        assert_eq!(attrs.get("missing"), 0.0);
        assert_eq!(attrs.set("x", 2.5), 2.5);
        assert_eq!(attrs.get("x"), 2.5);
        assert!(attrs.contains("x"));
        assert!(!attrs.contains("missing"));
    }

    #[test]
    fn monitor_levels_are_ordered() {
        assert!(MonitorLevel::Off < MonitorLevel::Arrivals);
        assert!(MonitorLevel::Arrivals < MonitorLevel::Attributes);
    }

    #[test]
    fn arena_tracks_counts() {
        let mut arena = ArrivalArena::default();
        let id = arena.create(
            "job0".into(),
            SimTime::zero(),
            "flow".into(),
            None,
            MonitorLevel::Off,
        );
        assert_eq!(arena.created(), 1);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(id).unwrap().name(), "job0");

        let arrival = arena.take(id).unwrap();
        assert!(arena.is_empty());
        drop(arrival);
        arena.note_ended();
        assert_eq!(arena.ended(), 1);
    }
}
