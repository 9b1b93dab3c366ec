//! In-memory statistics collection.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

use flowsim_core::{Monitor, SimTime};

/// One arrival's passage through the simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrivalRecord {
    pub name: String,
    pub start: SimTime,
    pub end: Option<SimTime>,
    /// `false` when the arrival was dropped by policy.
    pub finished: bool,
}

impl ArrivalRecord {
    /// Time spent in the system, in seconds, once the arrival has ended.
    pub fn flow_time(&self) -> Option<f64> {
        self.end
            .map(|end| end.duration_since(self.start).as_secs_f64())
    }
}

/// A point in a resource's occupancy time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceSample {
    pub time: SimTime,
    pub server: i32,
    pub queue: i32,
    pub capacity: i32,
}

/// One attribute write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeRecord {
    pub arrival: String,
    pub time: SimTime,
    pub key: String,
    pub value: f64,
}

/// Serializable snapshot of everything collected.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub arrivals: Vec<ArrivalRecord>,
    pub resources: BTreeMap<String, Vec<ResourceSample>>,
    pub attributes: Vec<AttributeRecord>,
}

/// Monitoring sink that records everything the engine reports.
#[derive(Debug, Default)]
pub struct SimulationStats {
    arrivals: Vec<ArrivalRecord>,
    open: HashMap<String, usize>,
    resources: HashMap<String, Vec<ResourceSample>>,
    attributes: Vec<AttributeRecord>,
}

impl SimulationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared handle suitable for `Simulator::set_monitor`.
    pub fn shared() -> Arc<Mutex<SimulationStats>> {
        Arc::new(Mutex::new(SimulationStats::new()))
    }

    pub fn arrivals(&self) -> &[ArrivalRecord] {
        &self.arrivals
    }

    pub fn attributes(&self) -> &[AttributeRecord] {
        &self.attributes
    }

    pub fn resource_series(&self, resource: &str) -> Option<&[ResourceSample]> {
        self.resources.get(resource).map(Vec::as_slice)
    }

    /// Arrivals that reached the end of their trajectory.
    pub fn finished_count(&self) -> usize {
        self.arrivals
            .iter()
            .filter(|r| r.end.is_some() && r.finished)
            .count()
    }

    /// Arrivals dropped by policy.
    pub fn dropped_count(&self) -> usize {
        self.arrivals
            .iter()
            .filter(|r| r.end.is_some() && !r.finished)
            .count()
    }

    /// Arrivals recorded as started but not yet ended.
    pub fn active_count(&self) -> usize {
        self.open.len()
    }

    /// Mean time in system over all ended arrivals, in seconds.
    pub fn mean_flow_time(&self) -> Option<f64> {
        let times: Vec<f64> = self.arrivals.iter().filter_map(ArrivalRecord::flow_time).collect();
        if times.is_empty() {
            return None;
        }
        Some(times.iter().sum::<f64>() / times.len() as f64)
    }

    /// Time-weighted mean server occupancy of a resource over its sampled
    /// interval. Needs at least two samples.
    pub fn mean_occupancy(&self, resource: &str) -> Option<f64> {
        let samples = self.resources.get(resource)?;
        if samples.len() < 2 {
            return None;
        }
        let span = samples
            .last()
            .unwrap()
            .time
            .duration_since(samples[0].time)
            .as_secs_f64();
        if span <= 0.0 {
            return None;
        }
        let mut weighted = 0.0;
        for pair in samples.windows(2) {
            let dt = pair[1].time.duration_since(pair[0].time).as_secs_f64();
            weighted += pair[0].server as f64 * dt;
        }
        Some(weighted / span)
    }

    /// Copy the collected tables into a serializable snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            arrivals: self.arrivals.clone(),
            resources: self
                .resources
                .iter()
                .map(|(name, samples)| (name.clone(), samples.clone()))
                .collect(),
            attributes: self.attributes.clone(),
        }
    }

    /// Forget everything collected so far.
    pub fn clear(&mut self) {
        self.arrivals.clear();
        self.open.clear();
        self.resources.clear();
        self.attributes.clear();
    }
}

impl Monitor for SimulationStats {
    fn on_arrival_start(&mut self, name: &str, time: SimTime) {
        self.open.insert(name.to_string(), self.arrivals.len());
        self.arrivals.push(ArrivalRecord {
            name: name.to_string(),
            start: time,
            end: None,
            finished: false,
        });
    }

    fn on_arrival_end(&mut self, name: &str, time: SimTime, finished: bool) {
        match self.open.remove(name) {
            Some(index) => {
                let record = &mut self.arrivals[index];
                record.end = Some(time);
                record.finished = finished;
            }
            None => {
                warn!(arrival = name, "end reported for an unknown arrival");
                self.arrivals.push(ArrivalRecord {
                    name: name.to_string(),
                    start: time,
                    end: Some(time),
                    finished,
                });
            }
        }
    }

    fn on_resource_change(
        &mut self,
        resource: &str,
        time: SimTime,
        server: i32,
        queue: i32,
        capacity: i32,
    ) {
        self.resources
            .entry(resource.to_string())
            .or_default()
            .push(ResourceSample {
                time,
                server,
                queue,
                capacity,
            });
    }

    fn on_attribute(&mut self, name: &str, time: SimTime, key: &str, value: f64) {
        self.attributes.push(AttributeRecord {
            arrival: name.to_string(),
            time,
            key: key.to_string(),
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_arrival_lifecycles() {
        let mut stats = SimulationStats::new();
        stats.on_arrival_start("a0", SimTime::zero());
        stats.on_arrival_start("a1", SimTime::from_secs(1));
        assert_eq!(stats.active_count(), 2);

        stats.on_arrival_end("a0", SimTime::from_secs(5), true);
        stats.on_arrival_end("a1", SimTime::from_secs(3), false);

        assert_eq!(stats.finished_count(), 1);
        assert_eq!(stats.dropped_count(), 1);
        assert_eq!(stats.active_count(), 0);
        assert_eq!(stats.arrivals()[0].flow_time(), Some(5.0));
        assert_eq!(stats.arrivals()[1].flow_time(), Some(2.0));
        assert_eq!(stats.mean_flow_time(), Some(3.5));
    }

    #[test]
    fn mean_occupancy_is_time_weighted() {
        let mut stats = SimulationStats::new();
        // one unit busy for 2s, then two units for 6s, then idle
        stats.on_resource_change("server", SimTime::zero(), 1, 0, 2);
        stats.on_resource_change("server", SimTime::from_secs(2), 2, 0, 2);
        stats.on_resource_change("server", SimTime::from_secs(8), 0, 0, 2);

        let mean = stats.mean_occupancy("server").unwrap();
        assert!((mean - (1.0 * 2.0 + 2.0 * 6.0) / 8.0).abs() < 1e-9);
        assert_eq!(stats.mean_occupancy("missing"), None);
    }

    #[test]
    fn end_without_start_still_counts() {
        let mut stats = SimulationStats::new();
        stats.on_arrival_end("ghost", SimTime::from_secs(2), false);
        assert_eq!(stats.dropped_count(), 1);
    }

    #[test]
    fn snapshot_and_clear() {
        let mut stats = SimulationStats::new();
        stats.on_arrival_start("a0", SimTime::zero());
        stats.on_attribute("a0", SimTime::from_secs(1), "size", 3.0);
        stats.on_resource_change("server", SimTime::zero(), 1, 0, 1);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.arrivals.len(), 1);
        assert_eq!(snapshot.attributes.len(), 1);
        assert_eq!(snapshot.resources["server"].len(), 1);

        stats.clear();
        assert!(stats.arrivals().is_empty());
        assert_eq!(stats.active_count(), 0);
    }
}
