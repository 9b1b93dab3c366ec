//! Full-pipeline test: run a simulation with the stats sink attached and
//! check the collected tables.

use flowsim_core::{dists, MonitorLevel, Preemption, SimTime, Simulator, Trajectory};
use flowsim_metrics::SimulationStats;

#[test]
fn stats_sink_collects_a_whole_run() {
    let stats = SimulationStats::shared();
    let mut sim = Simulator::new("pipeline", false);
    sim.set_monitor(stats.clone());

    sim.add_trajectory(
        Trajectory::builder("service")
            .set_attribute("billed", 1.0)
            .seize("desk", 1)
            .timeout(4.0)
            .release("desk", 1)
            .build(),
    );
    sim.add_resource("desk", 1, -1, true, Preemption::default());
    sim.add_generator(
        "client",
        "service",
        dists::every(vec![0.0, 0.0, 0.0]),
        MonitorLevel::Attributes,
    )
    .unwrap();

    sim.run(SimTime::from_secs(60)).unwrap();

    let stats = stats.lock().unwrap();

    // three clients, serialized on a unit server: 4, 8, 12
    assert_eq!(stats.finished_count(), 3);
    assert_eq!(stats.dropped_count(), 0);
    assert_eq!(stats.active_count(), 0);
    let flow_times: Vec<f64> = stats
        .arrivals()
        .iter()
        .filter_map(|r| r.flow_time())
        .collect();
    assert_eq!(flow_times, vec![4.0, 8.0, 12.0]);
    assert_eq!(stats.mean_flow_time(), Some(8.0));

    // each client wrote one attribute
    assert_eq!(stats.attributes().len(), 3);
    assert!(stats.attributes().iter().all(|a| a.key == "billed"));

    // the resource series starts busy and ends idle
    let series = stats.resource_series("desk").unwrap();
    assert_eq!(series.first().unwrap().server, 1);
    let last = series.last().unwrap();
    assert_eq!((last.server, last.queue), (0, 0));
    assert_eq!(last.time, SimTime::from_secs(12));

    // the unit server was busy the whole sampled span
    let occupancy = stats.mean_occupancy("desk").unwrap();
    assert!((occupancy - 1.0).abs() < 1e-9);
}
