//! End-to-end queueing scenarios: contention, preemption, tie-breaking,
//! capacity schedules, and reset behaviour.

use std::sync::{Arc, Mutex};

use flowsim_core::{
    dists, Monitor, MonitorLevel, PreemptOrder, Preemption, SeizePolicy, SimTime, Simulator,
    Trajectory,
};

/// Test sink capturing the monitor callbacks verbatim.
#[derive(Debug, Default)]
struct Recording {
    starts: Vec<(String, f64)>,
    ends: Vec<(String, f64, bool)>,
    resource_samples: Vec<(String, f64, i32, i32, i32)>,
}

impl Recording {
    fn shared() -> Arc<Mutex<Recording>> {
        Arc::new(Mutex::new(Recording::default()))
    }

    fn end_of(&self, name: &str) -> (f64, bool) {
        self.ends
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, t, ok)| (*t, *ok))
            .unwrap_or_else(|| panic!("no end recorded for {name}"))
    }
}

impl Monitor for Recording {
    fn on_arrival_start(&mut self, name: &str, time: SimTime) {
        self.starts.push((name.to_string(), time.as_secs_f64()));
    }

    fn on_arrival_end(&mut self, name: &str, time: SimTime, finished: bool) {
        self.ends
            .push((name.to_string(), time.as_secs_f64(), finished));
    }

    fn on_resource_change(
        &mut self,
        resource: &str,
        time: SimTime,
        server: i32,
        queue: i32,
        capacity: i32,
    ) {
        self.resource_samples.push((
            resource.to_string(),
            time.as_secs_f64(),
            server,
            queue,
            capacity,
        ));
    }

    fn on_attribute(&mut self, _name: &str, _time: SimTime, _key: &str, _value: f64) {}
}

fn service_trajectory(resource: &str, service: f64) -> Trajectory {
    Trajectory::builder("service")
        .seize(resource, 1)
        .timeout(service)
        .release(resource, 1)
        .build()
}

#[test]
fn two_arrivals_share_a_unit_server() {
    let recording = Recording::shared();
    let mut sim = Simulator::new("mm1", false);
    sim.set_monitor(recording.clone());

    sim.add_trajectory(service_trajectory("server", 5.0));
    sim.add_resource("server", 1, -1, true, Preemption::default());
    sim.add_generator(
        "customer",
        "service",
        dists::every(vec![0.0, 0.0]),
        MonitorLevel::Arrivals,
    )
    .unwrap();

    sim.run(SimTime::from_secs(100)).unwrap();

    let rec = recording.lock().unwrap();
    assert_eq!(rec.starts[0], ("customer0".to_string(), 0.0));
    assert_eq!(rec.starts[1], ("customer1".to_string(), 0.0));
    assert_eq!(rec.end_of("customer0"), (5.0, true));
    assert_eq!(rec.end_of("customer1"), (10.0, true));

    let server = sim.get_resource("server").unwrap();
    assert_eq!(server.server_count(), 0);
    assert_eq!(server.queue_count(), 0);
}

fn preemption_times(restart: bool) -> (f64, f64) {
    let recording = Recording::shared();
    let mut sim = Simulator::new("preempt", false);
    sim.set_monitor(recording.clone());

    sim.add_trajectory(
        Trajectory::builder("low_flow")
            .seize_with(
                "cpu",
                1,
                SeizePolicy {
                    priority: 0,
                    preemptible: true,
                    restart,
                },
            )
            .timeout(10.0)
            .release("cpu", 1)
            .build(),
    );
    sim.add_trajectory(
        Trajectory::builder("high_flow")
            .timeout(3.0)
            .seize_with("cpu", 1, SeizePolicy::with_priority(1))
            .timeout(4.0)
            .release("cpu", 1)
            .build(),
    );
    sim.add_resource(
        "cpu",
        1,
        -1,
        false,
        Preemption::Enabled(PreemptOrder::Fifo),
    );
    sim.add_generator("low", "low_flow", dists::every(vec![0.0]), MonitorLevel::Arrivals)
        .unwrap();
    sim.add_generator("high", "high_flow", dists::every(vec![0.0]), MonitorLevel::Arrivals)
        .unwrap();

    sim.run(SimTime::from_secs(100)).unwrap();

    let rec = recording.lock().unwrap();
    let (high_end, _) = rec.end_of("high0");
    let (low_end, _) = rec.end_of("low0");
    (high_end, low_end)
}

#[test]
fn preemption_resumes_the_residual_timeout() {
    // low seizes at 0 for 10; high preempts at 3 for 4; low resumes with
    // residual 7 once high releases at 7
    assert_eq!(preemption_times(false), (7.0, 14.0));
}

#[test]
fn preemption_with_restart_reruns_the_timeout() {
    assert_eq!(preemption_times(true), (7.0, 17.0));
}

#[test]
fn release_and_seize_at_the_same_instant_resolve_release_first() {
    let recording = Recording::shared();
    let mut sim = Simulator::new("tie", false);
    sim.set_monitor(recording.clone());

    sim.add_trajectory(
        Trajectory::builder("holder")
            .seize("server", 1)
            .timeout(5.0)
            .release("server", 1)
            .build(),
    );
    sim.add_trajectory(
        Trajectory::builder("late")
            .timeout(5.0)
            .seize("server", 1)
            .timeout(5.0)
            .release("server", 1)
            .build(),
    );
    sim.add_resource("server", 1, -1, false, Preemption::default());
    sim.add_generator("a", "holder", dists::every(vec![0.0]), MonitorLevel::Arrivals)
        .unwrap();
    sim.add_generator("b", "late", dists::every(vec![0.0]), MonitorLevel::Arrivals)
        .unwrap();

    sim.run(SimTime::from_secs(100)).unwrap();

    let rec = recording.lock().unwrap();
    assert_eq!(rec.end_of("a0"), (5.0, true));
    // b is admitted at 5, not 5 + epsilon, so it finishes at exactly 10
    assert_eq!(rec.end_of("b0"), (10.0, true));
}

#[test]
fn capacity_schedule_gates_admissions() {
    let recording = Recording::shared();
    let mut sim = Simulator::new("window", false);
    sim.set_monitor(recording.clone());

    sim.add_trajectory(
        Trajectory::builder("job_flow")
            .seize("gate", 1)
            .timeout(0.5)
            .release("gate", 1)
            .build(),
    );
    sim.add_resource("gate", 2, -1, true, Preemption::default());
    sim.add_resource_manager("gate", flowsim_core::ManagedParam::Capacity, vec![10.0, 10.0], vec![2, 0])
        .unwrap();
    sim.add_generator("job", "job_flow", dists::constant(1.0), MonitorLevel::Arrivals)
        .unwrap();

    sim.run(SimTime::from_secs(30)).unwrap();

    let rec = recording.lock().unwrap();
    // before the zero-capacity window, jobs clear in half a second
    assert_eq!(rec.end_of("job5"), (5.5, true));
    // jobs arriving inside [10, 20) wait for the capacity to come back
    let (end, finished) = rec.end_of("job12");
    assert!(finished);
    assert!(end >= 20.0, "job12 ended at {end}, inside the closed window");
    // the monitor saw the window close and the queue build up
    assert!(rec
        .resource_samples
        .iter()
        .any(|(name, _, _, queue, capacity)| name == "gate" && *capacity == 0 && *queue > 0));
}

#[test]
fn created_equals_ended_plus_active() {
    let mut sim = Simulator::new("conservation", false);
    sim.add_trajectory(service_trajectory("server", 3.0));
    sim.add_resource("server", 1, -1, false, Preemption::default());
    sim.add_generator("job", "service", dists::constant(1.0), MonitorLevel::Off)
        .unwrap();

    sim.run(SimTime::from_secs(10)).unwrap();

    assert!(sim.created_arrivals() > 0);
    assert_eq!(
        sim.created_arrivals(),
        sim.ended_arrivals() + sim.active_arrivals() as u64
    );
}

#[test]
fn reset_is_idempotent() {
    let mut sim = Simulator::new("reset", false);
    sim.add_trajectory(service_trajectory("server", 3.0));
    sim.add_resource("server", 1, -1, false, Preemption::default());
    sim.add_generator("job", "service", dists::constant(1.0), MonitorLevel::Off)
        .unwrap();

    sim.run(SimTime::from_secs(10)).unwrap();
    assert!(sim.now() > SimTime::zero());

    sim.reset();
    let after_one = (
        sim.now(),
        sim.created_arrivals(),
        sim.active_arrivals(),
        sim.peek(),
        sim.get_resource("server").unwrap().server_count(),
    );

    sim.reset();
    let after_two = (
        sim.now(),
        sim.created_arrivals(),
        sim.active_arrivals(),
        sim.peek(),
        sim.get_resource("server").unwrap().server_count(),
    );

    assert_eq!(after_one, after_two);
    assert_eq!(after_one.0, SimTime::zero());
    // the generator re-seeded the queue
    assert_eq!(after_one.3, Some(SimTime::zero()));
}

#[test]
fn shrinking_capacity_keeps_the_overage() {
    let recording = Recording::shared();
    let mut sim = Simulator::new("shrink", false);
    sim.set_monitor(recording.clone());

    sim.add_trajectory(service_trajectory("server", 100.0));
    sim.add_resource("server", 2, -1, false, Preemption::default());
    sim.add_generator("job", "service", dists::every(vec![0.0, 0.0]), MonitorLevel::Arrivals)
        .unwrap();

    // play out the time-zero admissions only
    while sim.peek() == Some(SimTime::zero()) {
        sim.step().unwrap();
    }
    assert_eq!(sim.get_resource("server").unwrap().server_count(), 2);

    sim.set_capacity("server", 1).unwrap();
    let server = sim.get_resource("server").unwrap();
    assert_eq!(server.capacity(), 1);
    assert_eq!(server.server_count(), 2, "no eviction on shrink");

    sim.run(SimTime::from_secs(1000)).unwrap();
    let rec = recording.lock().unwrap();
    assert_eq!(rec.end_of("job0"), (100.0, true));
    assert_eq!(rec.end_of("job1"), (100.0, true));
    assert_eq!(sim.get_resource("server").unwrap().server_count(), 0);
}

#[test]
fn full_queue_drops_or_redirects() {
    let recording = Recording::shared();
    let mut sim = Simulator::new("reject", false);
    sim.set_monitor(recording.clone());

    // no queue at all: the second arrival is turned away
    sim.add_trajectory(service_trajectory("server", 1.0));
    sim.add_resource("server", 1, 0, false, Preemption::default());
    sim.add_generator("job", "service", dists::every(vec![0.0, 0.0]), MonitorLevel::Arrivals)
        .unwrap();

    sim.run(SimTime::from_secs(10)).unwrap();

    let rec = recording.lock().unwrap();
    assert_eq!(rec.end_of("job0"), (1.0, true));
    assert_eq!(rec.end_of("job1"), (0.0, false), "dropped at seize time");
    assert_eq!(sim.get_resource("server").unwrap().rejected(), 1);
}

#[test]
fn rejection_edge_routes_instead_of_dropping() {
    let recording = Recording::shared();
    let mut sim = Simulator::new("reroute", false);
    sim.set_monitor(recording.clone());

    sim.add_trajectory(
        Trajectory::builder("service")
            .seize_or(
                "server",
                1,
                SeizePolicy::default(),
                flowsim_core::TrajectoryBuilder::path()
                    .timeout(2.0)
                    .set_attribute("rerouted", 1.0),
            )
            .timeout(1.0)
            .release("server", 1)
            .build(),
    );
    sim.add_resource("server", 1, 0, false, Preemption::default());
    sim.add_generator("job", "service", dists::every(vec![0.0, 0.0]), MonitorLevel::Arrivals)
        .unwrap();

    sim.run(SimTime::from_secs(10)).unwrap();

    let rec = recording.lock().unwrap();
    assert_eq!(rec.end_of("job0"), (1.0, true));
    // the rejected arrival takes the fallback path and finishes normally
    assert_eq!(rec.end_of("job1"), (2.0, true));
}
