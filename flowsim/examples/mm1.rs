//! M/M/1 queue: Poisson arrivals into a single exponential server.
//!
//! Run with: `cargo run --example mm1`

use flowsim::prelude::*;

fn main() {
    flowsim::core::init_logging();

    let config = SimConfig::with_seed(7);
    let service_rate = 1.0; // jobs per second
    let arrival_rate = 0.8; // offered load rho = 0.8

    let stats = SimulationStats::shared();
    let mut sim = Simulator::new("mm1", false);
    sim.set_monitor(stats.clone());

    let mut service = dists::exponential(&config, service_rate);
    sim.add_trajectory(
        Trajectory::builder("job_flow")
            .seize("server", 1)
            .timeout(Dynamic::call(move |_| service()))
            .release("server", 1)
            .build(),
    );
    sim.add_resource("server", 1, -1, true, Preemption::Disabled);
    sim.add_generator(
        "job",
        "job_flow",
        dists::exponential(&config, arrival_rate),
        MonitorLevel::Arrivals,
    )
    .unwrap();

    let horizon = SimTime::from_secs(10_000);
    sim.run(horizon).unwrap();

    let stats = stats.lock().unwrap();
    println!("simulated {} of virtual time", sim.now());
    println!("jobs finished:   {}", stats.finished_count());
    println!("jobs in flight:  {}", sim.active_arrivals());
    println!(
        "mean flow time:  {:.3}s (M/M/1 theory: {:.3}s)",
        stats.mean_flow_time().unwrap_or(0.0),
        1.0 / (service_rate - arrival_rate)
    );
    println!(
        "server busy:     {:.1}% (theory: {:.1}%)",
        100.0 * stats.mean_occupancy("server").unwrap_or(0.0),
        100.0 * arrival_rate / service_rate
    );

    let out = std::env::temp_dir().join("mm1_stats.json");
    JsonExporter::new(&out).pretty().export(&stats).unwrap();
    println!("stats written to {}", out.display());
}
