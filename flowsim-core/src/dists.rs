//! Ready-made host callbacks for inter-arrival delays.
//!
//! The engine only ever sees a `FnMut() -> f64`; these factories cover the
//! common cases so models and tests do not hand-roll RNG plumbing. The
//! random variants derive their seed from a [`SimConfig`] so runs are
//! reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Exp;

use crate::process::DistFn;

/// Simulation-wide configuration consumed by the seeded factories.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimConfig {
    pub seed: u64,
}

impl SimConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

/// A fixed inter-arrival delay, forever.
pub fn constant(delta: f64) -> DistFn {
    Box::new(move || delta)
}

/// Exponentially distributed delays with the given rate (arrivals per
/// second). Deterministic for a given config.
pub fn exponential(config: &SimConfig, rate: f64) -> DistFn {
    assert!(rate > 0.0, "rate must be positive");
    let dist = Exp::new(rate).expect("rate must be positive");
    let mut seed = config.seed ^ 0x9E37_79B9_7F4A_7C15;
    seed ^= rate.to_bits();
    let mut rng = StdRng::seed_from_u64(seed);
    Box::new(move || rng.sample(dist))
}

/// Uniformly distributed delays in `[low, high)`. Deterministic for a given
/// config.
pub fn uniform(config: &SimConfig, low: f64, high: f64) -> DistFn {
    assert!(low < high, "low must be less than high");
    assert!(low >= 0.0, "delays cannot be negative");
    let mut seed = config.seed ^ 0xB4B4_4B4B_0202_0305;
    seed ^= low.to_bits();
    seed ^= high.to_bits().rotate_left(13);
    let mut rng = StdRng::seed_from_u64(seed);
    Box::new(move || rng.gen_range(low..high))
}

/// A finite list of inter-arrival gaps, then stop.
///
/// A generator driven by this callback produces exactly `gaps.len()`
/// arrivals: the first at registration time, each following one after the
/// corresponding gap, and the generator ends once the list is exhausted.
pub fn every(gaps: Vec<f64>) -> DistFn {
    let mut iter = gaps.into_iter();
    Box::new(move || iter.next().unwrap_or(-1.0))
}
