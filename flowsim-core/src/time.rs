//! Virtual simulation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// A point in virtual time, stored as nanoseconds since simulation start.
///
/// The engine advances `SimTime` only at event dispatch; it never moves
/// backwards. Host callbacks exchange delays as `f64` seconds, which the
/// engine converts at the boundary with [`SimTime::from_secs_f64`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// The simulation start (time zero).
    pub const fn zero() -> Self {
        SimTime(0)
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis * 1_000_000)
    }

    pub const fn from_secs(secs: u64) -> Self {
        SimTime(secs * 1_000_000_000)
    }

    /// Convert a non-negative, finite number of seconds.
    ///
    /// # Panics
    ///
    /// Panics if `secs` is negative, infinite, or NaN. Callers that accept
    /// host-provided values are expected to validate them first.
    pub fn from_secs_f64(secs: f64) -> Self {
        assert!(
            secs.is_finite(),
            "simulation time must be finite, got {secs}"
        );
        assert!(secs >= 0.0, "simulation time cannot be negative: {secs}");
        SimTime((secs * 1_000_000_000.0) as u64)
    }

    pub fn from_duration(duration: Duration) -> Self {
        SimTime(duration.as_nanos() as u64)
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Elapsed time since `earlier`, saturating at zero.
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<SimTime> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        SimTime(self.0.saturating_add(rhs.as_nanos() as u64))
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::zero()
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.as_duration();
        let secs = duration.as_secs();
        let millis = duration.subsec_millis();
        if secs > 0 || millis == 0 {
            write!(f, "{secs}.{millis:03}s")
        } else {
            write!(f, "{millis}ms")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction() {
        assert_eq!(SimTime::zero().as_nanos(), 0);
        assert_eq!(SimTime::from_millis(2).as_nanos(), 2_000_000);
        assert_eq!(SimTime::from_secs(1).as_nanos(), 1_000_000_000);
        assert_eq!(SimTime::from_secs_f64(1.5).as_nanos(), 1_500_000_000);
        assert_eq!(SimTime::from_secs(3).as_secs_f64(), 3.0);
    }

    #[test]
    fn arithmetic() {
        let t1 = SimTime::from_millis(100);
        let t2 = SimTime::from_millis(40);
        assert_eq!(t1 + t2, SimTime::from_millis(140));
        assert_eq!(t1 + Duration::from_millis(25), SimTime::from_millis(125));
        assert_eq!(t1 - t2, Duration::from_millis(60));
        // saturates rather than wrapping
        assert_eq!(t2.duration_since(t1), Duration::ZERO);
    }

    #[test]
    fn ordering() {
        assert!(SimTime::from_secs(1) < SimTime::from_secs(2));
        assert_eq!(SimTime::default(), SimTime::zero());
    }

    #[test]
    #[should_panic(expected = "cannot be negative")]
    fn negative_seconds_rejected() {
        let _ = SimTime::from_secs_f64(-1.0);
    }

    #[test]
    #[should_panic(expected = "must be finite")]
    fn non_finite_seconds_rejected() {
        let _ = SimTime::from_secs_f64(f64::NAN);
    }
}
