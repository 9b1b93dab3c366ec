//! Error types for the simulation engine.

use crate::time::SimTime;
use thiserror::Error;

/// Errors surfaced by simulation operations.
///
/// Name lookups and malformed host callback results are fatal to the current
/// `run` call; the engine state stays consistent up to the failed step, and
/// `reset` restores a clean slate. Duplicate registrations and queue-full
/// rejections are not errors (they warn and take the configured fallback).
#[derive(Debug, Error)]
pub enum SimError {
    #[error("resource '{0}' not found (typo?)")]
    UnknownResource(String),

    #[error("generator '{0}' not found (typo?)")]
    UnknownGenerator(String),

    #[error("trajectory '{0}' not found (typo?)")]
    UnknownTrajectory(String),

    #[error("branch selected option {selected}, but only {paths} paths are defined")]
    BranchOutOfRange { selected: usize, paths: usize },

    #[error("{op} amount must be non-negative, got {amount}")]
    NegativeAmount { op: &'static str, amount: i32 },

    #[error("arrival '{arrival}' released '{resource}' without holding it")]
    ReleaseWithoutSeize { arrival: String, resource: String },

    #[error("arrival '{arrival}' released {amount} of '{resource}' but holds only {held}")]
    OverRelease {
        arrival: String,
        resource: String,
        held: i32,
        amount: i32,
    },

    #[error("callback produced a non-finite delay: {value}")]
    NonFiniteDelay { value: f64 },

    #[error("run interrupted at {at}")]
    Interrupted { at: SimTime },
}
