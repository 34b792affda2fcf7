//! Shared primitive types used across the entire simulation.

/// A simulation day. Day 0 is the first simulated day of a run.
pub type Day = u64;

/// Stable index of an operator in the population arena.
/// Ids are assigned monotonically and never reused.
pub type OperatorId = usize;

/// The canonical run identifier, `<scenario>_<policy>`.
pub type RunId = String;

/// One simulated year in days.
pub const DAYS_PER_YEAR: Day = 365;

/// One simulated month in days (scenario shocks are expressed in months).
pub const DAYS_PER_MONTH: Day = 30;
