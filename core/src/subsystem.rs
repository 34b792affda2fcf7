//! Subsystem trait and per-day context.
//!
//! RULE: Every pipeline stage implements SimSubsystem.
//! The engine calls update() on each registered stage
//! in registration order, every day.
//! Execution order is fixed and documented in engine.rs.

use crate::{
    config::SimConfig,
    error::SimResult,
    rng::SubsystemRng,
    scenario::ScenarioConfig,
    types::Day,
    world::World,
};
use std::any::Any;

/// Read-only inputs for one day of one run.
pub struct StepContext<'a> {
    pub day: Day,
    pub config: &'a SimConfig,
    pub scenario: &'a ScenarioConfig,
}

/// The contract every stage must fulfill.
pub trait SimSubsystem: Send {
    /// Unique stable name for this stage.
    fn name(&self) -> &'static str;

    /// Called once per day by the engine.
    ///
    /// - `ctx`:   day index, configuration and scenario
    /// - `world`: the run's state, including flows written by earlier stages today
    /// - `rng`:   this stage's deterministic RNG stream
    fn update(
        &mut self,
        ctx: &StepContext<'_>,
        world: &mut World,
        rng: &mut SubsystemRng,
    ) -> SimResult<()>;

    /// For downcasting in tests and tooling only.
    /// Production sim code never uses this.
    fn as_any(&self) -> &dyn Any;
}
