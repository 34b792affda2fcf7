//! Supply accounting: last stage of every day.
//!
//! Mints emission, removes burns and slashed stake from circulation,
//! moves slashed stake into the treasury and pays the subsidy out of it.
//! Also refreshes the active count seen by tomorrow's demand and
//! controller stages.
//!
//! Invariants after this stage:
//!   0 <= circulating <= total_supply
//!   treasury >= 0
//!   active_count >= 1

use crate::{
    error::SimResult,
    event::SimEvent,
    rng::SubsystemRng,
    subsystem::{SimSubsystem, StepContext},
    world::World,
};

#[derive(Default)]
pub struct SupplySubsystem;

impl SupplySubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for SupplySubsystem {
    fn name(&self) -> &'static str {
        "supply"
    }

    fn update(
        &mut self,
        ctx: &StepContext<'_>,
        world: &mut World,
        _rng: &mut SubsystemRng,
    ) -> SimResult<()> {
        let flows = world.flows;
        let live = world.operators.active_count();
        let state = &mut world.state;

        let slashed = flows.slashed as f64;
        state.circulating = (state.circulating + state.emission - state.burn - slashed)
            .clamp(0.0, ctx.config.total_supply);
        state.treasury = (state.treasury + slashed - flows.subsidy).max(0.0);
        state.slashed_total += flows.slashed;
        state.fraud_captured_total += flows.fraud_captured;
        state.active_count = (live as u64).max(1);

        if live == 0 && state.collapsed_on.is_none() {
            state.collapsed_on = Some(ctx.day);
            log::warn!("day={} operator population collapsed", ctx.day);
            world.emit(SimEvent::PopulationCollapsed { day: ctx.day });
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
