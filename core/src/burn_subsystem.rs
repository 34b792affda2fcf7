//! Burn subsystem: the protocol fee share of revenue buys back and burns
//! tokens at today's price.

use crate::{
    config::BurnConfig,
    error::SimResult,
    rng::SubsystemRng,
    subsystem::{SimSubsystem, StepContext},
    world::World,
};

/// Tokens burned for `fee_revenue` USD at `price`.
pub fn burn_tokens(fee_revenue: f64, price: f64, cfg: &BurnConfig) -> f64 {
    fee_revenue * cfg.protocol_fee / price.max(cfg.price_epsilon)
}

#[derive(Default)]
pub struct BurnSubsystem;

impl BurnSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for BurnSubsystem {
    fn name(&self) -> &'static str {
        "burn"
    }

    fn update(
        &mut self,
        ctx: &StepContext<'_>,
        world: &mut World,
        _rng: &mut SubsystemRng,
    ) -> SimResult<()> {
        let state = &mut world.state;
        state.burn = burn_tokens(state.fee_revenue, state.price, &ctx.config.burn);
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    #[test]
    fn burn_scales_inversely_with_price() {
        let cfg = SimConfig::default().burn;
        assert!((burn_tokens(1_000.0, 0.10, &cfg) - 3_000.0).abs() < 1e-9);
        assert!((burn_tokens(1_000.0, 0.20, &cfg) - 1_500.0).abs() < 1e-9);
    }

    #[test]
    fn price_is_floored_as_divisor() {
        let cfg = SimConfig::default().burn;
        assert_eq!(burn_tokens(100.0, 0.0, &cfg), burn_tokens(100.0, 0.001, &cfg));
    }
}
