//! Price subsystem: Ornstein-Uhlenbeck mean reversion in log space.
//!
//! The price is pulled toward a fundamental derived from annualized fee
//! revenue per circulating token, plus a daily shock and the scenario's
//! drift. Reads yesterday's circulating supply.

use crate::{
    config::PriceConfig,
    error::SimResult,
    rng::SubsystemRng,
    subsystem::{SimSubsystem, StepContext},
    types::DAYS_PER_YEAR,
    world::World,
};

/// Fee-implied token value, clamped to the configured band.
pub fn fundamental_price(fee_revenue: f64, circulating: f64, cfg: &PriceConfig) -> f64 {
    (fee_revenue * DAYS_PER_YEAR as f64 / circulating.max(1.0) * cfg.fundamental_scale)
        .clamp(cfg.fundamental_min, cfg.fundamental_max)
}

/// One OU step given a standard-normal draw `z`.
pub fn next_price(price: f64, fee_revenue: f64, circulating: f64, drift: f64, z: f64, cfg: &PriceConfig) -> f64 {
    let fundamental = fundamental_price(fee_revenue, circulating, cfg);
    let log_p = price.max(cfg.price_floor).ln();
    let log_f = fundamental.max(cfg.price_floor).ln();
    let next = log_p + cfg.ou_kappa / DAYS_PER_YEAR as f64 * (log_f - log_p) + cfg.ou_sigma * z + drift;
    next.exp().max(cfg.price_floor)
}

#[derive(Default)]
pub struct PriceSubsystem;

impl PriceSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for PriceSubsystem {
    fn name(&self) -> &'static str {
        "price"
    }

    fn update(
        &mut self,
        ctx: &StepContext<'_>,
        world: &mut World,
        rng: &mut SubsystemRng,
    ) -> SimResult<()> {
        let z = rng.normal(0.0, 1.0);
        let state = &mut world.state;
        state.price = next_price(
            state.price,
            state.fee_revenue,
            state.circulating,
            ctx.scenario.price_drift,
            z,
            &ctx.config.price,
        );
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
    fn fundamental_is_clamped() {
        let cfg = SimConfig::default().price;
        assert_eq!(fundamental_price(0.0, 200_000_000.0, &cfg), 0.01);
        assert_eq!(fundamental_price(1e12, 1.0, &cfg), 10.0);
    }

    #[test]
    fn price_reverts_toward_fundamental_without_noise() {
        let cfg = SimConfig::default().price;
        // Fundamental: 1000 × 365 / 1e8 × 1000 = 3.65.
        let p = next_price(0.10, 1_000.0, 100_000_000.0, 0.0, 0.0, &cfg);
        assert!(p > 0.10 && p < 3.65);
        let q = next_price(9.0, 1_000.0, 100_000_000.0, 0.0, 0.0, &cfg);
        assert!(q < 9.0 && q > 3.65);
    }

    #[test]
    fn price_never_falls_below_floor() {
        let cfg = SimConfig::default().price;
        let p = next_price(0.001, 0.0, 1e9, -5.0, -10.0, &cfg);
        assert_eq!(p, cfg.price_floor);
    }
}
