//! Demand subsystem: stochastic daily fee revenue.
//!
//! Revenue scales superlinearly with coverage (active operators relative
//! to target), compounds with the scenario's growth rate, and is bent by
//! the scenario shock once the onset day has passed.
//!
//! Execution: first stage of every day. Reads the previous day's active
//! count and today's cost multiplier. Writes `fee_revenue`.

use crate::{
    config::{DemandConfig, SimConfig},
    error::SimResult,
    rng::SubsystemRng,
    scenario::{ScenarioConfig, Shock},
    subsystem::{SimSubsystem, StepContext},
    types::{Day, DAYS_PER_MONTH},
    world::World,
};

/// Network-effect multiplier for a coverage ratio `active / target`.
///
/// Linear below the enterprise threshold, accelerating between the two
/// thresholds, saturating (and capped) above.
pub fn coverage_factor(active: u64, target: u64, cfg: &DemandConfig) -> f64 {
    let ratio = active as f64 / target.max(1) as f64;
    if ratio < cfg.enterprise_threshold {
        ratio
    } else if ratio < cfg.saturation_threshold {
        ratio.powf(cfg.enterprise_exponent)
    } else {
        ratio.powf(cfg.saturation_exponent).min(cfg.max_coverage_factor)
    }
}

/// Multiplier applied by the scenario shock on `day`. Only strictly
/// after the onset day; fractional months count.
pub fn shock_factor(day: Day, scenario: &ScenarioConfig, cost_multiplier: f64, cfg: &DemandConfig) -> f64 {
    let Some(onset) = scenario.shock.onset_day() else {
        return 1.0;
    };
    if day <= onset {
        return 1.0;
    }
    let months_since = (day - onset) as f64 / DAYS_PER_MONTH as f64;
    match scenario.shock {
        Shock::DemandContraction { .. } => {
            (1.0 - cfg.contraction_per_month * months_since).max(cfg.contraction_floor)
        }
        Shock::CostIncrease { .. } => 1.0 / cost_multiplier.max(f64::EPSILON),
        Shock::OperatorPoach { .. } => {
            1.0 - (cfg.poach_erosion_per_month * months_since).min(cfg.poach_erosion_cap)
        }
        Shock::NoShock => 1.0,
    }
}

/// Noise-free demand for `day`: base revenue × coverage × growth × shock.
pub fn expected_demand(
    day: Day,
    active: u64,
    scenario: &ScenarioConfig,
    cost_multiplier: f64,
    config: &SimConfig,
) -> f64 {
    let cfg = &config.demand;
    let growth = (1.0 + scenario.daily_growth()).powf(day as f64);
    cfg.base_revenue
        * coverage_factor(active, config.target_population, cfg)
        * growth
        * shock_factor(day, scenario, cost_multiplier, cfg)
}

/// Daily fee revenue in USD with multiplicative noise, floored.
pub fn compute_demand(
    day: Day,
    active: u64,
    scenario: &ScenarioConfig,
    cost_multiplier: f64,
    config: &SimConfig,
    rng: &mut SubsystemRng,
) -> f64 {
    let noise = 1.0 + rng.normal(0.0, config.demand.noise_std);
    let revenue = expected_demand(day, active, scenario, cost_multiplier, config) * noise;
    revenue.max(config.demand.revenue_floor)
}

#[derive(Default)]
pub struct DemandSubsystem;

impl DemandSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for DemandSubsystem {
    fn name(&self) -> &'static str {
        "demand"
    }

    fn update(
        &mut self,
        ctx: &StepContext<'_>,
        world: &mut World,
        rng: &mut SubsystemRng,
    ) -> SimResult<()> {
        let state = &mut world.state;
        state.fee_revenue = compute_demand(
            ctx.day,
            state.active_count,
            ctx.scenario,
            state.cost_multiplier,
            ctx.config,
            rng,
        );
        log::trace!("day={} fee_revenue={:.2}", ctx.day, state.fee_revenue);
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
