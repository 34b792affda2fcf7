//! Per-day simulation records.
//!
//! One `SimulationRecord` is captured at the end of every simulated day.
//! Records are immutable once captured; the record table of a run is the
//! primary output artifact.

use crate::{
    emission_subsystem::PolicyKind,
    types::{Day, RunId},
    world::EconomicState,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub seed:            u64,
    pub run_id:          RunId,
    pub day:             Day,
    pub scenario:        String,
    pub policy:          PolicyKind,
    pub active:          u64,
    pub emission:        f64,
    pub burn:            f64,
    pub fee_revenue:     f64,
    pub price:           f64,
    pub circulating:     f64,
    pub treasury:        f64,
    pub burn_mint_ratio: f64,
    pub slashed_total:   u64,
    pub fraud_captured:  f64,
    pub fraud_captured_pct: f64,
}

impl SimulationRecord {
    pub fn capture(
        seed: u64,
        run_id: &str,
        day: Day,
        scenario: &str,
        policy: PolicyKind,
        state: &EconomicState,
    ) -> Self {
        let minted_to_date = (state.emission * (day + 1) as f64).max(1.0);
        Self {
            seed,
            run_id:             run_id.to_string(),
            day,
            scenario:           scenario.to_string(),
            policy,
            active:             state.active_count,
            emission:           state.emission,
            burn:               state.burn,
            fee_revenue:        state.fee_revenue,
            price:              state.price,
            circulating:        state.circulating,
            treasury:           state.treasury,
            burn_mint_ratio:    state.burn_mint_ratio(),
            slashed_total:      state.slashed_total,
            fraud_captured:     state.fraud_captured_total,
            fraud_captured_pct: state.fraud_captured_total / minted_to_date * 100.0,
        }
    }

    /// Absolute relative deviation of the active count from `target`.
    pub fn deviation_from(&self, target: u64) -> f64 {
        (self.active as f64 - target as f64).abs() / target.max(1) as f64
    }
}

/// Canonical run id: `<scenario>_<policy>`.
pub fn run_id(scenario: &str, policy: PolicyKind) -> RunId {
    format!("{scenario}_{}", policy.name())
}
