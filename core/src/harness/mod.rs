//! Ensemble and sensitivity harnesses.
//!
//! Every harness follows the same shape:
//!   1. build a `RunPlan` from its grid (scenarios × policies × seeds ×
//!      parameter values),
//!   2. execute it with a reducer that condenses each run's record table
//!      into one result row,
//!   3. write the rows as a flat table and return them for printing.
//!
//! Seeding conventions:
//!   - single-seed harnesses run scenario i with `base_seed + i`,
//!   - multi-seed harnesses run seeds `base_seed .. base_seed + n`.

pub mod baseline;
pub mod consistency;
pub mod ensemble;
pub mod governance;
pub mod saturation;
pub mod sweep;
pub mod wash_trading;

use crate::{
    config::SimConfig,
    scenario::{self, ScenarioConfig},
    snapshot::SimulationRecord,
    stats,
    types::Day,
};

pub const ENSEMBLE_SEEDS: usize = 30;
pub const ENSEMBLE_BASE_SEED: u64 = 1_000;

/// Result file names, relative to the results directory.
pub mod files {
    pub const SIMULATION: &str = "simulation_results.csv";
    pub const SENSITIVITY: &str = "sensitivity_results.csv";
    pub const SLASHING: &str = "slashing_sensitivity_results.csv";
    pub const ENSEMBLE: &str = "multi_seed_results.csv";
    pub const ENSEMBLE_SUMMARY: &str = "multi_seed_summary.csv";
    pub const CONSISTENCY: &str = "rank_consistency_runs.csv";
    pub const CONSISTENCY_REPORT: &str = "rank_consistency.json";
    pub const INTERACTION: &str = "interaction_sweep_results.csv";
    pub const CADENCE: &str = "cadence_sensitivity_results.csv";
    pub const SATURATION: &str = "pid_floor_analysis.json";
    pub const GOVERNANCE: &str = "exponent_sensitivity_results.csv";
    pub const WASH_TRADING: &str = "wash_trading_results.csv";
}

/// `n` consecutive seeds starting at `base`.
pub fn seed_range(base: u64, n: usize) -> Vec<u64> {
    (0..n as u64).map(|i| base + i).collect()
}

/// Seed for a single-seed harness run of the scenario at `scenario_index`.
pub fn scenario_seed(base: u64, scenario_index: usize) -> u64 {
    base + scenario_index as u64
}

/// Resolve a scenario subset (empty means the whole catalog).
pub fn scenarios(names: &[String]) -> crate::error::SimResult<Vec<(usize, ScenarioConfig)>> {
    scenario::select(names)
}

/// Condensed view of one run's trajectory used by the sweep reducers.
///
/// Bound hits use the rounded emission series and count days within one
/// token of a bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub final_active: u64,
    pub deviation: f64,
    /// Mean absolute deviation of N from target over the whole run.
    pub mad: f64,
    pub max_active: u64,
    pub min_active: u64,
    pub final_price: f64,
    pub final_circulating: f64,
    pub initial_circulating: f64,
    pub final_treasury: f64,
    pub slashed_total: u64,
    pub emission_range: f64,
    pub total_emission: f64,
    pub total_burned: f64,
    pub max_burn_mint: f64,
    pub floor_days: usize,
    pub ceiling_days: usize,
    /// Days on which the (rounded) emission differs from the day before.
    pub adjustments: usize,
    pub emission_std: f64,
}

impl Trajectory {
    pub fn from_records(records: &[SimulationRecord], config: &SimConfig) -> Self {
        let target = config.target_population;
        let emissions = rounded_emissions(records);
        let active: Vec<u64> = records.iter().map(|r| r.active).collect();
        let last = records.last();

        let e_min = emissions.iter().copied().fold(f64::INFINITY, f64::min);
        let e_max = emissions.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            final_active:        last.map_or(0, |r| r.active),
            deviation:           last.map_or(1.0, |r| r.deviation_from(target)),
            mad:                 stats::mean(
                &active.iter().map(|&n| (n as f64 - target as f64).abs()).collect::<Vec<_>>(),
            ),
            max_active:          active.iter().copied().max().unwrap_or(0),
            min_active:          active.iter().copied().min().unwrap_or(0),
            final_price:         last.map_or(0.0, |r| r.price),
            final_circulating:   last.map_or(0.0, |r| r.circulating),
            initial_circulating: records.first().map_or(0.0, |r| r.circulating),
            final_treasury:      last.map_or(0.0, |r| r.treasury),
            slashed_total:       last.map_or(0, |r| r.slashed_total),
            emission_range:      if emissions.is_empty() { 0.0 } else { e_max - e_min },
            total_emission:      emissions.iter().sum(),
            total_burned:        records.iter().map(|r| r.burn).sum(),
            max_burn_mint:       records.iter().map(|r| r.burn_mint_ratio).fold(0.0, f64::max),
            floor_days:          count_floor_days(&emissions, config),
            ceiling_days:        count_ceiling_days(&emissions, config),
            adjustments:         emissions.windows(2).filter(|w| w[0] != w[1]).count(),
            emission_std:        stats::pop_std_dev(&emissions),
        }
    }

    /// Relative change of circulating supply over the run, in percent.
    pub fn circulating_change_pct(&self) -> f64 {
        (self.final_circulating - self.initial_circulating) / self.initial_circulating.max(1.0) * 100.0
    }
}

/// Emission per day, rounded to whole tokens as in the record table.
pub fn rounded_emissions(records: &[SimulationRecord]) -> Vec<f64> {
    records.iter().map(|r| r.emission.round()).collect()
}

pub fn count_floor_days(emissions: &[f64], config: &SimConfig) -> usize {
    emissions.iter().filter(|&&e| e <= config.emission.floor + 1.0).count()
}

pub fn count_ceiling_days(emissions: &[f64], config: &SimConfig) -> usize {
    emissions.iter().filter(|&&e| e >= config.emission.ceiling - 1.0).count()
}

/// Days from `onset` until emission first departs more than 5% from its
/// mean over the ten days before onset. Searches 180 days.
pub fn shock_response_days(emissions: &[f64], onset: Day) -> Option<Day> {
    let onset = onset as usize;
    if onset == 0 || onset > emissions.len() {
        return None;
    }
    let pre = &emissions[onset.saturating_sub(10)..onset];
    let pre_mean = stats::mean(pre);
    let end = (onset + 180).min(emissions.len());
    (onset..end)
        .find(|&t| (emissions[t] - pre_mean).abs() / pre_mean.max(1.0) > 0.05)
        .map(|t| (t - onset) as Day)
}
