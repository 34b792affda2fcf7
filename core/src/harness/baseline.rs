//! Baseline comparison: every selected scenario under each selected
//! policy, one seed per scenario, full record table out.

use super::scenario_seed;
use crate::{
    config::{BurnMintCurve, SimConfig},
    emission_subsystem::PolicyKind,
    engine::RunOutput,
    error::SimResult,
    plan::{RunPlan, RunSpec},
    scenario::ScenarioConfig,
    snapshot::SimulationRecord,
    stats,
    types::{DAYS_PER_MONTH, DAYS_PER_YEAR},
};

pub struct BaselineReport {
    /// All runs' records, run after run in plan order.
    pub records: Vec<SimulationRecord>,
    /// Last record of each run, in plan order.
    pub finals: Vec<SimulationRecord>,
    pub validation: Vec<ValidationRow>,
    /// Burn/mint ratio of the bull PID run against the calibrated curve,
    /// empty when that run is not in the plan.
    pub burn_mint: Vec<BurnMintCheckpoint>,
}

/// Months at which the burn/mint trajectory is compared to the benchmark.
pub const BURN_MINT_MONTHS: [u64; 6] = [6, 12, 24, 36, 48, 60];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyOutcome {
    pub final_active: u64,
    pub deviation: f64,
    /// Mean absolute deviation from target over the last two years.
    pub late_mad: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRow {
    pub scenario: String,
    pub pid: Option<PolicyOutcome>,
    pub fixed: Option<PolicyOutcome>,
}

impl ValidationRow {
    /// True when both policies ran and PID held closer to target late in the run.
    pub fn pid_better(&self) -> Option<bool> {
        Some(self.pid?.late_mad < self.fixed?.late_mad)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurnMintCheckpoint {
    pub month: u64,
    pub simulated: f64,
    pub benchmark: f64,
}

/// Simulated burn/mint ratio at each checkpoint month inside the run,
/// next to the calibrated logistic benchmark for that month.
pub fn burn_mint_progression(records: &[SimulationRecord], curve: &BurnMintCurve) -> Vec<BurnMintCheckpoint> {
    BURN_MINT_MONTHS
        .iter()
        .filter_map(|&month| {
            let record = records.get((month * DAYS_PER_MONTH) as usize)?;
            Some(BurnMintCheckpoint {
                month,
                simulated: record.burn_mint_ratio,
                benchmark: curve.ratio_at_month(month as f64),
            })
        })
        .collect()
}

/// PID runs come before static runs for each scenario; scenario `i` of the
/// catalog uses `seed + i`.
pub fn plan(scenarios: &[(usize, ScenarioConfig)], policies: &[PolicyKind], seed: u64) -> RunPlan {
    let mut plan = RunPlan::new("core");
    for (idx, scenario) in scenarios {
        for &policy in policies {
            plan.push(RunSpec::new(*idx, scenario.clone(), policy, scenario_seed(seed, *idx)));
        }
    }
    plan
}

pub fn run(
    config: &SimConfig,
    scenarios: &[(usize, ScenarioConfig)],
    policies: &[PolicyKind],
    seed: u64,
) -> SimResult<BaselineReport> {
    run_with_sink(config, scenarios, policies, seed, |_| Ok(()))
}

/// Like `run`, but hands every finished run to `sink` before its records
/// are kept (used to persist runs).
pub fn run_with_sink<S>(
    config: &SimConfig,
    scenarios: &[(usize, ScenarioConfig)],
    policies: &[PolicyKind],
    seed: u64,
    sink: S,
) -> SimResult<BaselineReport>
where
    S: Fn(&RunOutput) -> SimResult<()> + Sync,
{
    let plan = plan(scenarios, policies, seed);
    let runs = plan.execute(config, |_, out| {
        sink(&out)?;
        Ok(out.records)
    })?;

    let finals = runs.iter().filter_map(|r| r.last().cloned()).collect();
    let validation = scenarios
        .iter()
        .map(|(_, s)| validate(&s.name, &runs, config.target_population))
        .collect();
    let burn_mint = runs
        .iter()
        .find(|r| r.first().is_some_and(|f| f.scenario == "bull" && f.policy == PolicyKind::Pid))
        .map(|r| burn_mint_progression(r, &config.benchmarks.burn_mint))
        .unwrap_or_default();
    Ok(BaselineReport {
        records: runs.into_iter().flatten().collect(),
        finals,
        validation,
        burn_mint,
    })
}

fn outcome(records: &[SimulationRecord], target: u64) -> Option<PolicyOutcome> {
    let last = records.last()?;
    let window = (2 * DAYS_PER_YEAR) as usize;
    let tail = &records[records.len().saturating_sub(window)..];
    let late: Vec<f64> = tail
        .iter()
        .map(|r| (r.active as f64 - target as f64).abs())
        .collect();
    Some(PolicyOutcome {
        final_active: last.active,
        deviation: last.deviation_from(target),
        late_mad: stats::mean(&late),
    })
}

fn validate(scenario: &str, runs: &[Vec<SimulationRecord>], target: u64) -> ValidationRow {
    let find = |policy: PolicyKind| {
        runs.iter()
            .find(|r| r.first().is_some_and(|f| f.scenario == scenario && f.policy == policy))
            .and_then(|r| outcome(r, target))
    };
    ValidationRow {
        scenario: scenario.to_string(),
        pid: find(PolicyKind::Pid),
        fixed: find(PolicyKind::Static),
    }
}
