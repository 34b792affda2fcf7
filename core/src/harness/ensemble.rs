//! Multi-seed Monte Carlo ensemble: every scenario × policy × seed.
//!
//! Each run is condensed to one terminal row; rows are then grouped by
//! (scenario, policy) into distribution summaries (mean, sample std,
//! 5th/95th percentiles, coefficient of variation).

use super::Trajectory;
use crate::{
    config::SimConfig,
    emission_subsystem::PolicyKind,
    error::SimResult,
    plan::{RunPlan, RunSpec},
    scenario::ScenarioConfig,
    stats,
    table::{parse_field, CsvRow, FromCsvRow},
};
use std::io::{self, Write};

#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleRow {
    pub scenario:       String,
    pub policy:         PolicyKind,
    pub seed:           u64,
    pub final_active:   u64,
    pub final_price:    f64,
    pub final_circulating: f64,
    pub final_treasury: f64,
    pub max_burn_mint:  f64,
    pub total_emission: f64,
    pub total_burned:   f64,
    pub slashed_total:  u64,
}

const ENSEMBLE_HEADER: &[&str] = &[
    "scenario", "emission_model", "seed", "final_N", "final_P", "final_C", "final_T",
    "bme_max", "total_emission", "total_burned", "slashed_total",
];

impl CsvRow for EnsembleRow {
    const HEADER: &'static [&'static str] = ENSEMBLE_HEADER;

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{},{},{},{},{:.6},{:.0},{:.0},{:.6},{:.0},{:.2},{}",
            self.scenario,
            self.policy.name(),
            self.seed,
            self.final_active,
            self.final_price,
            self.final_circulating,
            self.final_treasury,
            self.max_burn_mint,
            self.total_emission,
            self.total_burned,
            self.slashed_total,
        )
    }
}

impl FromCsvRow for EnsembleRow {
    const HEADER: &'static [&'static str] = ENSEMBLE_HEADER;

    fn from_fields(f: &[&str]) -> Result<Self, String> {
        let policy = PolicyKind::from_name(f[1].trim())
            .ok_or_else(|| format!("unknown emission_model '{}'", f[1]))?;
        Ok(Self {
            scenario:          f[0].trim().to_string(),
            policy,
            seed:              parse_field(f, 2, "seed")?,
            final_active:      parse_field(f, 3, "final_N")?,
            final_price:       parse_field(f, 4, "final_P")?,
            final_circulating: parse_field(f, 5, "final_C")?,
            final_treasury:    parse_field(f, 6, "final_T")?,
            max_burn_mint:     parse_field(f, 7, "bme_max")?,
            total_emission:    parse_field(f, 8, "total_emission")?,
            total_burned:      parse_field(f, 9, "total_burned")?,
            slashed_total:     parse_field(f, 10, "slashed_total")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleSummary {
    pub scenario:     String,
    pub policy:       PolicyKind,
    pub runs:         usize,
    pub n_mean:       f64,
    pub n_std:        f64,
    pub n_p5:         f64,
    pub n_p95:        f64,
    pub n_cv:         f64,
    pub p_mean:       f64,
    pub p_std:        f64,
    pub p_cv:         f64,
    pub bme_max_mean: f64,
    pub bme_max_std:  f64,
}

impl CsvRow for EnsembleSummary {
    const HEADER: &'static [&'static str] = &[
        "scenario", "emission_model", "runs", "N_mean", "N_std", "N_p5", "N_p95", "N_cv",
        "P_mean", "P_std", "P_cv", "bme_max_mean", "bme_max_std",
    ];

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{},{},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
            self.scenario,
            self.policy.name(),
            self.runs,
            self.n_mean,
            self.n_std,
            self.n_p5,
            self.n_p95,
            self.n_cv,
            self.p_mean,
            self.p_std,
            self.p_cv,
            self.bme_max_mean,
            self.bme_max_std,
        )
    }
}

/// Scenario-major, PID before static, seeds innermost.
pub fn plan(scenarios: &[(usize, ScenarioConfig)], policies: &[PolicyKind], seeds: &[u64]) -> RunPlan {
    let mut plan = RunPlan::new("ensemble");
    for (idx, scenario) in scenarios {
        for &policy in policies {
            for &seed in seeds {
                plan.push(RunSpec::new(*idx, scenario.clone(), policy, seed));
            }
        }
    }
    plan
}

pub fn run(
    config: &SimConfig,
    scenarios: &[(usize, ScenarioConfig)],
    policies: &[PolicyKind],
    seeds: &[u64],
) -> SimResult<Vec<EnsembleRow>> {
    plan(scenarios, policies, seeds).execute(config, |spec, out| {
        let t = Trajectory::from_records(&out.records, config);
        Ok(EnsembleRow {
            scenario:          spec.scenario.name.clone(),
            policy:            spec.policy,
            seed:              spec.seed,
            final_active:      t.final_active,
            final_price:       t.final_price,
            final_circulating: t.final_circulating,
            final_treasury:    t.final_treasury,
            max_burn_mint:     t.max_burn_mint,
            total_emission:    t.total_emission,
            total_burned:      t.total_burned,
            slashed_total:     t.slashed_total,
        })
    })
}

/// Group rows by (scenario, policy) in first-seen order and summarize.
pub fn summarize(rows: &[EnsembleRow]) -> Vec<EnsembleSummary> {
    let mut groups: Vec<(String, PolicyKind, Vec<&EnsembleRow>)> = Vec::new();
    for row in rows {
        match groups
            .iter_mut()
            .find(|(s, p, _)| *s == row.scenario && *p == row.policy)
        {
            Some((_, _, members)) => members.push(row),
            None => groups.push((row.scenario.clone(), row.policy, vec![row])),
        }
    }

    groups
        .into_iter()
        .map(|(scenario, policy, members)| {
            let n: Vec<f64> = members.iter().map(|r| r.final_active as f64).collect();
            let p: Vec<f64> = members.iter().map(|r| r.final_price).collect();
            let bme: Vec<f64> = members.iter().map(|r| r.max_burn_mint).collect();
            EnsembleSummary {
                scenario,
                policy,
                runs:         members.len(),
                n_mean:       stats::mean(&n),
                n_std:        stats::std_dev(&n),
                n_p5:         stats::quantile(&n, 0.05),
                n_p95:        stats::quantile(&n, 0.95),
                n_cv:         stats::coefficient_of_variation(&n, 1.0),
                p_mean:       stats::mean(&p),
                p_std:        stats::std_dev(&p),
                p_cv:         stats::coefficient_of_variation(&p, 0.001),
                bme_max_mean: stats::mean(&bme),
                bme_max_std:  stats::std_dev(&bme),
            }
        })
        .collect()
}

/// Mean absolute relative deviation of terminal N from target for one
/// (scenario, policy) group, or `None` if the group is empty.
pub fn mean_deviation(rows: &[EnsembleRow], scenario: &str, policy: PolicyKind, target: u64) -> Option<f64> {
    let devs: Vec<f64> = rows
        .iter()
        .filter(|r| r.scenario == scenario && r.policy == policy)
        .map(|r| (r.final_active as f64 - target as f64).abs() / target.max(1) as f64)
        .collect();
    (!devs.is_empty()).then(|| stats::mean(&devs))
}
