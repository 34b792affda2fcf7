//! Structural-vs-noise test for a single swept parameter.
//!
//! One scenario, every value of the parameter, every seed. Per seed the
//! values are ranked by terminal N (1 = most operators, ties averaged).
//! For each value the modal rank across seeds is taken and the agreement
//! is the fraction of seeds that put the value at that rank.
//!
//! RULE: The ordering is called structural only if every value's
//! agreement reaches `STRUCTURAL_AGREEMENT`; one unstable value makes the
//! whole ordering path-dependent.

use super::sweep::SweepParam;
use crate::{
    config::SimConfig,
    emission_subsystem::PolicyKind,
    error::SimResult,
    plan::{RunPlan, RunSpec},
    scenario::ScenarioConfig,
    stats,
    table::CsvRow,
};
use serde::Serialize;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

pub const STRUCTURAL_AGREEMENT: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct ConsistencyRun {
    pub param:        SweepParam,
    pub value:        f64,
    pub seed:         u64,
    pub final_active: u64,
}

impl CsvRow for ConsistencyRun {
    const HEADER: &'static [&'static str] = &["param", "value", "seed", "final_N"];

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "{},{},{},{}", self.param.name(), self.value, self.seed, self.final_active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Structural,
    PathDependent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueConsistency {
    pub value:             f64,
    pub modal_rank:        Option<f64>,
    pub agreement:         f64,
    pub mean_final_active: f64,
    pub std_final_active:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub scenario:      String,
    pub param:         String,
    pub seeds:         usize,
    pub threshold:     f64,
    pub values:        Vec<ValueConsistency>,
    pub min_agreement: f64,
    pub verdict:       Verdict,
}

/// Value-major: every seed for the first value, then the next value.
pub fn plan(
    config: &SimConfig,
    param: SweepParam,
    values: &[f64],
    scenario: &(usize, ScenarioConfig),
    seeds: &[u64],
) -> RunPlan {
    let (idx, scenario) = scenario;
    let mut plan = RunPlan::new("consistency");
    for &value in values {
        for &seed in seeds {
            plan.push(
                RunSpec::new(*idx, scenario.clone(), PolicyKind::Pid, seed)
                    .with_overrides(param.overrides(value, config)),
            );
        }
    }
    plan
}

pub fn run(
    config: &SimConfig,
    param: SweepParam,
    values: &[f64],
    scenario: &(usize, ScenarioConfig),
    seeds: &[u64],
) -> SimResult<(Vec<ConsistencyRun>, ConsistencyReport)> {
    let finals = plan(config, param, values, scenario, seeds)
        .execute(config, |_, out| Ok(out.last().map_or(0, |r| r.active)))?;

    let runs: Vec<ConsistencyRun> = values
        .iter()
        .flat_map(|&value| seeds.iter().map(move |&seed| (value, seed)))
        .zip(finals)
        .map(|((value, seed), final_active)| ConsistencyRun { param, value, seed, final_active })
        .collect();

    let report = analyze(&scenario.1.name, param, values, seeds, &runs);
    log::info!(
        "{} ordering in {}: {:?} (min agreement {:.2})",
        param.name(),
        report.scenario,
        report.verdict,
        report.min_agreement
    );
    Ok((runs, report))
}

/// Rank analysis over a complete value × seed table. Seeds missing any
/// value are left out of the ranking.
pub fn analyze(
    scenario: &str,
    param: SweepParam,
    values: &[f64],
    seeds: &[u64],
    runs: &[ConsistencyRun],
) -> ConsistencyReport {
    let lookup = |value: f64, seed: u64| {
        runs.iter()
            .find(|r| r.value == value && r.seed == seed)
            .map(|r| r.final_active as f64)
    };

    // ranks[s][v]: rank of value v under seed s.
    let ranks: Vec<Vec<f64>> = seeds
        .iter()
        .filter_map(|&seed| {
            let row: Option<Vec<f64>> = values.iter().map(|&v| lookup(v, seed)).collect();
            row.map(|finals| stats::rank_descending(&finals))
        })
        .collect();

    let per_value: Vec<ValueConsistency> = values
        .iter()
        .enumerate()
        .map(|(vi, &value)| {
            let column: Vec<f64> = ranks.iter().map(|r| r[vi]).collect();
            let modal_rank = stats::mode(&column);
            let agreement = match modal_rank {
                Some(m) => column.iter().filter(|&&r| r == m).count() as f64 / column.len() as f64,
                None => 0.0,
            };
            let finals: Vec<f64> = seeds.iter().filter_map(|&s| lookup(value, s)).collect();
            ValueConsistency {
                value,
                modal_rank,
                agreement,
                mean_final_active: stats::mean(&finals),
                std_final_active:  stats::std_dev(&finals),
            }
        })
        .collect();

    let min_agreement = per_value.iter().map(|v| v.agreement).fold(f64::INFINITY, f64::min);
    let min_agreement = if per_value.is_empty() { 0.0 } else { min_agreement };
    let verdict = if !per_value.is_empty() && min_agreement >= STRUCTURAL_AGREEMENT {
        Verdict::Structural
    } else {
        Verdict::PathDependent
    };

    ConsistencyReport {
        scenario: scenario.to_string(),
        param: param.name().to_string(),
        seeds: ranks.len(),
        threshold: STRUCTURAL_AGREEMENT,
        values: per_value,
        min_agreement,
        verdict,
    }
}

pub fn write_report(path: impl AsRef<Path>, report: &ConsistencyReport) -> SimResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    log::info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(f64, u64, u64)]) -> Vec<ConsistencyRun> {
        rows.iter()
            .map(|&(value, seed, n)| ConsistencyRun { param: SweepParam::Ki, value, seed, final_active: n })
            .collect()
    }

    #[test]
    fn identical_ordering_is_structural() {
        let runs = table(&[
            (0.1, 1, 9_000), (0.2, 1, 8_000), (0.3, 1, 7_000),
            (0.1, 2, 9_500), (0.2, 2, 8_500), (0.3, 2, 7_500),
        ]);
        let report = analyze("bear", SweepParam::Ki, &[0.1, 0.2, 0.3], &[1, 2], &runs);
        assert_eq!(report.verdict, Verdict::Structural);
        assert_eq!(report.min_agreement, 1.0);
        assert_eq!(report.values[0].modal_rank, Some(1.0));
        assert_eq!(report.values[2].modal_rank, Some(3.0));
    }

    #[test]
    fn reshuffled_ordering_is_path_dependent() {
        // Seeds 1 and 2 agree, seeds 3 and 4 swap the top two values.
        let runs = table(&[
            (0.1, 1, 9_000), (0.2, 1, 8_000),
            (0.1, 2, 9_000), (0.2, 2, 8_000),
            (0.1, 3, 8_000), (0.2, 3, 9_000),
            (0.1, 4, 8_000), (0.2, 4, 9_000),
        ]);
        let report = analyze("bear", SweepParam::Ki, &[0.1, 0.2], &[1, 2, 3, 4], &runs);
        assert_eq!(report.values[0].agreement, 0.5);
        assert_eq!(report.verdict, Verdict::PathDependent);
    }

    #[test]
    fn agreement_at_threshold_counts_as_structural() {
        // 3 of 5 seeds agree on every value: exactly 0.6.
        let mut rows = Vec::new();
        for seed in 1..=5u64 {
            let flipped = seed > 3;
            rows.push((0.1, seed, if flipped { 8_000 } else { 9_000 }));
            rows.push((0.2, seed, if flipped { 9_000 } else { 8_000 }));
        }
        let report = analyze("bear", SweepParam::Ki, &[0.1, 0.2], &[1, 2, 3, 4, 5], &table(&rows));
        assert!((report.min_agreement - 0.6).abs() < 1e-12);
        assert_eq!(report.verdict, Verdict::Structural);
    }

    #[test]
    fn ties_share_averaged_rank() {
        let runs = table(&[(0.1, 1, 9_000), (0.2, 1, 9_000), (0.3, 1, 5_000)]);
        let report = analyze("bear", SweepParam::Ki, &[0.1, 0.2, 0.3], &[1], &runs);
        assert_eq!(report.values[0].modal_rank, Some(1.5));
        assert_eq!(report.values[1].modal_rank, Some(1.5));
    }

    #[test]
    fn incomplete_seeds_are_skipped() {
        let runs = table(&[(0.1, 1, 9_000), (0.2, 1, 8_000), (0.1, 2, 9_000)]);
        let report = analyze("bear", SweepParam::Ki, &[0.1, 0.2], &[1, 2], &runs);
        assert_eq!(report.seeds, 1);
    }
}
