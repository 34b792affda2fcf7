//! Controller bound saturation across a seed ensemble.
//!
//! Runs one scenario under PID for every seed and reports how close the
//! emission rate gets to its floor and ceiling. A day counts as a hit when
//! the rounded rate is within one token of the bound.

use super::{count_ceiling_days, count_floor_days, ensemble::EnsembleRow, rounded_emissions};
use crate::{
    config::SimConfig,
    emission_subsystem::PolicyKind,
    error::SimResult,
    plan::{RunPlan, RunSpec},
    scenario::ScenarioConfig,
    stats,
    types::{Day, DAYS_PER_YEAR},
};
use serde::Serialize;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundWindow {
    pub mean_emission: f64,
    pub min_emission:  f64,
    pub max_emission:  f64,
    pub floor_days:    usize,
    pub ceiling_days:  usize,
    pub days:          usize,
}

impl BoundWindow {
    fn over(emissions: &[f64], config: &SimConfig) -> Self {
        Self {
            mean_emission: stats::mean(emissions),
            min_emission:  emissions.iter().copied().fold(f64::INFINITY, f64::min),
            max_emission:  emissions.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            floor_days:    count_floor_days(emissions, config),
            ceiling_days:  count_ceiling_days(emissions, config),
            days:          emissions.len(),
        }
    }

    pub fn pct_at_floor(&self) -> f64 {
        self.floor_days as f64 / self.days.max(1) as f64 * 100.0
    }

    pub fn pct_at_ceiling(&self) -> f64 {
        self.ceiling_days as f64 / self.days.max(1) as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedSaturation {
    pub seed:              u64,
    pub min_emission:      f64,
    pub max_emission:      f64,
    /// Extremes as multiples of the base rate.
    pub min_multiple:      f64,
    pub max_multiple:      f64,
    pub floor_hits:        usize,
    pub ceiling_hits:      usize,
    pub first_floor_hit:   Option<Day>,
    pub first_ceiling_hit: Option<Day>,
    pub final_active:      u64,
    pub final_price:       f64,
    pub total_emission:    f64,
    pub yearly:            Vec<BoundWindow>,
    pub pre_shock:         Option<BoundWindow>,
    pub post_shock:        Option<BoundWindow>,
}

impl SeedSaturation {
    pub fn from_emissions(
        seed: u64,
        emissions: &[f64],
        final_active: u64,
        final_price: f64,
        shock_day: Option<Day>,
        config: &SimConfig,
    ) -> Self {
        let floor = config.emission.floor + 1.0;
        let ceiling = config.emission.ceiling - 1.0;
        let base = config.emission.base_emission;
        let whole = BoundWindow::over(emissions, config);

        let shock = shock_day
            .map(|d| d as usize)
            .filter(|&d| d > 0 && d < emissions.len());

        Self {
            seed,
            min_emission:      whole.min_emission,
            max_emission:      whole.max_emission,
            min_multiple:      whole.min_emission / base,
            max_multiple:      whole.max_emission / base,
            floor_hits:        whole.floor_days,
            ceiling_hits:      whole.ceiling_days,
            first_floor_hit:   emissions.iter().position(|&e| e <= floor).map(|t| t as Day),
            first_ceiling_hit: emissions.iter().position(|&e| e >= ceiling).map(|t| t as Day),
            final_active,
            final_price,
            total_emission:    emissions.iter().sum(),
            yearly:            emissions
                .chunks(DAYS_PER_YEAR as usize)
                .map(|year| BoundWindow::over(year, config))
                .collect(),
            pre_shock:         shock.map(|d| BoundWindow::over(&emissions[..d], config)),
            post_shock:        shock.map(|d| BoundWindow::over(&emissions[d..], config)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationVerdict {
    /// No seed ever reaches either bound.
    Unsaturated,
    /// At most two seeds touch the floor; the ceiling is never reached.
    RareFloor,
    FloorOnly,
    CeilingOnly,
    BothBounds,
}

impl SaturationVerdict {
    fn classify(floor_seeds: usize, ceiling_seeds: usize) -> Self {
        match (floor_seeds, ceiling_seeds) {
            (0, 0) => Self::Unsaturated,
            (1..=2, 0) => Self::RareFloor,
            (_, 0) => Self::FloorOnly,
            (0, _) => Self::CeilingOnly,
            _ => Self::BothBounds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearAggregate {
    pub year:                  usize,
    pub mean_emission:         f64,
    pub min_emission:          f64,
    pub max_emission:          f64,
    pub mean_pct_at_floor:     f64,
    pub mean_pct_at_ceiling:   f64,
    pub seeds_with_floor:      usize,
    pub seeds_with_ceiling:    usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseAggregate {
    pub mean_emission:      f64,
    pub total_floor_days:   usize,
    pub total_ceiling_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossCheck {
    pub ensemble_rows: usize,
    pub matching:      usize,
    pub mismatching:   usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaturationReport {
    pub scenario:            String,
    pub floor:               f64,
    pub ceiling:             f64,
    pub base_emission:       f64,
    pub shock_day:           Option<Day>,
    pub verdict:             SaturationVerdict,
    pub seeds:               usize,
    pub seeds_with_floor:    Vec<u64>,
    pub seeds_with_ceiling:  Vec<u64>,
    pub min_emission:        f64,
    pub max_emission:        f64,
    /// Share of the floor..ceiling range the controller actually used.
    pub authority_used_pct:  f64,
    pub per_seed:            Vec<SeedSaturation>,
    pub yearly:              Vec<YearAggregate>,
    pub pre_shock:           Option<PhaseAggregate>,
    pub post_shock:          Option<PhaseAggregate>,
    pub cross_check:         Option<CrossCheck>,
}

impl SaturationReport {
    pub fn aggregate(
        scenario: &str,
        shock_day: Option<Day>,
        per_seed: Vec<SeedSaturation>,
        config: &SimConfig,
    ) -> Self {
        let em = &config.emission;
        let seeds_with_floor: Vec<u64> =
            per_seed.iter().filter(|s| s.floor_hits > 0).map(|s| s.seed).collect();
        let seeds_with_ceiling: Vec<u64> =
            per_seed.iter().filter(|s| s.ceiling_hits > 0).map(|s| s.seed).collect();
        let min_emission = per_seed.iter().map(|s| s.min_emission).fold(f64::INFINITY, f64::min);
        let max_emission = per_seed.iter().map(|s| s.max_emission).fold(f64::NEG_INFINITY, f64::max);
        let authority = (em.ceiling - em.floor).max(1.0);
        let authority_used_pct = if per_seed.is_empty() {
            0.0
        } else {
            (max_emission - min_emission) / authority * 100.0
        };

        let years = per_seed.iter().map(|s| s.yearly.len()).max().unwrap_or(0);
        let yearly = (0..years)
            .map(|y| {
                let windows: Vec<&BoundWindow> = per_seed.iter().filter_map(|s| s.yearly.get(y)).collect();
                YearAggregate {
                    year:                y + 1,
                    mean_emission:       stats::mean(&windows.iter().map(|w| w.mean_emission).collect::<Vec<_>>()),
                    min_emission:        windows.iter().map(|w| w.min_emission).fold(f64::INFINITY, f64::min),
                    max_emission:        windows.iter().map(|w| w.max_emission).fold(f64::NEG_INFINITY, f64::max),
                    mean_pct_at_floor:   stats::mean(&windows.iter().map(|w| w.pct_at_floor()).collect::<Vec<_>>()),
                    mean_pct_at_ceiling: stats::mean(&windows.iter().map(|w| w.pct_at_ceiling()).collect::<Vec<_>>()),
                    seeds_with_floor:    windows.iter().filter(|w| w.floor_days > 0).count(),
                    seeds_with_ceiling:  windows.iter().filter(|w| w.ceiling_days > 0).count(),
                }
            })
            .collect();

        let phase = |pick: fn(&SeedSaturation) -> Option<&BoundWindow>| {
            let windows: Vec<&BoundWindow> = per_seed.iter().filter_map(pick).collect();
            (!windows.is_empty()).then(|| PhaseAggregate {
                mean_emission:      stats::mean(&windows.iter().map(|w| w.mean_emission).collect::<Vec<_>>()),
                total_floor_days:   windows.iter().map(|w| w.floor_days).sum(),
                total_ceiling_days: windows.iter().map(|w| w.ceiling_days).sum(),
            })
        };
        let pre_shock = phase(|s| s.pre_shock.as_ref());
        let post_shock = phase(|s| s.post_shock.as_ref());

        Self {
            scenario: scenario.to_string(),
            floor: em.floor,
            ceiling: em.ceiling,
            base_emission: em.base_emission,
            shock_day,
            verdict: SaturationVerdict::classify(seeds_with_floor.len(), seeds_with_ceiling.len()),
            seeds: per_seed.len(),
            seeds_with_floor,
            seeds_with_ceiling,
            min_emission,
            max_emission,
            authority_used_pct,
            per_seed,
            yearly,
            pre_shock,
            post_shock,
            cross_check: None,
        }
    }

    /// Compare per-seed total emission against an earlier ensemble table.
    /// Totals within 0.1% count as matching.
    pub fn cross_check_against(&mut self, rows: &[EnsembleRow]) {
        let relevant: Vec<&EnsembleRow> = rows
            .iter()
            .filter(|r| r.scenario == self.scenario && r.policy == PolicyKind::Pid)
            .collect();
        if relevant.is_empty() {
            return;
        }
        let (mut matching, mut mismatching) = (0, 0);
        for seed in &self.per_seed {
            let Some(row) = relevant.iter().find(|r| r.seed == seed.seed) else {
                continue;
            };
            let diff = (seed.total_emission.round() - row.total_emission).abs() / row.total_emission.max(1.0);
            if diff < 0.001 {
                matching += 1;
            } else {
                mismatching += 1;
            }
        }
        if mismatching > 0 {
            log::warn!("{mismatching} seeds disagree with the ensemble table");
        }
        self.cross_check = Some(CrossCheck { ensemble_rows: relevant.len(), matching, mismatching });
    }
}

pub fn plan(scenario: &(usize, ScenarioConfig), seeds: &[u64]) -> RunPlan {
    let (idx, scenario) = scenario;
    let mut plan = RunPlan::new("saturation");
    for &seed in seeds {
        plan.push(RunSpec::new(*idx, scenario.clone(), PolicyKind::Pid, seed));
    }
    plan
}

pub fn run(
    config: &SimConfig,
    scenario: &(usize, ScenarioConfig),
    seeds: &[u64],
) -> SimResult<SaturationReport> {
    let shock_day = scenario.1.shock.onset_day();
    let per_seed = plan(scenario, seeds).execute(config, |spec, out| {
        let last = out.last();
        Ok(SeedSaturation::from_emissions(
            spec.seed,
            &rounded_emissions(&out.records),
            last.map_or(0, |r| r.active),
            last.map_or(0.0, |r| r.price),
            shock_day,
            config,
        ))
    })?;
    let report = SaturationReport::aggregate(&scenario.1.name, shock_day, per_seed, config);
    log::info!(
        "{} saturation: {:?}, {} floor seeds, {} ceiling seeds, {:.1}% authority used",
        report.scenario,
        report.verdict,
        report.seeds_with_floor.len(),
        report.seeds_with_ceiling.len(),
        report.authority_used_pct
    );
    Ok(report)
}

pub fn write_report(path: impl AsRef<Path>, report: &SaturationReport) -> SimResult<()> {
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

    fn series(days: usize, value: f64) -> Vec<f64> {
        vec![value; days]
    }

    #[test]
    fn first_hits_and_phases() {
        let config = SimConfig::default();
        let mut e = series(730, 100_000.0);
        for v in e.iter_mut().skip(400).take(10) {
            *v = config.emission.floor;
        }
        let s = SeedSaturation::from_emissions(7, &e, 9_000, 0.1, Some(360), &config);
        assert_eq!(s.floor_hits, 10);
        assert_eq!(s.first_floor_hit, Some(400));
        assert_eq!(s.first_ceiling_hit, None);
        assert_eq!(s.yearly.len(), 2);
        assert_eq!(s.yearly[1].floor_days, 10);
        assert_eq!(s.pre_shock.as_ref().map(|w| w.floor_days), Some(0));
        assert_eq!(s.post_shock.as_ref().map(|w| w.floor_days), Some(10));
    }

    #[test]
    fn verdict_classification() {
        assert_eq!(SaturationVerdict::classify(0, 0), SaturationVerdict::Unsaturated);
        assert_eq!(SaturationVerdict::classify(2, 0), SaturationVerdict::RareFloor);
        assert_eq!(SaturationVerdict::classify(3, 0), SaturationVerdict::FloorOnly);
        assert_eq!(SaturationVerdict::classify(0, 1), SaturationVerdict::CeilingOnly);
        assert_eq!(SaturationVerdict::classify(1, 1), SaturationVerdict::BothBounds);
    }

    #[test]
    fn authority_range_spans_all_seeds() {
        let config = SimConfig::default();
        let em = &config.emission;
        let a = SeedSaturation::from_emissions(1, &series(10, em.floor + 100.0), 1, 1.0, None, &config);
        let b = SeedSaturation::from_emissions(2, &series(10, em.ceiling - 100.0), 1, 1.0, None, &config);
        let report = SaturationReport::aggregate("bear", None, vec![a, b], &config);
        let expected = (em.ceiling - em.floor - 200.0) / (em.ceiling - em.floor) * 100.0;
        assert!((report.authority_used_pct - expected).abs() < 1e-9);
        assert_eq!(report.verdict, SaturationVerdict::Unsaturated);
        assert!(report.pre_shock.is_none());
    }
}
