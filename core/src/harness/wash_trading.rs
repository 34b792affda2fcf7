//! Wash-trading Monte Carlo: mercenary operators submit false coverage
//! claims, with and without proof-of-coverage challenges.
//!
//! Standalone from the daily pipeline: a fixed population shares a flat
//! daily emission for one year. Per day, in id order, every active
//! operator claims its share. A mercenary lies with its own fraud
//! probability; with detection on, a lie is caught at the catch rate and
//! slashed, otherwise it is paid like an honest claim. Stakes are whole
//! tokens, so a repeatedly caught operator is eventually slashed to zero
//! and deactivated.

use crate::{
    config::BASE_EMISSION,
    operator::{Archetype, OperatorTable},
    rng::{RngBank, SubsystemSlot},
    stats,
    table::CsvRow,
    types::Day,
};
use rayon::prelude::*;
use std::io::{self, Write};

pub const WASH_TRADING_RUNS: usize = 100;
pub const WASH_TRADING_BASE_SEED: u64 = 5_000;

#[derive(Debug, Clone, PartialEq)]
pub struct WashTradingConfig {
    pub nodes:              usize,
    pub days:               Day,
    pub daily_emission:     f64,
    pub mercenary_fraction: f64,
    /// Per-mercenary fraud probability is uniform in this range.
    pub fraud_prob:         (f64, f64),
    pub catch_rate:         f64,
    pub slash_fraction:     f64,
    pub initial_stake:      u64,
}

impl Default for WashTradingConfig {
    fn default() -> Self {
        Self {
            nodes:              1_000,
            days:               365,
            daily_emission:     BASE_EMISSION,
            mercenary_fraction: 0.15,
            fraud_prob:         (0.1, 0.3),
            catch_rate:         0.97,
            slash_fraction:     0.50,
            initial_stake:      20_000,
        }
    }
}

/// Outcome of one seed under one detection setting.
#[derive(Debug, Clone, PartialEq)]
pub struct WashTradingRow {
    pub detection:               bool,
    pub seed:                    u64,
    /// Uncaught fraudulent emission as a share of all paid emission, in percent.
    pub fraud_rate_pct:          f64,
    pub total_slashed:           u64,
    /// Honest earnings against an equal share of the year's emission, in percent.
    pub honest_yield_impact_pct: f64,
    pub surviving_mercenaries:   usize,
    pub surviving_honest:        usize,
    pub active_final:            usize,
}

impl CsvRow for WashTradingRow {
    const HEADER: &'static [&'static str] = &[
        "poc", "seed", "fraud_rate_pct", "total_slashed", "honest_yield_impact_pct",
        "surviving_mercs", "surviving_honest", "total_active_final",
    ];

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{},{},{:.4},{},{:.2},{},{},{}",
            self.detection,
            self.seed,
            self.fraud_rate_pct,
            self.total_slashed,
            self.honest_yield_impact_pct,
            self.surviving_mercenaries,
            self.surviving_honest,
            self.active_final,
        )
    }
}

/// Simulate one year for `seed`. The population layout and fraud
/// probabilities depend on the seed only, so both detection settings of
/// a seed face the same operators.
pub fn simulate(cfg: &WashTradingConfig, seed: u64, detection: bool) -> WashTradingRow {
    let mut rng = RngBank::new(seed).for_subsystem(SubsystemSlot::WashTrading);

    let mercenaries = (cfg.nodes as f64 * cfg.mercenary_fraction) as usize;
    let honest = cfg.nodes - mercenaries.min(cfg.nodes);
    let mut layout = vec![Archetype::Mercenary; mercenaries.min(cfg.nodes)];
    layout.resize(cfg.nodes, Archetype::Casual);
    rng.shuffle(&mut layout);

    let mut ops = OperatorTable::uniform(&layout, cfg.initial_stake);
    let (lo, hi) = cfg.fraud_prob;
    for (id, archetype) in layout.iter().enumerate() {
        ops.fraud_prob[id] = if *archetype == Archetype::Mercenary {
            rng.uniform(lo, hi)
        } else {
            0.0
        };
    }

    let mut paid = 0.0;
    let mut fraud_paid = 0.0;
    let mut honest_earnings = 0.0;
    let mut slashed = 0u64;

    for _ in 0..cfg.days {
        let active = ops.active_count();
        if active == 0 {
            break;
        }
        let share = cfg.daily_emission / active as f64;
        let ids: Vec<usize> = ops.active_ids().collect();
        for id in ids {
            let mercenary = layout[id] == Archetype::Mercenary;
            if mercenary && rng.chance(ops.fraud_prob[id]) {
                if detection && rng.chance(cfg.catch_rate) {
                    slashed += ops.slash(id, cfg.slash_fraction);
                    if ops.operator(id).is_some_and(|o| o.stake == 0) {
                        ops.deactivate(id);
                    }
                } else {
                    fraud_paid += share;
                    paid += share;
                }
            } else {
                paid += share;
                if !mercenary {
                    honest_earnings += share;
                }
            }
        }
    }

    let surviving = |kind: bool| {
        ops.active_ids()
            .filter(|&id| (layout[id] == Archetype::Mercenary) == kind)
            .count()
    };
    let expected_honest = cfg.daily_emission * cfg.days as f64 * honest as f64 / cfg.nodes.max(1) as f64;
    WashTradingRow {
        detection,
        seed,
        fraud_rate_pct:          fraud_paid / paid.max(1.0) * 100.0,
        total_slashed:           slashed,
        honest_yield_impact_pct: (honest_earnings - expected_honest) / expected_honest.max(1.0) * 100.0,
        surviving_mercenaries:   surviving(true),
        surviving_honest:        surviving(false),
        active_final:            ops.active_count(),
    }
}

/// Every seed with detection on, then every seed with detection off.
pub fn run(cfg: &WashTradingConfig, seeds: &[u64]) -> Vec<WashTradingRow> {
    let mut rows = Vec::with_capacity(seeds.len() * 2);
    for detection in [true, false] {
        let batch: Vec<WashTradingRow> = seeds
            .par_iter()
            .map(|&seed| simulate(cfg, seed, detection))
            .collect();
        log::info!(
            "wash trading: {} seeds with detection {}",
            batch.len(),
            if detection { "on" } else { "off" }
        );
        rows.extend(batch);
    }
    rows
}

/// Distribution of outcomes for one detection setting.
#[derive(Debug, Clone, PartialEq)]
pub struct WashTradingSummary {
    pub detection:             bool,
    pub runs:                  usize,
    pub fraud_median:          f64,
    pub fraud_mean:            f64,
    pub fraud_p25:             f64,
    pub fraud_p75:             f64,
    pub fraud_min:             f64,
    pub fraud_max:             f64,
    pub slashed_mean:          f64,
    pub yield_impact_mean:     f64,
    pub surviving_mercs_mean:  f64,
}

pub fn summarize(rows: &[WashTradingRow]) -> Vec<WashTradingSummary> {
    [true, false]
        .into_iter()
        .filter_map(|detection| {
            let sub: Vec<&WashTradingRow> = rows.iter().filter(|r| r.detection == detection).collect();
            if sub.is_empty() {
                return None;
            }
            let fraud: Vec<f64> = sub.iter().map(|r| r.fraud_rate_pct).collect();
            let column = |f: fn(&WashTradingRow) -> f64| stats::mean(&sub.iter().map(|r| f(r)).collect::<Vec<_>>());
            Some(WashTradingSummary {
                detection,
                runs:                 sub.len(),
                fraud_median:         stats::quantile(&fraud, 0.5),
                fraud_mean:           stats::mean(&fraud),
                fraud_p25:            stats::quantile(&fraud, 0.25),
                fraud_p75:            stats::quantile(&fraud, 0.75),
                fraud_min:            stats::quantile(&fraud, 0.0),
                fraud_max:            stats::quantile(&fraud, 1.0),
                slashed_mean:         column(|r| r.total_slashed as f64),
                yield_impact_mean:    column(|r| r.honest_yield_impact_pct),
                surviving_mercs_mean: column(|r| r.surviving_mercenaries as f64),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> WashTradingConfig {
        WashTradingConfig { nodes: 200, days: 60, ..WashTradingConfig::default() }
    }

    #[test]
    fn without_detection_nothing_is_slashed() {
        let row = simulate(&small(), 5_000, false);
        assert_eq!(row.total_slashed, 0);
        assert_eq!(row.active_final, 200);
        assert_eq!(row.surviving_mercenaries, 30);
        assert!(row.fraud_rate_pct > 0.0);
        assert!(row.honest_yield_impact_pct.abs() < 1e-6);
    }

    #[test]
    fn perfect_detection_pays_no_fraud() {
        let cfg = WashTradingConfig { catch_rate: 1.0, ..small() };
        let row = simulate(&cfg, 5_001, true);
        assert_eq!(row.fraud_rate_pct, 0.0);
        assert!(row.total_slashed > 0);
        assert_eq!(row.surviving_honest, 170);
    }

    #[test]
    fn repeat_offenders_are_slashed_out() {
        let cfg = WashTradingConfig { catch_rate: 1.0, slash_fraction: 1.0, days: 250, ..small() };
        let row = simulate(&cfg, 5_002, true);
        assert_eq!(row.surviving_mercenaries, 0);
        assert_eq!(row.active_final, 170);
        assert_eq!(row.total_slashed, 30 * 20_000);
    }

    #[test]
    fn summary_splits_by_detection() {
        let rows = run(&small(), &[1, 2, 3]);
        assert_eq!(rows.len(), 6);
        assert!(rows[..3].iter().all(|r| r.detection));
        let summary = summarize(&rows);
        assert_eq!(summary.len(), 2);
        assert!(summary[0].detection && !summary[1].detection);
        assert!(summary[0].fraud_mean < summary[1].fraud_mean);
        assert!(summary[0].fraud_min <= summary[0].fraud_median && summary[0].fraud_median <= summary[0].fraud_max);
    }
}
