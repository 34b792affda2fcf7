//! Parameter sweeps. PID only, one seed per scenario (`base + index`).
//!
//!   - gains:       Kp, Ki, Kd each swept alone, the others at defaults
//!   - slashing:    downtime and fraud penalties each swept alone
//!   - interaction: full Ki × Kd grid at default Kp
//!   - cadence:     controller evaluation interval

use super::{rounded_emissions, scenario_seed, shock_response_days, Trajectory};
use crate::{
    config::{PidGains, RunOverrides, SimConfig},
    emission_subsystem::PolicyKind,
    error::SimResult,
    plan::{RunPlan, RunSpec},
    scenario::ScenarioConfig,
    table::{opt, CsvRow},
    types::Day,
};
use std::io::{self, Write};

pub const KP_GRID: [f64; 5] = [0.3, 0.5, 0.8, 1.2, 1.6];
pub const KI_GRID: [f64; 5] = [0.05, 0.10, 0.15, 0.25, 0.35];
pub const KD_GRID: [f64; 5] = [0.05, 0.10, 0.20, 0.35, 0.50];
pub const SLASH_DOWNTIME_GRID: [f64; 5] = [0.02, 0.05, 0.10, 0.20, 0.30];
pub const SLASH_FRAUD_GRID: [f64; 5] = [0.20, 0.40, 0.60, 0.80, 1.00];
pub const CADENCE_GRID: [Day; 4] = [7, 14, 21, 30];

/// A single swept parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepParam {
    Kp,
    Ki,
    Kd,
    SlashDowntime,
    SlashFraud,
    Cadence,
}

impl SweepParam {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kp => "Kp",
            Self::Ki => "Ki",
            Self::Kd => "Kd",
            Self::SlashDowntime => "slash_downtime",
            Self::SlashFraud => "slash_fraud",
            Self::Cadence => "cadence_days",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "kp" => Some(Self::Kp),
            "ki" => Some(Self::Ki),
            "kd" => Some(Self::Kd),
            "slash_downtime" => Some(Self::SlashDowntime),
            "slash_fraud" => Some(Self::SlashFraud),
            "cadence" | "cadence_days" => Some(Self::Cadence),
            _ => None,
        }
    }

    pub fn default_grid(&self) -> Vec<f64> {
        match self {
            Self::Kp => KP_GRID.to_vec(),
            Self::Ki => KI_GRID.to_vec(),
            Self::Kd => KD_GRID.to_vec(),
            Self::SlashDowntime => SLASH_DOWNTIME_GRID.to_vec(),
            Self::SlashFraud => SLASH_FRAUD_GRID.to_vec(),
            Self::Cadence => CADENCE_GRID.iter().map(|&c| c as f64).collect(),
        }
    }

    /// Overrides that set this parameter to `value` and pin the other
    /// parameters of its family to the base configuration.
    pub fn overrides(&self, value: f64, base: &SimConfig) -> RunOverrides {
        let gains = base.emission.gains;
        let lc = &base.lifecycle;
        match self {
            Self::Kp => RunOverrides::gains(PidGains { kp: value, ..gains }),
            Self::Ki => RunOverrides::gains(PidGains { ki: value, ..gains }),
            Self::Kd => RunOverrides::gains(PidGains { kd: value, ..gains }),
            Self::SlashDowntime => RunOverrides {
                slash_downtime: Some(value),
                slash_fraud: Some(lc.slash_fraud),
                ..RunOverrides::default()
            },
            Self::SlashFraud => RunOverrides {
                slash_downtime: Some(lc.slash_downtime),
                slash_fraud: Some(value),
                ..RunOverrides::default()
            },
            Self::Cadence => RunOverrides {
                cadence_days: Some(value.round() as Day),
                ..RunOverrides::default()
            },
        }
    }
}

/// PID runs for each (value, scenario) pair, value-major.
fn one_dimensional_plan(
    name: &'static str,
    param: SweepParam,
    values: &[f64],
    scenarios: &[(usize, ScenarioConfig)],
    config: &SimConfig,
    base_seed: u64,
) -> (RunPlan, Vec<(SweepParam, f64)>) {
    let mut plan = RunPlan::new(name);
    let mut keys = Vec::new();
    for &value in values {
        for (idx, scenario) in scenarios {
            plan.push(
                RunSpec::new(*idx, scenario.clone(), PolicyKind::Pid, scenario_seed(base_seed, *idx))
                    .with_overrides(param.overrides(value, config)),
            );
            keys.push((param, value));
        }
    }
    (plan, keys)
}

// ── Gain sensitivity ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct GainSweepRow {
    pub param:          SweepParam,
    pub value:          f64,
    pub gains:          PidGains,
    pub scenario:       String,
    pub final_active:   u64,
    pub deviation:      f64,
    pub mad:            f64,
    pub max_active:     u64,
    pub min_active:     u64,
    pub final_price:    f64,
    pub emission_range: f64,
}

impl CsvRow for GainSweepRow {
    const HEADER: &'static [&'static str] = &[
        "sweep_param", "param_value", "Kp", "Ki", "Kd", "scenario", "final_N",
        "dev_from_target", "mad", "max_N", "min_N", "final_P", "E_range",
    ];

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{:.4},{:.1},{},{},{:.6},{:.0}",
            self.param.name(),
            self.value,
            self.gains.kp,
            self.gains.ki,
            self.gains.kd,
            self.scenario,
            self.final_active,
            self.deviation,
            self.mad,
            self.max_active,
            self.min_active,
            self.final_price,
            self.emission_range,
        )
    }
}

pub fn run_gains(
    config: &SimConfig,
    scenarios: &[(usize, ScenarioConfig)],
    base_seed: u64,
) -> SimResult<Vec<GainSweepRow>> {
    let mut rows = Vec::new();
    for param in [SweepParam::Kp, SweepParam::Ki, SweepParam::Kd] {
        log::info!("sweeping {}", param.name());
        let (plan, keys) =
            one_dimensional_plan("sensitivity", param, &param.default_grid(), scenarios, config, base_seed);
        let results = plan.execute(config, |spec, out| {
            let effective = spec.overrides.apply(config);
            Ok((
                spec.scenario.name.clone(),
                effective.emission.gains,
                Trajectory::from_records(&out.records, config),
            ))
        })?;
        for ((param, value), (scenario, gains, t)) in keys.into_iter().zip(results) {
            rows.push(GainSweepRow {
                param,
                value,
                gains,
                scenario,
                final_active:   t.final_active,
                deviation:      t.deviation,
                mad:            t.mad,
                max_active:     t.max_active,
                min_active:     t.min_active,
                final_price:    t.final_price,
                emission_range: t.emission_range,
            });
        }
    }
    Ok(rows)
}

// ── Slashing sensitivity ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SlashingSweepRow {
    pub param:          SweepParam,
    pub value:          f64,
    pub scenario:       String,
    pub final_active:   u64,
    pub deviation:      f64,
    pub mad:            f64,
    pub final_circulating: f64,
    pub circulating_change_pct: f64,
    pub final_treasury: f64,
    pub slashed_total:  u64,
    pub final_price:    f64,
}

impl CsvRow for SlashingSweepRow {
    const HEADER: &'static [&'static str] = &[
        "sweep_param", "param_value", "scenario", "final_N", "dev_from_target", "mad",
        "final_C", "C_change_pct", "final_T", "slashed_total", "final_P",
    ];

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{},{},{},{},{:.4},{:.0},{:.0},{:.1},{:.0},{},{:.6}",
            self.param.name(),
            self.value,
            self.scenario,
            self.final_active,
            self.deviation,
            self.mad,
            self.final_circulating,
            self.circulating_change_pct,
            self.final_treasury,
            self.slashed_total,
            self.final_price,
        )
    }
}

pub fn run_slashing(
    config: &SimConfig,
    scenarios: &[(usize, ScenarioConfig)],
    base_seed: u64,
) -> SimResult<Vec<SlashingSweepRow>> {
    let mut rows = Vec::new();
    for param in [SweepParam::SlashDowntime, SweepParam::SlashFraud] {
        log::info!("sweeping {}", param.name());
        let (plan, keys) =
            one_dimensional_plan("slashing", param, &param.default_grid(), scenarios, config, base_seed);
        let results = plan.execute(config, |spec, out| {
            Ok((spec.scenario.name.clone(), Trajectory::from_records(&out.records, config)))
        })?;
        for ((param, value), (scenario, t)) in keys.into_iter().zip(results) {
            rows.push(SlashingSweepRow {
                param,
                value,
                scenario,
                final_active:           t.final_active,
                deviation:              t.deviation,
                mad:                    t.mad,
                final_circulating:      t.final_circulating,
                circulating_change_pct: t.circulating_change_pct(),
                final_treasury:         t.final_treasury,
                slashed_total:          t.slashed_total,
                final_price:            t.final_price,
            });
        }
    }
    Ok(rows)
}

// ── Ki × Kd interaction ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRow {
    pub ki:             f64,
    pub kd:             f64,
    pub kp:             f64,
    pub scenario:       String,
    pub final_active:   u64,
    pub deviation:      f64,
    pub total_emission: f64,
    pub slashed_total:  u64,
    pub final_circulating: f64,
    pub final_price:    f64,
    pub floor_days:     usize,
    pub ceiling_days:   usize,
}

impl CsvRow for InteractionRow {
    const HEADER: &'static [&'static str] = &[
        "Ki", "Kd", "Kp", "scenario", "final_N", "dev_from_target", "total_emission",
        "total_slashed", "final_C", "final_P", "at_floor_steps", "at_ceiling_steps",
    ];

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{},{},{},{},{},{:.4},{:.0},{},{:.0},{:.6},{},{}",
            self.ki,
            self.kd,
            self.kp,
            self.scenario,
            self.final_active,
            self.deviation,
            self.total_emission,
            self.slashed_total,
            self.final_circulating,
            self.final_price,
            self.floor_days,
            self.ceiling_days,
        )
    }
}

pub fn interaction_plan(
    config: &SimConfig,
    scenarios: &[(usize, ScenarioConfig)],
    ki_values: &[f64],
    kd_values: &[f64],
    base_seed: u64,
) -> RunPlan {
    let mut plan = RunPlan::new("interaction");
    for &ki in ki_values {
        for &kd in kd_values {
            let gains = PidGains { ki, kd, ..config.emission.gains };
            for (idx, scenario) in scenarios {
                plan.push(
                    RunSpec::new(*idx, scenario.clone(), PolicyKind::Pid, scenario_seed(base_seed, *idx))
                        .with_overrides(RunOverrides::gains(gains)),
                );
            }
        }
    }
    plan
}

pub fn run_interaction(
    config: &SimConfig,
    scenarios: &[(usize, ScenarioConfig)],
    base_seed: u64,
) -> SimResult<Vec<InteractionRow>> {
    interaction_plan(config, scenarios, &KI_GRID, &KD_GRID, base_seed).execute(config, |spec, out| {
        let gains = spec.overrides.apply(config).emission.gains;
        let t = Trajectory::from_records(&out.records, config);
        Ok(InteractionRow {
            ki:                gains.ki,
            kd:                gains.kd,
            kp:                gains.kp,
            scenario:          spec.scenario.name.clone(),
            final_active:      t.final_active,
            deviation:         t.deviation,
            total_emission:    t.total_emission,
            slashed_total:     t.slashed_total,
            final_circulating: t.final_circulating,
            final_price:       t.final_price,
            floor_days:        t.floor_days,
            ceiling_days:      t.ceiling_days,
        })
    })
}

/// For one scenario, whether deviation is non-decreasing in Ki at each Kd.
pub fn ki_ordering_by_kd(rows: &[InteractionRow], scenario: &str) -> Vec<(f64, bool)> {
    let mut kds: Vec<f64> = rows.iter().filter(|r| r.scenario == scenario).map(|r| r.kd).collect();
    kds.sort_by(|a, b| a.total_cmp(b));
    kds.dedup();
    kds.into_iter()
        .map(|kd| {
            let mut sub: Vec<&InteractionRow> = rows
                .iter()
                .filter(|r| r.scenario == scenario && r.kd == kd)
                .collect();
            sub.sort_by(|a, b| a.ki.total_cmp(&b.ki));
            let monotonic = sub.windows(2).all(|w| w[0].deviation <= w[1].deviation);
            (kd, monotonic)
        })
        .collect()
}

// ── Cadence ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CadenceRow {
    pub cadence_days:   Day,
    pub scenario:       String,
    pub final_active:   u64,
    pub deviation:      f64,
    pub adjustments:    usize,
    pub floor_days:     usize,
    pub ceiling_days:   usize,
    pub total_emission: f64,
    pub emission_std:   f64,
    pub response_days:  Option<Day>,
    pub final_price:    f64,
}

impl CsvRow for CadenceRow {
    const HEADER: &'static [&'static str] = &[
        "cadence_days", "scenario", "final_N", "dev_from_target", "n_adjustments",
        "at_floor_steps", "at_ceiling_steps", "total_emission", "emission_volatility",
        "response_time_days", "final_P",
    ];

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{},{},{},{:.4},{},{},{},{:.0},{:.1},{},{:.6}",
            self.cadence_days,
            self.scenario,
            self.final_active,
            self.deviation,
            self.adjustments,
            self.floor_days,
            self.ceiling_days,
            self.total_emission,
            self.emission_std,
            opt(self.response_days),
            self.final_price,
        )
    }
}

pub fn run_cadence(
    config: &SimConfig,
    scenarios: &[(usize, ScenarioConfig)],
    base_seed: u64,
) -> SimResult<Vec<CadenceRow>> {
    let param = SweepParam::Cadence;
    let (plan, _) = one_dimensional_plan("cadence", param, &param.default_grid(), scenarios, config, base_seed);
    plan.execute(config, |spec, out| {
        let t = Trajectory::from_records(&out.records, config);
        let response_days = spec
            .scenario
            .shock
            .onset_day()
            .and_then(|onset| shock_response_days(&rounded_emissions(&out.records), onset));
        Ok(CadenceRow {
            cadence_days:   spec.overrides.cadence_days.unwrap_or(config.emission.cadence_days),
            scenario:       spec.scenario.name.clone(),
            final_active:   t.final_active,
            deviation:      t.deviation,
            adjustments:    t.adjustments,
            floor_days:     t.floor_days,
            ceiling_days:   t.ceiling_days,
            total_emission: t.total_emission,
            emission_std:   t.emission_std,
            response_days,
            final_price:    t.final_price,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_overrides_pin_the_other_gains() {
        let config = SimConfig::default();
        let o = SweepParam::Ki.overrides(0.35, &config);
        assert_eq!((o.kp, o.ki, o.kd), (Some(0.8), Some(0.35), Some(0.2)));
        assert_eq!(o.slash_downtime, None);
    }

    #[test]
    fn slashing_overrides_pin_the_other_penalty() {
        let config = SimConfig::default();
        let o = SweepParam::SlashFraud.overrides(0.4, &config);
        assert_eq!((o.slash_downtime, o.slash_fraud), (Some(0.10), Some(0.4)));
    }

    #[test]
    fn interaction_plan_covers_full_grid() {
        let config = SimConfig::default();
        let scenarios = crate::scenario::select(&[]).unwrap();
        let plan = interaction_plan(&config, &scenarios, &KI_GRID, &KD_GRID, 42);
        assert_eq!(plan.len(), 5 * 5 * 4);
        // Seed depends only on the scenario's catalog index.
        assert!(plan.runs.iter().all(|r| r.seed == 42 + r.scenario_index as u64));
    }

    #[test]
    fn param_names_round_trip() {
        for p in [
            SweepParam::Kp,
            SweepParam::Ki,
            SweepParam::Kd,
            SweepParam::SlashDowntime,
            SweepParam::SlashFraud,
            SweepParam::Cadence,
        ] {
            assert_eq!(SweepParam::from_name(p.name()), Some(p));
        }
    }
}
