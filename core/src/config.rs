//! Simulation configuration.
//!
//! RULE: There is no global mutable state. A `SimConfig` is built once
//! at process start (hardcoded defaults, optionally overlaid with a
//! calibration file) and passed by reference into every run and every
//! subsystem. Per-run parameter changes go through `RunOverrides`,
//! which produces a modified clone.

use crate::types::Day;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const TOTAL_SUPPLY: f64 = 1_000_000_000.0;
pub const BASE_EMISSION: f64 = 109_589.0;
pub const EMISSION_FLOOR: f64 = 27_397.0;
pub const EMISSION_CEILING: f64 = 328_767.0;
pub const TARGET_POPULATION: u64 = 10_000;
pub const PID_CADENCE: Day = 14;
pub const TIMESTEPS: Day = 1825;
pub const DEFAULT_SEED: u64 = 42;

// ── PID / emission ─────────────────────────────────────────────────

/// Normalized PID gains: adjustment is expressed as a fraction of base
/// emission per unit of normalized population error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self { kp: 0.8, ki: 0.15, kd: 0.2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionConfig {
    /// Tokens per day at zero error.
    pub base_emission: f64,
    /// Lowest rate the PID controller may output (0.25× base).
    pub floor: f64,
    /// Highest rate the PID controller may output (3.0× base).
    pub ceiling: f64,
    pub gains: PidGains,
    /// Days between controller evaluations.
    pub cadence_days: Day,
    /// Anti-windup bound on the normalized integral accumulator.
    pub integral_limit: f64,
    /// Annual taper of the static schedule.
    pub static_annual_taper: f64,
}

// ── Demand ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandConfig {
    /// Daily fee revenue at full coverage on day 0.
    pub base_revenue: f64,
    /// Coverage ratio below which revenue scales linearly.
    pub enterprise_threshold: f64,
    /// Coverage ratio above which network effects saturate.
    pub saturation_threshold: f64,
    pub enterprise_exponent: f64,
    pub saturation_exponent: f64,
    pub max_coverage_factor: f64,
    /// Std-dev of the multiplicative noise term.
    pub noise_std: f64,
    pub revenue_floor: f64,
    /// Demand contraction: loss per month since onset, and the residual floor.
    pub contraction_per_month: f64,
    pub contraction_floor: f64,
    /// Operator poaching: demand erosion per month since onset, and its cap.
    pub poach_erosion_per_month: f64,
    pub poach_erosion_cap: f64,
}

// ── Burn ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnConfig {
    /// Fraction of fee revenue routed to the burn.
    pub protocol_fee: f64,
    /// Lower bound on price used as a divisor.
    pub price_epsilon: f64,
}

// ── Operator lifecycle ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// USD/day an operator could earn elsewhere.
    pub opportunity_cost: f64,
    pub operating_cost_mean: f64,
    pub operating_cost_std: f64,
    pub uptime_jitter_std: f64,
    pub uptime_min: f64,
    /// Uptime below which downtime slashing applies.
    pub downtime_threshold: f64,
    /// Fraction of stake removed per downtime day.
    pub slash_downtime: f64,
    /// Fraction of stake removed when fraud is caught.
    pub slash_fraud: f64,
    /// Proof-of-coverage detection probability per fraud event.
    pub fraud_detection_rate: f64,
    /// Uncaught fraud gain as a fraction of per-operator emission.
    pub fraud_gain_fraction: f64,
    pub exit_prob_newcomer: f64,
    pub exit_prob_veteran: f64,
    /// Completed seasons after which an operator counts as a veteran.
    pub veteran_seasons: u32,
    /// Yield multiple of opportunity cost required before new hardware deploys.
    pub entry_yield_multiple: f64,
    /// Daily entrants as a fraction of the active population.
    pub entry_rate: f64,
    /// Absolute daily entrant cap (hardware deployment throughput).
    pub entry_cap_abs: u64,
    /// Entry tapers to zero at target × (1 + congestion_band).
    pub congestion_band: f64,
    /// Treasury tops yield up to this multiple of opportunity cost.
    pub subsidy_yield_floor: f64,
    /// Treasury must hold more than this fraction of total supply to pay out.
    pub treasury_reserve_fraction: f64,
    /// Daily subsidy cap as a fraction of the treasury balance.
    pub subsidy_cap_fraction: f64,
}

// ── Reputation ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    pub season_days: Day,
    /// Uptime a season must exceed to earn the increment.
    pub uptime_bar: f64,
    pub increment: f64,
    pub decay: f64,
    pub max_score: f64,
}

// ── Price ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    /// Annualized OU mean-reversion speed.
    pub ou_kappa: f64,
    /// Daily log-price volatility.
    pub ou_sigma: f64,
    pub fundamental_scale: f64,
    pub fundamental_min: f64,
    pub fundamental_max: f64,
    pub price_floor: f64,
}

// ── Population seeding ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Seed-population shares: high-commitment, casual, mercenary.
    /// The remainder is filled with casual operators.
    pub seed_shares: [f64; 3],
    /// Archetype probabilities for new entrants.
    pub entrant_shares: [f64; 3],
    pub seed_uptime_std: f64,
    pub entrant_uptime_mean: f64,
    pub entrant_uptime_std: f64,
    pub entrant_price_sensitivity: (f64, f64),
    pub stake_min: u64,
    /// Exclusive upper bound of the random stake top-up.
    pub stake_spread: u64,
}

// ── Initial economic state ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialState {
    pub circulating: f64,
    pub treasury: f64,
    pub operators: u64,
    pub fee_revenue: f64,
    pub price: f64,
}

// ── Calibrated benchmarks ──────────────────────────────────────────

/// Logistic burn/emission trajectory `L / (1 + e^(-k (month - t0)))`
/// fitted from historical data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BurnMintCurve {
    pub ceiling: f64,
    pub steepness: f64,
    pub midpoint_month: f64,
}

impl BurnMintCurve {
    pub fn ratio_at_month(&self, month: f64) -> f64 {
        self.ceiling / (1.0 + (-self.steepness * (month - self.midpoint_month)).exp())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Benchmarks {
    pub burn_mint: BurnMintCurve,
    pub target_gini: Option<f64>,
    pub target_hhi: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub timesteps: Day,
    pub total_supply: f64,
    pub target_population: u64,
    pub initial: InitialState,
    pub emission: EmissionConfig,
    pub demand: DemandConfig,
    pub burn: BurnConfig,
    pub lifecycle: LifecycleConfig,
    pub reputation: ReputationConfig,
    pub price: PriceConfig,
    pub population: PopulationConfig,
    pub benchmarks: Benchmarks,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            timesteps: TIMESTEPS,
            total_supply: TOTAL_SUPPLY,
            target_population: TARGET_POPULATION,
            initial: InitialState {
                circulating: 200_000_000.0,
                treasury:    150_000_000.0,
                operators:   2_000,
                fee_revenue: 500.0,
                price:       0.10,
            },
            emission: EmissionConfig {
                base_emission:       BASE_EMISSION,
                floor:               EMISSION_FLOOR,
                ceiling:             EMISSION_CEILING,
                gains:               PidGains::default(),
                cadence_days:        PID_CADENCE,
                integral_limit:      5.0,
                static_annual_taper: 0.95,
            },
            demand: DemandConfig {
                base_revenue:            1_000.0,
                enterprise_threshold:    0.3,
                saturation_threshold:    0.8,
                enterprise_exponent:     1.3,
                saturation_exponent:     1.5,
                max_coverage_factor:     2.0,
                noise_std:               0.05,
                revenue_floor:           50.0,
                contraction_per_month:   0.02,
                contraction_floor:       0.3,
                poach_erosion_per_month: 0.05,
                poach_erosion_cap:       0.30,
            },
            burn: BurnConfig {
                protocol_fee:  0.30,
                price_epsilon: 0.001,
            },
            lifecycle: LifecycleConfig {
                opportunity_cost:          5.0,
                operating_cost_mean:       3.0,
                operating_cost_std:        0.5,
                uptime_jitter_std:         0.005,
                uptime_min:                0.5,
                downtime_threshold:        0.90,
                slash_downtime:            0.10,
                slash_fraud:               1.00,
                fraud_detection_rate:      0.97,
                fraud_gain_fraction:       0.1,
                exit_prob_newcomer:        0.008,
                exit_prob_veteran:         0.003,
                veteran_seasons:           2,
                entry_yield_multiple:      2.0,
                entry_rate:                0.03,
                entry_cap_abs:             30,
                congestion_band:           0.2,
                subsidy_yield_floor:       0.5,
                treasury_reserve_fraction: 0.02,
                subsidy_cap_fraction:      0.01,
            },
            reputation: ReputationConfig {
                season_days: 90,
                uptime_bar:  0.99,
                increment:   1.0,
                decay:       0.15,
                max_score:   5.0,
            },
            price: PriceConfig {
                ou_kappa:          2.8,
                ou_sigma:          0.049,
                fundamental_scale: 1_000.0,
                fundamental_min:   0.01,
                fundamental_max:   10.0,
                price_floor:       0.001,
            },
            population: PopulationConfig {
                seed_shares:               [0.40, 0.30, 0.15],
                entrant_shares:            [0.50, 0.35, 0.15],
                seed_uptime_std:           0.01,
                entrant_uptime_mean:       0.95,
                entrant_uptime_std:        0.02,
                entrant_price_sensitivity: (0.2, 0.9),
                stake_min:                 10_000,
                stake_spread:              20_000,
            },
            benchmarks: Benchmarks {
                burn_mint: BurnMintCurve {
                    ceiling:        1.5,
                    steepness:      0.7,
                    midpoint_month: 28.0,
                },
                target_gini: None,
                target_hhi:  None,
            },
        }
    }
}

// ── Calibration file ───────────────────────────────────────────────
//
// Every section and every key is optional. Unknown keys are ignored so
// the calibration pipeline can carry extra diagnostics in the same file.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CalibrationFile {
    pid:        Option<PidSection>,
    price:      Option<PriceSection>,
    s2r:        Option<BurnMintSection>,
    governance: Option<GovernanceSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PidSection {
    kp:               Option<f64>,
    ki:               Option<f64>,
    kd:               Option<f64>,
    cadence_days:     Option<Day>,
    emission_floor:   Option<f64>,
    emission_ceiling: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PriceSection {
    mesh_ou_kappa:      Option<f64>,
    mesh_ou_sigma:      Option<f64>,
    mesh_initial_price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BurnMintSection {
    #[serde(rename = "logistic_L")]
    logistic_l:  Option<f64>,
    logistic_k:  Option<f64>,
    logistic_t0: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GovernanceSection {
    mesh_target_gini: Option<f64>,
    mesh_target_hhi:  Option<f64>,
}

impl SimConfig {
    /// Load calibration overrides from a JSON file on top of the defaults.
    ///
    /// A missing or malformed file is not fatal: the simulation runs on
    /// hardcoded defaults and the degradation is logged.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut config = Self::default();

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("calibration {} unavailable ({e}); using defaults", path.display());
                return config;
            }
        };
        let file: CalibrationFile = match serde_json::from_str(&content) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("calibration {} malformed ({e}); using defaults", path.display());
                return config;
            }
        };

        config.apply_calibration(file);
        log::info!(
            "calibration loaded from {}: kappa={:.4} sigma={:.6} gains={:?}",
            path.display(),
            config.price.ou_kappa,
            config.price.ou_sigma,
            config.emission.gains,
        );
        config
    }

    fn apply_calibration(&mut self, file: CalibrationFile) {
        if let Some(pid) = file.pid {
            let gains = &mut self.emission.gains;
            gains.kp = pid.kp.unwrap_or(gains.kp);
            gains.ki = pid.ki.unwrap_or(gains.ki);
            gains.kd = pid.kd.unwrap_or(gains.kd);
            self.emission.cadence_days = pid.cadence_days.unwrap_or(self.emission.cadence_days).max(1);
            let floor = pid.emission_floor.unwrap_or(self.emission.floor);
            let ceiling = pid.emission_ceiling.unwrap_or(self.emission.ceiling);
            if valid_bounds(floor, ceiling) {
                self.emission.floor = floor;
                self.emission.ceiling = ceiling;
            } else {
                log::warn!(
                    "calibration emission bounds [{floor}, {ceiling}] invalid; keeping [{}, {}]",
                    self.emission.floor,
                    self.emission.ceiling
                );
            }
        }
        if let Some(price) = file.price {
            self.price.ou_kappa = price.mesh_ou_kappa.unwrap_or(self.price.ou_kappa);
            self.price.ou_sigma = price.mesh_ou_sigma.unwrap_or(self.price.ou_sigma);
            self.initial.price = price.mesh_initial_price.unwrap_or(self.initial.price);
        }
        if let Some(s2r) = file.s2r {
            let curve = &mut self.benchmarks.burn_mint;
            curve.ceiling = s2r.logistic_l.unwrap_or(curve.ceiling);
            curve.steepness = s2r.logistic_k.unwrap_or(curve.steepness);
            curve.midpoint_month = s2r.logistic_t0.unwrap_or(curve.midpoint_month);
        }
        if let Some(gov) = file.governance {
            self.benchmarks.target_gini = gov.mesh_target_gini.or(self.benchmarks.target_gini);
            self.benchmarks.target_hhi = gov.mesh_target_hhi.or(self.benchmarks.target_hhi);
        }
    }

    /// Config for unit tests: defaults on a shortened horizon.
    pub fn default_test(timesteps: Day) -> Self {
        Self { timesteps, ..Self::default() }
    }
}

/// Controller bounds must be finite, positive and ordered.
fn valid_bounds(floor: f64, ceiling: f64) -> bool {
    floor.is_finite() && ceiling.is_finite() && floor > 0.0 && floor <= ceiling
}

/// Per-run parameter overrides used by the sweep harnesses.
/// `None` keeps the base configuration's value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOverrides {
    pub kp:             Option<f64>,
    pub ki:             Option<f64>,
    pub kd:             Option<f64>,
    pub cadence_days:   Option<Day>,
    pub slash_downtime: Option<f64>,
    pub slash_fraud:    Option<f64>,
}

impl RunOverrides {
    pub fn gains(gains: PidGains) -> Self {
        Self {
            kp: Some(gains.kp),
            ki: Some(gains.ki),
            kd: Some(gains.kd),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Produce the effective configuration for one run.
    pub fn apply(&self, base: &SimConfig) -> SimConfig {
        let mut config = base.clone();
        let gains = &mut config.emission.gains;
        gains.kp = self.kp.unwrap_or(gains.kp);
        gains.ki = self.ki.unwrap_or(gains.ki);
        gains.kd = self.kd.unwrap_or(gains.kd);
        if let Some(cadence) = self.cadence_days {
            config.emission.cadence_days = cadence.max(1);
        }
        if let Some(sd) = self.slash_downtime {
            config.lifecycle.slash_downtime = sd;
        }
        if let Some(sf) = self.slash_fraud {
            config.lifecycle.slash_fraud = sf;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_calibration_falls_back_to_defaults() {
        let config = SimConfig::load("/nonexistent/calibration_params.json");
        assert_eq!(config.price.ou_kappa, 2.8);
        assert_eq!(config.emission.gains, PidGains::default());
    }

    #[test]
    fn malformed_calibration_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let config = SimConfig::load(file.path());
        assert_eq!(config.price.ou_sigma, 0.049);
    }

    #[test]
    fn calibration_overlays_only_present_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "price": {{ "mesh_ou_kappa": 1.9, "hnt_daily_vol": 0.05 }},
                "s2r": {{ "logistic_L": 2.0 }},
                "pid": {{ "ki": 0.25 }}
            }}"#
        )
        .unwrap();
        let config = SimConfig::load(file.path());
        assert_eq!(config.price.ou_kappa, 1.9);
        assert_eq!(config.price.ou_sigma, 0.049);
        assert_eq!(config.benchmarks.burn_mint.ceiling, 2.0);
        assert_eq!(config.benchmarks.burn_mint.steepness, 0.7);
        assert_eq!(config.emission.gains.ki, 0.25);
        assert_eq!(config.emission.gains.kp, 0.8);
    }

    #[test]
    fn inverted_emission_bounds_keep_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "pid": {{ "emission_floor": 400000.0, "emission_ceiling": 1000.0, "kp": 0.5 }} }}"#
        )
        .unwrap();
        let config = SimConfig::load(file.path());
        assert_eq!(config.emission.floor, EMISSION_FLOOR);
        assert_eq!(config.emission.ceiling, EMISSION_CEILING);
        assert_eq!(config.emission.gains.kp, 0.5);

        let scenario = &crate::scenario::catalog()[0];
        let short = SimConfig { timesteps: 30, ..config };
        let out = crate::engine::run_simulation(&short, scenario, crate::emission_subsystem::PolicyKind::Pid, 42)
            .unwrap();
        assert_eq!(out.records.len(), 30);
    }

    #[test]
    fn non_positive_floor_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "pid": {{ "emission_floor": 0.0 }} }}"#).unwrap();
        let config = SimConfig::load(file.path());
        assert_eq!(config.emission.floor, EMISSION_FLOOR);
        assert!(!valid_bounds(f64::NAN, EMISSION_CEILING));
        assert!(!valid_bounds(EMISSION_FLOOR, f64::INFINITY));
        assert!(valid_bounds(EMISSION_FLOOR, EMISSION_FLOOR));
    }

    #[test]
    fn overrides_leave_base_untouched() {
        let base = SimConfig::default();
        let o = RunOverrides { kd: Some(0.5), slash_fraud: Some(0.4), ..Default::default() };
        let run = o.apply(&base);
        assert_eq!(run.emission.gains.kd, 0.5);
        assert_eq!(run.lifecycle.slash_fraud, 0.4);
        assert_eq!(base.emission.gains.kd, 0.2);
        assert!(!o.is_empty());
        assert!(RunOverrides::default().is_empty());
    }
}
