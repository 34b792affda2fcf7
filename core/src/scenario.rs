//! Scenario catalog: named macro regimes.
//!
//! Scenarios are pure configuration: built once, shared read-only by
//! every run, never mutated.

use crate::{
    error::{SimError, SimResult},
    types::{Day, DAYS_PER_MONTH},
};
use serde::{Deserialize, Serialize};

/// A macro shock. Each kind carries only the fields meaningful to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shock {
    NoShock,
    /// Demand decays after onset.
    DemandContraction { month: u64 },
    /// A competitor poaches a fraction of non-committed operators on the
    /// onset day and siphons demand afterwards.
    OperatorPoach { month: u64, rate: f64 },
    /// Operating costs rise by `multiplier` from the onset day on.
    CostIncrease { month: u64, multiplier: f64 },
}

impl Shock {
    /// The day the shock fires, if any.
    pub fn onset_day(&self) -> Option<Day> {
        match self {
            Self::NoShock => None,
            Self::DemandContraction { month }
            | Self::OperatorPoach { month, .. }
            | Self::CostIncrease { month, .. } => Some(month * DAYS_PER_MONTH),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoShock => "none",
            Self::DemandContraction { .. } => "demand_contraction",
            Self::OperatorPoach { .. } => "operator_poach",
            Self::CostIncrease { .. } => "cost_increase",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub demand_growth_annual: f64,
    /// Added to log-price every day.
    pub price_drift: f64,
    pub shock: Shock,
}

impl ScenarioConfig {
    /// Compounding daily growth equivalent to the annual rate.
    pub fn daily_growth(&self) -> f64 {
        (1.0 + self.demand_growth_annual).powf(1.0 / 365.0) - 1.0
    }

    /// Cost multiplier in force on `day`.
    pub fn cost_multiplier(&self, day: Day) -> f64 {
        match self.shock {
            Shock::CostIncrease { multiplier, .. }
                if self.shock.onset_day().is_some_and(|onset| day >= onset) =>
            {
                multiplier
            }
            _ => 1.0,
        }
    }
}

/// Catalog order is stable: harnesses derive per-scenario seeds from
/// the catalog index.
pub fn catalog() -> Vec<ScenarioConfig> {
    vec![
        ScenarioConfig {
            name:                 "bull".into(),
            demand_growth_annual: 0.30,
            price_drift:          0.002,
            shock:                Shock::NoShock,
        },
        ScenarioConfig {
            name:                 "bear".into(),
            demand_growth_annual: -0.15,
            price_drift:          -0.001,
            shock:                Shock::DemandContraction { month: 12 },
        },
        ScenarioConfig {
            name:                 "competitor".into(),
            demand_growth_annual: -0.10,
            price_drift:          -0.001,
            shock:                Shock::OperatorPoach { month: 18, rate: 0.25 },
        },
        ScenarioConfig {
            name:                 "regulatory".into(),
            demand_growth_annual: -0.05,
            price_drift:          -0.001,
            shock:                Shock::CostIncrease { month: 18, multiplier: 1.30 },
        },
    ]
}

/// Look up a scenario and its catalog index by name.
pub fn by_name(name: &str) -> SimResult<(usize, ScenarioConfig)> {
    catalog()
        .into_iter()
        .enumerate()
        .find(|(_, s)| s.name == name)
        .ok_or_else(|| SimError::UnknownScenario { name: name.to_string() })
}

/// Resolve a list of names in catalog order; an empty list means all.
pub fn select(names: &[String]) -> SimResult<Vec<(usize, ScenarioConfig)>> {
    if names.is_empty() {
        return Ok(catalog().into_iter().enumerate().collect());
    }
    for name in names {
        by_name(name)?;
    }
    Ok(catalog()
        .into_iter()
        .enumerate()
        .filter(|(_, s)| names.iter().any(|n| n == &s.name))
        .collect())
}
