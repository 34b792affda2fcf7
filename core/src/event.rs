//! Notable simulation events.
//!
//! The per-day record table is the primary artifact; events capture the
//! discrete moments worth auditing (shocks, saturation, mass exits,
//! subsidy draws). They are logged as they happen and can be persisted
//! alongside the record table.

use crate::types::{Day, RunId};
use serde::{Deserialize, Serialize};

/// Variants are added over time and never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    RunInitialized {
        run_id: RunId,
        seed: u64,
        operators: usize,
    },
    ShockFired {
        day: Day,
        kind: String,
    },
    /// The controller's unclamped output fell outside the emission bounds.
    EmissionSaturated {
        day: Day,
        bound: Bound,
        unclamped: f64,
    },
    OperatorsPoached {
        day: Day,
        poached: usize,
        active_before: usize,
    },
    TreasurySubsidyPaid {
        day: Day,
        tokens: f64,
        treasury_before: f64,
    },
    SeasonClosed {
        day: Day,
        active: usize,
        mean_reputation: f64,
    },
    PopulationCollapsed {
        day: Day,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    Floor,
    Ceiling,
}

impl SimEvent {
    /// Stable string name, used for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. }      => "run_initialized",
            Self::ShockFired { .. }          => "shock_fired",
            Self::EmissionSaturated { .. }   => "emission_saturated",
            Self::OperatorsPoached { .. }    => "operators_poached",
            Self::TreasurySubsidyPaid { .. } => "treasury_subsidy_paid",
            Self::SeasonClosed { .. }        => "season_closed",
            Self::PopulationCollapsed { .. } => "population_collapsed",
        }
    }

    pub fn day(&self) -> Day {
        match self {
            Self::RunInitialized { .. } => 0,
            Self::ShockFired { day, .. }
            | Self::EmissionSaturated { day, .. }
            | Self::OperatorsPoached { day, .. }
            | Self::TreasurySubsidyPaid { day, .. }
            | Self::SeasonClosed { day, .. }
            | Self::PopulationCollapsed { day } => *day,
        }
    }
}
