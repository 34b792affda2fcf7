//! Per-run mutable state shared by the pipeline stages.

use crate::{
    config::SimConfig,
    event::SimEvent,
    operator::OperatorTable,
    types::Day,
};
use serde::{Deserialize, Serialize};

/// The network's aggregate economic state. Bounds are enforced by the
/// supply accounting stage: `0 <= circulating <= total_supply`,
/// `treasury >= 0`, `active_count >= 1`, `price > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicState {
    pub circulating: f64,
    pub treasury: f64,
    /// Active operators as seen by demand and the controller (floored at 1).
    pub active_count: u64,
    pub emission: f64,
    pub burn: f64,
    pub fee_revenue: f64,
    pub price: f64,
    pub slashed_total: u64,
    pub fraud_captured_total: f64,
    pub cost_multiplier: f64,
    /// First day the population reached zero, if it ever did.
    pub collapsed_on: Option<Day>,
}

impl EconomicState {
    pub fn initial(config: &SimConfig) -> Self {
        Self {
            circulating:          config.initial.circulating,
            treasury:             config.initial.treasury,
            active_count:         config.initial.operators,
            emission:             config.emission.base_emission,
            burn:                 0.0,
            fee_revenue:          config.initial.fee_revenue,
            price:                config.initial.price,
            slashed_total:        0,
            fraud_captured_total: 0.0,
            cost_multiplier:      1.0,
            collapsed_on:         None,
        }
    }

    /// Burned tokens per emitted token for the current day.
    pub fn burn_mint_ratio(&self) -> f64 {
        self.burn / self.emission.max(1.0)
    }
}

/// Token flows produced during one day, consumed by supply accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayFlows {
    pub slashed: u64,
    pub fraud_captured: f64,
    pub subsidy: f64,
}

pub struct World {
    pub state: EconomicState,
    pub flows: DayFlows,
    pub operators: OperatorTable,
    /// Events emitted so far in this run, in emission order.
    pub events: Vec<SimEvent>,
}

impl World {
    pub fn new(config: &SimConfig, operators: OperatorTable) -> Self {
        Self {
            state: EconomicState::initial(config),
            flows: DayFlows::default(),
            operators,
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: SimEvent) {
        log::debug!("{} {:?}", event.type_name(), event);
        self.events.push(event);
    }
}
