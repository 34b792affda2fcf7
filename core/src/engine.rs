//! The simulation engine: drives one run of the MeshNet economy.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   0. Engine: refresh cost multiplier, announce shock on onset day
//!   1. Demand      fee revenue from yesterday's active count
//!   2. Emission    PID or static policy
//!   3. Burn        fee share → burned tokens at today's price
//!   4. Lifecycle   slashing, exits, subsidy, entry, poaching
//!   5. Reputation  season close every 90 days
//!   6. Price       OU step on yesterday's circulating supply
//!   7. Supply      circulating, treasury, active count
//!   8. Engine: capture the day's record
//!
//! RULES:
//!   - Stages execute in registration order, every day.
//!   - No stage calls another stage's functions directly; they
//!     communicate through `World`.
//!   - All randomness flows through the RngBank. Each stage owns one
//!     stream for the whole run.
//!   - No I/O inside the day loop.

use crate::{
    burn_subsystem::BurnSubsystem,
    clock::SimClock,
    config::SimConfig,
    demand_subsystem::DemandSubsystem,
    emission_subsystem::{build_policy, ControllerState, EmissionSubsystem, PolicyKind},
    error::SimResult,
    event::SimEvent,
    lifecycle_subsystem::LifecycleSubsystem,
    operator::OperatorTable,
    price_subsystem::PriceSubsystem,
    reputation_subsystem::ReputationSubsystem,
    rng::{RngBank, SubsystemRng, SubsystemSlot},
    scenario::ScenarioConfig,
    snapshot::{run_id, SimulationRecord},
    subsystem::{SimSubsystem, StepContext},
    supply_subsystem::SupplySubsystem,
    types::{RunId, DAYS_PER_YEAR},
    world::{DayFlows, EconomicState, World},
};

struct Stage {
    slot:      SubsystemSlot,
    subsystem: Box<dyn SimSubsystem>,
    rng:       SubsystemRng,
}

/// Everything a finished run leaves behind.
pub struct RunOutput {
    pub run_id:     RunId,
    pub seed:       u64,
    pub scenario:   String,
    pub policy:     PolicyKind,
    pub records:    Vec<SimulationRecord>,
    pub operators:  OperatorTable,
    pub events:     Vec<SimEvent>,
    pub controller: Option<ControllerState>,
}

impl RunOutput {
    pub fn last(&self) -> Option<&SimulationRecord> {
        self.records.last()
    }
}

pub struct SimEngine<'a> {
    pub run_id: RunId,
    pub clock:  SimClock,
    config:     &'a SimConfig,
    scenario:   &'a ScenarioConfig,
    policy:     PolicyKind,
    seed:       u64,
    rng_bank:   RngBank,
    world:      World,
    stages:     Vec<Stage>,
    records:    Vec<SimulationRecord>,
}

impl<'a> SimEngine<'a> {
    pub fn new(config: &'a SimConfig, scenario: &'a ScenarioConfig, policy: PolicyKind, seed: u64) -> Self {
        let run_id = run_id(&scenario.name, policy);
        let rng_bank = RngBank::new(seed);
        let mut population_rng = rng_bank.for_subsystem(SubsystemSlot::Population);
        let operators = OperatorTable::seed(
            config.initial.operators as usize,
            &config.population,
            &mut population_rng,
        );
        let mut world = World::new(config, operators);
        world.emit(SimEvent::RunInitialized {
            run_id: run_id.clone(),
            seed,
            operators: world.operators.len(),
        });

        Self {
            clock: SimClock::new(run_id.clone(), config.timesteps),
            run_id,
            config,
            scenario,
            policy,
            seed,
            rng_bank,
            world,
            stages: Vec::new(),
            records: Vec::with_capacity(config.timesteps as usize),
        }
    }

    /// Build a fully wired engine with all stages registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build(config: &'a SimConfig, scenario: &'a ScenarioConfig, policy: PolicyKind, seed: u64) -> Self {
        let mut engine = Self::new(config, scenario, policy, seed);

        // EXECUTION ORDER: fixed and documented. Never reorder.
        engine.register(SubsystemSlot::Demand, Box::new(DemandSubsystem::new()));
        engine.register(
            SubsystemSlot::Emission,
            Box::new(EmissionSubsystem::new(build_policy(
                policy,
                &config.emission,
                config.target_population,
            ))),
        );
        engine.register(SubsystemSlot::Burn, Box::new(BurnSubsystem::new()));
        engine.register(SubsystemSlot::Lifecycle, Box::new(LifecycleSubsystem::new()));
        engine.register(SubsystemSlot::Reputation, Box::new(ReputationSubsystem::new()));
        engine.register(SubsystemSlot::Price, Box::new(PriceSubsystem::new()));
        engine.register(SubsystemSlot::Supply, Box::new(SupplySubsystem::new()));
        engine
    }

    /// Register a stage. Call in the documented execution order.
    pub fn register(&mut self, slot: SubsystemSlot, subsystem: Box<dyn SimSubsystem>) {
        let rng = self.rng_bank.for_subsystem(slot);
        self.stages.push(Stage { slot, subsystem, rng });
    }

    /// Advance one day. Returns the captured record, or `None` once the
    /// horizon has been reached.
    pub fn tick(&mut self) -> SimResult<Option<&SimulationRecord>> {
        let Some(day) = self.clock.advance() else {
            return Ok(None);
        };

        self.world.flows = DayFlows::default();
        self.world.state.cost_multiplier = self.scenario.cost_multiplier(day);
        if self.scenario.shock.onset_day() == Some(day) {
            log::info!("day={day} {} shock fires in {}", self.scenario.shock.label(), self.run_id);
            self.world.emit(SimEvent::ShockFired {
                day,
                kind: self.scenario.shock.label().to_string(),
            });
        }

        let ctx = StepContext {
            day,
            config: self.config,
            scenario: self.scenario,
        };
        for stage in &mut self.stages {
            stage.subsystem.update(&ctx, &mut self.world, &mut stage.rng)?;
        }

        let state = &self.world.state;
        if day % DAYS_PER_YEAR == 0 {
            log::info!(
                "[{}] year {}: N={} P={:.4} C={:.0}",
                self.run_id,
                SimClock::year_of(day),
                state.active_count,
                state.price,
                state.circulating,
            );
        }

        self.records.push(SimulationRecord::capture(
            self.seed,
            &self.run_id,
            day,
            &self.scenario.name,
            self.policy,
            state,
        ));
        Ok(self.records.last())
    }

    /// Run to the horizon and hand back the run's artifacts.
    pub fn run(mut self) -> SimResult<RunOutput> {
        while self.tick()?.is_some() {}
        let controller = self.controller_state().copied();
        Ok(RunOutput {
            run_id:     self.run_id,
            seed:       self.seed,
            scenario:   self.scenario.name.clone(),
            policy:     self.policy,
            records:    self.records,
            operators:  self.world.operators,
            events:     self.world.events,
            controller,
        })
    }

    pub fn state(&self) -> &EconomicState {
        &self.world.state
    }

    pub fn operators(&self) -> &OperatorTable {
        &self.world.operators
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.world.events
    }

    pub fn records(&self) -> &[SimulationRecord] {
        &self.records
    }

    /// Stage names in execution order.
    pub fn stage_order(&self) -> Vec<(SubsystemSlot, &'static str)> {
        self.stages.iter().map(|s| (s.slot, s.subsystem.name())).collect()
    }

    /// The PID controller's memory, if this run uses one.
    /// Used by tests and the saturation harness.
    pub fn controller_state(&self) -> Option<&ControllerState> {
        self.stages.iter().find_map(|s| {
            s.subsystem
                .as_any()
                .downcast_ref::<EmissionSubsystem>()
                .and_then(|e| e.controller_state())
        })
    }
}

/// Convenience wrapper: build and run one configuration to completion.
pub fn run_simulation(
    config: &SimConfig,
    scenario: &ScenarioConfig,
    policy: PolicyKind,
    seed: u64,
) -> SimResult<RunOutput> {
    SimEngine::build(config, scenario, policy, seed).run()
}
