//! Run plans: the single execution path shared by every harness.
//!
//! A harness describes its experiment as a `RunPlan` (a flat list of
//! `RunSpec`s), hands it to `RunPlan::execute` together with a reducer,
//! and gets one reduced value per spec back, in plan order.
//!
//! RULE: Runs are independent. Each run builds its own engine from the
//! shared immutable config (plus its overrides) and its own seed, so
//! executing the plan in parallel cannot change any result.

use crate::{
    config::{RunOverrides, SimConfig},
    emission_subsystem::PolicyKind,
    engine::{run_simulation, RunOutput},
    error::{SimError, SimResult},
    scenario::ScenarioConfig,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Position of the scenario in the catalog.
    pub scenario_index: usize,
    pub scenario:       ScenarioConfig,
    pub policy:         PolicyKind,
    pub seed:           u64,
    pub overrides:      RunOverrides,
}

impl RunSpec {
    pub fn new(scenario_index: usize, scenario: ScenarioConfig, policy: PolicyKind, seed: u64) -> Self {
        Self {
            scenario_index,
            scenario,
            policy,
            seed,
            overrides: RunOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: RunOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn describe(&self) -> String {
        let mut s = format!("{}/{} seed={}", self.scenario.name, self.policy.name(), self.seed);
        if !self.overrides.is_empty() {
            s.push_str(&format!(" {:?}", self.overrides));
        }
        s
    }
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub name: &'static str,
    pub runs: Vec<RunSpec>,
}

impl RunPlan {
    pub fn new(name: &'static str) -> Self {
        Self { name, runs: Vec::new() }
    }

    pub fn push(&mut self, spec: RunSpec) {
        self.runs.push(spec);
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn validate(&self, base: &SimConfig) -> SimResult<()> {
        if self.runs.is_empty() {
            return Err(SimError::InvalidPlan(format!("plan '{}' has no runs", self.name)));
        }
        if base.timesteps == 0 {
            return Err(SimError::InvalidPlan("horizon must be at least one day".into()));
        }
        if let Some(bad) = self.runs.iter().find(|r| r.overrides.cadence_days == Some(0)) {
            return Err(SimError::InvalidPlan(format!(
                "zero controller cadence in {}",
                bad.describe()
            )));
        }
        Ok(())
    }

    /// Execute every run and reduce each output as soon as it finishes.
    /// Results come back in plan order regardless of scheduling.
    pub fn execute<T, F>(&self, base: &SimConfig, reduce: F) -> SimResult<Vec<T>>
    where
        T: Send,
        F: Fn(&RunSpec, RunOutput) -> SimResult<T> + Sync,
    {
        self.validate(base)?;
        let total = self.runs.len();
        let done = AtomicUsize::new(0);
        log::info!("plan '{}': {} runs", self.name, total);

        self.runs
            .par_iter()
            .map(|spec| {
                let config = spec.overrides.apply(base);
                let output = run_simulation(&config, &spec.scenario, spec.policy, spec.seed)?;
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                log::info!("[{finished}/{total}] {}", spec.describe());
                reduce(spec, output)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::by_name;

    #[test]
    fn empty_plan_is_rejected() {
        let plan = RunPlan::new("empty");
        let err = plan.execute(&SimConfig::default_test(5), |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, SimError::InvalidPlan(_)));
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let (idx, bull) = by_name("bull").unwrap();
        let mut plan = RunPlan::new("bad");
        plan.push(RunSpec::new(idx, bull, PolicyKind::Pid, 1).with_overrides(RunOverrides {
            cadence_days: Some(0),
            ..RunOverrides::default()
        }));
        assert!(plan.execute(&SimConfig::default_test(5), |_, _| Ok(())).is_err());
    }

    #[test]
    fn results_keep_plan_order() {
        let (idx, bull) = by_name("bull").unwrap();
        let mut plan = RunPlan::new("order");
        for seed in [9, 3, 7, 1] {
            plan.push(RunSpec::new(idx, bull.clone(), PolicyKind::Static, seed));
        }
        let seeds = plan
            .execute(&SimConfig::default_test(3), |spec, out| {
                assert_eq!(out.records.len(), 3);
                Ok(spec.seed)
            })
            .unwrap();
        assert_eq!(seeds, vec![9, 3, 7, 1]);
    }
}
