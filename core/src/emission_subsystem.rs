//! Emission subsystem: how many new tokens are minted each day.
//!
//! Two interchangeable policies implement `EmissionPolicy`:
//!   - `PidController`: closed-loop on the normalized population error,
//!     evaluated every `cadence_days` (day 0 included). Between
//!     evaluations the previous rate persists.
//!   - `StaticSchedule`: open-loop, tapering a fixed fraction per year.
//!
//! The PID output is clamped to [floor, ceiling]. Clamping is silent as
//! far as the economy is concerned, but every evaluation reports whether
//! it saturated so harnesses can count it.

use crate::{
    config::{EmissionConfig, PidGains},
    error::SimResult,
    event::{Bound, SimEvent},
    rng::SubsystemRng,
    subsystem::{SimSubsystem, StepContext},
    types::{Day, DAYS_PER_YEAR},
    world::World,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Pid,
    Static,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 2] = [Self::Pid, Self::Static];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pid => "pid",
            Self::Static => "static",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pid" => Some(Self::Pid),
            "static" => Some(Self::Static),
            _ => None,
        }
    }
}

/// Result of one policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub rate: f64,
    /// Rate before clamping to the controller's bounds.
    pub unclamped: f64,
    pub saturated: Option<Bound>,
}

pub trait EmissionPolicy: Send {
    fn kind(&self) -> PolicyKind;

    /// Emission rate for `day`, or `None` to keep the previous rate.
    fn evaluate(&mut self, day: Day, active: u64) -> Option<Evaluation>;

    /// Internal controller memory, if the policy has any.
    fn controller_state(&self) -> Option<&ControllerState> {
        None
    }
}

/// PID memory carried across evaluations, in normalized units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub integral: f64,
    pub prev_error: f64,
    pub last_eval_day: Option<Day>,
}

pub struct PidController {
    gains: PidGains,
    target: f64,
    base: f64,
    floor: f64,
    ceiling: f64,
    cadence: Day,
    integral_limit: f64,
    pub state: ControllerState,
}

impl PidController {
    pub fn new(cfg: &EmissionConfig, target_population: u64) -> Self {
        Self {
            gains:          cfg.gains,
            target:         target_population.max(1) as f64,
            base:           cfg.base_emission,
            floor:          cfg.floor,
            ceiling:        cfg.ceiling.max(cfg.floor),
            cadence:        cfg.cadence_days.max(1),
            integral_limit: cfg.integral_limit.abs(),
            state:          ControllerState::default(),
        }
    }

    pub fn is_evaluation_day(&self, day: Day) -> bool {
        day % self.cadence == 0
    }
}

impl EmissionPolicy for PidController {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Pid
    }

    fn evaluate(&mut self, day: Day, active: u64) -> Option<Evaluation> {
        if !self.is_evaluation_day(day) {
            return None;
        }
        let error = (self.target - active as f64) / self.target;
        let integral = (self.state.integral + error)
            .max(-self.integral_limit)
            .min(self.integral_limit);
        let derivative = error - self.state.prev_error;

        let g = self.gains;
        let adjustment = self.base * (g.kp * error + g.ki * integral + g.kd * derivative);
        let unclamped = self.base + adjustment;
        let rate = unclamped.max(self.floor).min(self.ceiling);
        let saturated = if unclamped < self.floor {
            Some(Bound::Floor)
        } else if unclamped > self.ceiling {
            Some(Bound::Ceiling)
        } else {
            None
        };

        self.state = ControllerState {
            integral,
            prev_error: error,
            last_eval_day: Some(day),
        };
        Some(Evaluation { rate, unclamped, saturated })
    }

    fn controller_state(&self) -> Option<&ControllerState> {
        Some(&self.state)
    }
}

/// Fixed schedule: `base × taper^(day / 365)`.
pub struct StaticSchedule {
    base: f64,
    annual_taper: f64,
}

impl StaticSchedule {
    pub fn new(cfg: &EmissionConfig) -> Self {
        Self {
            base: cfg.base_emission,
            annual_taper: cfg.static_annual_taper,
        }
    }

    pub fn rate_at(&self, day: Day) -> f64 {
        self.base * self.annual_taper.powf(day as f64 / DAYS_PER_YEAR as f64)
    }
}

impl EmissionPolicy for StaticSchedule {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Static
    }

    fn evaluate(&mut self, day: Day, _active: u64) -> Option<Evaluation> {
        let rate = self.rate_at(day);
        Some(Evaluation { rate, unclamped: rate, saturated: None })
    }
}

pub fn build_policy(kind: PolicyKind, cfg: &EmissionConfig, target_population: u64) -> Box<dyn EmissionPolicy> {
    match kind {
        PolicyKind::Pid => Box::new(PidController::new(cfg, target_population)),
        PolicyKind::Static => Box::new(StaticSchedule::new(cfg)),
    }
}

pub struct EmissionSubsystem {
    policy: Box<dyn EmissionPolicy>,
}

impl EmissionSubsystem {
    pub fn new(policy: Box<dyn EmissionPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    pub fn controller_state(&self) -> Option<&ControllerState> {
        self.policy.controller_state()
    }
}

impl SimSubsystem for EmissionSubsystem {
    fn name(&self) -> &'static str {
        "emission"
    }

    fn update(
        &mut self,
        ctx: &StepContext<'_>,
        world: &mut World,
        _rng: &mut SubsystemRng,
    ) -> SimResult<()> {
        let Some(eval) = self.policy.evaluate(ctx.day, world.state.active_count) else {
            return Ok(());
        };
        world.state.emission = eval.rate;
        if let Some(bound) = eval.saturated {
            world.emit(SimEvent::EmissionSaturated {
                day: ctx.day,
                bound,
                unclamped: eval.unclamped,
            });
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn controller(gains: PidGains) -> PidController {
        let mut cfg = SimConfig::default().emission;
        cfg.gains = gains;
        PidController::new(&cfg, 10_000)
    }

    #[test]
    fn holds_between_cadence_days() {
        let mut pid = controller(PidGains::default());
        assert!(pid.evaluate(0, 2_000).is_some());
        for day in 1..14 {
            assert!(pid.evaluate(day, 2_000).is_none());
        }
        assert!(pid.evaluate(14, 2_000).is_some());
        assert_eq!(pid.state.last_eval_day, Some(14));
    }

    #[test]
    fn at_target_with_no_history_emits_base() {
        let mut pid = controller(PidGains::default());
        let eval = pid.evaluate(0, 10_000).unwrap();
        assert_eq!(eval.rate, 109_589.0);
        assert_eq!(eval.saturated, None);
    }

    #[test]
    fn integral_is_clamped() {
        let mut pid = controller(PidGains { kp: 0.0, ki: 0.0, kd: 0.0 });
        for k in 0..20 {
            pid.evaluate(k * 14, 1);
        }
        assert_eq!(pid.state.integral, 5.0);
    }

    #[test]
    fn static_schedule_tapers_yearly() {
        let schedule = StaticSchedule::new(&SimConfig::default().emission);
        assert_eq!(schedule.rate_at(0), 109_589.0);
        assert!((schedule.rate_at(365) - 109_589.0 * 0.95).abs() < 1e-6);
        assert!(schedule.rate_at(1824) < schedule.rate_at(1000));
    }
}
