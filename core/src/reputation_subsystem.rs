//! Reputation subsystem: seasonal accrual and decay.
//!
//! A season closes every `season_days` (day 0 excluded). At each close,
//! every active operator:
//!   - completes one more season,
//!   - earns the increment if its uptime beat the bar,
//!   - decays by a fixed fraction,
//!   - is capped at the maximum score.
//!
//! Tombstoned operators keep whatever reputation they had at exit.

use crate::{
    config::ReputationConfig,
    error::SimResult,
    event::SimEvent,
    operator::OperatorTable,
    rng::SubsystemRng,
    subsystem::{SimSubsystem, StepContext},
    types::{Day, OperatorId},
    world::World,
};

pub fn is_season_close(day: Day, cfg: &ReputationConfig) -> bool {
    day > 0 && day % cfg.season_days.max(1) == 0
}

/// Apply one season close to every active operator. Returns the mean
/// reputation of the active population afterwards.
pub fn close_season(ops: &mut OperatorTable, cfg: &ReputationConfig) -> f64 {
    let ids: Vec<OperatorId> = ops.active_ids().collect();
    if ids.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    for &id in &ids {
        ops.seasons[id] += 1;
        let mut score = ops.reputation[id];
        if ops.uptime[id] > cfg.uptime_bar {
            score += cfg.increment;
        }
        score = (score * (1.0 - cfg.decay)).min(cfg.max_score);
        ops.reputation[id] = score;
        total += score;
    }
    total / ids.len() as f64
}

#[derive(Default)]
pub struct ReputationSubsystem;

impl ReputationSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for ReputationSubsystem {
    fn name(&self) -> &'static str {
        "reputation"
    }

    fn update(
        &mut self,
        ctx: &StepContext<'_>,
        world: &mut World,
        _rng: &mut SubsystemRng,
    ) -> SimResult<()> {
        let cfg = &ctx.config.reputation;
        if !is_season_close(ctx.day, cfg) || world.operators.active_count() == 0 {
            return Ok(());
        }
        let mean_reputation = close_season(&mut world.operators, cfg);
        let active = world.operators.active_count();
        world.emit(SimEvent::SeasonClosed {
            day: ctx.day,
            active,
            mean_reputation,
        });
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
