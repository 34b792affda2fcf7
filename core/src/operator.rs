//! Operator population: an arena of agents with stable ids.
//!
//! RULE: Operators are never removed. Exit, slashing to zero stake and
//! poaching deactivate in place (tombstone) so identity, stake and
//! reputation survive for audit and governance analysis. A deactivated
//! operator is never reactivated.
//!
//! Storage is struct-of-arrays: one column per field, indexed by
//! `OperatorId`, plus an `active` bitmap with a running count.

use crate::{
    config::PopulationConfig,
    rng::SubsystemRng,
    types::OperatorId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    HighCommitment,
    Casual,
    Mercenary,
}

/// Behavioral parameters shared by every operator of an archetype.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchetypeProfile {
    /// Multiplier on opportunity cost below which the operator considers exit.
    pub exit_threshold: f64,
    pub price_sensitivity: f64,
    pub base_uptime: f64,
    pub fraud_prob: f64,
}

impl Archetype {
    pub const ALL: [Archetype; 3] = [Self::HighCommitment, Self::Casual, Self::Mercenary];

    pub fn profile(&self) -> ArchetypeProfile {
        match self {
            Self::HighCommitment => ArchetypeProfile {
                exit_threshold: 0.3,
                price_sensitivity: 0.2,
                base_uptime: 0.995,
                fraud_prob: 0.0,
            },
            Self::Casual => ArchetypeProfile {
                exit_threshold: 0.8,
                price_sensitivity: 0.6,
                base_uptime: 0.95,
                fraud_prob: 0.0,
            },
            Self::Mercenary => ArchetypeProfile {
                exit_threshold: 1.2,
                price_sensitivity: 0.9,
                base_uptime: 0.85,
                fraud_prob: 0.15,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::HighCommitment => "high_commitment",
            Self::Casual => "casual",
            Self::Mercenary => "mercenary",
        }
    }
}

/// A read-only copy of one operator's row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub archetype: Archetype,
    pub exit_threshold: f64,
    pub price_sensitivity: f64,
    pub uptime: f64,
    pub fraud_prob: f64,
    pub stake: u64,
    pub reputation: f64,
    pub active: bool,
    pub seasons: u32,
}

#[derive(Debug, Clone, Default)]
pub struct OperatorTable {
    pub(crate) archetype: Vec<Archetype>,
    pub(crate) exit_threshold: Vec<f64>,
    pub(crate) price_sensitivity: Vec<f64>,
    pub(crate) uptime: Vec<f64>,
    pub(crate) fraud_prob: Vec<f64>,
    pub(crate) stake: Vec<u64>,
    pub(crate) reputation: Vec<f64>,
    pub(crate) active: Vec<bool>,
    pub(crate) seasons: Vec<u32>,
    active_count: usize,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the initial population: fixed archetype shares in id order
    /// (high-commitment first), the remainder filled with casual operators.
    pub fn seed(n: usize, cfg: &PopulationConfig, rng: &mut SubsystemRng) -> Self {
        let mut table = Self::new();
        let [high, casual, merc] = cfg.seed_shares.map(|s| (n as f64 * s) as usize);
        let layout = [
            (Archetype::HighCommitment, high),
            (Archetype::Casual, casual),
            (Archetype::Mercenary, merc),
            (Archetype::Casual, n.saturating_sub(high + casual + merc)),
        ];
        for (archetype, count) in layout {
            for _ in 0..count {
                let p = archetype.profile();
                let uptime = (p.base_uptime + rng.normal(0.0, cfg.seed_uptime_std)).min(1.0);
                let stake = cfg.stake_min + rng.next_u64_below(cfg.stake_spread);
                table.push(archetype, p.exit_threshold, p.price_sensitivity, uptime, stake);
            }
        }
        table
    }

    /// A population with the given archetypes in id order, each at its
    /// archetype profile and the same stake.
    pub fn uniform(archetypes: &[Archetype], stake: u64) -> Self {
        let mut table = Self::new();
        for &archetype in archetypes {
            let p = archetype.profile();
            table.push(archetype, p.exit_threshold, p.price_sensitivity, p.base_uptime, stake);
        }
        table
    }

    /// Admit one new operator. Archetype is drawn from the entrant mix;
    /// behavioral parameters follow the archetype profile.
    pub fn admit(&mut self, cfg: &PopulationConfig, rng: &mut SubsystemRng) -> OperatorId {
        let archetype = Archetype::ALL[rng.weighted_index(&cfg.entrant_shares)];
        let p = archetype.profile();
        let (lo, hi) = cfg.entrant_price_sensitivity;
        let price_sensitivity = rng.uniform(lo, hi);
        let uptime = rng
            .normal(cfg.entrant_uptime_mean, cfg.entrant_uptime_std)
            .min(1.0);
        let stake = cfg.stake_min + rng.next_u64_below(cfg.stake_spread);
        self.push(archetype, p.exit_threshold, price_sensitivity, uptime, stake)
    }

    fn push(
        &mut self,
        archetype: Archetype,
        exit_threshold: f64,
        price_sensitivity: f64,
        uptime: f64,
        stake: u64,
    ) -> OperatorId {
        let id = self.archetype.len();
        self.archetype.push(archetype);
        self.exit_threshold.push(exit_threshold);
        self.price_sensitivity.push(price_sensitivity);
        self.uptime.push(uptime);
        self.fraud_prob.push(archetype.profile().fraud_prob);
        self.stake.push(stake);
        self.reputation.push(0.0);
        self.active.push(true);
        self.seasons.push(0);
        self.active_count += 1;
        id
    }

    /// Total operators ever created (active and tombstoned).
    pub fn len(&self) -> usize {
        self.archetype.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetype.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn is_active(&self, id: OperatorId) -> bool {
        self.active.get(id).copied().unwrap_or(false)
    }

    /// Tombstone an operator. Returns false if it was already inactive.
    pub fn deactivate(&mut self, id: OperatorId) -> bool {
        match self.active.get_mut(id) {
            Some(flag) if *flag => {
                *flag = false;
                self.active_count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Remove `fraction` of an operator's stake (rounded down).
    /// Returns the tokens removed.
    pub fn slash(&mut self, id: OperatorId, fraction: f64) -> u64 {
        let Some(stake) = self.stake.get_mut(id) else {
            return 0;
        };
        let amount = ((*stake as f64 * fraction) as u64).min(*stake);
        *stake -= amount;
        amount
    }

    pub fn active_ids(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(id, a)| a.then_some(id))
    }

    pub fn operator(&self, id: OperatorId) -> Option<Operator> {
        if id >= self.len() {
            return None;
        }
        Some(Operator {
            id,
            archetype: self.archetype[id],
            exit_threshold: self.exit_threshold[id],
            price_sensitivity: self.price_sensitivity[id],
            uptime: self.uptime[id],
            fraud_prob: self.fraud_prob[id],
            stake: self.stake[id],
            reputation: self.reputation[id],
            active: self.active[id],
            seasons: self.seasons[id],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Operator> + '_ {
        (0..self.len()).filter_map(|id| self.operator(id))
    }

    /// Force-deactivate up to `count` active operators that are not
    /// high-commitment, lowest id first. Returns how many were removed.
    pub fn poach(&mut self, count: usize) -> usize {
        let victims: Vec<OperatorId> = self
            .active_ids()
            .filter(|&id| self.archetype[id] != Archetype::HighCommitment)
            .take(count)
            .collect();
        for &id in &victims {
            self.deactivate(id);
        }
        victims.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn seeded(n: usize) -> OperatorTable {
        let cfg = SimConfig::default();
        let mut rng = SubsystemRng::new(42, 0);
        OperatorTable::seed(n, &cfg.population, &mut rng)
    }

    #[test]
    fn seed_population_follows_archetype_shares() {
        let table = seeded(2_000);
        assert_eq!(table.len(), 2_000);
        assert_eq!(table.active_count(), 2_000);
        let count = |a: Archetype| table.iter().filter(|o| o.archetype == a).count();
        assert_eq!(count(Archetype::HighCommitment), 800);
        assert_eq!(count(Archetype::Mercenary), 300);
        assert_eq!(count(Archetype::Casual), 900);
        for op in table.iter() {
            assert!(op.uptime <= 1.0);
            assert!((10_000..30_000).contains(&op.stake));
            assert_eq!(op.fraud_prob > 0.0, op.archetype == Archetype::Mercenary);
        }
    }

    #[test]
    fn deactivation_is_a_tombstone() {
        let mut table = seeded(10);
        assert!(table.deactivate(3));
        assert!(!table.deactivate(3));
        assert_eq!(table.len(), 10);
        assert_eq!(table.active_count(), 9);
        let op = table.operator(3).unwrap();
        assert!(!op.active);
        assert!(op.stake > 0);
        assert!(!table.active_ids().any(|id| id == 3));
    }

    #[test]
    fn poach_spares_high_commitment() {
        // 100 operators: ids 0..40 high-commitment, the rest casual/mercenary.
        let mut table = seeded(100);
        let removed = table.poach(50);
        assert_eq!(removed, 50);
        assert_eq!(table.active_count(), 50);
        assert!((0..40).all(|id| table.is_active(id)));
        assert!((40..90).all(|id| !table.is_active(id)));
        assert!((90..100).all(|id| table.is_active(id)));
    }

    #[test]
    fn poach_is_bounded_by_eligible_operators() {
        let mut table = seeded(100);
        assert_eq!(table.poach(500), 60);
        assert_eq!(table.active_count(), 40);
    }

    #[test]
    fn slash_rounds_down_and_never_goes_negative() {
        let mut table = seeded(1);
        table.stake[0] = 10_005;
        assert_eq!(table.slash(0, 0.10), 1_000);
        assert_eq!(table.stake[0], 9_005);
        assert_eq!(table.slash(0, 1.0), 9_005);
        assert_eq!(table.stake[0], 0);
        assert_eq!(table.slash(0, 0.5), 0);
        assert_eq!(table.slash(99, 0.5), 0);
    }

    #[test]
    fn uniform_population_keeps_archetype_order() {
        let table = OperatorTable::uniform(&[Archetype::Mercenary, Archetype::Casual], 20_000);
        assert_eq!(table.active_count(), 2);
        let ops: Vec<Operator> = table.iter().collect();
        assert_eq!(ops[0].archetype, Archetype::Mercenary);
        assert_eq!(ops[1].uptime, Archetype::Casual.profile().base_uptime);
        assert!(ops.iter().all(|o| o.stake == 20_000));
    }

    #[test]
    fn admitted_ids_are_monotonic() {
        let cfg = SimConfig::default();
        let mut rng = SubsystemRng::new(9, 4);
        let mut table = seeded(5);
        let a = table.admit(&cfg.population, &mut rng);
        let b = table.admit(&cfg.population, &mut rng);
        assert_eq!((a, b), (5, 6));
        assert_eq!(table.active_count(), 7);
    }
}
