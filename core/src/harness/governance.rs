//! Governance voting-power analysis.
//!
//! Analytical: takes the active operators at the end of one run and
//! computes how voting power would concentrate under several
//! reputation-weighted formulas. Nothing here feeds back into the
//! simulation.

use super::scenario_seed;
use crate::{
    config::SimConfig,
    emission_subsystem::PolicyKind,
    engine::run_simulation,
    error::SimResult,
    operator::OperatorTable,
    scenario::ScenarioConfig,
    table::CsvRow,
};
use std::{
    fmt,
    io::{self, Write},
};

pub const EXPONENTS: [f64; 5] = [0.5, 1.0, 1.5, 2.0, 3.0];

/// Fraction of total supply held by the hypothetical whale.
pub const WHALE_SUPPLY_SHARE: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VotingFormula {
    /// `stake · (1 + R)^p`
    Power(f64),
    /// `stake · (1 + ln(1 + R))`
    Log,
}

impl VotingFormula {
    pub fn all() -> Vec<VotingFormula> {
        EXPONENTS
            .iter()
            .map(|&p| VotingFormula::Power(p))
            .chain(std::iter::once(VotingFormula::Log))
            .collect()
    }

    pub fn power(&self, stake: f64, reputation: f64) -> f64 {
        match *self {
            Self::Power(p) => stake * (1.0 + reputation).powf(p),
            Self::Log => stake * (1.0 + (1.0 + reputation).ln()),
        }
    }
}

impl fmt::Display for VotingFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Power(p) => write!(f, "{p}"),
            Self::Log => write!(f, "log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GovernanceRow {
    pub formula:        VotingFormula,
    pub voters:         usize,
    pub gini:           f64,
    pub hhi:            f64,
    pub top1_share:     f64,
    pub top10_share:    f64,
    pub whale_share:    f64,
}

impl GovernanceRow {
    /// Whether concentration is at or below the calibrated targets.
    /// `None` when no target is configured.
    pub fn meets_targets(&self, target_gini: Option<f64>, target_hhi: Option<f64>) -> Option<bool> {
        if target_gini.is_none() && target_hhi.is_none() {
            return None;
        }
        Some(target_gini.map_or(true, |t| self.gini <= t) && target_hhi.map_or(true, |t| self.hhi <= t))
    }
}

impl CsvRow for GovernanceRow {
    const HEADER: &'static [&'static str] = &[
        "exponent", "n_active", "gini", "hhi", "top1_pct_share", "top10_pct_share",
        "whale_20pct_power_share",
    ];

    fn write_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{},{},{:.4},{:.6},{:.2},{:.2},{:.2}",
            self.formula,
            self.voters,
            self.gini,
            self.hhi,
            self.top1_share * 100.0,
            self.top10_share * 100.0,
            self.whale_share * 100.0,
        )
    }
}

/// Gini coefficient of a set of shares summing to one.
pub fn gini(shares: &[f64]) -> f64 {
    if shares.is_empty() {
        return 0.0;
    }
    let mut sorted = shares.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    let mut running = 0.0;
    let cumulative_sum: f64 = sorted
        .iter()
        .map(|s| {
            running += s;
            running
        })
        .sum();
    1.0 - 2.0 * cumulative_sum / n + 1.0 / n
}

pub fn hhi(shares: &[f64]) -> f64 {
    shares.iter().map(|s| s * s).sum()
}

/// Combined share of the largest `ceil(fraction · n)` holders (at least one).
pub fn top_share(shares: &[f64], fraction: f64) -> f64 {
    if shares.is_empty() {
        return 0.0;
    }
    let mut sorted = shares.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let count = ((sorted.len() as f64 * fraction).ceil() as usize).max(1);
    sorted.iter().take(count).sum()
}

/// Concentration metrics for one formula over `(stake, reputation)` pairs.
/// `None` when there are no voters or no voting power at all.
pub fn measure(voters: &[(f64, f64)], formula: VotingFormula, total_supply: f64) -> Option<GovernanceRow> {
    let powers: Vec<f64> = voters.iter().map(|&(stake, rep)| formula.power(stake, rep)).collect();
    let total: f64 = powers.iter().sum();
    if powers.is_empty() || total <= 0.0 {
        return None;
    }
    let shares: Vec<f64> = powers.iter().map(|p| p / total).collect();
    let whale = formula.power((total_supply * WHALE_SUPPLY_SHARE).floor(), 0.0);
    Some(GovernanceRow {
        formula,
        voters:      shares.len(),
        gini:        gini(&shares),
        hhi:         hhi(&shares),
        top1_share:  top_share(&shares, 0.01),
        top10_share: top_share(&shares, 0.10),
        whale_share: whale / (total + whale),
    })
}

/// Active operators as `(stake, reputation)` pairs.
pub fn voters(operators: &OperatorTable) -> Vec<(f64, f64)> {
    operators
        .iter()
        .filter(|op| op.active)
        .map(|op| (op.stake as f64, op.reputation))
        .collect()
}

pub fn analyze(operators: &OperatorTable, total_supply: f64) -> Vec<GovernanceRow> {
    let voters = voters(operators);
    VotingFormula::all()
        .into_iter()
        .filter_map(|formula| measure(&voters, formula, total_supply))
        .collect()
}

/// Run the scenario under PID and analyze the final population.
pub fn run(config: &SimConfig, scenario: &(usize, ScenarioConfig), base_seed: u64) -> SimResult<Vec<GovernanceRow>> {
    let (idx, scenario) = scenario;
    let seed = scenario_seed(base_seed, *idx);
    let output = run_simulation(config, scenario, PolicyKind::Pid, seed)?;
    log::info!(
        "governance analysis on {} seed={}: {} active operators",
        scenario.name,
        seed,
        output.operators.active_count()
    );
    Ok(analyze(&output.operators, config.total_supply))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_compare_gini_and_hhi() {
        let row = measure(&[(100.0, 0.0), (300.0, 1.0)], VotingFormula::Power(1.0), 1_000.0).unwrap();
        assert_eq!(row.meets_targets(None, None), None);
        assert_eq!(row.meets_targets(Some(row.gini), None), Some(true));
        assert_eq!(row.meets_targets(Some(row.gini - 0.01), None), Some(false));
        assert_eq!(row.meets_targets(Some(1.0), Some(row.hhi - 0.01)), Some(false));
        assert_eq!(row.meets_targets(Some(1.0), Some(1.0)), Some(true));
    }

    #[test]
    fn equal_shares_have_zero_gini() {
        let shares = vec![0.25; 4];
        assert!(gini(&shares).abs() < 1e-12);
        assert!((hhi(&shares) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn single_holder_dominates() {
        let shares = [1.0, 0.0, 0.0, 0.0];
        assert!((gini(&shares) - 0.75).abs() < 1e-12);
        assert_eq!(hhi(&shares), 1.0);
        assert_eq!(top_share(&shares, 0.01), 1.0);
    }

    #[test]
    fn top_share_takes_at_least_one() {
        let shares = [0.5, 0.3, 0.2];
        assert_eq!(top_share(&shares, 0.01), 0.5);
        assert!((top_share(&shares, 0.5) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn reputation_dilutes_whale() {
        let voters = vec![(10_000.0, 4.0); 100];
        let linear = measure(&voters, VotingFormula::Power(1.0), 1_000_000_000.0).unwrap();
        let cubic = measure(&voters, VotingFormula::Power(3.0), 1_000_000_000.0).unwrap();
        assert!(cubic.whale_share < linear.whale_share);
        // 200M whale vs 100 × 10k × 5 = 5M.
        assert!((linear.whale_share - 200.0 / 205.0).abs() < 1e-12);
    }

    #[test]
    fn log_formula_at_zero_reputation_is_stake() {
        assert_eq!(VotingFormula::Log.power(5_000.0, 0.0), 5_000.0);
        assert_eq!(VotingFormula::Log.to_string(), "log");
        assert_eq!(VotingFormula::Power(1.5).to_string(), "1.5");
    }

    #[test]
    fn no_voters_no_row() {
        assert!(measure(&[], VotingFormula::Log, 1.0).is_none());
    }
}
