//! meshnet-runner: headless simulation and experiment runner for MeshNet.
//!
//! Usage:
//!   meshnet-runner core --seed 42 --scenarios bull,bear
//!   meshnet-runner ensemble --seeds 30 --base-seed 1000
//!   meshnet-runner summary --ensemble-table results/multi_seed_results.csv
//!   meshnet-runner wash-trading
//!
//! Every mode writes its table(s) under `--results-dir` and prints a
//! short summary. Set RUST_LOG=info for per-run progress.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use meshnet_core::{
    config::{SimConfig, DEFAULT_SEED},
    emission_subsystem::PolicyKind,
    harness::{
        self, baseline, consistency, ensemble, files, governance, saturation,
        sweep::{self, SweepParam},
        wash_trading::{self, WashTradingConfig, WASH_TRADING_BASE_SEED, WASH_TRADING_RUNS},
        ENSEMBLE_BASE_SEED, ENSEMBLE_SEEDS,
    },
    scenario::{self, ScenarioConfig},
    store::SimStore,
    table::{self, CsvRow},
    types::Day,
};
use std::{
    path::PathBuf,
    process::ExitCode,
    sync::Mutex,
};

#[derive(Parser)]
#[command(name = "meshnet-runner")]
#[command(about = "MeshNet discrete-time agent-based emission simulation")]
#[command(version)]
struct Cli {
    /// Experiment to run
    #[arg(value_enum, default_value_t = Mode::Core)]
    mode: Mode,

    /// Base seed for single-seed modes (scenario i runs with seed + i)
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Scenario subset, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    scenarios: Vec<String>,

    /// Run the PID policy only
    #[arg(long, conflicts_with = "static_only")]
    pid_only: bool,

    /// Run the static schedule only
    #[arg(long)]
    static_only: bool,

    /// Output path for the primary table of the mode (ensemble uses --ensemble-table)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for result tables
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,

    /// Calibration parameters (JSON); missing or malformed falls back to defaults
    #[arg(long, default_value = "calibration_params.json")]
    calibration: PathBuf,

    /// Persist core runs to this SQLite database
    #[arg(long)]
    db: Option<String>,

    /// Number of seeds for multi-seed modes [default: 30, wash-trading 100]
    #[arg(long)]
    seeds: Option<usize>,

    /// First seed for multi-seed modes [default: 1000, wash-trading 5000]
    #[arg(long)]
    base_seed: Option<u64>,

    /// Ensemble table written by `ensemble` and read by `summary` and
    /// `saturation` [default: <results-dir>/multi_seed_results.csv]
    #[arg(long)]
    ensemble_table: Option<PathBuf>,

    /// Override the simulated horizon in days
    #[arg(long)]
    timesteps: Option<Day>,

    /// Parameter tested by the consistency mode (kp, ki, kd, slash_downtime, slash_fraud, cadence)
    #[arg(long, default_value = "ki")]
    param: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Core,
    Sensitivity,
    Slashing,
    Ensemble,
    Interaction,
    Cadence,
    Consistency,
    Saturation,
    Governance,
    Summary,
    WashTrading,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = SimConfig::load(&cli.calibration);
    if let Some(days) = cli.timesteps {
        anyhow::ensure!(days > 0, "--timesteps must be at least 1");
        config.timesteps = days;
    }
    let policies = policies(cli);
    log::info!("mode {:?}, horizon {} days", cli.mode, config.timesteps);

    match cli.mode {
        Mode::Core => run_core(cli, &config, &policies),
        Mode::Sensitivity => {
            let rows = sweep::run_gains(&config, &selected(cli, &[])?, cli.seed)?;
            let path = write(cli, files::SENSITIVITY, &rows)?;
            println!("=== GAIN SENSITIVITY ===");
            for r in &rows {
                println!(
                    "  {:<3} {:>5.2}  {:<12} N={:>6}  dev={:.3}  E_range={:.0}",
                    r.param.name(), r.value, r.scenario, r.final_active, r.deviation, r.emission_range
                );
            }
            println!("Saved: {} ({} rows)", path.display(), rows.len());
            Ok(())
        }
        Mode::Slashing => {
            let rows = sweep::run_slashing(&config, &selected(cli, &[])?, cli.seed)?;
            let path = write(cli, files::SLASHING, &rows)?;
            println!("=== SLASHING SENSITIVITY ===");
            for r in &rows {
                println!(
                    "  {:<14} {:>4.2}  {:<12} N={:>6}  C_change={:+.1}%  slashed={}",
                    r.param.name(), r.value, r.scenario, r.final_active, r.circulating_change_pct, r.slashed_total
                );
            }
            println!("Saved: {} ({} rows)", path.display(), rows.len());
            Ok(())
        }
        Mode::Ensemble => run_ensemble(cli, &config, &policies),
        Mode::Interaction => {
            let scenarios = selected(cli, &[])?;
            let rows = sweep::run_interaction(&config, &scenarios, cli.seed)?;
            let path = write(cli, files::INTERACTION, &rows)?;
            println!("=== Ki × Kd INTERACTION ===");
            for (_, s) in &scenarios {
                for (kd, monotonic) in sweep::ki_ordering_by_kd(&rows, &s.name) {
                    println!(
                        "  {:<12} Kd={:.2}: deviation {} in Ki",
                        s.name,
                        kd,
                        if monotonic { "non-decreasing" } else { "non-monotonic" }
                    );
                }
            }
            println!("Saved: {} ({} rows)", path.display(), rows.len());
            Ok(())
        }
        Mode::Cadence => {
            let rows = sweep::run_cadence(&config, &selected(cli, &[])?, cli.seed)?;
            let path = write(cli, files::CADENCE, &rows)?;
            println!("=== CADENCE SENSITIVITY ===");
            for r in &rows {
                println!(
                    "  {:>2}d {:<12} N={:>6}  dev={:.3}  adjustments={:>4}  response={}",
                    r.cadence_days,
                    r.scenario,
                    r.final_active,
                    r.deviation,
                    r.adjustments,
                    table::opt(r.response_days),
                );
            }
            println!("Saved: {} ({} rows)", path.display(), rows.len());
            Ok(())
        }
        Mode::Consistency => run_consistency(cli, &config),
        Mode::Saturation => run_saturation(cli, &config),
        Mode::Governance => {
            let scenario = single_scenario(cli, "bull")?;
            let rows = governance::run(&config, &scenario, cli.seed)?;
            let path = write(cli, files::GOVERNANCE, &rows)?;
            println!("=== GOVERNANCE VOTING POWER ({}) ===", scenario.1.name);
            for r in &rows {
                let target = match r.meets_targets(config.benchmarks.target_gini, config.benchmarks.target_hhi) {
                    Some(true) => "  within target",
                    Some(false) => "  above target",
                    None => "",
                };
                println!(
                    "  p={:<4} Gini={:.4}  HHI={:.6}  top1%={:.1}%  whale(20%, R=0)={:.1}%{}",
                    r.formula.to_string(),
                    r.gini,
                    r.hhi,
                    r.top1_share * 100.0,
                    r.whale_share * 100.0,
                    target
                );
            }
            if let Some(gini) = config.benchmarks.target_gini {
                println!("  calibrated target Gini: {gini:.4}");
            }
            if let Some(hhi) = config.benchmarks.target_hhi {
                println!("  calibrated target HHI:  {hhi:.6}");
            }
            if let Some(best) = rows
                .iter()
                .filter(|r| matches!(r.formula, governance::VotingFormula::Power(_)))
                .min_by(|a, b| a.whale_share.total_cmp(&b.whale_share))
            {
                println!("  Best whale resistance: p={}", best.formula);
            }
            println!("Saved: {} ({} rows)", path.display(), rows.len());
            Ok(())
        }
        Mode::Summary => run_summary(cli, &config),
        Mode::WashTrading => run_wash_trading(cli),
    }
}

fn policies(cli: &Cli) -> Vec<PolicyKind> {
    match (cli.pid_only, cli.static_only) {
        (true, _) => vec![PolicyKind::Pid],
        (_, true) => vec![PolicyKind::Static],
        _ => PolicyKind::ALL.to_vec(),
    }
}

/// `--scenarios` if given, else `default` (empty default = whole catalog).
fn selected(cli: &Cli, default: &[&str]) -> Result<Vec<(usize, ScenarioConfig)>> {
    let names: Vec<String> = if cli.scenarios.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        cli.scenarios.clone()
    };
    Ok(harness::scenarios(&names)?)
}

fn single_scenario(cli: &Cli, default: &str) -> Result<(usize, ScenarioConfig)> {
    let name = cli.scenarios.first().map_or(default, String::as_str);
    Ok(scenario::by_name(name)?)
}

/// Seeds for a multi-seed mode: `--seeds`/`--base-seed`, else the mode's defaults.
fn seed_set(cli: &Cli, runs: usize, base: u64) -> Vec<u64> {
    harness::seed_range(cli.base_seed.unwrap_or(base), cli.seeds.unwrap_or(runs))
}

fn ensemble_table(cli: &Cli) -> PathBuf {
    cli.ensemble_table
        .clone()
        .unwrap_or_else(|| cli.results_dir.join(files::ENSEMBLE))
}

fn output_path(cli: &Cli, file: &str) -> PathBuf {
    cli.output.clone().unwrap_or_else(|| cli.results_dir.join(file))
}

fn write<R: CsvRow>(cli: &Cli, file: &str, rows: &[R]) -> Result<PathBuf> {
    let path = output_path(cli, file);
    table::write_csv(&path, rows)?;
    Ok(path)
}

fn run_core(cli: &Cli, config: &SimConfig, policies: &[PolicyKind]) -> Result<()> {
    let scenarios = selected(cli, &[])?;
    println!("{}", "=".repeat(60));
    println!("MESHNET SIMULATION");
    println!(
        "  scenarios: {} × {} policies = {} runs",
        scenarios.len(),
        policies.len(),
        scenarios.len() * policies.len()
    );
    println!("  days:      {}", config.timesteps);
    println!("  seed:      {}", cli.seed);
    println!("{}", "=".repeat(60));

    let report = match &cli.db {
        Some(db) => {
            let store = SimStore::open(db).with_context(|| format!("opening {db}"))?;
            store.migrate()?;
            let store = Mutex::new(store);
            baseline::run_with_sink(config, &scenarios, policies, cli.seed, |out| {
                let store = store
                    .lock()
                    .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
                store.save_run(out)?;
                Ok(())
            })?
        }
        None => baseline::run(config, &scenarios, policies, cli.seed)?,
    };

    for r in &report.finals {
        println!(
            "  {:<12} {:<6} seed={:<4} N={:>6}  P=${:.4}  C={:.0}  T={:.0}",
            r.scenario, r.policy.name(), r.seed, r.active, r.price, r.circulating, r.treasury
        );
    }

    let path = output_path(cli, files::SIMULATION);
    table::write_csv(&path, &report.records)?;
    println!("\nSaved: {} ({} rows)", path.display(), report.records.len());

    println!("\n── Quick Validation ──");
    let target = config.target_population;
    for v in &report.validation {
        let fmt = |o: Option<baseline::PolicyOutcome>| match o {
            Some(o) => format!("N={:>6} ({:.1}% off target)", o.final_active, o.deviation * 100.0),
            None => "not run".to_string(),
        };
        let verdict = match v.pid_better() {
            Some(true) => "  PID closer to target",
            Some(false) => "  static closer to target",
            None => "",
        };
        println!("  {:<12}: PID {}, static {}{}", v.scenario, fmt(v.pid), fmt(v.fixed), verdict);
    }
    println!("  target N = {target}");
    if !report.burn_mint.is_empty() {
        println!("  bull/pid burn-mint ratio vs calibrated curve:");
        for p in &report.burn_mint {
            println!(
                "    month {:>2}: simulated={:.4}  benchmark={:.4}",
                p.month, p.simulated, p.benchmark
            );
        }
    }
    if let Some(db) = &cli.db {
        println!("  runs persisted to {db}");
    }
    Ok(())
}

fn print_summary(summary: &[ensemble::EnsembleSummary]) {
    println!(
        "  {:<12} {:<6} {:>4} {:>9} {:>8} {:>8} {:>8} {:>6} {:>8} {:>6}",
        "scenario", "policy", "runs", "N_mean", "N_std", "N_p5", "N_p95", "N_cv", "P_mean", "P_cv"
    );
    for s in summary {
        println!(
            "  {:<12} {:<6} {:>4} {:>9.0} {:>8.0} {:>8.0} {:>8.0} {:>6.3} {:>8.4} {:>6.3}",
            s.scenario, s.policy.name(), s.runs, s.n_mean, s.n_std, s.n_p5, s.n_p95, s.n_cv, s.p_mean, s.p_cv
        );
    }
}

fn print_divergence(rows: &[ensemble::EnsembleRow], target: u64) {
    let mut scenarios: Vec<&str> = Vec::new();
    for r in rows {
        if !scenarios.contains(&r.scenario.as_str()) {
            scenarios.push(&r.scenario);
        }
    }
    for s in scenarios {
        let pid = ensemble::mean_deviation(rows, s, PolicyKind::Pid, target);
        let fixed = ensemble::mean_deviation(rows, s, PolicyKind::Static, target);
        if let (Some(pid), Some(fixed)) = (pid, fixed) {
            println!(
                "  {:<12} mean deviation: PID {:.1}%  static {:.1}%",
                s,
                pid * 100.0,
                fixed * 100.0
            );
        }
    }
}

fn run_ensemble(cli: &Cli, config: &SimConfig, policies: &[PolicyKind]) -> Result<()> {
    let scenarios = selected(cli, &[])?;
    let seeds = seed_set(cli, ENSEMBLE_SEEDS, ENSEMBLE_BASE_SEED);
    let rows = ensemble::run(config, &scenarios, policies, &seeds)?;
    let path = ensemble_table(cli);
    table::write_csv(&path, &rows)?;
    let summary = ensemble::summarize(&rows);
    let summary_path = cli.results_dir.join(files::ENSEMBLE_SUMMARY);
    table::write_csv(&summary_path, &summary)?;

    println!("=== MULTI-SEED ENSEMBLE ({} seeds from {}) ===", seeds.len(), seeds.first().copied().unwrap_or_default());
    print_summary(&summary);
    print_divergence(&rows, config.target_population);
    println!("Saved: {} ({} rows), {}", path.display(), rows.len(), summary_path.display());
    Ok(())
}

fn run_summary(cli: &Cli, config: &SimConfig) -> Result<()> {
    let path = ensemble_table(cli);
    let rows: Vec<ensemble::EnsembleRow> = table::read_csv(&path, "ensemble")?;
    println!("=== ENSEMBLE SUMMARY ({}) ===", path.display());
    print_summary(&ensemble::summarize(&rows));
    print_divergence(&rows, config.target_population);
    Ok(())
}

fn run_consistency(cli: &Cli, config: &SimConfig) -> Result<()> {
    let param = SweepParam::from_name(&cli.param)
        .with_context(|| format!("unknown parameter '{}'", cli.param))?;
    let scenario = single_scenario(cli, "bear")?;
    let seeds = seed_set(cli, ENSEMBLE_SEEDS, ENSEMBLE_BASE_SEED);
    let values = param.default_grid();
    let (runs, report) = consistency::run(config, param, &values, &scenario, &seeds)?;

    let path = write(cli, files::CONSISTENCY, &runs)?;
    let report_path = cli.results_dir.join(files::CONSISTENCY_REPORT);
    consistency::write_report(&report_path, &report)?;

    println!(
        "=== RANK CONSISTENCY: {} in {} ({} seeds) ===",
        report.param, report.scenario, report.seeds
    );
    for v in &report.values {
        println!(
            "  {}={:<5} mean N={:>8.0}  modal rank={}  agreement={:.2}",
            report.param,
            v.value,
            v.mean_final_active,
            table::opt(v.modal_rank),
            v.agreement
        );
    }
    println!("  min agreement {:.2} → {:?}", report.min_agreement, report.verdict);
    println!("Saved: {}, {}", path.display(), report_path.display());
    Ok(())
}

fn run_saturation(cli: &Cli, config: &SimConfig) -> Result<()> {
    let scenario = single_scenario(cli, "bear")?;
    let seeds = seed_set(cli, ENSEMBLE_SEEDS, ENSEMBLE_BASE_SEED);
    let mut report = saturation::run(config, &scenario, &seeds)?;

    let ensemble_path = ensemble_table(cli);
    if ensemble_path.exists() {
        let rows: Vec<ensemble::EnsembleRow> = table::read_csv(&ensemble_path, "ensemble")?;
        report.cross_check_against(&rows);
    }

    let path = output_path(cli, files::SATURATION);
    saturation::write_report(&path, &report)?;

    println!("=== PID BOUND SATURATION: {} ({} seeds) ===", report.scenario, report.seeds);
    for s in &report.per_seed {
        println!(
            "  seed={:<5} E=[{:.0}, {:.0}] ({:.2}x–{:.2}x) floor={} ceiling={} N={}",
            s.seed, s.min_emission, s.max_emission, s.min_multiple, s.max_multiple,
            s.floor_hits, s.ceiling_hits, s.final_active
        );
    }
    println!(
        "  verdict: {:?}; authority used {:.0}%; floor seeds {:?}; ceiling seeds {:?}",
        report.verdict, report.authority_used_pct, report.seeds_with_floor, report.seeds_with_ceiling
    );
    if let Some(check) = &report.cross_check {
        println!(
            "  ensemble cross-check: {} matching, {} mismatching",
            check.matching, check.mismatching
        );
    }
    println!("Saved: {}", path.display());
    Ok(())
}

fn run_wash_trading(cli: &Cli) -> Result<()> {
    let cfg = WashTradingConfig::default();
    let seeds = seed_set(cli, WASH_TRADING_RUNS, WASH_TRADING_BASE_SEED);
    let rows = wash_trading::run(&cfg, &seeds);
    let path = write(cli, files::WASH_TRADING, &rows)?;

    println!(
        "=== WASH TRADING MONTE CARLO ({} runs, {} nodes, {} days) ===",
        seeds.len(),
        cfg.nodes,
        cfg.days
    );
    let mercenaries = (cfg.nodes as f64 * cfg.mercenary_fraction) as usize;
    for s in wash_trading::summarize(&rows) {
        println!("  {}:", if s.detection { "WITH proof-of-coverage" } else { "WITHOUT proof-of-coverage" });
        println!(
            "    fraud rate: median={:.2}%  mean={:.2}%  IQR=[{:.2}%, {:.2}%]  range=[{:.2}%, {:.2}%]",
            s.fraud_median, s.fraud_mean, s.fraud_p25, s.fraud_p75, s.fraud_min, s.fraud_max
        );
        println!("    slashed: {:.0} tokens (mean)", s.slashed_mean);
        println!("    honest yield impact: {:+.2}%", s.yield_impact_mean);
        println!("    surviving mercenaries: {:.0}/{}", s.surviving_mercs_mean, mercenaries);
    }
    println!("Saved: {} ({} rows)", path.display(), rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensemble_table_is_shared_by_producer_and_readers() {
        let cli = Cli::try_parse_from(["meshnet-runner", "saturation", "--results-dir", "out"]).unwrap();
        assert_eq!(ensemble_table(&cli), PathBuf::from("out").join(files::ENSEMBLE));

        let cli = Cli::try_parse_from(["meshnet-runner", "ensemble", "--ensemble-table", "runs/e.csv"]).unwrap();
        assert_eq!(ensemble_table(&cli), PathBuf::from("runs/e.csv"));
    }

    #[test]
    fn seed_defaults_depend_on_mode() {
        let cli = Cli::try_parse_from(["meshnet-runner", "wash-trading"]).unwrap();
        assert_eq!(cli.mode, Mode::WashTrading);
        let seeds = seed_set(&cli, WASH_TRADING_RUNS, WASH_TRADING_BASE_SEED);
        assert_eq!((seeds.len(), seeds[0]), (100, 5_000));

        let cli = Cli::try_parse_from(["meshnet-runner", "ensemble", "--seeds", "3"]).unwrap();
        assert_eq!(seed_set(&cli, ENSEMBLE_SEEDS, ENSEMBLE_BASE_SEED), vec![1_000, 1_001, 1_002]);
    }
}
