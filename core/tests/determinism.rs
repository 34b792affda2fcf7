//! One seed, one table.
//!
//! Two runs with the same (seed, scenario, policy, gains) must produce
//! byte-identical record tables. Any divergence means some stage draws
//! randomness from outside its own stream.

use meshnet_core::{
    config::SimConfig,
    emission_subsystem::PolicyKind,
    engine::run_simulation,
    plan::{RunPlan, RunSpec},
    scenario::by_name,
    table::write_rows,
};

const DAYS: u64 = 400;

fn table_bytes(scenario: &str, policy: PolicyKind, seed: u64) -> Vec<u8> {
    let config = SimConfig::default_test(DAYS);
    let (_, scenario) = by_name(scenario).unwrap();
    let out = run_simulation(&config, &scenario, policy, seed).expect("run");
    let mut buf = Vec::new();
    write_rows(&mut buf, &out.records).unwrap();
    buf
}

#[test]
fn same_seed_produces_identical_tables() {
    for policy in PolicyKind::ALL {
        let a = table_bytes("bear", policy, 0xDEAD_BEEF);
        let b = table_bytes("bear", policy, 0xDEAD_BEEF);
        assert_eq!(a.len(), b.len());
        assert!(a == b, "{} tables diverged for identical seeds", policy.name());
    }
}

#[test]
fn different_seeds_produce_different_tables() {
    let a = table_bytes("bull", PolicyKind::Pid, 42);
    let b = table_bytes("bull", PolicyKind::Pid, 99);
    assert_ne!(a, b, "different seeds produced identical tables; seed is not being used");
}

#[test]
fn parallel_plan_matches_sequential_runs() {
    let config = SimConfig::default_test(120);
    let mut plan = RunPlan::new("determinism");
    let mut expected = Vec::new();
    for name in ["bull", "bear", "competitor", "regulatory"] {
        let (idx, scenario) = by_name(name).unwrap();
        for seed in [7, 8] {
            let out = run_simulation(&config, &scenario, PolicyKind::Pid, seed).unwrap();
            expected.push(out.records);
            plan.push(RunSpec::new(idx, scenario.clone(), PolicyKind::Pid, seed));
        }
    }
    let actual = plan.execute(&config, |_, out| Ok(out.records)).unwrap();
    assert_eq!(actual, expected);
}

#[test]
fn records_carry_run_identity() {
    let config = SimConfig::default_test(10);
    let (_, bear) = by_name("bear").unwrap();
    let out = run_simulation(&config, &bear, PolicyKind::Static, 5).unwrap();
    assert_eq!(out.run_id, "bear_static");
    assert_eq!(out.records.len(), 10);
    for (day, r) in out.records.iter().enumerate() {
        assert_eq!(r.day, day as u64);
        assert_eq!(r.seed, 5);
        assert_eq!(r.run_id, "bear_static");
    }
}
