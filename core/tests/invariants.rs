//! State invariants that must hold on every day of every run.

use meshnet_core::{
    config::{SimConfig, TIMESTEPS},
    emission_subsystem::PolicyKind,
    engine::run_simulation,
    event::SimEvent,
    scenario::catalog,
    types::DAYS_PER_YEAR,
};

// Long enough to pass every shock onset (day 360 and day 540).
const DAYS: u64 = 600;

fn assert_bounded_over(days: u64) {
    let config = SimConfig::default_test(days);
    for (i, scenario) in catalog().iter().enumerate() {
        for policy in PolicyKind::ALL {
            let out = run_simulation(&config, scenario, policy, 42 + i as u64).unwrap();
            assert_eq!(out.records.len(), days as usize);
            for r in &out.records {
                let ctx = format!("{} day {}", out.run_id, r.day);
                assert!(r.circulating >= 0.0 && r.circulating <= config.total_supply, "C out of range: {ctx}");
                assert!(r.treasury >= 0.0, "T negative: {ctx}");
                assert!(r.active >= 1, "N below 1: {ctx}");
                assert!(r.price > 0.0, "P not positive: {ctx}");
                assert!(r.burn >= 0.0, "B negative: {ctx}");
                match policy {
                    PolicyKind::Pid => assert!(
                        r.emission >= config.emission.floor && r.emission <= config.emission.ceiling,
                        "E outside controller bounds: {ctx} E={}",
                        r.emission
                    ),
                    PolicyKind::Static => assert!(
                        r.emission > 0.0 && r.emission <= config.emission.base_emission,
                        "E outside static range: {ctx} E={}",
                        r.emission
                    ),
                }
            }
            if policy == PolicyKind::Static {
                let taper = config.emission.static_annual_taper;
                for year in 1..=(days - 1) / DAYS_PER_YEAR {
                    let e = out.records[(year * DAYS_PER_YEAR) as usize].emission;
                    let expected = config.emission.base_emission * taper.powi(year as i32);
                    assert!((e - expected).abs() < 1e-6, "{} year {year}: E={e}", out.run_id);
                }
            }
        }
    }
}

#[test]
fn supply_population_price_and_emission_stay_bounded() {
    assert_bounded_over(DAYS);
}

#[test]
#[ignore = "full five-year horizon over every scenario and policy"]
fn invariants_hold_over_full_horizon() {
    let _ = env_logger::builder().is_test(true).try_init();
    assert_bounded_over(TIMESTEPS);
}

#[test]
fn slashed_total_is_monotonic() {
    let config = SimConfig::default_test(DAYS);
    let out = run_simulation(&config, &catalog()[1], PolicyKind::Pid, 43).unwrap();
    assert!(out.records.windows(2).all(|w| w[0].slashed_total <= w[1].slashed_total));
}

#[test]
fn static_schedule_tapers_continuously() {
    let config = SimConfig::default_test(DAYS);
    let out = run_simulation(&config, &catalog()[0], PolicyKind::Static, 1).unwrap();
    let base = config.emission.base_emission;
    assert_eq!(out.records[0].emission, base);
    assert!(out.records.windows(2).all(|w| w[1].emission < w[0].emission));
    assert!((out.records[365].emission - base * config.emission.static_annual_taper).abs() < 1e-6);
}

#[test]
fn shocks_fire_once_on_their_onset_day() {
    let config = SimConfig::default_test(DAYS);
    for scenario in catalog() {
        let out = run_simulation(&config, &scenario, PolicyKind::Pid, 3).unwrap();
        let fired: Vec<u64> = out
            .events
            .iter()
            .filter_map(|e| match e {
                SimEvent::ShockFired { day, .. } => Some(*day),
                _ => None,
            })
            .collect();
        match scenario.shock.onset_day() {
            Some(onset) => assert_eq!(fired, vec![onset], "{}", scenario.name),
            None => assert!(fired.is_empty(), "{}", scenario.name),
        }
    }
}

#[test]
fn competitor_poaching_removes_operators_once() {
    let config = SimConfig::default_test(DAYS);
    let competitor = &catalog()[2];
    let out = run_simulation(&config, competitor, PolicyKind::Pid, 44).unwrap();
    let poached: Vec<(u64, usize, usize)> = out
        .events
        .iter()
        .filter_map(|e| match e {
            SimEvent::OperatorsPoached { day, poached, active_before } => Some((*day, *poached, *active_before)),
            _ => None,
        })
        .collect();
    assert_eq!(poached.len(), 1);
    let (day, n, before) = poached[0];
    assert_eq!(day, 540);
    assert!(n > 0 && n <= before / 4 + 1);
}

#[test]
fn run_starts_with_initialization_event() {
    let config = SimConfig::default_test(5);
    let out = run_simulation(&config, &catalog()[0], PolicyKind::Pid, 9).unwrap();
    assert!(matches!(
        out.events.first(),
        Some(SimEvent::RunInitialized { seed: 9, operators: 2_000, .. })
    ));
}

#[test]
fn collapsed_population_clamps_n_and_runs_to_horizon() {
    let mut config = SimConfig::default();
    config.lifecycle.exit_prob_newcomer = 1.0;
    config.lifecycle.exit_prob_veteran = 1.0;
    config.lifecycle.opportunity_cost = 1e9;
    for policy in PolicyKind::ALL {
        let out = run_simulation(&config, &catalog()[0], policy, 7).unwrap();
        assert_eq!(out.records.len(), TIMESTEPS as usize);
        assert_eq!(out.operators.active_count(), 0);

        let collapses: Vec<u64> = out
            .events
            .iter()
            .filter_map(|e| match e {
                SimEvent::PopulationCollapsed { day } => Some(*day),
                _ => None,
            })
            .collect();
        assert_eq!(collapses, vec![0], "{}", out.run_id);

        for r in &out.records {
            assert_eq!(r.active, 1, "{} day {}", out.run_id, r.day);
            assert!(r.price.is_finite() && r.price > 0.0);
            assert!(r.circulating.is_finite() && r.circulating <= config.total_supply);
            assert!(r.treasury.is_finite() && r.treasury >= 0.0);
        }
    }
}
