//! Demand shocks and network-effect coverage.

use meshnet_core::{
    config::SimConfig,
    demand_subsystem::{coverage_factor, expected_demand, shock_factor},
    scenario::by_name,
};

#[test]
fn coverage_regimes() {
    let cfg = SimConfig::default().demand;
    assert!((coverage_factor(2_000, 10_000, &cfg) - 0.2).abs() < 1e-12);
    assert!((coverage_factor(5_000, 10_000, &cfg) - 0.5f64.powf(1.3)).abs() < 1e-12);
    assert_eq!(coverage_factor(100_000, 10_000, &cfg), 2.0);
}

#[test]
fn bear_contraction_starts_after_onset_and_floors() {
    let cfg = SimConfig::default().demand;
    let (_, bear) = by_name("bear").unwrap();
    assert_eq!(shock_factor(360, &bear, 1.0, &cfg), 1.0);
    assert!((shock_factor(390, &bear, 1.0, &cfg) - 0.98).abs() < 1e-12);
    assert!((shock_factor(375, &bear, 1.0, &cfg) - 0.99).abs() < 1e-12);
    assert_eq!(shock_factor(360 + 30 * 100, &bear, 1.0, &cfg), 0.3);
}

#[test]
fn competitor_erosion_is_capped() {
    let cfg = SimConfig::default().demand;
    let (_, competitor) = by_name("competitor").unwrap();
    assert!((shock_factor(600, &competitor, 1.0, &cfg) - 0.9).abs() < 1e-12);
    assert!((shock_factor(540 + 30 * 12, &competitor, 1.0, &cfg) - 0.7).abs() < 1e-12);
}

#[test]
fn regulatory_cost_divides_demand() {
    let cfg = SimConfig::default().demand;
    let (_, regulatory) = by_name("regulatory").unwrap();
    let mult = regulatory.cost_multiplier(600);
    assert!((mult - 1.3).abs() < 1e-12);
    assert!((shock_factor(600, &regulatory, mult, &cfg) - 1.0 / 1.3).abs() < 1e-12);
}

#[test]
fn bull_demand_grows() {
    let config = SimConfig::default();
    let (_, bull) = by_name("bull").unwrap();
    let early = expected_demand(10, 5_000, &bull, 1.0, &config);
    let late = expected_demand(700, 5_000, &bull, 1.0, &config);
    assert!(late > early);
}
