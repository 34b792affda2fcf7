//! Operator entry, congestion and treasury subsidy rules.

use meshnet_core::{
    config::SimConfig,
    lifecycle_subsystem::{congestion_factor, entrant_count, treasury_subsidy},
};

#[test]
fn entry_is_capped_before_congestion() {
    let cfg = SimConfig::default().lifecycle;
    // 3% of 500 = 15, under the cap of 30.
    assert_eq!(entrant_count(500, 10_000, &cfg), 15);
    // 3% of 5 000 = 150, capped at 30.
    assert_eq!(entrant_count(5_000, 10_000, &cfg), 30);
}

#[test]
fn congestion_halves_entry_midway_through_band() {
    let cfg = SimConfig::default().lifecycle;
    assert!((congestion_factor(11_000, 10_000, cfg.congestion_band) - 0.5).abs() < 1e-12);
    assert_eq!(entrant_count(11_000, 10_000, &cfg), 15);
}

#[test]
fn no_entry_beyond_congestion_band() {
    let cfg = SimConfig::default().lifecycle;
    assert_eq!(congestion_factor(12_500, 10_000, cfg.congestion_band), 0.0);
    assert_eq!(entrant_count(12_500, 10_000, &cfg), 0);
    assert_eq!(congestion_factor(10_000, 10_000, cfg.congestion_band), 1.0);
}

#[test]
fn subsidy_respects_reserve_and_cap() {
    let config = SimConfig::default();
    let cfg = &config.lifecycle;
    let supply = config.total_supply;

    // Healthy yield: nothing paid.
    assert_eq!(treasury_subsidy(10.0, 0.1, 5_000, 150e6, supply, cfg), 0.0);
    // Treasury at its reserve: nothing paid.
    assert_eq!(treasury_subsidy(0.0, 0.1, 5_000, 20e6, supply, cfg), 0.0);
    // Deficit 2.5 USD at $0.10 for 100 ops = 2 500 tokens, well under the cap.
    assert!((treasury_subsidy(0.0, 0.1, 100, 150e6, supply, cfg) - 2_500.0).abs() < 1e-6);
    // Large deficit is capped at 1% of the treasury.
    assert!((treasury_subsidy(0.0, 0.001, 10_000, 150e6, supply, cfg) - 1.5e6).abs() < 1e-6);
}
