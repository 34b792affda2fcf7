//! meshnet-core: agent-based simulation of the MeshNet operator network
//! under a PID-controlled versus a fixed-schedule token emission policy.
//!
//! A run is one scenario × policy × seed, advanced day by day through a
//! fixed pipeline of subsystems (see `engine`). Harnesses build run plans
//! over scenarios, policies, seeds and parameter grids, and reduce each
//! run to result rows.

pub mod burn_subsystem;
pub mod clock;
pub mod config;
pub mod demand_subsystem;
pub mod emission_subsystem;
pub mod engine;
pub mod error;
pub mod event;
pub mod harness;
pub mod lifecycle_subsystem;
pub mod operator;
pub mod plan;
pub mod price_subsystem;
pub mod reputation_subsystem;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod subsystem;
pub mod supply_subsystem;
pub mod table;
pub mod types;
pub mod world;
