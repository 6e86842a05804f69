#![forbid(unsafe_code)]
//! lanes-sim: deterministic interleaving simulator for the lanes sync engine.
//!
//! Each seed drives a real [`lanes_core::BoardEngine`] against a model ticket
//! server over a simulated wire that delays, reorders, and fails messages.
//! At quiescence a convergence oracle asserts the engine's store equals the
//! server's truth with no optimistic residue. A failing seed replays exactly.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` at the run/campaign surface.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod campaign;
pub mod oracle;
pub mod rng;
pub mod schedule;
pub mod server;
pub mod simulator;

pub use campaign::{CampaignConfig, CampaignReport, SeedFailure, run_campaign};
pub use oracle::{ConvergenceOracle, InvariantViolation, OracleResult};
pub use rng::DeterministicRng;
pub use schedule::{Delivery, DeliveryQueue};
pub use server::ModelServer;
pub use simulator::{SimulationConfig, SimulationResult, Simulator};
