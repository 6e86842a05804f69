//! Campaign runner: many seeds, one verdict.
//!
//! Executes a range of seeds with shared parameters, collecting pass/fail
//! per seed and surfacing the first failing seed for replay under a debugger
//! or raised log level.

use std::ops::Range;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::simulator::{SimulationConfig, Simulator};

/// How many seeds to run and with what per-seed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g. `0..100`.
    pub seed_range: Range<u64>,
    /// Rounds of activity per seed.
    pub rounds: u64,
    /// Tickets pre-existing on the server.
    pub seed_tickets: usize,
    /// Chance per round of a local user action (percent).
    pub action_percent: u8,
    /// Chance per round of a foreign client write (percent).
    pub foreign_percent: u8,
    /// Chance that an issued REST call fails in transit (percent).
    pub failure_percent: u8,
    /// Chance per round that the push channel drops (percent).
    pub drop_channel_percent: u8,
    /// Maximum delivery delay, in rounds.
    pub max_delay_rounds: u64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let defaults = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            rounds: defaults.rounds,
            seed_tickets: defaults.seed_tickets,
            action_percent: defaults.action_percent,
            foreign_percent: defaults.foreign_percent,
            failure_percent: defaults.failure_percent,
            drop_channel_percent: defaults.drop_channel_percent,
            max_delay_rounds: defaults.max_delay_rounds,
        }
    }
}

impl CampaignConfig {
    /// Build the [`SimulationConfig`] for one seed.
    #[must_use]
    pub const fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            rounds: self.rounds,
            seed_tickets: self.seed_tickets,
            action_percent: self.action_percent,
            foreign_percent: self.foreign_percent,
            failure_percent: self.failure_percent,
            drop_channel_percent: self.drop_channel_percent,
            max_delay_rounds: self.max_delay_rounds,
        }
    }

    /// Validate before running.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        Ok(())
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFailure {
    pub seed: u64,
    /// Rendered invariant violations.
    pub violations: Vec<String>,
}

/// Aggregate verdict over a seed range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First failing seed, for prioritized replay.
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run every seed in the range.
///
/// # Errors
///
/// Returns an error for an invalid configuration or a seed whose scenario
/// breaks out of the simulated wire entirely.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;
    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
    };

    for seed in config.seed_range.clone() {
        let mut simulator = Simulator::new(config.sim_config_for_seed(seed))?;
        let result = simulator.run()?;
        report.seeds_run += 1;
        if result.oracle.passed {
            report.seeds_passed += 1;
        } else {
            warn!(seed, violations = result.oracle.violations.len(), "seed failed");
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: result
                    .oracle
                    .violations
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }
    }

    info!(
        seeds_run = report.seeds_run,
        seeds_passed = report.seeds_passed,
        "campaign finished"
    );
    Ok(report)
}
