#![forbid(unsafe_code)]

use anyhow::{Result, bail};

use lanes_sim::{CampaignConfig, run_campaign};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let report = run_campaign(&CampaignConfig::default())?;
    println!(
        "campaign complete: seeds_run={} seeds_passed={}",
        report.seeds_run, report.seeds_passed
    );

    if let Some(seed) = report.first_failure {
        for failure in &report.failures {
            eprintln!("seed {} failed:", failure.seed);
            for violation in &failure.violations {
                eprintln!("  {violation}");
            }
        }
        bail!("first failing seed: {seed}");
    }
    Ok(())
}
