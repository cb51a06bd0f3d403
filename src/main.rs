// Kalman filter demo - Main Entry Point
// Licensed under AGPL v3

use clap::Parser;
use lti_kalman::config::Config;
use lti_kalman::driver;
use lti_kalman::output::{CsvOutput, LogOutput, OutputHandler};
use lti_kalman::scenario::ConstantVelocity;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    info!("Starting Kalman filter demo");

    let scenario = ConstantVelocity::new(config.dt, config.process_noise, config.correlation)
        .build(config.gain_policy.into())?;

    // Seeded generator keeps runs reproducible when --seed is given
    let seed = config.seed.unwrap_or_else(rand::random);
    info!(seed, "Measurement generator seeded");
    let rng = StdRng::seed_from_u64(seed);

    let mut outputs: Vec<Box<dyn OutputHandler>> = Vec::new();
    info!("Writing CSV results to {}", config.output);
    outputs.push(Box::new(CsvOutput::create(&config.output, &["v_x", "v_y"])?));
    if config.verbose {
        outputs.push(Box::new(LogOutput));
    }

    let summary = driver::run(scenario, rng, config.steps, &mut outputs)?;

    if summary.diagnostics.degraded_updates > 0 {
        warn!(
            "{} of {} updates ran with a degraded Kalman gain",
            summary.diagnostics.degraded_updates, summary.steps
        );
    }
    if let Some(last) = &summary.last_state {
        info!(
            "Filter finished after {} steps, last state {:?}",
            summary.steps,
            last.as_slice()
        );
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_span_events(if verbose {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    if verbose {
        subscriber
            .with_max_level(tracing::Level::DEBUG)
            .init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber
            .with_max_level(tracing::Level::INFO)
            .init();
    }
}
