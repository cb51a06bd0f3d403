use clap::{Parser, ValueEnum};

use crate::constants::{DEFAULT_CORRELATION, DEFAULT_DT, DEFAULT_PROCESS_NOISE, DEFAULT_STEPS};
use crate::kalman::GainPolicy;

/// Kalman filter demo configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Number of synthetic measurements to filter.
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    pub steps: usize,

    /// Sampling interval in seconds.
    #[arg(long, default_value_t = DEFAULT_DT)]
    pub dt: f64,

    /// Variance of the velocity random walk per step.
    #[arg(long, default_value_t = DEFAULT_PROCESS_NOISE)]
    pub process_noise: f64,

    /// Correlation between the v_x and v_y measurement errors, in (-1, 1).
    #[arg(long, default_value_t = DEFAULT_CORRELATION, allow_negative_numbers = true)]
    pub correlation: f64,

    /// Seed for the measurement generator. A random seed is drawn when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write (measurement, filtered) pairs in CSV format to this file.
    #[arg(long, value_name = "FILE", default_value = "test.csv")]
    pub output: String,

    /// What to do when the innovation covariance cannot be solved.
    #[arg(long, value_enum, default_value_t = GainPolicyArg::Degrade)]
    pub gain_policy: GainPolicyArg,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainPolicyArg {
    /// Zero gain, the step becomes predict-only
    Degrade,
    /// Abort the run with an error
    Strict,
    /// Moore-Penrose pseudo-inverse
    PseudoInverse,
}

impl From<GainPolicyArg> for GainPolicy {
    fn from(arg: GainPolicyArg) -> Self {
        match arg {
            GainPolicyArg::Degrade => GainPolicy::Degrade,
            GainPolicyArg::Strict => GainPolicy::Strict,
            GainPolicyArg::PseudoInverse => GainPolicy::PseudoInverse,
        }
    }
}
