// Demo driver: feeds synthetic measurements through the filter and fans the
// results out to the configured outputs.

use nalgebra::DVector;
use rand::Rng;
use tracing::{debug, info};

use crate::kalman::{Filter, FilterDiagnostics, FilterError};
use crate::output::{OutputError, OutputHandler, StepRecord};
use crate::scenario::{MeasurementSource, Scenario, ScenarioError};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("filter step {step} failed: {source}")]
    Filter { step: usize, source: FilterError },

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Outcome of a demo run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub diagnostics: FilterDiagnostics,
    /// Last corrected state
    pub last_state: Option<DVector<f64>>,
}

/// Run `steps` filter iterations on measurements drawn with `rng`
pub fn run<G: Rng>(
    scenario: Scenario,
    rng: G,
    steps: usize,
    outputs: &mut [Box<dyn OutputHandler>],
) -> Result<RunSummary, RunError> {
    let Scenario { filter, initial_state, truth } = scenario;
    let mut state = initial_state;
    let control = DVector::zeros(filter.model().n_controls());
    let source = MeasurementSource::new(truth, &filter.noise().r, rng)?;

    info!(steps, policy = ?filter.gain_policy(), "Running filter");

    for (step, measurement) in source.take(steps).enumerate() {
        let filtered = filter
            .apply(&mut state, &measurement, &control)
            .map_err(|source| RunError::Filter { step, source })?;

        let record = StepRecord { step, measurement, filtered };
        for output in outputs.iter_mut() {
            output.handle_step(&record)?;
        }
    }

    for output in outputs.iter_mut() {
        output.finish()?;
    }

    let summary = RunSummary {
        steps,
        diagnostics: filter.diagnostics(),
        last_state: filter.state(),
    };
    debug!(?summary, "Run complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kalman::GainPolicy;
    use crate::scenario::ConstantVelocity;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::{Arc, Mutex};

    /// Collects records for inspection
    struct Collect(Arc<Mutex<Vec<StepRecord>>>);

    impl OutputHandler for Collect {
        fn handle_step(&mut self, record: &StepRecord) -> Result<(), OutputError> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[test]
    fn test_run_feeds_every_output() {
        let scenario = ConstantVelocity::new(0.1, 0.01, 0.5).build(GainPolicy::Degrade).unwrap();
        let records = Arc::new(Mutex::new(Vec::new()));
        let mut outputs: Vec<Box<dyn OutputHandler>> = vec![
            Box::new(Collect(records.clone())),
            Box::new(crate::output::LogOutput),
        ];

        let summary = run(scenario, StdRng::seed_from_u64(1), 25, &mut outputs).unwrap();

        assert_eq!(summary.steps, 25);
        assert_eq!(summary.diagnostics.applies, 25);
        assert_eq!(summary.diagnostics.degraded_updates, 0);
        assert_eq!(summary.last_state.unwrap().len(), 4);

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 25);
        assert_eq!(records[24].step, 24);
        assert_eq!(records[0].measurement.len(), 2);
        assert_eq!(records[0].filtered.len(), 2);
    }

    #[test]
    fn test_run_is_reproducible() {
        let cv = ConstantVelocity::new(0.1, 0.01, 0.5);

        let a = run(cv.build(GainPolicy::Degrade).unwrap(), StdRng::seed_from_u64(9), 50, &mut []).unwrap();
        let b = run(cv.build(GainPolicy::Degrade).unwrap(), StdRng::seed_from_u64(9), 50, &mut []).unwrap();

        assert_eq!(a, b);
    }
}
