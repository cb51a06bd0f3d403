// Demo scenario: constant-velocity target with correlated velocity measurements
//
// State is [pos_x, pos_y, v_x, v_y]; only the two velocities are measured.

use nalgebra as na;
use na::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::constants::TRUE_VELOCITY;
use crate::kalman::{FilterError, GainPolicy, KalmanState, LinearFilter, LinearModel, Noise};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScenarioError {
    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),

    #[error("process noise must be non-negative and finite, got {0}")]
    InvalidProcessNoise(f64),

    #[error("measurement correlation must lie in (-1, 1), got {0}")]
    InvalidCorrelation(f64),

    #[error("measurement noise covariance is not positive definite")]
    NoiseNotPositiveDefinite,

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Parameters of the constant-velocity demo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantVelocity {
    /// Sampling interval
    pub dt: f64,
    /// Variance of the velocity random walk per step
    pub process_noise: f64,
    /// Correlation between the v_x and v_y measurement errors
    pub correlation: f64,
}

/// Everything needed to run the demo filter
#[derive(Debug)]
pub struct Scenario {
    pub filter: LinearFilter,
    pub initial_state: KalmanState,
    /// Noise-free value of the measured outputs
    pub truth: DVector<f64>,
}

impl ConstantVelocity {
    pub fn new(dt: f64, process_noise: f64, correlation: f64) -> Self {
        Self { dt, process_noise, correlation }
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ScenarioError::InvalidTimeStep(self.dt));
        }
        if !(self.process_noise.is_finite() && self.process_noise >= 0.0) {
            return Err(ScenarioError::InvalidProcessNoise(self.process_noise));
        }
        if !(self.correlation > -1.0 && self.correlation < 1.0) {
            return Err(ScenarioError::InvalidCorrelation(self.correlation));
        }
        Ok(())
    }

    /// Transition, control, observation and feed-through matrices
    pub fn model(&self) -> Result<LinearModel, ScenarioError> {
        self.validate()?;
        let dt = self.dt;

        let a = DMatrix::from_row_slice(4, 4, &[
            1.0, 0.0, dt,  0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]);
        // No external influence
        let b = DMatrix::zeros(4, 4);
        // Measure v_x and v_y
        let c = DMatrix::from_row_slice(2, 4, &[
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]);
        let d = DMatrix::zeros(2, 4);

        Ok(LinearModel::new(a, b, c, d)?)
    }

    /// Process noise Q = Gd qk Gd^T with Gd = A G, and the correlated measurement noise R
    pub fn noise(&self, model: &LinearModel) -> Result<Noise, ScenarioError> {
        self.validate()?;

        // Noise enters through the velocities
        let g = DMatrix::from_row_slice(4, 2, &[
            0.0, 0.0,
            0.0, 0.0,
            1.0, 0.0,
            0.0, 1.0,
        ]);
        let gd = model.a() * g;
        let qk = DMatrix::identity(2, 2) * self.process_noise;
        let q = &gd * qk * gd.transpose();

        let corr = self.correlation;
        let r = DMatrix::from_row_slice(2, 2, &[
            1.0,  corr,
            corr, 1.0,
        ]);

        Ok(Noise::new(q, r))
    }

    /// Build the filter and its initial state
    ///
    /// Initial estimate is at the origin moving at the true velocity, with identity covariance.
    pub fn build(&self, policy: GainPolicy) -> Result<Scenario, ScenarioError> {
        let model = self.model()?;
        let noise = self.noise(&model)?;
        let filter = LinearFilter::new(model, noise)?.with_gain_policy(policy);

        let initial_state = KalmanState::new(
            DVector::from_vec(vec![0.0, 0.0, TRUE_VELOCITY[0], TRUE_VELOCITY[1]]),
            DMatrix::identity(4, 4),
        )?;

        Ok(Scenario {
            filter,
            initial_state,
            truth: DVector::from_row_slice(&TRUE_VELOCITY),
        })
    }
}

/// Endless stream of synthetic measurements `truth + L e`, `e ~ N(0, I)`, `L L^T = R`
pub struct MeasurementSource<G: Rng> {
    truth: DVector<f64>,
    l: DMatrix<f64>,
    rng: G,
}

impl<G: Rng> MeasurementSource<G> {
    /// # Arguments
    /// * `truth` - Noise-free measurement
    /// * `r` - Measurement noise covariance, must be positive definite
    /// * `rng` - Random generator, seeded by the caller for reproducible runs
    pub fn new(truth: DVector<f64>, r: &DMatrix<f64>, rng: G) -> Result<Self, ScenarioError> {
        let k = truth.len();
        if r.shape() != (k, k) {
            return Err(FilterError::shape("R", (k, k), r.shape()).into());
        }

        let l = r
            .clone()
            .cholesky()
            .ok_or(ScenarioError::NoiseNotPositiveDefinite)?
            .l();

        Ok(Self { truth, l, rng })
    }

    pub fn truth(&self) -> &DVector<f64> {
        &self.truth
    }
}

impl<G: Rng> Iterator for MeasurementSource<G> {
    type Item = DVector<f64>;

    fn next(&mut self) -> Option<DVector<f64>> {
        let rng = &mut self.rng;
        let e = DVector::from_fn(self.truth.len(), |_, _| rng.sample::<f64, _>(StandardNormal));
        Some(&self.truth + &self.l * e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kalman::Filter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn demo() -> ConstantVelocity {
        ConstantVelocity::new(0.1, 0.01, 0.5)
    }

    #[test]
    fn test_model_matrices() {
        let model = demo().model().unwrap();

        assert_eq!(model.n_states(), 4);
        assert_eq!(model.n_controls(), 4);
        assert_eq!(model.n_measurements(), 2);
        assert!((model.a()[(0, 2)] - 0.1).abs() < 1e-12);
        assert!((model.a()[(1, 3)] - 0.1).abs() < 1e-12);
        assert_eq!(model.c()[(0, 2)], 1.0);
        assert_eq!(model.c()[(1, 3)], 1.0);
    }

    #[test]
    fn test_process_noise() {
        let cv = demo();
        let model = cv.model().unwrap();
        let noise = cv.noise(&model).unwrap();

        // Gd = A G = [[dt, 0], [0, dt], [1, 0], [0, 1]]
        let q = &noise.q;
        assert!((q[(0, 0)] - 0.01 * 0.01).abs() < 1e-15);
        assert!((q[(0, 2)] - 0.01 * 0.1).abs() < 1e-15);
        assert!((q[(2, 2)] - 0.01).abs() < 1e-15);
        assert_eq!(q[(0, 1)], 0.0);
        assert!((q - q.transpose()).amax() < 1e-15);

        assert_eq!(noise.r[(0, 1)], 0.5);
        assert_eq!(noise.r[(1, 0)], 0.5);
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(
            ConstantVelocity::new(0.0, 0.01, 0.5).model().unwrap_err(),
            ScenarioError::InvalidTimeStep(0.0)
        );
        assert_eq!(
            ConstantVelocity::new(0.1, -1.0, 0.5).build(GainPolicy::Degrade).unwrap_err(),
            ScenarioError::InvalidProcessNoise(-1.0)
        );
        assert_eq!(
            ConstantVelocity::new(0.1, 0.01, 1.0).build(GainPolicy::Degrade).unwrap_err(),
            ScenarioError::InvalidCorrelation(1.0)
        );
    }

    #[test]
    fn test_measurement_source_is_reproducible() {
        let r = DMatrix::identity(2, 2);
        let truth = DVector::from_vec(vec![30.0, 10.0]);

        let a: Vec<_> = MeasurementSource::new(truth.clone(), &r, StdRng::seed_from_u64(3))
            .unwrap()
            .take(5)
            .collect();
        let b: Vec<_> = MeasurementSource::new(truth, &r, StdRng::seed_from_u64(3))
            .unwrap()
            .take(5)
            .collect();

        assert_eq!(a, b);
    }

    #[test]
    fn test_measurement_source_covariance() {
        let r = DMatrix::from_row_slice(2, 2, &[
            1.0, 0.5,
            0.5, 1.0,
        ]);
        let truth = DVector::from_vec(vec![30.0, 10.0]);
        let n = 20_000;

        let samples: Vec<_> = MeasurementSource::new(truth.clone(), &r, StdRng::seed_from_u64(5))
            .unwrap()
            .take(n)
            .collect();

        let mut cov = DMatrix::<f64>::zeros(2, 2);
        for z in &samples {
            let e = z - &truth;
            cov += &e * e.transpose();
        }
        cov /= n as f64;

        assert!((cov - r).amax() < 0.05);
    }

    #[test]
    fn test_measurement_source_rejects_bad_noise() {
        let truth = DVector::from_vec(vec![30.0, 10.0]);

        let singular = DMatrix::from_element(2, 2, 1.0);
        assert!(matches!(
            MeasurementSource::new(truth.clone(), &singular, StdRng::seed_from_u64(0)),
            Err(ScenarioError::NoiseNotPositiveDefinite)
        ));

        let wrong = DMatrix::identity(3, 3);
        assert!(matches!(
            MeasurementSource::new(truth, &wrong, StdRng::seed_from_u64(0)),
            Err(ScenarioError::Filter(FilterError::Shape { what: "R", .. }))
        ));
    }

    #[test]
    fn test_demo_run_tracks_velocity() {
        let cv = demo();
        let Scenario { filter, mut initial_state, truth } = cv.build(GainPolicy::Degrade).unwrap();
        let source = MeasurementSource::new(truth.clone(), &filter.noise().r, StdRng::seed_from_u64(42)).unwrap();
        let control = DVector::zeros(4);

        let mut outputs = Vec::new();
        for z in source.take(200) {
            let y = filter.apply(&mut initial_state, &z, &control).unwrap();
            let health = initial_state.covariance_health();
            assert!(health.is_positive_semidefinite());
            outputs.push(y);
        }

        let tail = &outputs[180..];
        for i in 0..2 {
            let mean = tail.iter().map(|y| y[i]).sum::<f64>() / tail.len() as f64;
            assert!((mean - truth[i]).abs() < 0.5, "channel {i}: mean {mean}");
        }

        // Position integrates the velocity estimate: ~20 s at [30, 10]
        let last = filter.state().unwrap();
        assert!((last[0] - 600.0).abs() < 60.0);
        assert!((last[1] - 200.0).abs() < 60.0);
        assert_eq!(filter.diagnostics().degraded_updates, 0);
    }
}
