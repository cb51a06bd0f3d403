// Discrete-time linear Kalman filter
//
// The engine owns the fixed model and noise matrices; the recursion state
// lives in a KalmanState supplied by the caller on every call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use nalgebra as na;
use na::{DMatrix, DVector};
use tracing::{trace, warn};

use super::error::FilterError;
use super::model::{LinearModel, Noise};
use super::state::KalmanState;
use super::Filter;
use crate::constants::{CONDITION_TOLERANCE, PINV_EPSILON};

/// What to do when the innovation covariance cannot be solved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GainPolicy {
    /// Use a zero gain, so the step degrades to predict-only
    #[default]
    Degrade,
    /// Return `FilterError::SingularInnovationCovariance` and leave the state untouched
    Strict,
    /// Use the Moore-Penrose pseudo-inverse of the innovation covariance
    PseudoInverse,
}

/// How the gain of an update step was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainOutcome {
    Solved,
    Degraded,
    PseudoInverse,
}

/// Counters for monitoring a filter engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterDiagnostics {
    /// Completed apply calls
    pub applies: u64,
    /// Update steps whose innovation covariance could not be solved
    pub degraded_updates: u64,
}

/// Linear Kalman filter engine
///
/// Immutable after construction except for the inspection cache and the
/// diagnostic counters, so one engine can serve many `KalmanState`s across threads.
#[derive(Debug)]
pub struct LinearFilter {
    model: LinearModel,
    noise: Noise,
    q_is_zero: bool,
    policy: GainPolicy,

    saved_state: Mutex<Option<DVector<f64>>>,
    applies: AtomicU64,
    degraded_updates: AtomicU64,
}

impl LinearFilter {
    /// Create a filter for `model` with the given noise covariances
    ///
    /// # Returns
    /// * `Err(FilterError::Shape)` if `Q` is not `n x n` or `R` is not `k x k`
    pub fn new(model: LinearModel, noise: Noise) -> Result<Self, FilterError> {
        noise.validate(model.n_states(), model.n_measurements())?;
        let q_is_zero = noise.q.iter().all(|&v| v == 0.0);

        Ok(Self {
            model,
            noise,
            q_is_zero,
            policy: GainPolicy::default(),
            saved_state: Mutex::new(None),
            applies: AtomicU64::new(0),
            degraded_updates: AtomicU64::new(0),
        })
    }

    pub fn with_gain_policy(mut self, policy: GainPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn gain_policy(&self) -> GainPolicy {
        self.policy
    }

    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    pub fn noise(&self) -> &Noise {
        &self.noise
    }

    pub fn diagnostics(&self) -> FilterDiagnostics {
        FilterDiagnostics {
            applies: self.applies.load(Ordering::Relaxed),
            degraded_updates: self.degraded_updates.load(Ordering::Relaxed),
        }
    }

    fn check_dims(&self, state: &KalmanState, measurement: Option<&DVector<f64>>, control: &DVector<f64>) {
        check_len("state", self.model.n_states(), state.dim());
        check_len("control", self.model.n_controls(), control.len());
        if let Some(z) = measurement {
            check_len("measurement", self.model.n_measurements(), z.len());
        }
    }

    /// Gain for the current covariance, applying the fallback policy when S cannot be solved
    fn gain(&self, p: &DMatrix<f64>) -> Result<(DMatrix<f64>, GainOutcome), FilterError> {
        let c = self.model.c();
        let k = self.model.n_measurements();

        let pct = p * c.transpose();
        let s = c * &pct + &self.noise.r;

        let condition = match solve_gain(&pct, &s) {
            Ok(gain) => return Ok((gain, GainOutcome::Solved)),
            Err(condition) => condition,
        };

        self.degraded_updates.fetch_add(1, Ordering::Relaxed);
        warn!(
            condition,
            policy = ?self.policy,
            "Innovation covariance is singular or ill-conditioned"
        );

        match self.policy {
            GainPolicy::Strict => Err(FilterError::SingularInnovationCovariance { condition }),
            GainPolicy::PseudoInverse => match s.pseudo_inverse(PINV_EPSILON) {
                Ok(s_pinv) => Ok((pct * s_pinv, GainOutcome::PseudoInverse)),
                Err(_) => Ok((pct * DMatrix::zeros(k, k), GainOutcome::Degraded)),
            },
            // Degenerate product P C^T * 0: a zero gain, NaNs in P still propagate
            GainPolicy::Degrade => Ok((pct * DMatrix::zeros(k, k), GainOutcome::Degraded)),
        }
    }
}

impl Filter for LinearFilter {
    /// Time update: x = A x + B u, P = A P A^T + Q
    ///
    /// # Panics
    /// If the state or control does not match the model dimensions
    fn predict(&self, state: &mut KalmanState, control: &DVector<f64>) {
        self.check_dims(state, None, control);
        let a = self.model.a();

        let x = a * state.state() + self.model.b() * control;
        let mut p = a * state.covariance() * a.transpose();
        if !self.q_is_zero {
            p += &self.noise.q;
        }

        state.replace(x, p);
    }

    /// Measurement update
    ///
    /// Solves `S^T K^T = (P C^T)^T` for the gain, with `S = C P C^T + R`, then
    /// corrects `x += K (z - C x - D u)` and `P -= K C P`.
    ///
    /// # Panics
    /// If the state, measurement or control does not match the model dimensions
    fn update(
        &self,
        state: &mut KalmanState,
        measurement: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<GainOutcome, FilterError> {
        self.check_dims(state, Some(measurement), control);
        let c = self.model.c();

        let (gain, outcome) = self.gain(state.covariance())?;

        let innovation = measurement - c * state.state() - self.model.d() * control;
        let x = state.state() + &gain * innovation;
        let p = state.covariance() - &gain * c * state.covariance();
        state.replace(x, p);

        let health = state.covariance_health();
        if !health.is_positive_semidefinite() {
            warn!(
                min_eigenvalue = health.min_eigenvalue,
                "Corrected covariance is not positive semidefinite"
            );
        }

        Ok(outcome)
    }

    /// One filtering step: update, output from the corrected state, then predict
    ///
    /// Returns `C x + D u` evaluated on the corrected state, before the predict.
    fn apply(
        &self,
        state: &mut KalmanState,
        measurement: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<DVector<f64>, FilterError> {
        let outcome = self.update(state, measurement, control)?;

        let filtered = self.model.c() * state.state() + self.model.d() * control;

        *self.saved_state.lock().unwrap_or_else(PoisonError::into_inner) = Some(state.state().clone());

        self.predict(state, control);
        self.applies.fetch_add(1, Ordering::Relaxed);

        trace!(?outcome, filtered = ?filtered.as_slice(), "Applied filter step");
        Ok(filtered)
    }

    fn state(&self) -> Option<DVector<f64>> {
        self.saved_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Solve `K S = P C^T` through the transposed system `S^T K^T = (P C^T)^T`
///
/// # Returns
/// * `Ok(K)` on success
/// * `Err(condition)` when `S` is singular or its condition number exceeds `CONDITION_TOLERANCE`
pub fn solve_gain(pct: &DMatrix<f64>, s: &DMatrix<f64>) -> Result<DMatrix<f64>, f64> {
    let condition = condition_number(s);
    // Written so that a NaN condition also fails
    if !(condition <= CONDITION_TOLERANCE) {
        return Err(condition);
    }

    s.transpose()
        .lu()
        .solve(&pct.transpose())
        .map(|kt| kt.transpose())
        .ok_or(condition)
}

/// 2-norm condition number, infinite for singular and NaN for non-finite matrices
pub fn condition_number(s: &DMatrix<f64>) -> f64 {
    if s.is_empty() {
        return 1.0;
    }
    if s.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }

    let sv = s.singular_values();
    let min = sv.min();
    if min == 0.0 {
        f64::INFINITY
    } else {
        sv.max() / min
    }
}

fn check_len(what: &str, expected: usize, actual: usize) {
    assert!(
        expected == actual,
        "{what} has dimension {actual}, filter expects {expected}"
    );
}
