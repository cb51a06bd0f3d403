// Kalman filter state container
//
// Pairs the state estimate with its covariance. One container per filtering
// session; the filter replaces both fields on every predict/update step.

use nalgebra as na;
use na::{DMatrix, DVector, SymmetricEigen};

use super::error::{expect_shape, FilterError};
use crate::constants::{PSD_TOLERANCE, SYMMETRY_TOLERANCE};

/// State estimate and covariance of one filtering session
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanState {
    x: DVector<f64>, // State vector, length n
    p: DMatrix<f64>, // Covariance matrix, n x n
}

/// Numerical health of a covariance matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CovarianceHealth {
    /// Largest |P[i,j] - P[j,i]|
    pub symmetry_error: f64,
    /// Smallest eigenvalue of the symmetric part of P
    pub min_eigenvalue: f64,
    pub trace: f64,
}

impl CovarianceHealth {
    pub fn is_symmetric(&self) -> bool {
        self.symmetry_error <= SYMMETRY_TOLERANCE
    }

    pub fn is_positive_semidefinite(&self) -> bool {
        self.min_eigenvalue >= -PSD_TOLERANCE
    }
}

impl KalmanState {
    /// Create a state container from an initial estimate and covariance
    ///
    /// # Returns
    /// * `Err(FilterError::Shape)` if the covariance is not `n x n` for an `n`-state estimate
    pub fn new(x: DVector<f64>, p: DMatrix<f64>) -> Result<Self, FilterError> {
        let n = x.len();
        expect_shape("P", (n, n), p.shape())?;
        Ok(Self { x, p })
    }

    /// Zero state with identity covariance
    pub fn with_identity(n: usize) -> Self {
        Self {
            x: DVector::zeros(n),
            p: DMatrix::identity(n, n),
        }
    }

    pub fn dim(&self) -> usize {
        self.x.len()
    }

    /// Current state estimate
    pub fn state(&self) -> &DVector<f64> {
        &self.x
    }

    /// Current covariance
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.p
    }

    /// Replace both fields with the result of a recursion step
    pub(crate) fn replace(&mut self, x: DVector<f64>, p: DMatrix<f64>) {
        debug_assert_eq!(p.shape(), (x.len(), x.len()));
        self.x = x;
        self.p = p;
    }

    /// Symmetry error, minimum eigenvalue and trace of the covariance
    pub fn covariance_health(&self) -> CovarianceHealth {
        let p = &self.p;
        let symmetry_error = (p - p.transpose()).amax();

        let sym = (p + p.transpose()) * 0.5;
        let min_eigenvalue = SymmetricEigen::new(sym)
            .eigenvalues
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);

        CovarianceHealth {
            symmetry_error,
            min_eigenvalue,
            trace: p.trace(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_creation() {
        let state = KalmanState::new(
            DVector::from_vec(vec![0.0, 0.0, 30.0, 10.0]),
            DMatrix::identity(4, 4),
        )
        .unwrap();

        assert_eq!(state.dim(), 4);
        assert!((state.state()[2] - 30.0).abs() < 1e-12);
        assert_eq!(state.covariance().shape(), (4, 4));
    }

    #[test]
    fn test_state_rejects_mismatched_covariance() {
        let err = KalmanState::new(DVector::zeros(3), DMatrix::identity(2, 2)).unwrap_err();
        assert_eq!(err, FilterError::shape("P", (3, 3), (2, 2)));

        let err = KalmanState::new(DVector::zeros(2), DMatrix::zeros(2, 3)).unwrap_err();
        assert!(matches!(err, FilterError::Shape { what: "P", .. }));
    }

    #[test]
    fn test_covariance_health() {
        let state = KalmanState::new(
            DVector::zeros(2),
            DMatrix::from_row_slice(2, 2, &[
                2.0, 1.0,
                1.0, 2.0,
            ]),
        )
        .unwrap();

        let health = state.covariance_health();
        assert!(health.is_symmetric());
        assert!(health.is_positive_semidefinite());
        // Eigenvalues are 1 and 3
        assert!((health.min_eigenvalue - 1.0).abs() < 1e-10);
        assert!((health.trace - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_covariance_health_flags_indefinite() {
        let state = KalmanState::new(
            DVector::zeros(2),
            DMatrix::from_row_slice(2, 2, &[
                1.0, 2.0,
                2.0, 1.0,
            ]),
        )
        .unwrap();

        let health = state.covariance_health();
        // Eigenvalues are -1 and 3
        assert!((health.min_eigenvalue + 1.0).abs() < 1e-10);
        assert!(!health.is_positive_semidefinite());
    }

    #[test]
    fn test_covariance_health_flags_asymmetry() {
        let state = KalmanState::new(
            DVector::zeros(2),
            DMatrix::from_row_slice(2, 2, &[
                1.0, 0.5,
                0.0, 1.0,
            ]),
        )
        .unwrap();

        let health = state.covariance_health();
        assert!((health.symmetry_error - 0.5).abs() < 1e-12);
        assert!(!health.is_symmetric());
    }
}
