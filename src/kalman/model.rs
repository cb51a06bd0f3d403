// Linear time-invariant system model and noise descriptors
//
// x_k+1 = A x_k + B u_k + w,   w ~ N(0, Q)
// y_k   = C x_k + D u_k + v,   v ~ N(0, R)

use nalgebra as na;
use na::DMatrix;

use super::error::{expect_shape, FilterError};

/// Fixed system matrices of a discrete LTI model
///
/// Dimensions: `n` states, `m` controls, `k` measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    a: DMatrix<f64>, // n x n transition
    b: DMatrix<f64>, // n x m control input
    c: DMatrix<f64>, // k x n observation
    d: DMatrix<f64>, // k x m control-to-output
}

impl LinearModel {
    /// Build a model, checking every matrix against the dimensions implied by `A`, `C` and `D`
    ///
    /// `n` is taken from `A`, `k` from the rows of `C` and `m` from the columns of `D`.
    ///
    /// # Returns
    /// * `Err(FilterError::Shape)` naming the first inconsistent matrix
    pub fn new(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        c: DMatrix<f64>,
        d: DMatrix<f64>,
    ) -> Result<Self, FilterError> {
        let n = a.nrows();
        let k = c.nrows();
        let m = d.ncols();

        expect_shape("A", (n, n), a.shape())?;
        expect_shape("B", (n, m), b.shape())?;
        expect_shape("C", (k, n), c.shape())?;
        expect_shape("D", (k, m), d.shape())?;

        Ok(Self { a, b, c, d })
    }

    /// Number of state variables
    pub fn n_states(&self) -> usize {
        self.a.nrows()
    }

    /// Number of control inputs
    pub fn n_controls(&self) -> usize {
        self.b.ncols()
    }

    /// Number of measured outputs
    pub fn n_measurements(&self) -> usize {
        self.c.nrows()
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    pub fn c(&self) -> &DMatrix<f64> {
        &self.c
    }

    pub fn d(&self) -> &DMatrix<f64> {
        &self.d
    }
}

/// Process and measurement noise covariances
#[derive(Debug, Clone, PartialEq)]
pub struct Noise {
    /// (Discretized) process noise, n x n
    pub q: DMatrix<f64>,
    /// Measurement noise, k x k
    pub r: DMatrix<f64>,
}

impl Noise {
    pub fn new(q: DMatrix<f64>, r: DMatrix<f64>) -> Self {
        Self { q, r }
    }

    /// All-zero noise for a noiseless process
    ///
    /// # Arguments
    /// * `n` - Dimension of `Q`
    /// * `k` - Dimension of `R`
    pub fn zero(n: usize, k: usize) -> Self {
        Self {
            q: DMatrix::zeros(n, n),
            r: DMatrix::zeros(k, k),
        }
    }

    /// Check `Q` against `n` and `R` against `k`
    pub(crate) fn validate(&self, n: usize, k: usize) -> Result<(), FilterError> {
        expect_shape("Q", (n, n), self.q.shape())?;
        expect_shape("R", (k, k), self.r.shape())
    }
}
