// Error type for the Kalman filter core

/// Errors produced by the filter core
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// Matrix dimensions are mutually inconsistent
    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    Shape {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Innovation covariance could not be solved (only surfaced under the strict gain policy)
    #[error("innovation covariance is singular or ill-conditioned (condition number {condition:e})")]
    SingularInnovationCovariance { condition: f64 },
}

impl FilterError {
    pub(crate) fn shape(what: &'static str, expected: (usize, usize), actual: (usize, usize)) -> Self {
        FilterError::Shape { what, expected, actual }
    }
}

/// Fails with [`FilterError::Shape`] unless `actual == expected`.
pub(crate) fn expect_shape(
    what: &'static str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<(), FilterError> {
    if expected == actual {
        Ok(())
    } else {
        Err(FilterError::shape(what, expected, actual))
    }
}
