// Shared numeric thresholds and demo defaults

/// Condition number above which the innovation covariance is treated as
/// singular. Same cutoff the gonum/LAPACK solvers use (1e16).
pub const CONDITION_TOLERANCE: f64 = 1e16;

/// Singular values below this are dropped when the pseudo-inverse gain policy is used.
pub const PINV_EPSILON: f64 = 1e-10;

/// Most negative eigenvalue a covariance may have before it is reported as non-PSD.
pub const PSD_TOLERANCE: f64 = 1e-9;

/// Largest |P - P^T| entry still considered symmetric.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

// --- Demo scenario defaults ---

/// Number of measurements the demo feeds through the filter.
pub const DEFAULT_STEPS: usize = 200;

/// Sampling interval (s).
pub const DEFAULT_DT: f64 = 0.1;

/// Spectral density of the velocity random walk.
pub const DEFAULT_PROCESS_NOISE: f64 = 0.01;

/// Correlation between the two velocity measurement channels.
pub const DEFAULT_CORRELATION: f64 = 0.5;

/// True velocity [v_x, v_y] (km/h) the demo measures around.
pub const TRUE_VELOCITY: [f64; 2] = [30.0, 10.0];
