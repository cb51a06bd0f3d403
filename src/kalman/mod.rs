// Kalman filter module
// Provides recursive state estimation for linear time-invariant systems

pub mod error;
pub mod linear;
pub mod model;
pub mod state;

use nalgebra::DVector;

pub use error::FilterError;
pub use linear::{condition_number, solve_gain, FilterDiagnostics, GainOutcome, GainPolicy, LinearFilter};
pub use model::{LinearModel, Noise};
pub use state::{CovarianceHealth, KalmanState};

/// Operations shared by every filter implementation
///
/// The engine holds only the fixed model; the recursion state is passed in
/// on each call and mutated in place.
pub trait Filter: Send + Sync {
    /// Advance the state to the next time step
    fn predict(&self, state: &mut KalmanState, control: &DVector<f64>);

    /// Correct the state with a measurement
    fn update(
        &self,
        state: &mut KalmanState,
        measurement: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<GainOutcome, FilterError>;

    /// Update, emit the filtered output, then predict. Returns the filtered output.
    fn apply(
        &self,
        state: &mut KalmanState,
        measurement: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<DVector<f64>, FilterError>;

    /// Copy of the last corrected state, `None` before the first `apply`
    fn state(&self) -> Option<DVector<f64>>;
}
