use std::sync::Arc;
use thiserror::Error;

/// Failure of an energy evaluation: a disconnected fragment, malformed geometry or a
/// non-finite energy. Callers map it to a NaN energy plus this message rather than
/// aborting, so a different starting geometry can be tried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Energy evaluation failed: {message}")]
pub struct OracleError {
    pub message: String,
}

impl OracleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The energy/gradient contract the optimization engine consumes.
///
/// Implementations evaluate the total energy of a flat cartesian coordinate buffer
/// `[x0, y0, z0, x1, ...]`. When `mask` is given, only terms whose atoms are all
/// `true` contribute; this is how the pre-optimizer scores partially placed geometries.
/// When `gradient` is given it must be overwritten with `dE/dx` in the same layout;
/// rigid atoms receive a zero gradient.
pub trait EnergyOracle: Send + Sync {
    fn evaluate(
        &self,
        coordinates: &[f64],
        mask: Option<&[bool]>,
        gradient: Option<&mut [f64]>,
    ) -> Result<f64, OracleError>;
}

impl<T: EnergyOracle + ?Sized> EnergyOracle for &T {
    fn evaluate(
        &self,
        coordinates: &[f64],
        mask: Option<&[bool]>,
        gradient: Option<&mut [f64]>,
    ) -> Result<f64, OracleError> {
        (**self).evaluate(coordinates, mask, gradient)
    }
}

impl<T: EnergyOracle + ?Sized> EnergyOracle for Box<T> {
    fn evaluate(
        &self,
        coordinates: &[f64],
        mask: Option<&[bool]>,
        gradient: Option<&mut [f64]>,
    ) -> Result<f64, OracleError> {
        (**self).evaluate(coordinates, mask, gradient)
    }
}

impl<T: EnergyOracle + ?Sized> EnergyOracle for Arc<T> {
    fn evaluate(
        &self,
        coordinates: &[f64],
        mask: Option<&[bool]>,
        gradient: Option<&mut [f64]>,
    ) -> Result<f64, OracleError> {
        (**self).evaluate(coordinates, mask, gradient)
    }
}
