//! The function-of-a-state abstraction both optimizers consume, and its molecular
//! implementation over a [`transform::TransformChain`].

pub mod molecule;
pub mod transform;

use crate::core::forcefield::oracle::OracleError;

/// A differentiable scalar function of a state vector with `dof()` entries.
///
/// Implementations hold their current state: [`Evaluable::set_state`] installs one, and
/// [`Evaluable::value_and_gradient`] evaluates at whatever state is installed. Reading the
/// state back never recomputes anything, and `set_state(&state())` is lossless.
pub trait Evaluable {
    fn dof(&self) -> usize;

    /// Copies the current state into `out`, which must hold `dof()` values.
    fn state_into(&self, out: &mut [f64]);

    fn state(&self) -> Vec<f64> {
        let mut state = vec![0.0; self.dof()];
        self.state_into(&mut state);
        state
    }

    /// Installs `state`.
    ///
    /// # Panics
    ///
    /// Panics if `state.len() != self.dof()`.
    fn set_state(&mut self, state: &[f64]);

    /// Value at the current state. When `gradient` is given (length `dof()`), it is
    /// overwritten with the gradient with respect to the state.
    fn value_and_gradient(&mut self, gradient: Option<&mut [f64]>) -> Result<f64, OracleError>;
}
