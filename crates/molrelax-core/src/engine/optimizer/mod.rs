//! Gradient-based minimizers over an [`Evaluable`].
//!
//! Both methods share the [`LineSearch`](super::linesearch::LineSearch), the termination
//! rules and the final safeguard: a run never reports an energy above the one it started
//! from. They differ only in how the search direction is derived from gradient history.

mod cg;
mod lbfgs;

use super::config::{Method, OptimizerConfig};
use super::evaluable::Evaluable;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    Converged,
    MaxIterations,
    Timeout,
    LineSearchFailures,
    OracleFailure,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Converged => "converged",
            StopReason::MaxIterations => "iteration limit reached",
            StopReason::Timeout => "time limit reached",
            StopReason::LineSearchFailures => "too many consecutive line-search failures",
            StopReason::OracleFailure => "energy evaluation failed",
        };
        write!(f, "{text}")
    }
}

/// Outcome of one minimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Final state; the evaluable is left at this state.
    pub state: Vec<f64>,
    /// Final energy, or NaN when the oracle failed.
    pub energy: f64,
    pub initial_energy: f64,
    /// Number of line searches performed.
    pub iterations: usize,
    pub rms_gradient: f64,
    pub stop_reason: StopReason,
    pub message: Option<String>,
}

impl OptimizationResult {
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Converged
    }

    pub fn failed(&self) -> bool {
        self.stop_reason == StopReason::OracleFailure
    }
}

/// Minimizes `evaluable` from its current state with the configured method.
///
/// Oracle failures never surface as errors: they are reported through
/// [`StopReason::OracleFailure`] with a NaN energy, and the initial state is restored.
pub fn minimize<E: Evaluable + ?Sized>(
    evaluable: &mut E,
    config: &OptimizerConfig,
) -> OptimizationResult {
    match config.method {
        Method::Lbfgs => lbfgs::minimize(evaluable, config),
        Method::ConjugateGradient => cg::minimize(evaluable, config),
    }
}

pub(crate) fn rms(gradient: &[f64]) -> f64 {
    if gradient.is_empty() {
        return 0.0;
    }
    (gradient.iter().map(|g| g * g).sum::<f64>() / gradient.len() as f64).sqrt()
}

/// Bookkeeping shared by both methods: start point, clock and termination checks.
pub(crate) struct Run {
    pub initial_state: Vec<f64>,
    pub initial_energy: f64,
    pub initial_rms: f64,
    started: Instant,
    max_time: Option<Duration>,
    max_iterations: usize,
    min_rms: f64,
}

pub(crate) enum Start {
    Ready(Run, f64, Vec<f64>),
    Finished(OptimizationResult),
}

impl Run {
    /// Evaluates the starting point. Returns a finished result when there is nothing to do
    /// or the oracle fails.
    pub fn start<E: Evaluable + ?Sized>(evaluable: &mut E, config: &OptimizerConfig) -> Start {
        let started = Instant::now();
        let initial_state = evaluable.state();
        let mut gradient = vec![0.0; evaluable.dof()];
        let energy = match evaluable.value_and_gradient(Some(&mut gradient)) {
            Ok(e) if e.is_finite() => e,
            Ok(e) => {
                return Start::Finished(oracle_failure(
                    initial_state,
                    e,
                    0,
                    "initial energy is not finite".to_string(),
                ));
            }
            Err(err) => {
                return Start::Finished(oracle_failure(initial_state, f64::NAN, 0, err.to_string()));
            }
        };
        let run = Run {
            initial_rms: rms(&gradient),
            initial_state,
            initial_energy: energy,
            started,
            max_time: config.max_time,
            max_iterations: config.max_iterations,
            min_rms: config.min_rms,
        };
        Start::Ready(run, energy, gradient)
    }

    /// Termination test performed at the top of every iteration.
    pub fn should_stop(&self, iterations: usize, gradient: &[f64]) -> Option<StopReason> {
        if gradient.is_empty() || rms(gradient) < self.min_rms {
            return Some(StopReason::Converged);
        }
        if iterations >= self.max_iterations {
            return Some(StopReason::MaxIterations);
        }
        if self.max_time.is_some_and(|limit| self.started.elapsed() >= limit) {
            return Some(StopReason::Timeout);
        }
        None
    }

    /// Builds the final result, restoring the initial state if the run made things worse.
    pub fn finish<E: Evaluable + ?Sized>(
        self,
        evaluable: &mut E,
        energy: f64,
        gradient: &[f64],
        iterations: usize,
        stop_reason: StopReason,
    ) -> OptimizationResult {
        if energy <= self.initial_energy {
            return OptimizationResult {
                state: evaluable.state(),
                energy,
                initial_energy: self.initial_energy,
                iterations,
                rms_gradient: rms(gradient),
                stop_reason,
                message: None,
            };
        }
        warn!(
            energy,
            initial_energy = self.initial_energy,
            "Minimization ended above the starting energy; restoring the initial state"
        );
        evaluable.set_state(&self.initial_state);
        OptimizationResult {
            state: self.initial_state,
            energy: self.initial_energy,
            initial_energy: self.initial_energy,
            iterations,
            rms_gradient: self.initial_rms,
            stop_reason,
            message: Some("final energy exceeded the initial energy; initial state restored".to_string()),
        }
    }

    /// Result for an oracle failure mid-run: initial state restored, NaN energy.
    pub fn fail<E: Evaluable + ?Sized>(
        self,
        evaluable: &mut E,
        iterations: usize,
        message: String,
    ) -> OptimizationResult {
        warn!(%message, "Energy evaluation failed during minimization");
        evaluable.set_state(&self.initial_state);
        let mut result = oracle_failure(self.initial_state, f64::NAN, iterations, message);
        result.initial_energy = self.initial_energy;
        result
    }
}

fn oracle_failure(
    state: Vec<f64>,
    initial_energy: f64,
    iterations: usize,
    message: String,
) -> OptimizationResult {
    OptimizationResult {
        state,
        energy: f64::NAN,
        initial_energy,
        iterations,
        rms_gradient: f64::NAN,
        stop_reason: StopReason::OracleFailure,
        message: Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::oracle::OracleError;
    use crate::engine::config::{LbfgsMemory, OptimizerConfigBuilder};
    use crate::engine::evaluable::tests::WeightedQuadratic;

    fn config(method: Method) -> OptimizerConfig {
        OptimizerConfigBuilder::new()
            .method(method)
            .min_rms(1e-6)
            .max_iterations(200)
            .build()
            .unwrap()
    }

    struct FailingAfter {
        x: Vec<f64>,
        calls: usize,
        fail_at: usize,
    }

    impl Evaluable for FailingAfter {
        fn dof(&self) -> usize {
            self.x.len()
        }
        fn state_into(&self, out: &mut [f64]) {
            out.copy_from_slice(&self.x);
        }
        fn set_state(&mut self, state: &[f64]) {
            self.x.copy_from_slice(state);
        }
        fn value_and_gradient(&mut self, gradient: Option<&mut [f64]>) -> Result<f64, OracleError> {
            self.calls += 1;
            if self.calls >= self.fail_at {
                return Err(OracleError::new("fragment is disconnected"));
            }
            if let Some(g) = gradient {
                g[0] = 2.0 * (self.x[0] - 3.0);
            }
            Ok((self.x[0] - 3.0).powi(2))
        }
    }

    /// A surface whose reported value at the start is artificially low, so every step
    /// appears to climb.
    struct Deceptive {
        x: Vec<f64>,
        start: f64,
    }

    impl Evaluable for Deceptive {
        fn dof(&self) -> usize {
            1
        }
        fn state_into(&self, out: &mut [f64]) {
            out.copy_from_slice(&self.x);
        }
        fn set_state(&mut self, state: &[f64]) {
            self.x.copy_from_slice(state);
        }
        fn value_and_gradient(&mut self, gradient: Option<&mut [f64]>) -> Result<f64, OracleError> {
            if let Some(g) = gradient {
                g[0] = 2.0 * (self.x[0] - 3.0);
            }
            if self.x[0] == self.start {
                Ok(-100.0)
            } else {
                Ok((self.x[0] - 3.0).powi(2))
            }
        }
    }

    #[test]
    fn both_methods_minimize_shifted_parabola_from_zero() {
        for method in [Method::Lbfgs, Method::ConjugateGradient] {
            let mut f = WeightedQuadratic::shifted_parabola();
            let result = minimize(&mut f, &config(method));
            assert!(result.converged(), "{method}: {:?}", result.stop_reason);
            assert!((f.x[0] - 3.0).abs() < 1e-6, "{method}: x = {}", f.x[0]);
            assert!(result.energy < 1e-10);
            assert_eq!(result.initial_energy, 9.0);
            assert_eq!(result.state, f.x);
        }
    }

    #[test]
    fn both_methods_minimize_an_anisotropic_quadratic() {
        for method in [Method::Lbfgs, Method::ConjugateGradient] {
            let mut f = WeightedQuadratic::new(
                vec![0.0, 0.0, 0.0, 0.0],
                vec![0.5, -0.25, 0.1, 0.3],
                vec![1.0, 2.0, 3.0, 0.5],
            );
            let mut cfg = config(method);
            cfg.max_iterations = 1000;
            let result = minimize(&mut f, &cfg);
            assert!(result.converged(), "{method}: {:?}", result.stop_reason);
            for (x, c) in f.x.iter().zip(&f.center) {
                assert!((x - c).abs() < 1e-5, "{method}: {x} vs {c}");
            }
        }
    }

    #[test]
    fn lbfgs_honours_full_degree_of_freedom_memory() {
        let mut f = WeightedQuadratic::new(vec![0.0; 3], vec![0.2, 0.4, -0.3], vec![1.0, 2.0, 3.0]);
        let mut cfg = config(Method::Lbfgs);
        cfg.lbfgs_memory = LbfgsMemory::DegreesOfFreedom;
        let result = minimize(&mut f, &cfg);
        assert!(result.converged());
    }

    #[test]
    fn iteration_budget_is_respected() {
        for method in [Method::Lbfgs, Method::ConjugateGradient] {
            let mut f = WeightedQuadratic::new(vec![0.0, 0.0], vec![5.0, -5.0], vec![1.0, 50.0]);
            let mut cfg = config(method);
            cfg.max_iterations = 3;
            let result = minimize(&mut f, &cfg);
            assert!(result.iterations <= 3);
            assert_eq!(result.stop_reason, StopReason::MaxIterations);
            assert!(result.energy <= result.initial_energy);
        }
    }

    #[test]
    fn zero_time_budget_stops_before_the_first_iteration() {
        for method in [Method::Lbfgs, Method::ConjugateGradient] {
            let mut f = WeightedQuadratic::shifted_parabola();
            let mut cfg = config(method);
            cfg.max_time = Some(Duration::ZERO);
            let result = minimize(&mut f, &cfg);
            assert_eq!(result.stop_reason, StopReason::Timeout);
            assert_eq!(result.iterations, 0);
            assert_eq!(result.energy, 9.0);
        }
    }

    #[test]
    fn oracle_failure_yields_nan_energy_and_restores_initial_state() {
        for method in [Method::Lbfgs, Method::ConjugateGradient] {
            let mut f = FailingAfter {
                x: vec![0.0],
                calls: 0,
                fail_at: 4,
            };
            let result = minimize(&mut f, &config(method));
            assert!(result.failed());
            assert!(result.energy.is_nan());
            assert_eq!(result.message.as_deref(), Some("Energy evaluation failed: fragment is disconnected"));
            assert_eq!(f.x, vec![0.0]);
            assert_eq!(result.initial_energy, 9.0);
        }
    }

    #[test]
    fn failure_on_the_starting_point_is_reported() {
        let mut f = FailingAfter {
            x: vec![0.0],
            calls: 0,
            fail_at: 1,
        };
        let result = minimize(&mut f, &config(Method::Lbfgs));
        assert!(result.failed());
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn final_energy_never_exceeds_initial_energy() {
        for method in [Method::Lbfgs, Method::ConjugateGradient] {
            let mut f = Deceptive {
                x: vec![0.0],
                start: 0.0,
            };
            let result = minimize(&mut f, &config(method));
            assert!(result.energy <= result.initial_energy);
            assert_eq!(result.energy, -100.0);
            assert_eq!(f.x, vec![0.0]);
        }
    }

    #[test]
    fn rms_of_gradient() {
        assert_eq!(rms(&[3.0, 4.0]), (12.5f64).sqrt());
        assert_eq!(rms(&[]), 0.0);
    }
}
