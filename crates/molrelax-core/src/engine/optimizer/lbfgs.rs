use super::{OptimizationResult, Run, Start, StopReason};
use crate::engine::config::OptimizerConfig;
use crate::engine::evaluable::Evaluable;
use crate::engine::linesearch::{LineSearch, dot};
use std::collections::VecDeque;
use tracing::{debug, instrument, warn};

const MAX_TOLERATED_FAILURES: usize = 2;

struct Correction {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

/// Limited-memory BFGS with a bounded correction history.
#[instrument(level = "debug", skip_all, fields(dof = evaluable.dof()))]
pub(super) fn minimize<E: Evaluable + ?Sized>(
    evaluable: &mut E,
    config: &OptimizerConfig,
) -> OptimizationResult {
    let (run, mut energy, mut gradient) = match Run::start(evaluable, config) {
        Start::Ready(run, energy, gradient) => (run, energy, gradient),
        Start::Finished(result) => return result,
    };
    let line_search = LineSearch::new(config.line_search);
    let n = gradient.len();
    let memory = config.lbfgs_memory.resolve(n);

    let mut history: VecDeque<Correction> = VecDeque::with_capacity(memory);
    let mut gamma = 1.0;
    let mut restart = true;
    let mut failures = 0;
    let mut f_move = 1.0;
    let mut iterations = 0;
    let mut direction = vec![0.0; n];
    let mut alphas = vec![0.0; memory];
    let mut previous_state = vec![0.0; n];
    let mut previous_gradient = vec![0.0; n];

    let stop_reason = loop {
        if let Some(reason) = run.should_stop(iterations, &gradient) {
            break reason;
        }

        if restart {
            history.clear();
            gamma = 1.0;
            for (d, g) in direction.iter_mut().zip(&gradient) {
                *d = -g;
            }
        } else {
            two_loop(&history, gamma, &gradient, &mut alphas, &mut direction);
            if dot(&direction, &gradient) >= 0.0 {
                debug!("Quasi-Newton direction is not downhill; resetting history");
                history.clear();
                gamma = 1.0;
                for (d, g) in direction.iter_mut().zip(&gradient) {
                    *d = -g;
                }
            }
        }

        iterations += 1;
        evaluable.state_into(&mut previous_state);
        previous_gradient.copy_from_slice(&gradient);
        let outcome =
            match line_search.search(evaluable, energy, &mut gradient, &direction, f_move) {
                Ok(outcome) => outcome,
                Err(err) => return run.fail(evaluable, iterations, err.to_string()),
            };
        f_move = energy - outcome.value;
        energy = outcome.value;

        if !outcome.success {
            failures += 1;
            restart = true;
            warn!(iterations, failures, "Line search failed; resetting L-BFGS history");
            if failures > MAX_TOLERATED_FAILURES {
                break StopReason::LineSearchFailures;
            }
            continue;
        }
        failures = 0;

        let state = evaluable.state();
        let s: Vec<f64> = state.iter().zip(&previous_state).map(|(x, xp)| x - xp).collect();
        let y: Vec<f64> = gradient
            .iter()
            .zip(&previous_gradient)
            .map(|(g, gp)| g - gp)
            .collect();
        let ys = dot(&y, &s);
        let yy = dot(&y, &y);

        if ys == 0.0 || yy == 0.0 || !ys.is_finite() {
            debug!(ys, yy, "Zero curvature pair; restarting");
            restart = true;
        } else {
            restart = false;
            gamma = (ys / yy).abs();
            if ys > 0.0 {
                if history.len() == memory {
                    history.pop_front();
                }
                history.push_back(Correction { s, y, rho: 1.0 / ys });
            }
        }
        debug!(
            iterations,
            energy,
            rms = super::rms(&gradient),
            history = history.len(),
            evaluations = outcome.evaluations,
            "L-BFGS iteration"
        );
    };

    run.finish(evaluable, energy, &gradient, iterations, stop_reason)
}

/// Writes `-H g` into `direction`, with `H` the inverse Hessian approximation built from
/// `history` on top of `gamma * I`.
fn two_loop(
    history: &VecDeque<Correction>,
    gamma: f64,
    gradient: &[f64],
    alphas: &mut [f64],
    direction: &mut [f64],
) {
    direction.copy_from_slice(gradient);
    for (i, c) in history.iter().enumerate().rev() {
        let alpha = c.rho * dot(&c.s, direction);
        alphas[i] = alpha;
        for (r, y) in direction.iter_mut().zip(&c.y) {
            *r -= alpha * y;
        }
    }
    for r in direction.iter_mut() {
        *r *= gamma;
    }
    for (i, c) in history.iter().enumerate() {
        let beta = c.rho * dot(&c.y, direction);
        for (r, s) in direction.iter_mut().zip(&c.s) {
            *r += s * (alphas[i] - beta);
        }
    }
    for r in direction.iter_mut() {
        *r = -*r;
    }
}
