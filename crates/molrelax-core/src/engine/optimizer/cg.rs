use super::{OptimizationResult, Run, Start, StopReason};
use crate::engine::config::OptimizerConfig;
use crate::engine::evaluable::Evaluable;
use crate::engine::linesearch::{LineSearch, dot};
use tracing::{debug, instrument, warn};

const MAX_CONSECUTIVE_FAILURES: usize = 3;

/// Polak-Ribiere conjugate gradient with steepest-descent restarts.
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

    let mut direction = vec![0.0; n];
    let mut previous_gradient = vec![0.0; n];
    let mut restart = true;
    let mut failures = 0;
    let mut f_move = 1.0;
    let mut iterations = 0;

    let stop_reason = loop {
        if let Some(reason) = run.should_stop(iterations, &gradient) {
            break reason;
        }

        let previous_norm2 = dot(&previous_gradient, &previous_gradient);
        if restart || previous_norm2 == 0.0 {
            for (d, g) in direction.iter_mut().zip(&gradient) {
                *d = -g;
            }
        } else {
            let beta = gradient
                .iter()
                .zip(&previous_gradient)
                .map(|(g, gp)| g * (g - gp))
                .sum::<f64>()
                / previous_norm2;
            for (d, g) in direction.iter_mut().zip(&gradient) {
                *d = -g + beta * *d;
            }
            if dot(&direction, &gradient) >= 0.0 {
                debug!(beta, "Conjugate direction is not downhill; restarting");
                for (d, g) in direction.iter_mut().zip(&gradient) {
                    *d = -g;
                }
            }
        }

        iterations += 1;
        previous_gradient.copy_from_slice(&gradient);
        let outcome =
            match line_search.search(evaluable, energy, &mut gradient, &direction, f_move) {
                Ok(outcome) => outcome,
                Err(err) => return run.fail(evaluable, iterations, err.to_string()),
            };
        let decrease = energy - outcome.value;
        f_move = decrease;
        energy = outcome.value;

        if outcome.success {
            failures = 0;
            restart = false;
        } else {
            failures += 1;
            restart = true;
            warn!(iterations, failures, "Line search failed; restarting along steepest descent");
            if failures >= MAX_CONSECUTIVE_FAILURES {
                break StopReason::LineSearchFailures;
            }
        }
        debug!(
            iterations,
            energy,
            rms = super::rms(&gradient),
            evaluations = outcome.evaluations,
            "Conjugate gradient iteration"
        );
    };

    run.finish(evaluable, energy, &gradient, iterations, stop_reason)
}
