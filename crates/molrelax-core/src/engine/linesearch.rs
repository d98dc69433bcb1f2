//! One-dimensional search shared by both optimizers.
//!
//! The search brackets a step along a normalized direction with secant extrapolation,
//! then refines the bracket by cubic interpolation until the slope along the direction
//! has dropped to `curvature` times its initial magnitude without raising the value.
//! A search that cannot satisfy this still returns the best point it saw, flagged as
//! unsuccessful.

use super::config::LineSearchConfig;
use super::evaluable::Evaluable;
use crate::core::forcefield::oracle::OracleError;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchOutcome {
    /// Value at the returned point.
    pub value: f64,
    /// Whether the curvature condition was met. `false` is a soft failure: the point is
    /// still usable and never worse than the starting point.
    pub success: bool,
    pub evaluations: usize,
}

#[derive(Debug, Clone)]
struct Probe {
    step: f64,
    value: f64,
    slope: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LineSearch {
    config: LineSearchConfig,
}

struct Walk<'a, E: Evaluable + ?Sized> {
    evaluable: &'a mut E,
    origin: Vec<f64>,
    direction: Vec<f64>,
    trial: Vec<f64>,
    gradient: Vec<f64>,
    best_step: f64,
    best_value: f64,
    best_gradient: Vec<f64>,
    evaluations: usize,
}

impl<E: Evaluable + ?Sized> Walk<'_, E> {
    fn probe(&mut self, step: f64) -> Result<Probe, OracleError> {
        for (t, (x, d)) in self.trial.iter_mut().zip(self.origin.iter().zip(&self.direction)) {
            *t = x + step * d;
        }
        self.evaluable.set_state(&self.trial);
        let raw = self.evaluable.value_and_gradient(Some(self.gradient.as_mut_slice()))?;
        self.evaluations += 1;
        let value = if raw.is_finite() { raw } else { f64::INFINITY };
        let slope = dot(&self.gradient, &self.direction);
        trace!(step, value, slope, "Line search probe");
        if value < self.best_value {
            self.best_value = value;
            self.best_step = step;
            self.best_gradient.copy_from_slice(&self.gradient);
        }
        Ok(Probe { step, value, slope })
    }

    fn settle(self, gradient: &mut [f64], success: bool) -> LineSearchOutcome {
        let position: Vec<f64> = self
            .origin
            .iter()
            .zip(&self.direction)
            .map(|(x, d)| x + self.best_step * d)
            .collect();
        self.evaluable.set_state(&position);
        gradient.copy_from_slice(&self.best_gradient);
        LineSearchOutcome {
            value: self.best_value,
            success,
            evaluations: self.evaluations,
        }
    }
}

impl LineSearch {
    pub fn new(config: LineSearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LineSearchConfig {
        &self.config
    }

    /// Searches along `direction` from the evaluable's current state.
    ///
    /// `value` and `gradient` must describe the current state; on return the evaluable
    /// sits at the returned point and `gradient` holds the gradient there. An uphill
    /// direction is replaced by steepest descent. `f_move` is the expected decrease used
    /// to size the first step.
    ///
    /// # Errors
    ///
    /// Propagates oracle failures; the evaluable is then left at the failing trial point.
    pub fn search<E: Evaluable + ?Sized>(
        &self,
        evaluable: &mut E,
        value: f64,
        gradient: &mut [f64],
        direction: &[f64],
        f_move: f64,
    ) -> Result<LineSearchOutcome, OracleError> {
        let cfg = &self.config;
        let origin = evaluable.state();

        let Some((direction, initial_slope)) = descent_direction(direction, gradient) else {
            return Ok(LineSearchOutcome {
                value,
                success: true,
                evaluations: 0,
            });
        };

        let mut initial_step = if f_move > 0.0 {
            (f_move / initial_slope).abs()
        } else {
            cfg.step_max
        };
        if !initial_step.is_finite() {
            initial_step = cfg.step_max;
        }
        let initial_step = initial_step.clamp(cfg.step_min, cfg.step_max);

        let n = origin.len();
        let mut walk = Walk {
            evaluable,
            trial: vec![0.0; n],
            gradient: vec![0.0; n],
            best_step: 0.0,
            best_value: value,
            best_gradient: gradient.to_vec(),
            evaluations: 0,
            origin,
            direction,
        };
        let accepts = |p: &Probe| p.value <= value && (p.slope / initial_slope).abs() <= cfg.curvature;

        // Bracketing: walk forward until the value rises or the slope turns positive.
        let mut previous = Probe {
            step: 0.0,
            value,
            slope: initial_slope,
        };
        let mut step = initial_step;
        let mut bracket = None;
        for _ in 0..cfg.max_bracket_steps {
            let current = walk.probe(step)?;
            if accepts(&current) {
                walk.best_step = current.step;
                walk.best_value = current.value;
                walk.best_gradient.copy_from_slice(&walk.gradient);
                return Ok(walk.settle(gradient, true));
            }
            if current.value > previous.value || current.slope >= 0.0 {
                bracket = Some((previous, current));
                break;
            }
            let last_increment = current.step - previous.step;
            let secant = last_increment * -current.slope / (current.slope - previous.slope);
            let increment = if secant.is_finite() && current.slope > previous.slope {
                secant.clamp(cfg.step_min, cfg.growth_limit * last_increment)
            } else {
                last_increment
            };
            step = current.step + increment;
            previous = current;
        }

        // Cubic refinement inside the bracket.
        if let Some((mut lo, mut hi)) = bracket {
            for _ in 0..cfg.max_refine_steps {
                let width = hi.step - lo.step;
                let candidate = if hi.value.is_finite() {
                    let d1 = lo.slope + hi.slope - 3.0 * (lo.value - hi.value) / (lo.step - hi.step);
                    let discriminant = d1 * d1 - lo.slope * hi.slope;
                    if discriminant < 0.0 {
                        trace!(discriminant, "Cubic interpolation failed");
                        return Ok(walk.settle(gradient, false));
                    }
                    let d2 = discriminant.sqrt() * width.signum();
                    hi.step - width * (hi.slope + d2 - d1) / (hi.slope - lo.slope + 2.0 * d2)
                } else {
                    f64::NAN
                };
                let (low, high) = (lo.step.min(hi.step), lo.step.max(hi.step));
                let margin = 0.01 * (high - low);
                let candidate = if candidate.is_finite()
                    && candidate > low + margin
                    && candidate < high - margin
                {
                    candidate
                } else {
                    0.5 * (lo.step + hi.step)
                };

                let current = walk.probe(candidate)?;
                if accepts(&current) {
                    walk.best_step = current.step;
                    walk.best_value = current.value;
                    walk.best_gradient.copy_from_slice(&walk.gradient);
                    return Ok(walk.settle(gradient, true));
                }
                if current.slope > 0.0 || current.value > lo.value {
                    hi = current;
                } else {
                    lo = current;
                }
                if (hi.step - lo.step).abs() < cfg.step_min * 1e-3 {
                    break;
                }
            }
        }

        if cfg.reverse_probe && walk.best_step == 0.0 {
            walk.probe(-0.1 * initial_step)?;
        }
        Ok(walk.settle(gradient, false))
    }
}

/// Normalized search direction and its slope, or `None` when the gradient vanishes.
fn descent_direction(direction: &[f64], gradient: &[f64]) -> Option<(Vec<f64>, f64)> {
    let gradient_norm = norm(gradient);
    if gradient_norm == 0.0 || !gradient_norm.is_finite() {
        return None;
    }
    let direction_norm = norm(direction);
    if direction_norm > 0.0 && direction_norm.is_finite() {
        let normalized: Vec<f64> = direction.iter().map(|d| d / direction_norm).collect();
        let slope = dot(gradient, &normalized);
        if slope < 0.0 {
            return Some((normalized, slope));
        }
    }
    let steepest = gradient.iter().map(|g| -g / gradient_norm).collect();
    Some((steepest, -gradient_norm))
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}
