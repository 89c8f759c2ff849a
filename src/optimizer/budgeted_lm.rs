//! Levenberg-Marquardt with a wall-clock budget.
//!
//! Minimizes `½ Σ ρ(rᵢ²)` for a problem expressed through the
//! `levenberg_marquardt::LeastSquaresProblem` trait. The loop is driven by
//! hand rather than by `LevenbergMarquardt::minimize` so that the deadline
//! can be checked before every Jacobian and every trial evaluation.
//!
//! Each iteration solves the IRLS-weighted damped normal equations
//!
//! ```text
//! (JᵀWJ + λ diag(JᵀWJ)) δ = -JᵀWr,    W = diag(ρ'(rᵢ²))
//! ```
//!
//! and accepts the step only if the robust cost decreases, so the
//! parameters held by the problem on return are the best ones seen.

use std::time::{Duration, Instant};

use levenberg_marquardt::LeastSquaresProblem;
use nalgebra::{DMatrix, DVector, Dyn, Owned};
use tracing::{debug, trace};

use crate::config::EstimatorConfig;

use super::numeric_diff::numeric_jacobian;
use super::robust::RobustLoss;

const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
const MIN_LAMBDA: f64 = 1e-10;
const MAX_LAMBDA: f64 = 1e10;

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    GradientTolerance,
    StepTolerance,
    MaxIterations,
    TimeBudget,
    /// The problem could not be evaluated at the current parameters, or
    /// the damped system was singular.
    EvaluationFailure,
}

#[derive(Debug, Clone)]
pub struct SolverSummary {
    /// Robust cost at the starting parameters, infinite when they could not
    /// be evaluated.
    pub initial_cost: f64,
    pub final_cost: f64,
    /// Number of trial steps taken, accepted or not.
    pub iterations: usize,
    pub termination: Termination,
    pub elapsed: Duration,
}

impl SolverSummary {
    pub fn converged(&self) -> bool {
        matches!(
            self.termination,
            Termination::GradientTolerance | Termination::StepTolerance
        )
    }
}

#[derive(Debug, Clone)]
pub struct BudgetedLevenbergMarquardt {
    pub time_budget: Duration,
    pub max_iterations: usize,
    pub diff_step: f64,
    pub initial_lambda: f64,
    pub gradient_tolerance: f64,
    pub step_tolerance: f64,
}

impl BudgetedLevenbergMarquardt {
    pub fn new(time_budget: Duration) -> Self {
        Self::from_config(&EstimatorConfig::default(), time_budget)
    }

    pub fn from_config(config: &EstimatorConfig, time_budget: Duration) -> Self {
        Self {
            time_budget,
            max_iterations: config.max_iterations,
            diff_step: config.diff_step,
            initial_lambda: config.initial_lambda,
            gradient_tolerance: config.gradient_tolerance,
            step_tolerance: config.step_tolerance,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run the solver. The returned problem holds the best parameters.
    pub fn minimize<P>(&self, mut problem: P, loss: &dyn RobustLoss) -> (P, SolverSummary)
    where
        P: LeastSquaresProblem<
                f64,
                Dyn,
                Dyn,
                ParameterStorage = Owned<f64, Dyn>,
                ResidualStorage = Owned<f64, Dyn>,
            > + Clone
            + Sync,
    {
        let start = Instant::now();
        // Budgets past the end of the clock mean no deadline.
        let deadline = start.checked_add(self.time_budget);
        let expired = || deadline.is_some_and(|d| Instant::now() >= d);

        let mut x = problem.params();
        let mut residuals = match problem.residuals() {
            Some(r) => r,
            None => {
                debug!("Initial evaluation failed, solver not started");
                let summary = SolverSummary {
                    initial_cost: f64::INFINITY,
                    final_cost: f64::INFINITY,
                    iterations: 0,
                    termination: Termination::EvaluationFailure,
                    elapsed: start.elapsed(),
                };
                return (problem, summary);
            }
        };
        let mut cost = loss.cost(&residuals);
        let initial_cost = cost;

        let mut lambda = self.initial_lambda;
        let mut iterations = 0;
        let mut termination = Termination::MaxIterations;
        // Weighted normal equations at `x`, dropped whenever `x` moves.
        let mut linearization: Option<(DMatrix<f64>, DVector<f64>)> = None;

        while iterations < self.max_iterations {
            if expired() {
                termination = Termination::TimeBudget;
                break;
            }

            if linearization.is_none() {
                let Some(mut weighted_j) = numeric_jacobian(&problem, self.diff_step) else {
                    termination = Termination::EvaluationFailure;
                    break;
                };
                let w = loss.sqrt_weights(&residuals);
                for (i, mut row) in weighted_j.row_iter_mut().enumerate() {
                    row *= w[i];
                }
                let weighted_r = residuals.component_mul(&w);
                let gradient = weighted_j.transpose() * weighted_r;

                if gradient.amax() < self.gradient_tolerance {
                    termination = Termination::GradientTolerance;
                    break;
                }
                let jtj = weighted_j.transpose() * &weighted_j;
                linearization = Some((jtj, gradient));

                if expired() {
                    termination = Termination::TimeBudget;
                    break;
                }
            }
            let Some((jtj, gradient)) = linearization.as_ref() else {
                break;
            };

            let mut damped = jtj.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * damped[(i, i)].max(1e-6);
            }
            let Some(delta) = damped.lu().solve(&(-gradient)) else {
                termination = Termination::EvaluationFailure;
                break;
            };

            if delta.norm() < self.step_tolerance * (x.norm() + self.step_tolerance) {
                termination = Termination::StepTolerance;
                break;
            }

            iterations += 1;
            let trial = &x + &delta;
            problem.set_params(&trial);
            let trial_eval = problem.residuals().map(|r| {
                let c = loss.cost(&r);
                (r, c)
            });

            match trial_eval {
                Some((trial_residuals, trial_cost)) if trial_cost < cost => {
                    trace!(
                        "LM iter {}: accepted, cost {:.6e} -> {:.6e}, lambda {:.1e}",
                        iterations,
                        cost,
                        trial_cost,
                        lambda
                    );
                    x = trial;
                    residuals = trial_residuals;
                    cost = trial_cost;
                    lambda = (lambda * LAMBDA_DOWN).max(MIN_LAMBDA);
                    linearization = None;
                }
                _ => {
                    trace!("LM iter {}: rejected, lambda {:.1e}", iterations, lambda);
                    problem.set_params(&x);
                    lambda = (lambda * LAMBDA_UP).min(MAX_LAMBDA);
                }
            }
        }

        problem.set_params(&x);
        let summary = SolverSummary {
            initial_cost,
            final_cost: cost,
            iterations,
            termination,
            elapsed: start.elapsed(),
        };
        debug!(
            "LM finished: {:?} after {} iterations in {:?}, cost {:.6e} -> {:.6e}",
            summary.termination, summary.iterations, summary.elapsed, initial_cost, cost
        );
        (problem, summary)
    }
}
