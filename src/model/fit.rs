//! Fit driver: estimate `(β, γ)` and, when trimming is active, the inlier
//! weights by block coordinate descent.
//!
//! Without trimming a single solver call is made with
//! `inner_max_iter · outer_max_iter` iterations. With trimming each outer
//! iteration
//!
//! 1. solves for `x` with `w` fixed (`inner_max_iter` iterations),
//! 2. builds the trimming surrogate at the new `x`,
//! 3. takes one projected gradient step on `w`,
//!
//! and stops once the surrogate value changes by less than `outer_tol`
//! between outer iterations or `outer_max_iter` is reached. A final solve
//! re-estimates `x` for the final weights. The model is never mutated; all
//! estimates live in the returned [`FitResult`].
use ndarray::{Array1, ArrayView1};

use crate::{
    model::{
        errors::{ModelError, ModelResult},
        likelihood::LimeModel,
    },
    optimization::{
        errors::OptResult,
        nlp::{
            traits::{NlpSolver, SolverOutcome},
            types::Theta,
        },
    },
    trimming::{CappedSimplexProjector, ProjectorOptions, TrimmingController},
};

/// Outer-loop configuration.
///
/// Default: `inner_max_iter = 20`, `outer_max_iter = 100`,
/// `outer_step_size = 1.0`, `outer_tol = 1e-6`, default projector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub inner_max_iter: usize,
    pub outer_max_iter: usize,
    pub outer_step_size: f64,
    pub outer_tol: f64,
    pub projector: ProjectorOptions,
}

impl FitOptions {
    /// # Errors
    /// [`ModelError::InvalidFitOption`] for zero iteration caps, or a step
    /// size / tolerance that is not finite and positive.
    pub fn new(
        inner_max_iter: usize, outer_max_iter: usize, outer_step_size: f64, outer_tol: f64,
        projector: ProjectorOptions,
    ) -> ModelResult<Self> {
        for (name, value) in [("inner_max_iter", inner_max_iter), ("outer_max_iter", outer_max_iter)]
        {
            if value == 0 {
                return Err(ModelError::InvalidFitOption {
                    name,
                    value: 0.0,
                    reason: "Iteration caps must be greater than zero.",
                });
            }
        }
        for (name, value) in [("outer_step_size", outer_step_size), ("outer_tol", outer_tol)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ModelError::InvalidFitOption {
                    name,
                    value,
                    reason: "Must be finite and strictly positive.",
                });
            }
        }
        Ok(Self { inner_max_iter, outer_max_iter, outer_step_size, outer_tol, projector })
    }

    /// Iteration budget of the single solve made when trimming is off.
    pub fn untrimmed_max_iter(&self) -> usize {
        self.inner_max_iter.saturating_mul(self.outer_max_iter)
    }
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            inner_max_iter: 20,
            outer_max_iter: 100,
            outer_step_size: 1.0,
            outer_tol: 1e-6,
            projector: ProjectorOptions::default(),
        }
    }
}

/// How a fit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// The final solve converged and, with trimming, the outer loop met
    /// `outer_tol`.
    Converged,
    /// The final solver call did not report convergence.
    SolverNotConverged,
    /// The outer loop used `outer_max_iter` iterations without meeting
    /// `outer_tol`.
    OuterMaxIterReached,
}

/// Estimates and diagnostics of [`LimeModel::fit`].
///
/// - `objective`: likelihood objective at `(x, weights)`.
/// - `solver`: outcome of the last solver call.
/// - `outer_iterations`: `0` without trimming.
/// - `trimming_objective`: surrogate value at the final weights, when
///   trimming was active.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub beta: Array1<f64>,
    pub gamma: Array1<f64>,
    pub weights: Array1<f64>,
    pub x: Theta,
    pub objective: f64,
    pub solver: SolverOutcome,
    pub outer_iterations: usize,
    pub trimming_objective: Option<f64>,
    pub status: FitStatus,
}

impl LimeModel {
    /// Fit the model with `solver`, starting from `x0` or
    /// [`LimeModel::default_x0`].
    ///
    /// # Errors
    /// - `OptError::Model` for an `x0` of the wrong length.
    /// - `OptError::Trimming` for an invalid controller configuration.
    /// - Any error propagated by the solver or by the model callbacks.
    pub fn fit(
        &self, solver: &dyn NlpSolver, x0: Option<&Theta>, opts: &FitOptions,
    ) -> OptResult<FitResult> {
        let mut x = match x0 {
            Some(x0) => {
                self.split(x0.view())?;
                x0.clone()
            }
            None => self.default_x0(),
        };
        tracing::info!(
            num_obs = self.num_obs(),
            k_beta = self.k_beta(),
            k_gamma = self.k_gamma(),
            trimming = self.trimming().is_active(),
            "starting fit"
        );

        if !self.trimming().is_active() {
            let weights = Array1::ones(self.num_obs());
            let problem = self.problem(None)?;
            let outcome = solver.solve(&problem, &x, Some(opts.untrimmed_max_iter()))?;
            let status =
                if outcome.converged { FitStatus::Converged } else { FitStatus::SolverNotConverged };
            return self.finish(outcome, weights, 0, None, status);
        }

        let controller = TrimmingController::new(
            CappedSimplexProjector::new(opts.projector),
            opts.outer_step_size,
            self.trimming().num_inliers(self.num_obs()),
        )?;
        let mut weights = self.initial_weights();
        let mut previous = f64::INFINITY;
        let mut outer_converged = false;
        let mut outer_iterations = 0usize;

        while outer_iterations < opts.outer_max_iter {
            outer_iterations += 1;
            let problem = self.problem(Some(weights.view()))?;
            let outcome = solver.solve(&problem, &x, Some(opts.inner_max_iter))?;
            x = outcome.x_hat;

            let surrogate = self.trimming_objective(x.view())?;
            weights = controller.step(&surrogate, weights.view())?;
            let value = surrogate.value(weights.view())?;
            let change = (value - previous).abs();
            tracing::debug!(
                outer_iteration = outer_iterations,
                trimming_objective = value,
                change,
                solver_converged = outcome.converged,
                "outer iteration"
            );
            previous = value;
            if change < opts.outer_tol {
                outer_converged = true;
                break;
            }
        }

        let problem = self.problem(Some(weights.view()))?;
        let outcome = solver.solve(&problem, &x, Some(opts.inner_max_iter))?;
        let status = if !outcome.converged {
            FitStatus::SolverNotConverged
        } else if !outer_converged {
            FitStatus::OuterMaxIterReached
        } else {
            FitStatus::Converged
        };
        let surrogate = self.trimming_objective(outcome.x_hat.view())?;
        let trimming_value = surrogate.value(weights.view())?;
        self.finish(outcome, weights, outer_iterations, Some(trimming_value), status)
    }

    fn finish(
        &self, outcome: SolverOutcome, weights: Array1<f64>, outer_iterations: usize,
        trimming_objective: Option<f64>, status: FitStatus,
    ) -> OptResult<FitResult> {
        let x = outcome.x_hat.clone();
        let (beta, gamma) = self.split(x.view())?;
        let (beta, gamma) = (beta.to_owned(), gamma.to_owned());
        let objective = outcome.value;
        match status {
            FitStatus::Converged => {
                tracing::info!(objective, outer_iterations, "fit converged");
            }
            _ => {
                tracing::warn!(
                    objective,
                    outer_iterations,
                    ?status,
                    solver_status = %outcome.status,
                    "fit did not converge"
                );
            }
        }
        Ok(FitResult {
            beta,
            gamma,
            weights,
            x,
            objective,
            solver: outcome,
            outer_iterations,
            trimming_objective,
            status,
        })
    }
}

impl FitResult {
    /// Indices of observations whose weight is below `threshold`.
    pub fn trimmed(&self, threshold: f64) -> Vec<usize> {
        trimmed_indices(self.weights.view(), threshold)
    }
}

fn trimmed_indices(weights: ArrayView1<f64>, threshold: f64) -> Vec<usize> {
    weights.iter().enumerate().filter(|(_, w)| **w < threshold).map(|(i, _)| i).collect()
}
