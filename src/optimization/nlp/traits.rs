//! Public API surface of the NLP layer.
//!
//! - [`NlpProblem`]: callbacks a model exposes to a solver (objective,
//!   gradient, simple bounds, range constraints).
//! - [`NlpSolver`]: anything that can minimize an [`NlpProblem`] from a
//!   starting point.
//! - [`SolverOptions`], [`Tolerances`], [`PenaltyOptions`]: configuration for
//!   the bundled L-BFGS solver.
//! - [`LineSearcher`]: choice of line search used by L-BFGS.
//! - [`SolverOutcome`]: normalized result of a solve.
//!
//! Convention: problems are *minimized*. Bounds and constraint ranges use
//! `±∞` for absent sides.
use crate::optimization::{
    errors::{OptError, OptResult},
    nlp::{
        types::{Cost, FnEvalMap, Grad, Jacobian, Theta},
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
};
use argmin::core::{TerminationReason, TerminationStatus};
use ndarray::{Array1, Array2};
use std::str::FromStr;

/// Callbacks of a bound- and range-constrained nonlinear program
///
///   minimize f(x)  s.t.  lb ≤ x ≤ ub,  cl ≤ C(x) ≤ cu.
///
/// Required:
/// - `num_variables()`: dimension `n` of `x`.
/// - `objective(x)`: `f(x)`. Errors are propagated out of the solver.
///
/// Optional:
/// - `gradient(x)`: `∇f(x)`. Defaults to
///   [`OptError::GradientNotImplemented`], in which case the solver falls
///   back to finite differences.
/// - `bounds()`: `(lb, ub)`; defaults to unbounded.
/// - `num_constraints()`, `constraints(x)`, `jacobian(x)`,
///   `constraint_bounds()`: range constraints; default to none.
/// - `check(x)`: called once on the starting point; the default checks the
///   length.
pub trait NlpProblem {
    // Required methods
    fn num_variables(&self) -> usize;
    fn objective(&self, x: &Theta) -> OptResult<Cost>;

    // Optional methods
    fn gradient(&self, _x: &Theta) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }

    fn bounds(&self) -> (Theta, Theta) {
        let n = self.num_variables();
        (Array1::from_elem(n, f64::NEG_INFINITY), Array1::from_elem(n, f64::INFINITY))
    }

    fn num_constraints(&self) -> usize {
        0
    }

    fn constraints(&self, _x: &Theta) -> OptResult<Array1<f64>> {
        Ok(Array1::zeros(0))
    }

    fn jacobian(&self, _x: &Theta) -> OptResult<Jacobian> {
        Ok(Array2::zeros((0, self.num_variables())))
    }

    fn constraint_bounds(&self) -> (Array1<f64>, Array1<f64>) {
        (Array1::zeros(0), Array1::zeros(0))
    }

    fn check(&self, x: &Theta) -> OptResult<()> {
        if x.len() != self.num_variables() {
            return Err(OptError::ParameterLengthMismatch {
                expected: self.num_variables(),
                found: x.len(),
            });
        }
        Ok(())
    }
}

/// A solver for [`NlpProblem`]s.
///
/// `max_iter`, when given, overrides the solver's own iteration cap for this
/// call. Non-convergence is reported through [`SolverOutcome::converged`],
/// not as an error.
pub trait NlpSolver {
    fn solve(
        &self, problem: &dyn NlpProblem, x0: &Theta, max_iter: Option<usize>,
    ) -> OptResult<SolverOutcome>;
}

/// Choice of line search used inside the L-BFGS solver.
///
/// Parsing is case-insensitive (`"MoreThuente"`, `"HagerZhang"`); unknown
/// names return [`OptError::InvalidLineSearch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl LineSearcher {
    /// The other line search, used as a one-shot retry after a failed run.
    pub fn alternate(self) -> Self {
        match self {
            LineSearcher::MoreThuente => LineSearcher::HagerZhang,
            LineSearcher::HagerZhang => LineSearcher::MoreThuente,
        }
    }
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Numerical tolerances and iteration limits used by the optimizer.
///
/// - `tol_grad`: terminate when the gradient norm falls below this threshold.
/// - `tol_cost`: terminate when the change in cost falls below this threshold.
/// - `max_iter`: hard cap on the number of iterations per solver run.
///
/// Any field can be `None` but **at least one** of the three must be provided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Construct validated tolerances.
    ///
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] if all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for
    ///   non-finite or non-positive tolerances.
    /// - [`OptError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_cost(tol_cost)?;
        verify_tol_grad(tol_grad)?;
        if let Some(max_iter) = max_iter {
            verify_max_iter(max_iter)?;
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self { tol_grad: Some(1e-6), tol_cost: None, max_iter: Some(300) }
    }
}

/// Quadratic-penalty continuation for range constraints.
///
/// Each round minimizes `f(x) + 0.5·ρ·‖C(x) − clip(C(x), cl, cu)‖²`; when the
/// largest violation exceeds `violation_tol`, `ρ` is multiplied by `growth`
/// and the next round warm-starts from the previous estimate.
///
/// Default: `initial = 10`, `growth = 10`, `max_rounds = 8`,
/// `violation_tol = 1e-6`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyOptions {
    pub initial: f64,
    pub growth: f64,
    pub max_rounds: usize,
    pub violation_tol: f64,
}

impl PenaltyOptions {
    /// # Errors
    /// [`OptError::InvalidPenalty`] unless `initial > 0`, `growth > 1`,
    /// `violation_tol > 0` (all finite) and `max_rounds ≥ 1`.
    pub fn new(
        initial: f64, growth: f64, max_rounds: usize, violation_tol: f64,
    ) -> OptResult<Self> {
        if !(initial.is_finite() && initial > 0.0) {
            return Err(OptError::InvalidPenalty {
                value: initial,
                reason: "Initial penalty weight must be finite and positive.",
            });
        }
        if !(growth.is_finite() && growth > 1.0) {
            return Err(OptError::InvalidPenalty {
                value: growth,
                reason: "Penalty growth factor must be finite and greater than one.",
            });
        }
        if max_rounds == 0 {
            return Err(OptError::InvalidPenalty {
                value: 0.0,
                reason: "At least one penalty round is required.",
            });
        }
        if !(violation_tol.is_finite() && violation_tol > 0.0) {
            return Err(OptError::InvalidPenalty {
                value: violation_tol,
                reason: "Violation tolerance must be finite and positive.",
            });
        }
        Ok(Self { initial, growth, max_rounds, violation_tol })
    }
}

impl Default for PenaltyOptions {
    fn default() -> Self {
        Self { initial: 10.0, growth: 10.0, max_rounds: 8, violation_tol: 1e-6 }
    }
}

/// Optimizer-level configuration.
///
/// Fields:
/// - `tols`: numerical tolerances and iteration limits.
/// - `line_searcher`: line-search algorithm used by L-BFGS.
/// - `lbfgs_mem`: history size; `None` uses [`DEFAULT_LBFGS_MEM`](super::types::DEFAULT_LBFGS_MEM).
/// - `penalty`: continuation schedule for range constraints.
/// - `verbose`: attach the slog observer (behind the `obs_slog` feature).
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    pub lbfgs_mem: Option<usize>,
    pub penalty: PenaltyOptions,
    pub verbose: bool,
}

impl SolverOptions {
    /// # Errors
    /// [`OptError::InvalidLBFGSMem`] if `lbfgs_mem == Some(0)`.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, lbfgs_mem: Option<usize>,
        penalty: PenaltyOptions, verbose: bool,
    ) -> OptResult<Self> {
        if let Some(m) = lbfgs_mem {
            if m == 0 {
                return Err(OptError::InvalidLBFGSMem {
                    mem: m,
                    reason: "L-BFGS memory must be greater than zero.",
                });
            }
        }
        Ok(Self { tols, line_searcher, lbfgs_mem, penalty, verbose })
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances::default(),
            line_searcher: LineSearcher::MoreThuente,
            lbfgs_mem: None,
            penalty: PenaltyOptions::default(),
            verbose: false,
        }
    }
}

/// Canonical result of [`NlpSolver::solve`].
///
/// - `x_hat`: best parameter vector found, in model space.
/// - `value`: objective `f(x_hat)` without any penalty terms.
/// - `converged`: solver met a tolerance (not the iteration cap) and the
///   constraint violation is within tolerance.
/// - `status`: human-readable termination status of the last run.
/// - `iterations` / `fn_evals`: summed over all penalty rounds.
/// - `grad_norm`: norm of the last solver-space gradient, if available.
/// - `max_violation`: `max_j |C_j − clip(C_j, cl_j, cu_j)|` at `x_hat`.
/// - `penalty_rounds`: number of solver runs performed.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub x_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
    pub max_violation: f64,
    pub penalty_rounds: usize,
}

impl SolverOutcome {
    /// Build a validated outcome from the final state of a solve.
    ///
    /// # Errors
    /// Propagates `validate_theta_hat` / `validate_value` failures.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        x_hat: Option<Theta>, value: f64, termination: &TerminationStatus, iterations: u64,
        fn_evals: FnEvalMap, grad_norm: Option<f64>, max_violation: f64, violation_tol: f64,
        penalty_rounds: usize,
    ) -> OptResult<Self> {
        let x_hat = validate_theta_hat(x_hat)?;
        validate_value(value)?;
        let (solver_ok, status) = match termination {
            TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
            TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
                (false, format!("{termination:?}"))
            }
            _ => (true, format!("{termination:?}")),
        };
        let converged = solver_ok && max_violation <= violation_tol;
        Ok(Self {
            x_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm,
            max_violation,
            penalty_rounds,
        })
    }
}

fn verify_max_iter(max_iter: usize) -> OptResult<()> {
    if max_iter == 0 {
        return Err(OptError::InvalidMaxIter {
            max_iter,
            reason: "Maximum iterations must be greater than zero.",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Validating constructors of the option structs.
    // - Default implementations of the optional `NlpProblem` callbacks.
    // - Mapping of termination status to `converged`.
    // -------------------------------------------------------------------------

    struct Quadratic;

    impl NlpProblem for Quadratic {
        fn num_variables(&self) -> usize {
            2
        }

        fn objective(&self, x: &Theta) -> OptResult<Cost> {
            Ok(x.dot(x))
        }
    }

    #[test]
    // Purpose
    // -------
    // Option constructors reject out-of-range settings.
    fn option_constructors_validate_inputs() {
        assert_eq!(Tolerances::new(None, None, None), Err(OptError::NoTolerancesProvided));
        assert!(matches!(
            Tolerances::new(Some(1e-6), None, Some(0)),
            Err(OptError::InvalidMaxIter { .. })
        ));
        assert!(matches!(PenaltyOptions::new(1.0, 1.0, 3, 1e-6), Err(OptError::InvalidPenalty { .. })));
        assert!(matches!(
            SolverOptions::new(
                Tolerances::default(),
                LineSearcher::HagerZhang,
                Some(0),
                PenaltyOptions::default(),
                false
            ),
            Err(OptError::InvalidLBFGSMem { .. })
        ));
        assert_eq!("hagerZHANG".parse::<LineSearcher>(), Ok(LineSearcher::HagerZhang));
        assert!("bfgs".parse::<LineSearcher>().is_err());
    }

    #[test]
    // Purpose
    // -------
    // A problem that implements only the required callbacks is unbounded,
    // unconstrained, and asks for finite differences.
    fn nlp_problem_defaults_describe_unconstrained_problem() {
        let problem = Quadratic;
        let x = array![1.0, 2.0];

        let (lb, ub) = problem.bounds();

        assert!(lb.iter().all(|v| *v == f64::NEG_INFINITY));
        assert!(ub.iter().all(|v| *v == f64::INFINITY));
        assert_eq!(problem.num_constraints(), 0);
        assert_eq!(problem.jacobian(&x).expect("empty jacobian").dim(), (0, 2));
        assert_eq!(problem.gradient(&x), Err(OptError::GradientNotImplemented));
        assert!(matches!(
            problem.check(&array![1.0]),
            Err(OptError::ParameterLengthMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Hitting the iteration cap or leaving a violation above tolerance is
    // reported as not converged.
    fn solver_outcome_maps_termination_to_converged() {
        let converged = TerminationStatus::Terminated(TerminationReason::SolverConverged);
        let capped = TerminationStatus::Terminated(TerminationReason::MaxItersReached);

        let ok = SolverOutcome::new(
            Some(array![0.0]),
            1.0,
            &converged,
            4,
            FnEvalMap::new(),
            None,
            0.0,
            1e-6,
            1,
        )
        .expect("valid outcome");
        let hit_cap =
            SolverOutcome::new(Some(array![0.0]), 1.0, &capped, 9, FnEvalMap::new(), None, 0.0, 1e-6, 1)
                .expect("valid outcome");
        let violated = SolverOutcome::new(
            Some(array![0.0]),
            1.0,
            &converged,
            4,
            FnEvalMap::new(),
            None,
            1e-2,
            1e-6,
            8,
        )
        .expect("valid outcome");

        assert!(ok.converged);
        assert!(!hit_cap.converged);
        assert!(!violated.converged);
    }
}
