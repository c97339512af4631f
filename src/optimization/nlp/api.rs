//! High-level entry point for minimizing an [`NlpProblem`].
//!
//! Bounds are handled by reparameterization ([`BoxTransform`]), range
//! constraints by a quadratic-penalty continuation, and each inner run is an
//! Argmin L-BFGS solve with the configured line search. [`LbfgsSolver`] wraps
//! [`minimize`] behind the [`NlpSolver`] trait.
use ndarray::Array1;

use crate::optimization::{
    errors::{OptError, OptResult},
    nlp::{
        adapter::{ArgMinAdapter, RangePenalty, range_violation},
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::{LbfgsRun, run_lbfgs},
        traits::{LineSearcher, NlpProblem, NlpSolver, SolverOptions, SolverOutcome},
        types::{FnEvalMap, Theta},
        validation::{validate_constraints, validate_range_bounds},
    },
    numerical_stability::BoxTransform,
};

/// Minimize `problem` from `x0` with L-BFGS.
///
/// # Behavior
/// - Validates `x0` via `problem.check` and builds the box transform from
///   `problem.bounds()`; `x0` is clamped into the box before mapping to θ.
/// - Without range constraints: a single solver run.
/// - With range constraints: up to `opts.penalty.max_rounds` runs, each
///   warm-started from the previous estimate, multiplying `ρ` by
///   `opts.penalty.growth` while the largest violation exceeds
///   `opts.penalty.violation_tol`.
/// - `max_iter` (else `opts.tols.max_iter`) caps each run.
/// - A run that fails inside the line search is retried once with the other
///   line search from the same starting point.
///
/// # Errors
/// - Propagates `problem.check`, bound, and constraint-range validation
///   errors.
/// - Propagates errors raised by the problem callbacks during the solve,
///   with their original variant (e.g. `OptError::Covariance`).
/// - Propagates solver errors that persist after the retry.
///
/// # Returns
/// A [`SolverOutcome`] whose `value` is the unpenalized objective at
/// `x_hat`.
pub fn minimize(
    problem: &dyn NlpProblem, x0: &Theta, opts: &SolverOptions, max_iter: Option<usize>,
) -> OptResult<SolverOutcome> {
    problem.check(x0)?;
    let n = problem.num_variables();
    let (lb, ub) = problem.bounds();
    for len in [lb.len(), ub.len()] {
        if len != n {
            return Err(OptError::ParameterLengthMismatch { expected: n, found: len });
        }
    }
    let transform = BoxTransform::new(lb.view(), ub.view())?;
    let m = problem.num_constraints();
    let (cl, cu) = problem.constraint_bounds();
    if m > 0 {
        validate_range_bounds(&cl, &cu, m)?;
    }

    let rounds = if m == 0 { 1 } else { opts.penalty.max_rounds };
    let tol = opts.penalty.violation_tol;
    let mut rho = opts.penalty.initial;
    let mut theta = transform.to_unconstrained(transform.clamp(x0.view()).view());
    let mut iterations = 0u64;
    let mut fn_evals = FnEvalMap::new();
    let mut max_violation = 0.0;
    let mut performed = 0usize;
    let mut last: Option<LbfgsRun> = None;

    for round in 0..rounds {
        let penalty = (m > 0).then(|| RangePenalty { rho, lower: cl.view(), upper: cu.view() });
        let run = run_with_retry(problem, &transform, penalty, theta, opts, max_iter)?;
        performed += 1;
        iterations += run.iterations;
        for (name, count) in run.fn_evals.iter() {
            *fn_evals.entry(name.clone()).or_insert(0) += count;
        }
        let x = transform.to_constrained(run.theta_hat.view());
        max_violation = largest_violation(problem, &x, &cl, &cu)?;
        theta = run.theta_hat.clone();
        last = Some(run);
        if max_violation <= tol {
            break;
        }
        if round + 1 < rounds {
            tracing::debug!(round, rho, max_violation, "constraint violation above tolerance");
            rho *= opts.penalty.growth;
        }
    }

    let run = last.ok_or(OptError::MissingThetaHat)?;
    let x_hat = transform.to_constrained(run.theta_hat.view());
    let value = problem.objective(&x_hat)?;
    SolverOutcome::new(
        Some(x_hat),
        value,
        &run.termination,
        iterations,
        fn_evals,
        run.grad_norm,
        max_violation,
        tol,
        performed,
    )
}

/// Argmin-backed L-BFGS implementation of [`NlpSolver`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LbfgsSolver {
    opts: SolverOptions,
}

impl LbfgsSolver {
    pub fn new(opts: SolverOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &SolverOptions {
        &self.opts
    }
}

impl NlpSolver for LbfgsSolver {
    fn solve(
        &self, problem: &dyn NlpProblem, x0: &Theta, max_iter: Option<usize>,
    ) -> OptResult<SolverOutcome> {
        minimize(problem, x0, &self.opts, max_iter)
    }
}

// ---- Helper Methods ----

fn run_once<'a>(
    problem: &'a dyn NlpProblem, transform: &'a BoxTransform, penalty: Option<RangePenalty<'a>>,
    theta0: Theta, opts: &SolverOptions, searcher: LineSearcher, max_iter: Option<usize>,
) -> OptResult<LbfgsRun> {
    let adapter = ArgMinAdapter::new(problem, transform, penalty);
    match searcher {
        LineSearcher::HagerZhang => {
            run_lbfgs(theta0, opts, max_iter, adapter, build_optimizer_hager_zhang(opts)?)
        }
        LineSearcher::MoreThuente => {
            run_lbfgs(theta0, opts, max_iter, adapter, build_optimizer_more_thuente(opts)?)
        }
    }
}

fn run_with_retry<'a>(
    problem: &'a dyn NlpProblem, transform: &'a BoxTransform, penalty: Option<RangePenalty<'a>>,
    theta0: Theta, opts: &SolverOptions, max_iter: Option<usize>,
) -> OptResult<LbfgsRun> {
    match run_once(problem, transform, penalty, theta0.clone(), opts, opts.line_searcher, max_iter)
    {
        Err(err) if is_line_search_failure(&err) => {
            let alternate = opts.line_searcher.alternate();
            tracing::warn!(error = %err, ?alternate, "line search failed; retrying");
            run_once(problem, transform, penalty, theta0, opts, alternate, max_iter)
        }
        other => other,
    }
}

fn is_line_search_failure(err: &OptError) -> bool {
    matches!(
        err,
        OptError::ConditionViolated { .. }
            | OptError::PotentialBug { .. }
            | OptError::NonFiniteCost { .. }
    )
}

fn largest_violation(
    problem: &dyn NlpProblem, x: &Theta, cl: &Array1<f64>, cu: &Array1<f64>,
) -> OptResult<f64> {
    let m = problem.num_constraints();
    if m == 0 {
        return Ok(0.0);
    }
    let values = problem.constraints(x)?;
    validate_constraints(&values, m)?;
    let viol = range_violation(&values, cl.view(), cu.view());
    Ok(viol.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance::CovError;
    use crate::optimization::nlp::{
        traits::{PenaltyOptions, Tolerances},
        types::{Cost, Grad, Jacobian},
    };
    use ndarray::{Array2, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Bound handling through the box transform (solution on a bound).
    // - Penalty continuation for a linear range constraint.
    // - Finite-difference fallback through the `NlpSolver` trait object.
    // - Recovery of typed callback errors after travelling through argmin.
    // -------------------------------------------------------------------------

    // f(x) = (x0 - a0)² + 2·(x1 - a1)² with optional bounds and x0 + x1 ≤ cap.
    struct Bowl {
        center: [f64; 2],
        lower: [f64; 2],
        cap: Option<f64>,
        analytic: bool,
    }

    impl NlpProblem for Bowl {
        fn num_variables(&self) -> usize {
            2
        }

        fn objective(&self, x: &Theta) -> OptResult<Cost> {
            Ok((x[0] - self.center[0]).powi(2) + 2.0 * (x[1] - self.center[1]).powi(2))
        }

        fn gradient(&self, x: &Theta) -> OptResult<Grad> {
            if !self.analytic {
                return Err(OptError::GradientNotImplemented);
            }
            Ok(array![2.0 * (x[0] - self.center[0]), 4.0 * (x[1] - self.center[1])])
        }

        fn bounds(&self) -> (Theta, Theta) {
            (array![self.lower[0], self.lower[1]], Array1::from_elem(2, f64::INFINITY))
        }

        fn num_constraints(&self) -> usize {
            usize::from(self.cap.is_some())
        }

        fn constraints(&self, x: &Theta) -> OptResult<Array1<f64>> {
            Ok(match self.cap {
                Some(_) => array![x[0] + x[1]],
                None => Array1::zeros(0),
            })
        }

        fn jacobian(&self, _x: &Theta) -> OptResult<Jacobian> {
            Ok(Array2::from_elem((self.num_constraints(), 2), 1.0))
        }

        fn constraint_bounds(&self) -> (Array1<f64>, Array1<f64>) {
            match self.cap {
                Some(cap) => (array![f64::NEG_INFINITY], array![cap]),
                None => (Array1::zeros(0), Array1::zeros(0)),
            }
        }
    }

    struct Failing;

    impl NlpProblem for Failing {
        fn num_variables(&self) -> usize {
            1
        }

        fn objective(&self, _x: &Theta) -> OptResult<Cost> {
            Err(OptError::Covariance(CovError::CorrectionNotPositiveDefinite { group: 2 }))
        }
    }

    const NEG_INF: f64 = f64::NEG_INFINITY;

    #[test]
    // Purpose
    // -------
    // With x1 ≥ 0 and the unconstrained minimizer at x1 = -2, the solution
    // sits on the bound and x0 is unaffected.
    //
    // Expect
    // ------
    // - x_hat ≈ (1, 0), x_hat inside the box.
    fn minimize_respects_lower_bound() {
        let problem = Bowl { center: [1.0, -2.0], lower: [NEG_INF, 0.0], cap: None, analytic: true };
        let x0 = array![0.0, 1.0];

        let outcome =
            minimize(&problem, &x0, &SolverOptions::default(), None).expect("solve succeeds");

        assert!((outcome.x_hat[0] - 1.0).abs() < 1e-4, "x0 = {}", outcome.x_hat[0]);
        assert!(outcome.x_hat[1] >= 0.0 && outcome.x_hat[1] < 1e-4, "x1 = {}", outcome.x_hat[1]);
        assert_eq!(outcome.penalty_rounds, 1);
        assert_eq!(outcome.max_violation, 0.0);
    }

    #[test]
    // Purpose
    // -------
    // A violated linear range constraint is enforced by penalty continuation.
    //
    // Given
    // -----
    // - Center (1, 1), weights (1, 2), constraint x0 + x1 ≤ 1; the exact
    //   solution is (1/3, 2/3).
    //
    // Expect
    // ------
    // - More than one penalty round; violation within tolerance; x_hat near
    //   the exact solution.
    fn minimize_enforces_range_constraint_by_penalty() {
        let problem =
            Bowl { center: [1.0, 1.0], lower: [NEG_INF, NEG_INF], cap: Some(1.0), analytic: true };
        let opts = SolverOptions {
            penalty: PenaltyOptions::new(10.0, 10.0, 8, 1e-4).expect("valid penalty"),
            ..SolverOptions::default()
        };

        let outcome = minimize(&problem, &array![0.0, 0.0], &opts, None).expect("solve succeeds");

        assert!(outcome.penalty_rounds > 1);
        assert!(outcome.max_violation <= 1e-4, "violation = {}", outcome.max_violation);
        assert!((outcome.x_hat[0] - 1.0 / 3.0).abs() < 1e-3, "x0 = {}", outcome.x_hat[0]);
        assert!((outcome.x_hat[1] - 2.0 / 3.0).abs() < 1e-3, "x1 = {}", outcome.x_hat[1]);
    }

    #[test]
    // Purpose
    // -------
    // A problem without an analytic gradient is solved through the trait
    // object using finite differences.
    fn lbfgs_solver_uses_finite_differences_without_gradient() {
        let problem =
            Bowl { center: [3.0, -1.0], lower: [NEG_INF, NEG_INF], cap: None, analytic: false };
        let opts = SolverOptions {
            tols: Tolerances::new(Some(1e-5), None, Some(200)).expect("valid tolerances"),
            ..SolverOptions::default()
        };
        let solver: &dyn NlpSolver = &LbfgsSolver::new(opts);

        let outcome = solver.solve(&problem, &array![0.0, 0.0], None).expect("solve succeeds");

        assert!((outcome.x_hat[0] - 3.0).abs() < 1e-3);
        assert!((outcome.x_hat[1] + 1.0).abs() < 1e-3);
        assert!(outcome.value < 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // A numerical failure raised inside the objective comes back with its
    // original variant, and a wrong starting length is rejected up front.
    fn minimize_propagates_typed_callback_errors() {
        let err = minimize(&Failing, &array![0.5], &SolverOptions::default(), None).unwrap_err();

        assert_eq!(err, OptError::Covariance(CovError::CorrectionNotPositiveDefinite { group: 2 }));
        assert!(matches!(
            minimize(&Failing, &array![0.5, 1.0], &SolverOptions::default(), None),
            Err(OptError::ParameterLengthMismatch { expected: 1, found: 2 })
        ));
    }
}
