//! Execution helper that runs an `argmin` L-BFGS solver on an adapted NLP
//! problem and returns the raw pieces of its final state.
use crate::optimization::{
    errors::OptResult,
    nlp::{
        adapter::ArgMinAdapter,
        traits::SolverOptions,
        types::{FnEvalMap, Grad, Theta},
        validation::validate_theta_hat,
    },
};
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient};
use argmin::core::{Executor, IterState, Solver, State, TerminationStatus};
use argmin_math::ArgminL2Norm;

/// Final state of one solver run, in θ-space.
#[derive(Debug, Clone)]
pub struct LbfgsRun {
    pub theta_hat: Theta,
    pub cost: f64,
    pub termination: TerminationStatus,
    pub iterations: u64,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

/// Run an `argmin` optimization for an adapted problem.
///
/// This is the shared runner used by both line-search variants. It wires up:
/// - the adapted problem,
/// - the chosen `Solver` (L-BFGS with Hager–Zhang/More–Thuente),
/// - the initial parameter `theta0`,
/// - optional observers (behind the `obs_slog` feature),
/// - the iteration cap (`max_iter`, else `opts.tols.max_iter`),
///
/// then executes the solver and extracts the best parameter and cost.
///
/// # Feature flags
/// With `obs_slog` enabled and `opts.verbose == true`, a terminal slog
/// observer is attached with `ObserverMode::Always` and the starting cost and
/// gradient norm are logged before the first iteration.
///
/// # Errors
/// - Propagates any `argmin` runtime error (line-search failures, errors
///   raised by the problem callbacks) via `From<argmin::core::Error>`.
/// - `MissingThetaHat` / `InvalidThetaHat` if the best parameter is absent or
///   non-finite.
pub fn run_lbfgs<'a, S>(
    theta0: Theta, opts: &SolverOptions, max_iter: Option<usize>, problem: ArgMinAdapter<'a>,
    solver: S,
) -> OptResult<LbfgsRun>
where
    S: Solver<ArgMinAdapter<'a>, IterState<Theta, Grad, (), (), (), f64>> + Send + 'static,
{
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        log_initial_state(&theta0, &problem)?;
    }
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(theta0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = max_iter.or(opts.tols.max_iter) {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let fn_evals = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let grad_norm = result.take_gradient().map(|g| g.l2_norm());
    let cost = result.get_best_cost();
    let theta_hat = validate_theta_hat(result.take_best_param())?;
    tracing::debug!(iterations, cost, status = ?termination, "L-BFGS run finished");
    Ok(LbfgsRun { theta_hat, cost, termination, iterations, fn_evals, grad_norm })
}

// ---- Helper Methods ----

#[cfg(feature = "obs_slog")]
fn log_initial_state(theta0: &Theta, problem: &ArgMinAdapter<'_>) -> OptResult<()> {
    let c0 = problem.cost(theta0)?;
    let g0n = problem.gradient(theta0).ok().map(|g| g.l2_norm());
    tracing::info!(cost = c0, grad_norm = ?g0n, "L-BFGS initial state");
    Ok(())
}
