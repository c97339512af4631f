//! nlp::builders — L-BFGS solver construction helpers.
//!
//! Purpose
//! -------
//! Build L-BFGS solvers with either line search and apply the crate-level
//! tolerances from [`SolverOptions`], so that higher layers never touch
//! Argmin's generic wiring.
//!
//! Conventions
//! -----------
//! - Builders do **not** set the initial parameter vector or `max_iters`;
//!   those are runtime concerns applied by the runner (`run_lbfgs`).
//! - The history size is `opts.lbfgs_mem` or [`DEFAULT_LBFGS_MEM`].
//! - Tolerance errors raised by Argmin are converted into [`OptError`]
//!   (`crate::optimization::errors::OptError`) through `From`.
use argmin::solver::quasinewton::LBFGS;

use crate::optimization::{
    errors::OptResult,
    nlp::{
        traits::SolverOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Theta,
        },
    },
};

/// Construct L-BFGS with the Hager–Zhang line search.
///
/// # Errors
/// Returns an `OptError` when Argmin rejects a tolerance.
pub fn build_optimizer_hager_zhang(opts: &SolverOptions) -> OptResult<LbfgsHagerZhang> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsHagerZhang::new(HagerZhangLS::new(), mem), opts)
}

/// Construct L-BFGS with the More–Thuente line search.
///
/// # Errors
/// Returns an `OptError` when Argmin rejects a tolerance.
pub fn build_optimizer_more_thuente(opts: &SolverOptions) -> OptResult<LbfgsMoreThuente> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsMoreThuente::new(MoreThuenteLS::new(), mem), opts)
}

/// configure_lbfgs — apply optional tolerances to an L-BFGS solver.
///
/// When a tolerance is `None` the corresponding `with_tolerance_*` call is
/// skipped and Argmin's default stays in effect. Generic over the line
/// search so both builders share it.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &SolverOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}
