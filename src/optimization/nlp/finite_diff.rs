//! nlp::finite_diff — finite-difference gradients with error capture.
//!
//! Purpose
//! -------
//! Provide finite-difference gradients around a parameter vector so that the
//! solver adapter can fall back on them when a problem has no analytic
//! gradient, and so that tests can compare analytic gradients against a
//! numerical reference, without depending directly on the `finitediff` API.
//!
//! Key behaviors
//! -------------
//! - [`fd_gradient`]: central differences, retried with forward differences
//!   when the central pass hits an evaluation error or a non-finite entry.
//! - [`run_fd_diff`]: the forward-difference retry on its own.
//! - [`check_gradient`]: analytic-versus-central comparison for any
//!   [`NlpProblem`], reported as a [`GradientCheck`].
//!
//! Invariants & assumptions
//! ------------------------
//! - The `finitediff` closures must return `f64`; the first error raised by
//!   the objective is parked in a `RefCell<Option<Error>>` and the closure
//!   returns `NaN`. After differencing the parked error is surfaced.
//! - Returned gradients always satisfy [`validate_grad`].
//!
//! Downstream usage
//! ----------------
//! - The argmin adapter calls [`fd_gradient`] when
//!   [`NlpProblem::gradient`] returns `GradientNotImplemented`.
//! - Model-level gradient checks call [`check_gradient`]; it is never on the
//!   optimization hot path.
use crate::optimization::{
    errors::{OptError, OptResult},
    nlp::{
        traits::NlpProblem,
        types::{Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Comparison of an analytic gradient with a central finite difference.
///
/// - `max_abs_err`: `max_j |g_j − ĝ_j|`.
/// - `max_rel_err`: `max_j |g_j − ĝ_j| / (1 + |ĝ_j|)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientCheck {
    pub analytic: Grad,
    pub numeric: Grad,
    pub max_abs_err: f64,
    pub max_rel_err: f64,
}

impl GradientCheck {
    /// `true` when every coordinate agrees within `rel_tol·(1 + |ĝ_j|)`.
    pub fn passes(&self, rel_tol: f64) -> bool {
        self.max_rel_err <= rel_tol
    }
}

/// fd_gradient — central-difference gradient with forward fallback.
///
/// Parameters
/// ----------
/// - `theta`: point at which to differentiate.
/// - `func`: fallible scalar objective.
///
/// Errors
/// ------
/// - The first error raised by `func`, if the forward retry also hits it.
/// - [`OptError::InvalidGradient`] / [`OptError::GradientDimMismatch`] if the
///   forward retry still yields an invalid gradient.
pub fn fd_gradient<F>(theta: &Theta, func: F) -> Result<Grad, Error>
where
    F: Fn(&Theta) -> Result<f64, Error>,
{
    let closure_err: RefCell<Option<Error>> = RefCell::new(None);
    let cost_func = |t: &Theta| -> f64 {
        match func(t) {
            Ok(val) => val,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                f64::NAN
            }
        }
    };
    let fd_grad = theta.central_diff(&cost_func);
    if closure_err.borrow().is_none() && validate_grad(&fd_grad, theta.len()).is_ok() {
        return Ok(fd_grad);
    }
    run_fd_diff(theta, &cost_func, &closure_err)
}

/// run_fd_diff — forward-difference gradient with error capture and validation.
///
/// Clears `closure_err`, runs `forward_diff`, and returns the parked error if
/// `func` raised one; otherwise validates and returns the gradient.
///
/// # Errors
/// Any error captured from `func`, or a [`validate_grad`] failure.
pub fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> Result<Grad, Error> {
    closure_err.replace(None);
    let fd_grad = theta.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_grad(&fd_grad, theta.len())?;
    Ok(fd_grad)
}

/// check_gradient — compare `problem.gradient(x)` with a central difference
/// of `problem.objective`.
///
/// # Errors
/// - Errors from the objective or the analytic gradient.
/// - [`OptError::GradientNotImplemented`] when the problem has no analytic
///   gradient to check.
pub fn check_gradient(problem: &dyn NlpProblem, x: &Theta) -> OptResult<GradientCheck> {
    problem.check(x)?;
    let analytic = problem.gradient(x)?;
    validate_grad(&analytic, x.len())?;
    let numeric = fd_gradient(x, |t| problem.objective(t).map_err(Error::from))?;

    let mut max_abs_err = 0.0_f64;
    let mut max_rel_err = 0.0_f64;
    for (&a, &n) in analytic.iter().zip(numeric.iter()) {
        let abs = (a - n).abs();
        max_abs_err = max_abs_err.max(abs);
        max_rel_err = max_rel_err.max(abs / (1.0 + n.abs()));
    }
    if !max_abs_err.is_finite() {
        return Err(OptError::NonFiniteCost { value: max_abs_err });
    }
    Ok(GradientCheck { analytic, numeric, max_abs_err, max_rel_err })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::nlp::types::Cost;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Central differences on a smooth function.
    // - Surfacing of an error raised by the objective during differencing.
    // - `check_gradient` catching a wrong analytic gradient.
    // -------------------------------------------------------------------------

    struct Rosenbrock {
        wrong_gradient: bool,
    }

    impl NlpProblem for Rosenbrock {
        fn num_variables(&self) -> usize {
            2
        }

        fn objective(&self, x: &Theta) -> OptResult<Cost> {
            Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
        }

        fn gradient(&self, x: &Theta) -> OptResult<Grad> {
            let g0 = -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0] * x[0]);
            let g1 = 200.0 * (x[1] - x[0] * x[0]);
            if self.wrong_gradient { Ok(array![g0, 2.0 * g1]) } else { Ok(array![g0, g1]) }
        }
    }

    #[test]
    // Purpose
    // -------
    // Central differences of a quadratic match its exact gradient.
    fn fd_gradient_matches_quadratic_gradient() {
        let theta = array![1.5, -2.0, 0.25];

        let grad = fd_gradient(&theta, |t| Ok(t.dot(t))).expect("smooth objective");

        for (g, t) in grad.iter().zip(theta.iter()) {
            assert!((g - 2.0 * t).abs() < 1e-6);
        }
    }

    #[test]
    // Purpose
    // -------
    // An error raised by the objective is returned rather than turned into a
    // NaN gradient.
    fn fd_gradient_surfaces_objective_errors() {
        let theta = array![0.0, 0.0];

        let err = fd_gradient(&theta, |_| Err(OptError::NonFiniteCost { value: f64::NAN }.into()))
            .unwrap_err();

        assert!(matches!(OptError::from(err), OptError::NonFiniteCost { .. }));
    }

    #[test]
    // Purpose
    // -------
    // `check_gradient` passes for the correct gradient and flags a wrong one.
    fn check_gradient_detects_wrong_analytic_gradient() {
        let x = array![-0.7, 1.1];

        let good = check_gradient(&Rosenbrock { wrong_gradient: false }, &x).expect("check runs");
        let bad = check_gradient(&Rosenbrock { wrong_gradient: true }, &x).expect("check runs");

        assert!(good.passes(1e-5), "max_rel_err = {}", good.max_rel_err);
        assert!(!bad.passes(1e-2));
    }
}
