//! Validation helpers for the NLP layer.
//!
//! This module centralizes the consistency checks used across the solver
//! interface:
//!
//! - **Tolerance checks**: [`verify_tol_grad`], [`verify_tol_cost`] ensure
//!   numeric tolerances are finite and strictly positive when provided.
//! - **Gradient validation**: [`validate_grad`] enforces correct dimension
//!   and finite entries.
//! - **Constraint validation**: [`validate_constraints`] and
//!   [`validate_jacobian`] check what a problem's constraint callbacks
//!   return; [`validate_range_bounds`] checks `(cl, cu)` once per solve.
//! - **Outcomes**: [`validate_theta_hat`] and [`validate_value`] check the
//!   final estimate and objective.
//!
//! All helpers return domain-specific [`OptError`] variants so higher-level
//! code reports problems uniformly.
use ndarray::Array1;

use crate::optimization::{
    errors::{OptError, OptResult},
    nlp::types::{Grad, Jacobian, Theta},
};

/// Validate the optional gradient‐norm tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolGrad`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate the optional cost‐change tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolCost`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate a gradient vector against dimension and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if length does not match `dim`.
/// - [`OptError::InvalidGradient`] for the first non-finite element.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate the output of a constraint callback.
///
/// # Errors
/// - [`OptError::ConstraintDimMismatch`] if `values.len() != expected`.
/// - [`OptError::NonFiniteConstraint`] for the first non-finite value.
pub fn validate_constraints(values: &Array1<f64>, expected: usize) -> OptResult<()> {
    if values.len() != expected {
        return Err(OptError::ConstraintDimMismatch { expected, found: values.len() });
    }
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::NonFiniteConstraint { index, value: values[index] }),
        None => Ok(()),
    }
}

/// Validate the shape of a constraint Jacobian (`m × n`).
///
/// # Errors
/// Returns [`OptError::JacobianShapeMismatch`] on a shape mismatch.
pub fn validate_jacobian(jac: &Jacobian, rows: usize, cols: usize) -> OptResult<()> {
    if jac.dim() != (rows, cols) {
        return Err(OptError::JacobianShapeMismatch { expected: (rows, cols), found: jac.dim() });
    }
    Ok(())
}

/// Validate the range `(cl, cu)` of `m` constraints.
///
/// # Errors
/// - [`OptError::ConstraintDimMismatch`] if either vector is not length `m`.
/// - [`OptError::InvalidBounds`] for NaN entries or `cl > cu`.
pub fn validate_range_bounds(lower: &Array1<f64>, upper: &Array1<f64>, m: usize) -> OptResult<()> {
    for len in [lower.len(), upper.len()] {
        if len != m {
            return Err(OptError::ConstraintDimMismatch { expected: m, found: len });
        }
    }
    for (index, (&l, &u)) in lower.iter().zip(upper.iter()).enumerate() {
        if l.is_nan() || u.is_nan() || l > u {
            return Err(OptError::InvalidBounds {
                index,
                lower: l,
                upper: u,
                reason: "Constraint range must satisfy cl <= cu without NaN.",
            });
        }
    }
    Ok(())
}

/// Validate and unwrap an estimated parameter vector.
///
/// # Errors
/// - [`OptError::MissingThetaHat`] if no vector was provided.
/// - [`OptError::InvalidThetaHat`] if any element is non-finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    match theta_hat {
        Some(t) => {
            for (index, &value) in t.iter().enumerate() {
                if !value.is_finite() {
                    return Err(OptError::InvalidThetaHat {
                        index,
                        value,
                        reason: "Parameter estimates must be finite.",
                    });
                }
            }
            Ok(t)
        }
        None => Err(OptError::MissingThetaHat),
    }
}

/// Validate that a scalar objective value is finite.
///
/// # Errors
/// Returns [`OptError::NonFiniteCost`] if the value is `NaN` or infinite.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover the error paths of the shape and finiteness checks
    // that guard solver callbacks.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Tolerances must be finite and positive when supplied; `None` passes.
    fn tolerance_checks_reject_non_positive_and_non_finite() {
        assert!(verify_tol_grad(None).is_ok());
        assert!(matches!(verify_tol_grad(Some(0.0)), Err(OptError::InvalidTolGrad { .. })));
        assert!(matches!(verify_tol_cost(Some(f64::NAN)), Err(OptError::InvalidTolCost { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Constraint values and Jacobians are checked against the declared size.
    fn constraint_checks_report_dimension_and_finiteness() {
        let values = array![1.0, f64::INFINITY];

        assert_eq!(
            validate_constraints(&values, 3),
            Err(OptError::ConstraintDimMismatch { expected: 3, found: 2 })
        );
        assert!(matches!(
            validate_constraints(&values, 2),
            Err(OptError::NonFiniteConstraint { index: 1, .. })
        ));
        assert_eq!(
            validate_jacobian(&Array2::zeros((2, 4)), 2, 3),
            Err(OptError::JacobianShapeMismatch { expected: (2, 3), found: (2, 4) })
        );
    }

    #[test]
    // Purpose
    // -------
    // Inverted or NaN ranges are rejected with the offending index.
    fn range_bounds_require_ordered_entries() {
        let lower = array![0.0, 1.0];
        let upper = array![1.0, 0.5];

        let err = validate_range_bounds(&lower, &upper, 2).unwrap_err();

        assert!(matches!(err, OptError::InvalidBounds { index: 1, .. }));
        assert!(validate_range_bounds(&lower, &array![1.0, f64::INFINITY], 2).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Outcome checks reject missing or non-finite estimates.
    fn outcome_checks_reject_missing_and_non_finite() {
        assert_eq!(validate_theta_hat(None), Err(OptError::MissingThetaHat));
        assert!(matches!(
            validate_theta_hat(Some(array![0.0, f64::NAN])),
            Err(OptError::InvalidThetaHat { index: 1, .. })
        ));
        assert!(validate_value(-3.5).is_ok());
    }
}
