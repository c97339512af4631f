//! Numerical stability utilities.
//!
//! Provides safe implementations of the scalar maps used to move parameters
//! between an unconstrained optimizer space and a box-constrained model
//! space. The functions here use explicit cutoffs (`|x| > 20.0`) to keep
//! `f64` arithmetic in a well-conditioned regime.
//!
//! # Provided items
//! - [`BOUNDARY_EPS`]: smallest gap kept between a parameter and a one-sided
//!   bound when mapping into optimizer space.
//! - [`LOGIT_EPS`]: clamp applied to interval fractions before the logit.
//! - [`safe_softplus(x)`]: stable `ln(1 + exp(x))`, ℝ → (0, ∞).
//! - [`safe_softplus_inv(x)`]: inverse softplus, (0, ∞) → ℝ.
//! - [`safe_logistic(x)`]: stable `1 / (1 + exp(-x))`, ℝ → (0, 1).
//! - [`safe_logit(p)`]: inverse logistic with clamping at [`LOGIT_EPS`].

/// Minimum distance from a one-sided bound used by inverse transforms.
///
/// A starting value sitting exactly on a bound (e.g. `γ = 0` with `γ ≥ 0`)
/// has no finite preimage under softplus; it is nudged inward by this
/// amount first.
pub const BOUNDARY_EPS: f64 = 1e-8;

/// Clamp for interval fractions `p ∈ (0, 1)` before taking the logit.
pub const LOGIT_EPS: f64 = 1e-10;

/// Numerically stable softplus: `softplus(x) = ln(1 + exp(x))`.
///
/// - For `x > 20`, `softplus(x) ≈ x` to machine precision.
/// - Otherwise it falls back to `ln1p(exp(x))`, which is accurate for large
///   negative `x` as well.
pub fn safe_softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Stable inverse of softplus on `(0, ∞)`: returns `t = ln(exp(x) - 1)`.
///
/// - For `x > 20`, `ln(exp(x) - 1) ≈ x`.
/// - Otherwise it uses `ln(expm1(x))`, which keeps precision for small `x`.
///
/// `x` must be finite and `> 0`; callers clamp with [`BOUNDARY_EPS`].
pub fn safe_softplus_inv(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp_m1().ln() }
}

/// Numerically stable logistic function `σ(x) = 1 / (1 + exp(-x))`.
///
/// Evaluated in the branch that never exponentiates a large positive number.
/// This is also the derivative of [`safe_softplus`].
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Logit `ln(p / (1 - p))` with `p` clamped to `[LOGIT_EPS, 1 - LOGIT_EPS]`.
pub fn safe_logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    (p / (1.0 - p)).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Agreement of the guarded transforms with naïve formulas on safe grids.
    // - Tail behavior beyond the cutoffs.
    // - Inverse pairs (softplus/softplus_inv, logistic/logit).
    // -------------------------------------------------------------------------

    const GRID: [f64; 9] = [-15.0, -5.0, -1.0, -0.1, 0.0, 0.1, 1.0, 5.0, 15.0];

    #[test]
    // Purpose
    // -------
    // On a moderate grid the guarded forms equal the textbook formulas.
    fn transforms_match_naive_formulas_on_safe_grid() {
        for &x in GRID.iter() {
            let naive_softplus = (1.0 + x.exp()).ln();
            let naive_logistic = 1.0 / (1.0 + (-x).exp());
            assert!((safe_softplus(x) - naive_softplus).abs() < 1e-12, "softplus at {x}");
            assert!((safe_logistic(x) - naive_logistic).abs() < 1e-14, "logistic at {x}");
        }
    }

    #[test]
    // Purpose
    // -------
    // Extreme inputs stay finite and land on the right asymptote.
    fn transforms_are_finite_in_the_tails() {
        assert_eq!(safe_softplus(800.0), 800.0);
        assert!(safe_softplus(-800.0) >= 0.0);
        assert_eq!(safe_logistic(800.0), 1.0);
        assert!(safe_logistic(-800.0) >= 0.0 && safe_logistic(-800.0) < 1e-300);
        assert!(safe_logit(0.0).is_finite());
        assert!(safe_logit(1.0).is_finite());
    }

    #[test]
    // Purpose
    // -------
    // softplus_inv and logit invert their forward maps.
    fn inverse_pairs_round_trip() {
        for &x in GRID.iter() {
            let y = safe_softplus(x);
            assert!((safe_softplus_inv(y) - x).abs() < 1e-6 * (1.0 + x.abs()), "softplus at {x}");
            let p = safe_logistic(x);
            assert!((safe_logit(p) - x).abs() < 1e-6 * (1.0 + x.abs()), "logistic at {x}");
        }
    }
}
