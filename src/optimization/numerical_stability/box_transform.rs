//! box_transform — elementwise reparameterization of box-constrained parameters.
//!
//! Purpose
//! -------
//! Let an unconstrained quasi-Newton solver work on a problem with simple
//! bounds `l ≤ x ≤ u`. Each coordinate gets its own smooth bijection
//! `x = T(θ)` from ℝ onto the interior of its interval, chosen from the
//! finiteness of its bounds:
//!
//! | bounds          | `x = T(θ)`                 | `dx/dθ`                  |
//! |-----------------|----------------------------|--------------------------|
//! | `(-∞, ∞)`       | `θ`                        | `1`                      |
//! | `[l, ∞)`        | `l + softplus(θ)`          | `σ(θ)`                   |
//! | `(-∞, u]`       | `u − softplus(θ)`          | `−σ(θ)`                  |
//! | `[l, u]`        | `l + (u − l)·σ(θ)`         | `(u − l)·σ(θ)(1 − σ(θ))` |
//! | `l == u`        | `l`                        | `0`                      |
//!
//! Invariants & assumptions
//! ------------------------
//! - Bounds are validated once in [`BoxTransform::new`]: equal lengths, no
//!   NaN, `l ≤ u`, and `l < ∞`, `u > −∞`.
//! - `to_constrained` always lands inside `[l, u]`; `to_unconstrained`
//!   clamps its input into the box and away from one-sided bounds by
//!   [`BOUNDARY_EPS`] so that the returned θ is finite.
//! - Gradients are pulled back with [`BoxTransform::chain_gradient`], i.e.
//!   `∂f/∂θ = ∂f/∂x ∘ dx/dθ`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover round trips, interior landing, the derivative against a
//!   central difference, and bound validation.
use ndarray::{Array1, ArrayView1, Zip};

use crate::optimization::{
    errors::{OptError, OptResult},
    numerical_stability::transformations::{
        BOUNDARY_EPS, safe_logistic, safe_logit, safe_softplus, safe_softplus_inv,
    },
};

/// Per-coordinate transform selected from the bound pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundKind {
    Free,
    Lower(f64),
    Upper(f64),
    Interval(f64, f64),
    Fixed(f64),
}

impl BoundKind {
    fn classify(lower: f64, upper: f64) -> Self {
        match (lower.is_finite(), upper.is_finite()) {
            (false, false) => BoundKind::Free,
            (true, false) => BoundKind::Lower(lower),
            (false, true) => BoundKind::Upper(upper),
            (true, true) if lower == upper => BoundKind::Fixed(lower),
            (true, true) => BoundKind::Interval(lower, upper),
        }
    }

    fn forward(&self, theta: f64) -> f64 {
        match *self {
            BoundKind::Free => theta,
            BoundKind::Lower(l) => l + safe_softplus(theta),
            BoundKind::Upper(u) => u - safe_softplus(theta),
            BoundKind::Interval(l, u) => l + (u - l) * safe_logistic(theta),
            BoundKind::Fixed(v) => v,
        }
    }

    fn inverse(&self, x: f64) -> f64 {
        match *self {
            BoundKind::Free => x,
            BoundKind::Lower(l) => safe_softplus_inv((x - l).max(BOUNDARY_EPS)),
            BoundKind::Upper(u) => safe_softplus_inv((u - x).max(BOUNDARY_EPS)),
            BoundKind::Interval(l, u) => safe_logit((x - l) / (u - l)),
            BoundKind::Fixed(_) => 0.0,
        }
    }

    fn derivative(&self, theta: f64) -> f64 {
        match *self {
            BoundKind::Free => 1.0,
            BoundKind::Lower(_) => safe_logistic(theta),
            BoundKind::Upper(_) => -safe_logistic(theta),
            BoundKind::Interval(l, u) => {
                let s = safe_logistic(theta);
                (u - l) * s * (1.0 - s)
            }
            BoundKind::Fixed(_) => 0.0,
        }
    }
}

/// BoxTransform — the full elementwise map `x = T(θ)` for one bound pair.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxTransform {
    kinds: Vec<BoundKind>,
}

impl BoxTransform {
    /// Build the transform for bounds `lower ≤ x ≤ upper`.
    ///
    /// # Errors
    /// - [`OptError::ParameterLengthMismatch`] if the bound vectors differ in
    ///   length.
    /// - [`OptError::InvalidBounds`] for NaN bounds, `lower > upper`,
    ///   `lower = +∞`, or `upper = −∞`.
    pub fn new(lower: ArrayView1<f64>, upper: ArrayView1<f64>) -> OptResult<Self> {
        if lower.len() != upper.len() {
            return Err(OptError::ParameterLengthMismatch {
                expected: lower.len(),
                found: upper.len(),
            });
        }
        let mut kinds = Vec::with_capacity(lower.len());
        for (index, (&l, &u)) in lower.iter().zip(upper.iter()).enumerate() {
            let reason = if l.is_nan() || u.is_nan() {
                Some("Bounds must not be NaN.")
            } else if l > u {
                Some("Lower bound exceeds upper bound.")
            } else if l == f64::INFINITY || u == f64::NEG_INFINITY {
                Some("Bounds leave no feasible value.")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(OptError::InvalidBounds { index, lower: l, upper: u, reason });
            }
            kinds.push(BoundKind::classify(l, u));
        }
        Ok(Self { kinds })
    }

    pub fn dim(&self) -> usize {
        self.kinds.len()
    }

    pub fn kinds(&self) -> &[BoundKind] {
        &self.kinds
    }

    /// `x = T(θ)`.
    pub fn to_constrained(&self, theta: ArrayView1<f64>) -> Array1<f64> {
        self.kinds.iter().zip(theta.iter()).map(|(k, &t)| k.forward(t)).collect()
    }

    /// `θ = T⁻¹(x)` after clamping `x` into the box.
    pub fn to_unconstrained(&self, x: ArrayView1<f64>) -> Array1<f64> {
        self.kinds.iter().zip(x.iter()).map(|(k, &v)| k.inverse(v)).collect()
    }

    /// Elementwise `dx/dθ`.
    pub fn derivative(&self, theta: ArrayView1<f64>) -> Array1<f64> {
        self.kinds.iter().zip(theta.iter()).map(|(k, &t)| k.derivative(t)).collect()
    }

    /// Pull a gradient with respect to `x` back to θ-space.
    pub fn chain_gradient(&self, theta: ArrayView1<f64>, grad_x: ArrayView1<f64>) -> Array1<f64> {
        let mut out = self.derivative(theta);
        Zip::from(&mut out).and(&grad_x).for_each(|d, &g| *d *= g);
        out
    }

    /// Project `x` onto the box.
    pub fn clamp(&self, x: ArrayView1<f64>) -> Array1<f64> {
        self.kinds
            .iter()
            .zip(x.iter())
            .map(|(k, &v)| match *k {
                BoundKind::Free => v,
                BoundKind::Lower(l) => v.max(l),
                BoundKind::Upper(u) => v.min(u),
                BoundKind::Interval(l, u) => v.clamp(l, u),
                BoundKind::Fixed(c) => c,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Classification of bound patterns.
    // - x → θ → x round trips for interior points.
    // - The analytic derivative against a central difference.
    // - Validation of malformed bounds.
    // -------------------------------------------------------------------------

    fn mixed_transform() -> BoxTransform {
        let inf = f64::INFINITY;
        let lower = array![-inf, 0.0, -inf, -1.0, 2.0];
        let upper = array![inf, inf, 3.0, 4.0, 2.0];
        BoxTransform::new(lower.view(), upper.view()).expect("valid bounds")
    }

    #[test]
    // Purpose
    // -------
    // Each bound pattern selects the matching transform.
    fn new_classifies_bound_patterns() {
        let transform = mixed_transform();

        assert_eq!(
            transform.kinds(),
            &[
                BoundKind::Free,
                BoundKind::Lower(0.0),
                BoundKind::Upper(3.0),
                BoundKind::Interval(-1.0, 4.0),
                BoundKind::Fixed(2.0),
            ]
        );
    }

    #[test]
    // Purpose
    // -------
    // Interior points survive x → θ → x, and any θ maps into the box.
    fn round_trip_recovers_interior_points() {
        let transform = mixed_transform();
        let x = array![-7.5, 0.3, 1.0, 3.9, 2.0];

        let theta = transform.to_unconstrained(x.view());
        let back = transform.to_constrained(theta.view());

        for (a, b) in x.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
        let wild = array![100.0, -50.0, 40.0, -30.0, 9.0];
        let mapped = transform.to_constrained(wild.view());
        assert_eq!(transform.clamp(mapped.view()), mapped);
    }

    #[test]
    // Purpose
    // -------
    // A start exactly on a one-sided bound maps to a finite θ.
    fn to_unconstrained_nudges_points_off_the_boundary() {
        let transform = mixed_transform();
        let x = array![0.0, 0.0, 3.0, -1.0, 2.0];

        let theta = transform.to_unconstrained(x.view());

        assert!(theta.iter().all(|t| t.is_finite()));
    }

    #[test]
    // Purpose
    // -------
    // `derivative` agrees with a central difference of `to_constrained`.
    fn derivative_matches_central_difference() {
        let transform = mixed_transform();
        let theta = array![0.4, -1.3, 0.7, 0.2, 5.0];
        let h = 1e-6;

        let analytic = transform.derivative(theta.view());

        for j in 0..theta.len() {
            let mut plus = theta.clone();
            let mut minus = theta.clone();
            plus[j] += h;
            minus[j] -= h;
            let fd = (transform.to_constrained(plus.view())[j]
                - transform.to_constrained(minus.view())[j])
                / (2.0 * h);
            assert!((fd - analytic[j]).abs() < 1e-7, "coordinate {j}: {fd} vs {}", analytic[j]);
        }
    }

    #[test]
    // Purpose
    // -------
    // Malformed bounds are rejected with the offending index.
    fn new_rejects_invalid_bounds() {
        let lower = array![0.0, 2.0];
        let upper = array![1.0, 1.0];

        let err = BoxTransform::new(lower.view(), upper.view()).unwrap_err();

        assert!(matches!(err, OptError::InvalidBounds { index: 1, .. }));
        let short = array![1.0];
        assert_eq!(
            BoxTransform::new(lower.view(), short.view()),
            Err(OptError::ParameterLengthMismatch { expected: 2, found: 1 })
        );
    }
}
