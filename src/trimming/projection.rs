//! Euclidean projection onto the capped simplex
//! `{ w ∈ ℝᴺ : 0 ≤ wᵢ ≤ 1, Σw = target }`.
//!
//! The projection is `wᵢ = clip(vᵢ − λ, 0, 1)` where `λ` solves
//! `Σ clip(vᵢ − λ, 0, 1) = target`. The left-hand side is continuous and
//! non-increasing in `λ`, equal to `N` at `λ = min v − 1` and to `0` at
//! `λ = max v`, so bisection on that bracket always brackets the root. Once
//! the bracket is tight the free set is known and `λ` is recomputed exactly
//! on it.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are finite; the output satisfies `0 ≤ wᵢ ≤ 1` and
//!   `|Σw − target| ≤ tol` for any finite `v`, including entries near
//!   `±f64::MAX`.
//! - Midpoints are formed as `0.5·lo + 0.5·hi` so they never overflow.
//!
//! Testing notes
//! -------------
//! - Unit tests cover degenerate targets, known projections and extreme
//!   magnitudes; a property test checks feasibility on random inputs.
use ndarray::{Array1, ArrayView1};

use crate::trimming::errors::{TrimError, TrimResult};

/// Bisection settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectorOptions {
    pub tol: f64,
    pub max_iter: usize,
}

impl ProjectorOptions {
    /// # Errors
    /// - [`TrimError::InvalidTolerance`] unless `tol` is finite and `> 0`.
    /// - [`TrimError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn new(tol: f64, max_iter: usize) -> TrimResult<Self> {
        if !(tol.is_finite() && tol > 0.0) {
            return Err(TrimError::InvalidTolerance { value: tol });
        }
        if max_iter == 0 {
            return Err(TrimError::InvalidMaxIter { value: max_iter });
        }
        Ok(Self { tol, max_iter })
    }
}

impl Default for ProjectorOptions {
    fn default() -> Self {
        Self { tol: 1e-10, max_iter: 200 }
    }
}

/// Euclidean projector onto `{0 ≤ w ≤ 1, Σw = target}`.
///
/// Stateless apart from its [`ProjectorOptions`]; one instance is shared by
/// every step of the weight controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CappedSimplexProjector {
    opts: ProjectorOptions,
}

impl CappedSimplexProjector {
    pub fn new(opts: ProjectorOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &ProjectorOptions {
        &self.opts
    }

    /// Project `v` onto the capped simplex with sum `target`.
    ///
    /// `target ≤ 0` returns all zeros and `target ≥ N` all ones.
    ///
    /// # Errors
    /// - [`TrimError::NonFiniteInput`] if `v` contains NaN or ±inf.
    /// - [`TrimError::InvalidTarget`] if `target` is not finite.
    pub fn project(&self, v: ArrayView1<f64>, target: f64) -> TrimResult<Array1<f64>> {
        if let Some(index) = v.iter().position(|x| !x.is_finite()) {
            return Err(TrimError::NonFiniteInput { name: "v", index, value: v[index] });
        }
        if !target.is_finite() {
            return Err(TrimError::InvalidTarget { value: target });
        }
        let n = v.len();
        if target <= 0.0 {
            return Ok(Array1::zeros(n));
        }
        if target >= n as f64 {
            return Ok(Array1::ones(n));
        }

        let (v_min, v_max) =
            v.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        // `lo` stands for `min v − 1` even when that rounds back to `min v`.
        let mut lo = v_min - 1.0;
        let mut hi = v_max;
        let mut lo_moved = false;
        let mut lambda = midpoint(lo, hi);
        for _ in 0..self.opts.max_iter {
            lambda = midpoint(lo, hi);
            let excess = clipped_sum(v, lambda) - target;
            if excess.abs() <= self.opts.tol {
                lo = lambda;
                hi = lambda;
                lo_moved = true;
                break;
            }
            if excess > 0.0 {
                lo = lambda;
                lo_moved = true;
            } else {
                hi = lambda;
            }
            if hi - lo <= f64::EPSILON * hi.abs().max(lo.abs()).max(1.0) {
                break;
            }
        }

        let bisected = v.mapv(|x| (x - lambda).clamp(0.0, 1.0));
        let polished = polish(v, Bracket { lo, hi, lo_moved }, target);
        let err = |w: &Array1<f64>| (w.sum() - target).abs();
        Ok(match polished {
            Some(w) if err(&w) <= err(&bisected) => w,
            _ => bisected,
        })
    }
}

// ---- Helper Methods ----

/// Final bisection interval for `λ`.
struct Bracket {
    lo: f64,
    hi: f64,
    lo_moved: bool,
}

/// Midpoint that stays finite for any pair of finite endpoints.
fn midpoint(lo: f64, hi: f64) -> f64 {
    0.5 * lo + 0.5 * hi
}

fn clipped_sum(v: ArrayView1<f64>, lambda: f64) -> f64 {
    v.iter().map(|&x| (x - lambda).clamp(0.0, 1.0)).sum()
}

/// Exact `λ` on the free set left open by the bracket.
///
/// An entry is at the upper bound if it is there for every `λ ≤ hi`, at
/// zero if it is there for every `λ ≥ lo`, and free otherwise. The weights
/// are formed as `(vᵢ − mean) + share` over the free set so that entries
/// of huge magnitude do not lose the fractional part of the shift.
fn polish(v: ArrayView1<f64>, bracket: Bracket, target: f64) -> Option<Array1<f64>> {
    let mut num_upper = 0usize;
    let mut num_free = 0usize;
    let mut free_mean = 0.0;
    for &x in v.iter() {
        if x - bracket.hi >= 1.0 {
            num_upper += 1;
        } else if !(bracket.lo_moved && x - bracket.lo <= 0.0) {
            num_free += 1;
            free_mean += (x - free_mean) / num_free as f64;
        }
    }
    if num_free == 0 {
        return None;
    }
    let share = (target - num_upper as f64) / num_free as f64;
    Some(v.mapv(|x| {
        if x - bracket.hi >= 1.0 {
            1.0
        } else if bracket.lo_moved && x - bracket.lo <= 0.0 {
            0.0
        } else {
            ((x - free_mean) + share).clamp(0.0, 1.0)
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Option validation and the degenerate targets.
    // - Exact solutions on small inputs.
    // - Entries near ±f64::MAX, where a naive midpoint overflows.
    // - Feasibility of the output for arbitrary finite inputs (property test).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Degenerate targets short-circuit and bad inputs are rejected.
    fn degenerate_targets_and_invalid_inputs() {
        let proj = CappedSimplexProjector::default();
        let v = array![0.3, -2.0, 5.0];

        assert_eq!(proj.project(v.view(), 0.0).expect("zero target"), Array1::<f64>::zeros(3));
        assert_eq!(proj.project(v.view(), -1.0).expect("negative target"), Array1::<f64>::zeros(3));
        assert_eq!(proj.project(v.view(), 3.0).expect("full target"), Array1::<f64>::ones(3));
        assert!(matches!(
            proj.project(array![0.0, f64::NAN].view(), 1.0),
            Err(TrimError::NonFiniteInput { name: "v", index: 1, .. })
        ));
        assert_eq!(
            proj.project(v.view(), f64::INFINITY),
            Err(TrimError::InvalidTarget { value: f64::INFINITY })
        );
        assert_eq!(ProjectorOptions::new(0.0, 10), Err(TrimError::InvalidTolerance { value: 0.0 }));
        assert_eq!(ProjectorOptions::new(1e-8, 0), Err(TrimError::InvalidMaxIter { value: 0 }));
    }

    #[test]
    // Purpose
    // -------
    // Known projections are reproduced.
    //
    // Given
    // -----
    // - v = (0.5, 0.5, 0.5, 0.5), target 2: already feasible.
    // - v = (3, 0.2, 0.1), target 1.5: first entry caps at one, the rest
    //   share 0.5 after shifting by λ = -0.1.
    fn known_projections_are_exact() {
        let proj = CappedSimplexProjector::default();

        let w = proj.project(array![0.5, 0.5, 0.5, 0.5].view(), 2.0).expect("projection");
        for wi in w.iter() {
            assert!((wi - 0.5).abs() < 1e-10);
        }

        let w = proj.project(array![3.0, 0.2, 0.1].view(), 1.5).expect("projection");
        let expected = array![1.0, 0.3, 0.2];
        for (a, b) in w.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-10, "got {w}");
        }
    }

    #[test]
    // Purpose
    // -------
    // Entries near the edge of the f64 range still project onto the set.
    //
    // Given
    // -----
    // - v = (MAX, MAX, 0), target 1.5: the tied maxima share 0.75 each.
    // - v = (−MAX, −MAX, 0), target 2.5: zero caps at one, the tied minima
    //   share 0.75 each.
    //
    // Expect
    // ------
    // - |Σw − target| < 1e-8 and the exact weights.
    fn extreme_magnitudes_project_exactly() {
        let proj = CappedSimplexProjector::default();
        let cases = [
            (array![f64::MAX, f64::MAX, 0.0], 1.5, array![0.75, 0.75, 0.0]),
            (array![-f64::MAX, -f64::MAX, 0.0], 2.5, array![0.75, 0.75, 1.0]),
        ];

        for (v, target, expected) in cases {
            let w = proj.project(v.view(), target).expect("finite input projects");
            assert!((w.sum() - target).abs() < 1e-8, "got {w} for target {target}");
            for (a, b) in w.iter().zip(expected.iter()) {
                assert!((a - b).abs() < 1e-12, "got {w}");
            }
        }
    }

    proptest! {
        #[test]
        // Purpose
        // -------
        // Any finite input and any target in [0, N] yields a feasible point.
        fn projection_is_feasible(
            v in prop::collection::vec(-50.0f64..50.0, 1..60),
            frac in 0.0f64..=1.0,
        ) {
            let n = v.len();
            let target = frac * n as f64;
            let w = CappedSimplexProjector::default()
                .project(Array1::from(v).view(), target)
                .expect("finite input projects");

            prop_assert_eq!(w.len(), n);
            prop_assert!(w.iter().all(|&wi| (0.0..=1.0).contains(&wi)));
            prop_assert!((w.sum() - target).abs() < 1e-8);
        }
    }
}
