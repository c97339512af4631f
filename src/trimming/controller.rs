//! Weight controller for the trimming outer loop.
//!
//! Purpose
//! -------
//! Advance the inlier weights by one projected gradient step on the
//! trimming surrogate, keeping them on the capped simplex
//! `{0 ≤ w ≤ 1, Σw = num_inliers}` after every step.
//!
//! Invariants & assumptions
//! ------------------------
//! - The step size is finite and strictly positive.
//! - The budget `num_inliers` is fixed for the lifetime of the controller;
//!   the fit driver derives it once from [`TrimmingConfig`].
//!
//! Testing notes
//! -------------
//! - Unit tests check feasibility of a step, that weight moves away from a
//!   large residual, and step-size validation.
//!
//! [`TrimmingConfig`]: crate::trimming::TrimmingConfig
use ndarray::{Array1, ArrayView1};

use crate::trimming::{
    errors::{TrimError, TrimResult},
    objective::TrimmingObjective,
    projection::CappedSimplexProjector,
};

/// Projected gradient step on the weights:
/// `w ← Proj(w − step_size·∇f(w), num_inliers)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimmingController {
    projector: CappedSimplexProjector,
    step_size: f64,
    num_inliers: usize,
}

impl TrimmingController {
    /// # Errors
    /// [`TrimError::InvalidStepSize`] unless `step_size` is finite and `> 0`.
    pub fn new(
        projector: CappedSimplexProjector, step_size: f64, num_inliers: usize,
    ) -> TrimResult<Self> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(TrimError::InvalidStepSize { value: step_size });
        }
        Ok(Self { projector, step_size, num_inliers })
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn num_inliers(&self) -> usize {
        self.num_inliers
    }

    /// One projected gradient step from `w`.
    ///
    /// # Errors
    /// Propagates [`TrimError`] from the objective and the projection.
    pub fn step(&self, objective: &TrimmingObjective, w: ArrayView1<f64>) -> TrimResult<Array1<f64>> {
        let grad = objective.gradient(w)?;
        let moved = &w - &(grad * self.step_size);
        self.projector.project(moved.view(), self.num_inliers as f64)
    }
}
