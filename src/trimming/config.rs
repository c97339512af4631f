//! Trimming configuration.
//!
//! Purpose
//! -------
//! Hold the inlier percentage `p` and derive from it the weight budget
//! `floor(p · N)` and the uniform starting weights of a trimmed fit.
//!
//! Conventions
//! -----------
//! - `p = 1` means trimming is off; the fit then uses unit weights and a
//!   single solver call.
//! - [`TrimmingConfig::default`] is the disabled configuration.
//!
//! Testing notes
//! -------------
//! - Unit tests cover validation of `p`, the inlier count, and the starting
//!   weights in both modes.
use ndarray::Array1;

use crate::trimming::errors::{TrimError, TrimResult};

/// Share of observations treated as inliers.
///
/// Trimming is active iff `inlier_percentage < 1`. The weight budget is
/// `floor(inlier_percentage · N)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimmingConfig {
    inlier_percentage: f64,
}

impl TrimmingConfig {
    /// # Errors
    /// [`TrimError::InvalidInlierPercentage`] unless `0 < p ≤ 1`.
    pub fn new(inlier_percentage: f64) -> TrimResult<Self> {
        if !(inlier_percentage > 0.0 && inlier_percentage <= 1.0) {
            return Err(TrimError::InvalidInlierPercentage { value: inlier_percentage });
        }
        Ok(Self { inlier_percentage })
    }

    /// No trimming: every observation is an inlier.
    pub fn disabled() -> Self {
        Self { inlier_percentage: 1.0 }
    }

    pub fn inlier_percentage(&self) -> f64 {
        self.inlier_percentage
    }

    pub fn is_active(&self) -> bool {
        self.inlier_percentage < 1.0
    }

    pub fn num_inliers(&self, num_obs: usize) -> usize {
        (self.inlier_percentage * num_obs as f64).floor() as usize
    }

    /// Uniform weights `num_inliers / N`; all ones when trimming is off.
    pub fn initial_weights(&self, num_obs: usize) -> Array1<f64> {
        if !self.is_active() || num_obs == 0 {
            return Array1::ones(num_obs);
        }
        Array1::from_elem(num_obs, self.num_inliers(num_obs) as f64 / num_obs as f64)
    }
}

impl Default for TrimmingConfig {
    fn default() -> Self {
        Self::disabled()
    }
}
