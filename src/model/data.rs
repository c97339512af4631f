//! GroupedData — immutable observation data of a grouped mixed-effects model.
//!
//! Purpose
//! -------
//! Own the responses `Y`, observation standard deviations `S`, the
//! random-effects design `Z`, and the [`GroupPartition`] they are stacked by.
//! The observation variances `V = S²` are derived once here.
//!
//! Invariants & assumptions
//! ------------------------
//! - `Y` and `S` have length `N`, `Z` is `N × k_gamma`, where `N` is the total
//!   size of the partition.
//! - `S > 0` and finite; `Y` and `Z` finite.
//! - Nothing here changes after construction.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::{
    covariance::GroupPartition,
    model::errors::{ModelError, ModelResult},
};

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedData {
    partition: GroupPartition,
    y: Array1<f64>,
    s: Array1<f64>,
    v: Array1<f64>,
    z: Array2<f64>,
}

impl GroupedData {
    /// Validate and store grouped observations.
    ///
    /// # Errors
    /// - [`ModelError::Covariance`] for an empty partition or empty group.
    /// - [`ModelError::ObservationLengthMismatch`] if `y` or `s` is not length `N`.
    /// - [`ModelError::DesignShapeMismatch`] if `z` does not have `N` rows.
    /// - [`ModelError::NonPositiveStd`] for `S ≤ 0` or non-finite `S`.
    /// - [`ModelError::NonFiniteData`] for non-finite `Y` or `Z` entries.
    pub fn new(
        group_sizes: Vec<usize>, y: Array1<f64>, s: Array1<f64>, z: Array2<f64>,
    ) -> ModelResult<Self> {
        let partition = GroupPartition::new(group_sizes)?;
        let n = partition.num_obs();
        for (name, len) in [("Y", y.len()), ("S", s.len())] {
            if len != n {
                return Err(ModelError::ObservationLengthMismatch { name, expected: n, found: len });
            }
        }
        if z.nrows() != n {
            return Err(ModelError::DesignShapeMismatch {
                name: "Z",
                expected: (n, z.ncols()),
                found: z.dim(),
            });
        }
        if let Some(index) = s.iter().position(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(ModelError::NonPositiveStd { index, value: s[index] });
        }
        if let Some(index) = y.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteData { name: "Y", index, value: y[index] });
        }
        if let Some((index, &value)) = z.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::NonFiniteData { name: "Z", index, value });
        }
        let v = s.mapv(|si| si * si);
        Ok(Self { partition, y, s, v, z })
    }

    pub fn partition(&self) -> &GroupPartition {
        &self.partition
    }

    /// Total number of observations `N`.
    pub fn num_obs(&self) -> usize {
        self.partition.num_obs()
    }

    /// Number of random effects `k_gamma`.
    pub fn num_random_effects(&self) -> usize {
        self.z.ncols()
    }

    pub fn y(&self) -> ArrayView1<'_, f64> {
        self.y.view()
    }

    pub fn s(&self) -> ArrayView1<'_, f64> {
        self.s.view()
    }

    /// Observation variances `V = S²`.
    pub fn v(&self) -> ArrayView1<'_, f64> {
        self.v.view()
    }

    pub fn z(&self) -> ArrayView2<'_, f64> {
        self.z.view()
    }
}
