//! StructuredCovariance — implicit block-diagonal, low-rank-plus-diagonal
//! covariance with Woodbury solves and determinant-lemma log-determinants.
//!
//! Purpose
//! -------
//! Represent
//!
//!   Σ = blockdiag_i( diag(V_i) + Z_i · diag(γ) · Z_iᵀ )
//!
//! without ever forming the `N × N` matrix. Only `V`, `Z`, `γ`, the group
//! partition, and one `k × k` Cholesky factor per group are stored, where
//! `k = γ.len()` is the number of random effects.
//!
//! Key behaviors
//! -------------
//! - Factor each block's correction matrix
//!   `M_i = I + U_iᵀ diag(1/V_i) U_i`, with `U_i = Z_i · diag(√γ)`, once at
//!   construction.
//! - [`StructuredCovariance::log_det`]: matrix determinant lemma,
//!   `log det Σ_i = Σ_j log V_ij + log det M_i`.
//! - [`StructuredCovariance::inv_dot`] / [`StructuredCovariance::inv_dot_mat`]:
//!   Woodbury identity,
//!   `Σ_i⁻¹ R = D⁻¹R − D⁻¹U_i M_i⁻¹ U_iᵀ D⁻¹R`, with `D = diag(V_i)`.
//! - [`StructuredCovariance::dense_matrix`],
//!   [`StructuredCovariance::dense_inverse`], and
//!   [`StructuredCovariance::dense_log_det`]: O(N³) oracles for tests.
//!
//! Invariants & assumptions
//! ------------------------
//! - `V > 0` and finite, `γ ≥ 0` and finite; both are checked at construction.
//! - Scaling by `√γ` on both sides keeps `M_i` symmetric positive definite
//!   for every admissible `γ` and never divides by `γ_j`; a zero `γ_j` turns
//!   its column into a no-op.
//! - Instances are cheap and ephemeral: the likelihood builds a fresh one for
//!   every evaluation because `γ` (and possibly `V` under trimming) changes.
//!
//! Performance
//! -----------
//! - Construction: O(Σ_i n_i · k²) plus m Cholesky factorizations of size k.
//! - `inv_dot_mat` with `c` columns: O(Σ_i n_i · k · c + m · k² · c).
//!
//! Testing notes
//! -------------
//! - Unit tests compare `inv_dot`, `inv_dot_mat`, and `log_det` with the dense
//!   oracle on random problems, and cover the zero-γ and validation paths.
use nalgebra::{Cholesky, DMatrix, Dyn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};

use crate::covariance::{
    errors::{CovError, CovResult},
    groups::GroupPartition,
};

/// StructuredCovariance — factored block-diagonal covariance.
///
/// Fields
/// ------
/// - `partition`: block boundaries shared with the caller.
/// - `v`, `inv_v`: observation variances and their reciprocals (length `N`).
/// - `u`: `Z · diag(√γ)` (`N × k`).
/// - `factors`: Cholesky factor of each block correction matrix; `None` when
///   `k == 0` (Σ is purely diagonal).
/// - `log_det`: cached `log det Σ`.
#[derive(Debug, Clone)]
pub struct StructuredCovariance<'a> {
    partition: &'a GroupPartition,
    v: Array1<f64>,
    inv_v: Array1<f64>,
    u: Array2<f64>,
    factors: Vec<Option<Cholesky<f64, Dyn>>>,
    log_det: f64,
}

impl<'a> StructuredCovariance<'a> {
    /// Validate inputs and factor every block.
    ///
    /// Parameters
    /// ----------
    /// - `v`: observation variances, length `N`.
    /// - `z`: random-effects design, `N × k`.
    /// - `gamma`: random-effect variances, length `k`.
    /// - `partition`: group boundaries with `partition.num_obs() == N`.
    ///
    /// Errors
    /// ------
    /// - Shape variants of [`CovError`] when `v`, `z`, `gamma` disagree with
    ///   each other or with `partition`.
    /// - [`CovError::NonPositiveVariance`] / [`CovError::NegativeGamma`] for
    ///   out-of-domain entries.
    /// - [`CovError::CorrectionNotPositiveDefinite`] /
    ///   [`CovError::NonFiniteLogDet`] when a block factorization breaks down.
    pub fn new(
        v: Array1<f64>, z: ArrayView2<f64>, gamma: ArrayView1<f64>, partition: &'a GroupPartition,
    ) -> CovResult<Self> {
        let n = partition.num_obs();
        let k = gamma.len();
        if v.len() != n {
            return Err(CovError::VarianceLengthMismatch { expected: n, found: v.len() });
        }
        if z.nrows() != n {
            return Err(CovError::DesignRowMismatch { expected: n, found: z.nrows() });
        }
        if z.ncols() != k {
            return Err(CovError::DesignColumnMismatch { expected: k, found: z.ncols() });
        }
        for (index, &value) in v.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(CovError::NonPositiveVariance { index, value });
            }
        }
        for (column, &value) in gamma.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(CovError::NegativeGamma { column, value });
            }
        }

        let inv_v = v.mapv(f64::recip);
        let sqrt_gamma = gamma.mapv(f64::sqrt);
        let u = &z * &sqrt_gamma.view().insert_axis(Axis(0));

        let mut factors = Vec::with_capacity(partition.num_groups());
        let mut log_det = 0.0;
        for (group, range) in partition.ranges().enumerate() {
            let log_diag: f64 = v.slice(s![range.clone()]).iter().map(|x| x.ln()).sum();
            let (factor, log_corr) = if k == 0 {
                (None, 0.0)
            } else {
                let u_blk = u.slice(s![range.clone(), ..]);
                let scaled = &u_blk * &inv_v.slice(s![range]).insert_axis(Axis(1));
                let mut correction = u_blk.t().dot(&scaled);
                correction.diag_mut().mapv_inplace(|d| d + 1.0);
                let chol = Cholesky::new(to_dmatrix(correction.view()))
                    .ok_or(CovError::CorrectionNotPositiveDefinite { group })?;
                let log_corr =
                    2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum::<f64>();
                (Some(chol), log_corr)
            };
            let block_log_det = log_diag + log_corr;
            if !block_log_det.is_finite() {
                return Err(CovError::NonFiniteLogDet { group, value: block_log_det });
            }
            log_det += block_log_det;
            factors.push(factor);
        }

        Ok(Self { partition, v, inv_v, u, factors, log_det })
    }

    /// Dimension `N` of Σ.
    pub fn num_obs(&self) -> usize {
        self.v.len()
    }

    /// `log det Σ`, summed over blocks.
    pub fn log_det(&self) -> f64 {
        self.log_det
    }

    /// Σ⁻¹ r for a single right-hand side of length `N`.
    ///
    /// # Errors
    /// - [`CovError::RhsRowMismatch`] if `r.len() != N`.
    pub fn inv_dot(&self, r: ArrayView1<f64>) -> CovResult<Array1<f64>> {
        let solved = self.inv_dot_mat(r.insert_axis(Axis(1)))?;
        Ok(solved.column(0).to_owned())
    }

    /// Σ⁻¹ R for an `N × c` right-hand side, one block at a time.
    ///
    /// # Errors
    /// - [`CovError::RhsRowMismatch`] if `r.nrows() != N`.
    pub fn inv_dot_mat(&self, r: ArrayView2<f64>) -> CovResult<Array2<f64>> {
        let n = self.num_obs();
        if r.nrows() != n {
            return Err(CovError::RhsRowMismatch { expected: n, found: r.nrows() });
        }
        let mut out = Array2::<f64>::zeros(r.raw_dim());
        for (range, factor) in self.partition.ranges().zip(self.factors.iter()) {
            let inv_v_col = self.inv_v.slice(s![range.clone()]).insert_axis(Axis(1));
            let mut solved = &r.slice(s![range.clone(), ..]) * &inv_v_col;
            if let Some(chol) = factor {
                let u_blk = self.u.slice(s![range.clone(), ..]);
                let projected = u_blk.t().dot(&solved);
                let inner = from_dmatrix(&chol.solve(&to_dmatrix(projected.view())));
                let correction = u_blk.dot(&inner) * &inv_v_col;
                solved -= &correction;
            }
            out.slice_mut(s![range, ..]).assign(&solved);
        }
        Ok(out)
    }

    /// Materialize Σ as a dense `N × N` matrix. Testing only: O(N²) memory.
    pub fn dense_matrix(&self) -> Array2<f64> {
        let n = self.num_obs();
        let mut dense = Array2::<f64>::zeros((n, n));
        for range in self.partition.ranges() {
            let u_blk = self.u.slice(s![range.clone(), ..]);
            dense.slice_mut(s![range.clone(), range.clone()]).assign(&u_blk.dot(&u_blk.t()));
        }
        for (i, &vi) in self.v.iter().enumerate() {
            dense[[i, i]] += vi;
        }
        dense
    }

    /// Explicit Σ⁻¹ via a dense inverse. Testing only: O(N³).
    ///
    /// # Errors
    /// - [`CovError::SingularDenseMatrix`] if the inversion fails.
    pub fn dense_inverse(&self) -> CovResult<Array2<f64>> {
        let inverse = to_dmatrix(self.dense_matrix().view())
            .try_inverse()
            .ok_or(CovError::SingularDenseMatrix)?;
        Ok(from_dmatrix(&inverse))
    }

    /// `log det Σ` from a dense Cholesky factorization. Testing only: O(N³).
    ///
    /// # Errors
    /// - [`CovError::SingularDenseMatrix`] if Σ is not numerically positive
    ///   definite.
    pub fn dense_log_det(&self) -> CovResult<f64> {
        let chol = Cholesky::new(to_dmatrix(self.dense_matrix().view()))
            .ok_or(CovError::SingularDenseMatrix)?;
        Ok(2.0 * chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum::<f64>())
    }
}

// ---- Helper methods ----

/// Copy an `ndarray` matrix into a column-major `nalgebra::DMatrix`.
pub(crate) fn to_dmatrix(a: ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Copy a `nalgebra::DMatrix` back into an `ndarray` matrix.
pub(crate) fn from_dmatrix(a: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.nrows(), a.ncols()), |(i, j)| a[(i, j)])
}
