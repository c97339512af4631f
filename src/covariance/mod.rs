//! covariance — structured covariance algebra for grouped random effects.
//!
//! Purpose
//! -------
//! Evaluate log-determinants and linear solves against the marginal
//! covariance of a grouped mixed-effects model,
//!
//!   Σ = blockdiag_i( diag(V_i) + Z_i · diag(γ) · Z_iᵀ ),
//!
//! without materializing the `N × N` matrix. The likelihood layer builds one
//! [`StructuredCovariance`] per evaluation and consumes it through
//! [`StructuredCovariance::log_det`] and [`StructuredCovariance::inv_dot_mat`].
//!
//! Key behaviors
//! -------------
//! - [`GroupPartition`] owns the block boundaries and the segmented
//!   reductions that must line up with them.
//! - [`StructuredCovariance`] factors each block through a `k × k` correction
//!   matrix (Woodbury identity / matrix determinant lemma).
//! - Errors are reported as [`CovError`], keeping shape problems apart from
//!   numerical breakdowns.
//!
//! Conventions
//! -----------
//! - Observations are stored group by group; group `i` occupies the rows
//!   returned by [`GroupPartition::range`].
//! - Dense oracles (`dense_matrix`, `dense_inverse`, `dense_log_det`) exist
//!   for tests and are never used on the fitting path.
//! - No logging and no I/O; everything here runs inside solver callbacks.

pub mod errors;
pub mod groups;
pub mod structured;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::errors::{CovError, CovResult};
pub use self::groups::GroupPartition;
pub use self::structured::StructuredCovariance;
