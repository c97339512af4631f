//! Errors for the structured covariance algebra (group partitions, block
//! factorizations, and the dense test oracle).
//!
//! ## Conventions
//! - **Indices are 0-based** and refer to observation rows unless the variant
//!   says `group` or `column`.
//! - Shape problems and numerical breakdowns are reported separately so that
//!   callers can tell a configuration mistake from a factorization that failed
//!   for the current `γ`.

/// Result alias for covariance operations that may produce [`CovError`].
pub type CovResult<T> = Result<T, CovError>;

/// Unified error type for the structured covariance layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CovError {
    // ---- Group partition ----
    /// No groups were provided.
    EmptyPartition,

    /// A group has zero observations.
    EmptyGroup { group: usize },

    // ---- Shapes ----
    /// Length of the observation variance vector does not match the partition.
    VarianceLengthMismatch { expected: usize, found: usize },

    /// Row count of the random-effects design does not match the partition.
    DesignRowMismatch { expected: usize, found: usize },

    /// Column count of the random-effects design does not match `γ`.
    DesignColumnMismatch { expected: usize, found: usize },

    /// Right-hand side passed to `inv_dot` has the wrong number of rows.
    RhsRowMismatch { expected: usize, found: usize },

    // ---- Domain ----
    /// Observation variances must be finite and strictly positive.
    NonPositiveVariance { index: usize, value: f64 },

    /// Random-effect variances must be finite and non-negative.
    NegativeGamma { column: usize, value: f64 },

    // ---- Numerical ----
    /// Cholesky factorization of a block correction matrix failed.
    CorrectionNotPositiveDefinite { group: usize },

    /// A block log-determinant came out non-finite.
    NonFiniteLogDet { group: usize, value: f64 },

    /// Dense oracle matrix could not be inverted.
    SingularDenseMatrix,
}

impl std::error::Error for CovError {}

impl std::fmt::Display for CovError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Group partition ----
            CovError::EmptyPartition => write!(f, "Group partition must contain at least one group"),
            CovError::EmptyGroup { group } => {
                write!(f, "Group {group} is empty; every group needs at least one observation")
            }

            // ---- Shapes ----
            CovError::VarianceLengthMismatch { expected, found } => {
                write!(f, "Observation variance length mismatch: expected {expected}, found {found}")
            }
            CovError::DesignRowMismatch { expected, found } => {
                write!(f, "Random-effects design row mismatch: expected {expected}, found {found}")
            }
            CovError::DesignColumnMismatch { expected, found } => {
                write!(
                    f,
                    "Random-effects design column mismatch: expected {expected}, found {found}"
                )
            }
            CovError::RhsRowMismatch { expected, found } => {
                write!(f, "Right-hand side row mismatch: expected {expected}, found {found}")
            }

            // ---- Domain ----
            CovError::NonPositiveVariance { index, value } => {
                write!(f, "Observation variance at index {index} is {value}; must be finite and > 0")
            }
            CovError::NegativeGamma { column, value } => {
                write!(f, "Random-effect variance {column} is {value}; must be finite and >= 0")
            }

            // ---- Numerical ----
            CovError::CorrectionNotPositiveDefinite { group } => {
                write!(f, "Correction matrix of group {group} is not positive definite")
            }
            CovError::NonFiniteLogDet { group, value } => {
                write!(f, "Log-determinant of group {group} is not finite: {value}")
            }
            CovError::SingularDenseMatrix => write!(f, "Dense covariance matrix is singular"),
        }
    }
}
