//! Errors for the trimming layer (inlier configuration, capped-simplex
//! projection and the weight controller).
//!
//! ## Conventions
//! - **Indices are 0-based** observation indices.
//! - Every check that can fail on user input fails before any arithmetic, so
//!   a returned weight vector is always feasible.

/// Result alias for trimming operations that may produce [`TrimError`].
pub type TrimResult<T> = Result<T, TrimError>;

/// Unified error type for the trimming layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TrimError {
    // ---- Configuration ----
    /// Inlier percentage must lie in `(0, 1]`.
    InvalidInlierPercentage { value: f64 },

    /// Projection tolerance must be finite and strictly positive.
    InvalidTolerance { value: f64 },

    /// Bisection needs at least one iteration.
    InvalidMaxIter { value: usize },

    /// Controller step size must be finite and strictly positive.
    InvalidStepSize { value: f64 },

    // ---- Inputs ----
    /// Projection target must be finite.
    InvalidTarget { value: f64 },

    /// A vector input contains NaN or ±inf.
    NonFiniteInput { name: &'static str, index: usize, value: f64 },

    /// Two per-observation vectors disagree in length.
    LengthMismatch { name: &'static str, expected: usize, found: usize },

    /// Observation variances must be finite and strictly positive.
    NonPositiveVariance { index: usize, value: f64 },
}

impl std::error::Error for TrimError {}

impl std::fmt::Display for TrimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Configuration ----
            TrimError::InvalidInlierPercentage { value } => {
                write!(f, "Inlier percentage must lie in (0, 1], got {value}")
            }
            TrimError::InvalidTolerance { value } => {
                write!(f, "Projection tolerance must be finite and > 0, got {value}")
            }
            TrimError::InvalidMaxIter { value } => {
                write!(f, "Projection max_iter must be > 0, got {value}")
            }
            TrimError::InvalidStepSize { value } => {
                write!(f, "Trimming step size must be finite and > 0, got {value}")
            }

            // ---- Inputs ----
            TrimError::InvalidTarget { value } => {
                write!(f, "Projection target must be finite, got {value}")
            }
            TrimError::NonFiniteInput { name, index, value } => {
                write!(f, "Non-finite value in {name} at index {index}: {value}")
            }
            TrimError::LengthMismatch { name, expected, found } => {
                write!(f, "Length of {name} mismatch: expected {expected}, found {found}")
            }
            TrimError::NonPositiveVariance { index, value } => {
                write!(f, "Observation variance at index {index} is {value}; must be finite and > 0")
            }
        }
    }
}
