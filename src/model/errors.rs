//! Errors for the likelihood model (data, priors, mean function, weights).
//!
//! ## Conventions
//! - **Indices are 0-based.**
//! - `name` fields identify the offending input (`"Y"`, `"S"`, `"mean"`,
//!   `"constraints"`, ...) so a configuration mistake points at its source.
//! - Numerical failures of the covariance algebra are wrapped unchanged in
//!   [`ModelError::Covariance`].
use crate::{covariance::errors::CovError, trimming::errors::TrimError};

/// Result alias for model operations that may produce [`ModelError`].
pub type ModelResult<T> = Result<T, ModelError>;

/// Unified error type for the likelihood model layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    // ---- Dimensions ----
    /// A model dimension is out of range (e.g. no fixed effects).
    InvalidDimension { name: &'static str, value: usize, reason: &'static str },

    /// A per-observation vector has the wrong length.
    ObservationLengthMismatch { name: &'static str, expected: usize, found: usize },

    /// A matrix input has the wrong shape.
    DesignShapeMismatch { name: &'static str, expected: (usize, usize), found: (usize, usize) },

    /// Parameter vector length does not match `k = k_beta + k_gamma`.
    ParameterLengthMismatch { expected: usize, found: usize },

    // ---- Data ----
    /// Observation standard deviations must be finite and strictly positive.
    NonPositiveStd { index: usize, value: f64 },

    /// Observation data must be finite.
    NonFiniteData { name: &'static str, index: usize, value: f64 },

    // ---- Priors & constraints ----
    /// A prior or range vector has the wrong length.
    PriorLengthMismatch { name: &'static str, expected: usize, found: usize },

    /// Box prior entry violates `lb <= ub` (or is NaN, or admits `γ < 0`).
    InvalidBounds { index: usize, lower: f64, upper: f64, reason: &'static str },

    /// Range of a constraint/regularizer violates `lower <= upper`.
    InvalidRange { name: &'static str, index: usize, lower: f64, upper: f64 },

    /// Prior scale parameters must be finite and strictly positive.
    NonPositiveScale { name: &'static str, index: usize, value: f64 },

    /// Prior location parameters must be finite.
    NonFiniteLocation { name: &'static str, index: usize, value: f64 },

    // ---- Caller-supplied maps ----
    /// A map returned a vector of the wrong length.
    MapOutputMismatch { name: &'static str, expected: usize, found: usize },

    /// A map returned a Jacobian of the wrong shape.
    MapJacobianMismatch { name: &'static str, expected: (usize, usize), found: (usize, usize) },

    // ---- Weights ----
    /// Weight vector length does not match `N`.
    WeightLengthMismatch { expected: usize, found: usize },

    /// Weights must be finite and lie in `[0, 1]`.
    InvalidWeight { index: usize, value: f64 },

    // ---- Fit options ----
    /// Outer-loop setting is out of range.
    InvalidFitOption { name: &'static str, value: f64, reason: &'static str },

    // ---- Wrapped ----
    /// Numerical failure of the structured covariance algebra.
    Covariance(CovError),

    /// Invalid trimming configuration.
    Trimming(TrimError),
}

impl std::error::Error for ModelError {}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Dimensions ----
            ModelError::InvalidDimension { name, value, reason } => {
                write!(f, "Invalid dimension {name} = {value}: {reason}")
            }
            ModelError::ObservationLengthMismatch { name, expected, found } => {
                write!(f, "Length of {name} mismatch: expected {expected}, found {found}")
            }
            ModelError::DesignShapeMismatch { name, expected, found } => {
                write!(f, "Shape of {name} mismatch: expected {expected:?}, found {found:?}")
            }
            ModelError::ParameterLengthMismatch { expected, found } => {
                write!(f, "Parameter length mismatch: expected {expected}, found {found}")
            }

            // ---- Data ----
            ModelError::NonPositiveStd { index, value } => {
                write!(f, "Observation std at index {index} is {value}; must be finite and > 0")
            }
            ModelError::NonFiniteData { name, index, value } => {
                write!(f, "Non-finite value in {name} at index {index}: {value}")
            }

            // ---- Priors & constraints ----
            ModelError::PriorLengthMismatch { name, expected, found } => {
                write!(f, "Length of {name} mismatch: expected {expected}, found {found}")
            }
            ModelError::InvalidBounds { index, lower, upper, reason } => {
                write!(f, "Invalid bounds at index {index}: [{lower}, {upper}]: {reason}")
            }
            ModelError::InvalidRange { name, index, lower, upper } => {
                write!(f, "Invalid {name} range at index {index}: [{lower}, {upper}]")
            }
            ModelError::NonPositiveScale { name, index, value } => {
                write!(f, "Scale of {name} at index {index} is {value}; must be finite and > 0")
            }
            ModelError::NonFiniteLocation { name, index, value } => {
                write!(f, "Location of {name} at index {index} is not finite: {value}")
            }

            // ---- Caller-supplied maps ----
            ModelError::MapOutputMismatch { name, expected, found } => {
                write!(f, "Map {name} returned length {found}, expected {expected}")
            }
            ModelError::MapJacobianMismatch { name, expected, found } => {
                write!(f, "Jacobian of {name} has shape {found:?}, expected {expected:?}")
            }

            // ---- Weights ----
            ModelError::WeightLengthMismatch { expected, found } => {
                write!(f, "Weight length mismatch: expected {expected}, found {found}")
            }
            ModelError::InvalidWeight { index, value } => {
                write!(f, "Weight at index {index} is {value}; must lie in [0, 1]")
            }

            // ---- Fit options ----
            ModelError::InvalidFitOption { name, value, reason } => {
                write!(f, "Invalid fit option {name} = {value}: {reason}")
            }

            // ---- Wrapped ----
            ModelError::Covariance(err) => write!(f, "Covariance error: {err}"),
            ModelError::Trimming(err) => write!(f, "Trimming error: {err}"),
        }
    }
}

impl From<CovError> for ModelError {
    fn from(err: CovError) -> Self {
        ModelError::Covariance(err)
    }
}

impl From<TrimError> for ModelError {
    fn from(err: TrimError) -> Self {
        ModelError::Trimming(err)
    }
}
