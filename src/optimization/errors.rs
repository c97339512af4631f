use argmin::core::{ArgminError, Error};

use crate::{covariance::errors::CovError, model::errors::ModelError, trimming::errors::TrimError};

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that FD should be used
    GradientNotImplemented,

    /// Gradient dimensions do not match parameter dimensions.
    GradientDimMismatch {
        expected: usize,
        found: usize,
    },

    /// Gradient elements need to be finite
    InvalidGradient {
        index: usize,
        value: f64,
        reason: &'static str,
    },

    // ---- Problem shape ----
    /// Parameter vector length does not match the problem dimension.
    ParameterLengthMismatch {
        expected: usize,
        found: usize,
    },

    /// Box bounds are malformed (lb > ub, NaN, or wrong length).
    InvalidBounds {
        index: usize,
        lower: f64,
        upper: f64,
        reason: &'static str,
    },

    /// Constraint callback returned the wrong number of values.
    ConstraintDimMismatch {
        expected: usize,
        found: usize,
    },

    /// Constraint Jacobian has the wrong shape.
    JacobianShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Constraint values need to be finite.
    NonFiniteConstraint {
        index: usize,
        value: f64,
    },

    // ---- SolverOptions ----
    /// Gradient tolerance needs to be positive and finite.
    InvalidTolGrad {
        tol: f64,
        reason: &'static str,
    },
    /// Cost change tolerance needs to be positive and finite.
    InvalidTolCost {
        tol: f64,
        reason: &'static str,
    },
    /// Maximum iterations needs to be positive.
    InvalidMaxIter {
        max_iter: usize,
        reason: &'static str,
    },
    /// At least one tolerance must be provided.
    NoTolerancesProvided,

    /// Invalid line searcher name.
    InvalidLineSearch {
        name: String,
        reason: &'static str,
    },

    /// lbfgs_mem needs to be at least 1.
    InvalidLBFGSMem {
        mem: usize,
        reason: &'static str,
    },

    /// Penalty schedule settings are out of range.
    InvalidPenalty {
        value: f64,
        reason: &'static str,
    },

    // ---- Cost function ----
    /// Cost function returned a non-finite value.
    NonFiniteCost {
        value: f64,
    },

    // ---- Optimizer outcome ----
    /// Estimated parameters must be finite.
    InvalidThetaHat {
        index: usize,
        value: f64,
        reason: &'static str,
    },

    /// Theta hat is missing
    MissingThetaHat,

    // ---- Argmin ---
    /// Wrapper for argmin::InvalidParameter
    InvalidParameter {
        text: String,
    },
    /// Wrapper for argmin::NotImplemented
    NotImplemented {
        text: String,
    },
    /// Wrapper for argmin::NotInitialized
    NotInitialized {
        text: String,
    },
    /// Wrapper for argmin::ConditionViolated
    ConditionViolated {
        text: String,
    },
    /// Wrapper for argmin::CheckPointNotFound
    CheckPointNotFound {
        text: String,
    },
    /// Wrapper for argmin::PotentialBug
    PotentialBug {
        text: String,
    },
    /// Wrapper for argmin::ImpossibleError
    ImpossibleError {
        text: String,
    },
    /// Wrapper for other argmin::Error types
    BackendError {
        text: String,
    },

    // ---- Model layers ----
    /// Configuration or evaluation error raised by the likelihood model.
    Model(ModelError),

    /// Numerical failure of the structured covariance algebra.
    Covariance(CovError),

    /// Projection or weight-update failure in the trimming step.
    Trimming(TrimError),

    // ---- Fallback ----
    UnknownError,
}

impl OptError {
    /// `true` when the error is a numerical breakdown of the covariance
    /// algebra (possibly reported through the model layer), as opposed to a
    /// configuration or backend problem.
    pub fn is_numerical_failure(&self) -> bool {
        matches!(self, OptError::Covariance(_) | OptError::Model(ModelError::Covariance(_)))
    }
}

impl std::error::Error for OptError {}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Gradient ----
            OptError::GradientNotImplemented => {
                write!(f, "Gradient optimization not implemented")
            }
            OptError::GradientDimMismatch { expected, found } => {
                write!(f, "Gradient dimension mismatch: expected {expected}, found {found}")
            }
            OptError::InvalidGradient { index, value, reason } => {
                write!(f, "Invalid gradient at index {index}: {value}: {reason}")
            }

            // ---- Problem shape ----
            OptError::ParameterLengthMismatch { expected, found } => {
                write!(f, "Parameter length mismatch: expected {expected}, found {found}")
            }
            OptError::InvalidBounds { index, lower, upper, reason } => {
                write!(f, "Invalid bounds at index {index}: [{lower}, {upper}]: {reason}")
            }
            OptError::ConstraintDimMismatch { expected, found } => {
                write!(f, "Constraint dimension mismatch: expected {expected}, found {found}")
            }
            OptError::JacobianShapeMismatch { expected, found } => {
                write!(f, "Constraint Jacobian shape mismatch: expected {expected:?}, found {found:?}")
            }
            OptError::NonFiniteConstraint { index, value } => {
                write!(f, "Non-finite constraint value at index {index}: {value}")
            }

            // ---- SolverOptions ----
            OptError::InvalidTolGrad { tol, reason } => {
                write!(f, "Invalid gradient tolerance {tol}: {reason}")
            }
            OptError::InvalidTolCost { tol, reason } => {
                write!(f, "Invalid cost function change tolerance {tol}: {reason}")
            }
            OptError::InvalidMaxIter { max_iter, reason } => {
                write!(f, "Invalid maximum iterations {max_iter}: {reason}")
            }
            OptError::NoTolerancesProvided => {
                write!(f, "No tolerances provided")
            }
            OptError::InvalidLineSearch { name, reason } => {
                write!(f, "Invalid line searcher '{name}': {reason}")
            }
            OptError::InvalidLBFGSMem { mem, reason } => {
                write!(f, "Invalid L-BFGS memory {mem}: {reason}")
            }
            OptError::InvalidPenalty { value, reason } => {
                write!(f, "Invalid penalty setting {value}: {reason}")
            }

            // ---- Cost function ----
            OptError::NonFiniteCost { value } => {
                write!(f, "Non-finite cost value: {value}")
            }

            // ---- Optimizer outcome ----
            OptError::InvalidThetaHat { index, value, reason } => {
                write!(f, "Invalid estimated parameter at index {index}: {value}: {reason}")
            }
            OptError::MissingThetaHat => {
                write!(f, "Missing estimated parameters (theta hat)")
            }

            // ---- Argmin ----
            OptError::InvalidParameter { text } => {
                write!(f, "Invalid parameter: {text}")
            }
            OptError::NotImplemented { text } => {
                write!(f, "Not implemented: {text}")
            }
            OptError::NotInitialized { text } => {
                write!(f, "Not initialized: {text}")
            }
            OptError::ConditionViolated { text } => {
                write!(f, "Condition violated: {text}")
            }
            OptError::CheckPointNotFound { text } => {
                write!(f, "Checkpoint not found: {text}")
            }
            OptError::PotentialBug { text } => {
                write!(f, "Potential bug: {text}")
            }
            OptError::ImpossibleError { text } => {
                write!(f, "Impossible error: {text}")
            }
            OptError::BackendError { text } => {
                write!(f, "Backend error: {text}")
            }

            // ---- Model layers ----
            OptError::Model(err) => write!(f, "Model error: {err}"),
            OptError::Covariance(err) => write!(f, "Covariance error: {err}"),
            OptError::Trimming(err) => write!(f, "Trimming error: {err}"),

            // ---- Fallback ----
            OptError::UnknownError => {
                write!(f, "Unknown error")
            }
        }
    }
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        // Errors raised inside our own callbacks travel through argmin boxed;
        // recover them first so numerical failures stay distinguishable.
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast() {
            Ok(opt_err) => match opt_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

impl From<ModelError> for OptError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Covariance(cov) => OptError::Covariance(cov),
            other => OptError::Model(other),
        }
    }
}

impl From<CovError> for OptError {
    fn from(err: CovError) -> Self {
        OptError::Covariance(err)
    }
}

impl From<TrimError> for OptError {
    fn from(err: TrimError) -> Self {
        OptError::Trimming(err)
    }
}
