//! optimization — solver boundary, numerical helpers, and unified error surface.
//!
//! Purpose
//! -------
//! Provide the optimization layer used by the fit driver: a narrow
//! [`nlp::NlpProblem`] / [`nlp::NlpSolver`] boundary with an Argmin-backed
//! L-BFGS implementation, numerically stable box transforms, and a single
//! error/result surface.
//!
//! Key behaviors
//! -------------
//! - `nlp`: problem/solver traits, options, and the penalty-continuation
//!   L-BFGS driver.
//! - `numerical_stability`: guarded softplus/logistic maps and the
//!   [`numerical_stability::BoxTransform`] that turns bounds into an
//!   unconstrained parameterization.
//! - `errors`: [`errors::OptError`] normalizes configuration issues, backend
//!   solver errors, and the model/covariance/trimming errors that travel up
//!   through solver callbacks.
//!
//! Conventions
//! -----------
//! - Problems are minimized.
//! - Public entry points that can fail return `OptResult<T>`; callers never
//!   see raw Argmin errors.
//! - Logging is limited to `tracing` debug/warn events around solver runs.

pub mod errors;
pub mod nlp;
pub mod numerical_stability;

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::nlp::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
