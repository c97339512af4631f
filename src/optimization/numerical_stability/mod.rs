//! numerical_stability — guarded scalar maps and the box reparameterization.
//!
//! Purpose
//! -------
//! Collect the numerically stable transforms the solver uses to turn a
//! box-constrained parameter vector into an unconstrained one, so that the
//! L-BFGS layer never has to reason about bounds directly.
//!
//! Key behaviors
//! -------------
//! - Stable scalar transforms (`safe_softplus`, its inverse, `safe_logistic`,
//!   `safe_logit`) that do not overflow for large `|x|`.
//! - [`BoxTransform`]: per-coordinate bijection `x = T(θ)` onto the interior
//!   of `[l, u]`, with its inverse and the chain rule for gradients.
//! - Shared tolerances (`BOUNDARY_EPS`, `LOGIT_EPS`) used by the inverse maps.
//!
//! Conventions
//! -----------
//! - Pure numerical helpers: no logging, no I/O, no global state.
//! - Inputs are assumed finite; shape and bound validation happens once in
//!   [`BoxTransform::new`].

pub mod box_transform;
pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::box_transform::{BoundKind, BoxTransform};
pub use self::transformations::{
    BOUNDARY_EPS, LOGIT_EPS, safe_logistic, safe_logit, safe_softplus, safe_softplus_inv,
};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::box_transform::BoxTransform;
    pub use super::transformations::{safe_logistic, safe_softplus, safe_softplus_inv};
}
