//! model — grouped nonlinear mixed-effects likelihood and its fit driver.
//!
//! Purpose
//! -------
//! Tie the data, the caller-supplied mean function, priors, constraints and
//! trimming configuration together into a [`LimeModel`] whose negative
//! log-likelihood is minimized through the [`crate::optimization::nlp`]
//! boundary.
//!
//! Key behaviors
//! -------------
//! - [`GroupedData`]: validated `Y`, `S`, `Z` and group partition.
//! - [`VectorMap`]: mean, constraint and regularizer maps with Jacobians.
//! - [`Priors`]: box, Gaussian, range constraints and regularizer.
//! - [`LimeModel`]: objective, gradient, constraints, the trimming surrogate
//!   and an [`crate::optimization::nlp::NlpProblem`] view for fixed weights.
//! - [`LimeModel::fit`]: block coordinate descent over `(x, w)`, returning a
//!   [`FitResult`].
//!
//! Conventions
//! -----------
//! - `x = (β, γ)`, with `β = x[..k_beta]` and `γ = x[k_beta..]`.
//! - Configuration errors are [`ModelError`] and surface at construction.
//! - Only the fit driver logs (`tracing`); evaluations are silent.

pub mod data;
pub mod errors;
pub mod fit;
pub mod likelihood;
pub mod maps;
pub mod priors;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::data::GroupedData;
pub use self::errors::{ModelError, ModelResult};
pub use self::fit::{FitOptions, FitResult, FitStatus};
pub use self::likelihood::{LikelihoodProblem, LimeModel};
pub use self::maps::{FnMap, LinearMap, VectorMap};
pub use self::priors::{BoxPrior, GaussianPrior, Priors, RangeConstraints, Regularizer};
