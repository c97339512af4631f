//! trimming — robust down-weighting of outlying observations.
//!
//! Purpose
//! -------
//! Maintain a weight vector `w ∈ [0, 1]ᴺ` with `Σw = floor(p·N)` that
//! multiplies each observation's contribution to the likelihood. The fit
//! driver alternates between solving for `(β, γ)` with `w` fixed and taking a
//! projected gradient step on `w` with `(β, γ)` fixed.
//!
//! Key behaviors
//! -------------
//! - [`TrimmingConfig`] validates the inlier percentage `p ∈ (0, 1]` and
//!   produces the uniform starting weights.
//! - [`TrimmingObjective`] evaluates the per-observation surrogate and its
//!   closed-form gradient.
//! - [`CappedSimplexProjector`] projects onto the feasible weight set.
//! - [`TrimmingController`] combines the two into one step.
//!
//! Conventions
//! -----------
//! - All inputs are checked for finiteness; failures are [`TrimError`].
//! - No logging here; the fit driver reports outer iterations.

pub mod config;
pub mod controller;
pub mod errors;
pub mod objective;
pub mod projection;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::config::TrimmingConfig;
pub use self::controller::TrimmingController;
pub use self::errors::{TrimError, TrimResult};
pub use self::objective::TrimmingObjective;
pub use self::projection::{CappedSimplexProjector, ProjectorOptions};
