//! rust_nlme — trimmed nonlinear mixed-effects models with structured
//! covariance algebra.
//!
//! Purpose
//! -------
//! Fit grouped models of the form
//!
//!   Y_i = F(β)_i + Z_i u_i + ε_i,  u_i ~ N(0, diag(γ)),  ε_i ~ N(0, diag(S_i²)),
//!
//! by minimizing the marginal negative log-likelihood, optionally with priors,
//! range constraints, a regularizer, and robust trimming of a fixed share of
//! observations.
//!
//! Key behaviors
//! -------------
//! - `covariance`: log-determinants and solves against the block-diagonal
//!   covariance without forming it.
//! - `model`: data, priors, the likelihood and the fit driver.
//! - `trimming`: the weight surrogate, capped-simplex projection and
//!   projected gradient controller.
//! - `optimization`: the `NlpProblem` / `NlpSolver` boundary and an Argmin
//!   L-BFGS solver with box transforms and a penalty for range constraints.
//!
//! Conventions
//! -----------
//! - Vectors and matrices on the public surface are `ndarray` types.
//! - Each layer has its own error enum; `OptError` wraps the others when they
//!   travel through a solver.
//! - Logging goes through `tracing`; install any subscriber to see it.
//!
//! Downstream usage
//! ----------------
//! Build a [`model::GroupedData`], a mean map, optional [`model::Priors`] and
//! a [`trimming::TrimmingConfig`]; construct a [`model::LimeModel`] and call
//! [`model::LimeModel::fit`] with an
//! [`optimization::nlp::LbfgsSolver`] (or any other
//! [`optimization::nlp::NlpSolver`]).

pub mod covariance;
pub mod model;
pub mod optimization;
pub mod trimming;
