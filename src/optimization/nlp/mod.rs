//! nlp — bound- and range-constrained minimization behind a narrow trait.
//!
//! Purpose
//! -------
//! Define the boundary between models and solvers. A model exposes its
//! objective, gradient, bounds and range constraints through
//! [`NlpProblem`]; a solver implements [`NlpSolver`]. The bundled
//! [`LbfgsSolver`] runs Argmin's L-BFGS in an unconstrained space obtained by
//! a per-coordinate box transform, and enforces range constraints by a
//! quadratic-penalty continuation.
//!
//! Key behaviors
//! -------------
//! - [`minimize`]: check the start, build the transform, run one or more
//!   penalty rounds, and report a [`SolverOutcome`].
//! - Missing analytic gradients fall back to finite differences
//!   ([`finite_diff`]); [`check_gradient`] compares the two for tests.
//! - Errors raised inside problem callbacks keep their variant after
//!   passing through Argmin (see `OptError`'s `From<argmin::core::Error>`).
//!
//! Invariants & assumptions
//! ------------------------
//! - Problems are minimized; no sign flips happen in this layer.
//! - Every `x` handed to a problem callback satisfies the problem's bounds.
//! - Solver non-convergence is a field of the outcome, not an error.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover:
//!   - penalty and chain-rule gradients in [`adapter`],
//!   - solver construction and tolerance wiring in [`builders`],
//!   - finite-difference and validation behavior in [`finite_diff`] and
//!     [`validation`],
//!   - configuration and outcome invariants in [`traits`],
//!   - bounded, range-constrained and gradient-free solves in [`api`].

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::{LbfgsSolver, minimize};
pub use self::finite_diff::{GradientCheck, check_gradient};
pub use self::traits::{
    LineSearcher, NlpProblem, NlpSolver, PenaltyOptions, SolverOptions, SolverOutcome, Tolerances,
};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Jacobian, Theta};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_nlme::optimization::nlp::prelude::*;
//
// to import the main solver surface in a single line.

pub mod prelude {
    pub use super::api::{LbfgsSolver, minimize};
    pub use super::traits::{NlpProblem, NlpSolver, SolverOptions, SolverOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
