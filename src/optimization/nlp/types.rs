//! nlp::types — shared numeric aliases and solver wiring.
//!
//! Purpose
//! -------
//! Centralize the numeric types and L-BFGS aliases used by the NLP layer so
//! the rest of the optimization code stays agnostic to `ndarray` and Argmin
//! generics.
//!
//! Conventions
//! -----------
//! - `Theta` and `Grad` are column vectors of length `n`, the number of
//!   decision variables; inside the argmin adapter they live in the
//!   unconstrained θ-space, everywhere else in model space `x`.
//! - `Jacobian` is `m × n` for `m` range constraints.
//! - `Cost` is the scalar being *minimized*; there is no sign flip anywhere
//!   in this layer.
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Parameter vector (`x` in model space, `θ` in solver space).
pub type Theta = Array1<f64>;

/// Gradient vector, same shape as [`Theta`].
pub type Grad = Array1<f64>;

/// Constraint Jacobian `∂C/∂x`, `m × n`.
pub type Jacobian = Array2<f64>;

/// Scalar objective value being minimized.
pub type Cost = f64;

/// Function-evaluation counters as reported by the solver.
///
/// Maps counter names (e.g., `"cost_count"`) to counts. Counters from
/// successive penalty rounds are summed.
pub type FnEvalMap = HashMap<String, u64>;

/// Default history size (`m`) for L-BFGS runs.
pub const DEFAULT_LBFGS_MEM: usize = 7;

/// Hager–Zhang line search specialized to this crate’s numeric types.
pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;

/// More–Thuente line search specialized to this crate’s numeric types.
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;

/// L-BFGS solver wired to the Hager–Zhang line search.
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;

/// L-BFGS solver wired to the More–Thuente line search.
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;
