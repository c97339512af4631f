//! Adapter that exposes an [`NlpProblem`] as an unconstrained `argmin` problem.
//!
//! The solver works on `θ ∈ ℝⁿ`; the problem sees `x = T(θ)` where `T` is the
//! [`BoxTransform`] built from the problem's bounds. Range constraints enter
//! the cost as a quadratic penalty on their violation:
//!
//!   cost(θ) = f(x) + 0.5·ρ·‖C(x) − clip(C(x), cl, cu)‖²,   x = T(θ).
//!
//! Analytic gradients are assembled in x-space and pulled back through `T`;
//! without an analytic gradient the whole cost is finite-differenced in
//! θ-space.
use ndarray::{Array1, ArrayView1, Zip};

use crate::optimization::{
    errors::{OptError, OptResult},
    nlp::{
        finite_diff::fd_gradient,
        traits::NlpProblem,
        types::{Cost, Grad, Theta},
        validation::{validate_constraints, validate_grad, validate_jacobian},
    },
    numerical_stability::BoxTransform,
};
use argmin::core::{CostFunction, Error, Gradient};

/// Constraint range `(cl, cu)` and the current penalty weight `ρ`.
#[derive(Debug, Clone, Copy)]
pub struct RangePenalty<'a> {
    pub rho: f64,
    pub lower: ArrayView1<'a, f64>,
    pub upper: ArrayView1<'a, f64>,
}

/// Bridges an [`NlpProblem`] to `argmin`'s `CostFunction` and `Gradient`.
pub struct ArgMinAdapter<'a> {
    pub problem: &'a dyn NlpProblem,
    pub transform: &'a BoxTransform,
    pub penalty: Option<RangePenalty<'a>>,
}

impl<'a> ArgMinAdapter<'a> {
    pub fn new(
        problem: &'a dyn NlpProblem, transform: &'a BoxTransform, penalty: Option<RangePenalty<'a>>,
    ) -> Self {
        Self { problem, transform, penalty }
    }

    /// Violation `C(x) − clip(C(x), cl, cu)` at model-space `x`, or `None`
    /// when no penalty is attached.
    fn violation(&self, x: &Theta) -> OptResult<Option<(Array1<f64>, f64)>> {
        let Some(penalty) = self.penalty else {
            return Ok(None);
        };
        let values = self.problem.constraints(x)?;
        validate_constraints(&values, self.problem.num_constraints())?;
        Ok(Some((range_violation(&values, penalty.lower, penalty.upper), penalty.rho)))
    }
}

impl<'a> CostFunction for ArgMinAdapter<'a> {
    type Param = Theta;
    type Output = Cost;

    /// Evaluate the penalized cost at `θ`.
    ///
    /// # Errors
    /// - Propagates errors from the problem's objective or constraints.
    /// - `NonFiniteCost` if the objective is not finite.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let x = self.transform.to_constrained(theta.view());
        let value = self.problem.objective(&x)?;
        if !value.is_finite() {
            return Err((OptError::NonFiniteCost { value }).into());
        }
        match self.violation(&x)? {
            Some((viol, rho)) => Ok(value + 0.5 * rho * viol.dot(&viol)),
            None => Ok(value),
        }
    }
}

impl<'a> Gradient for ArgMinAdapter<'a> {
    type Param = Theta;
    type Gradient = Grad;

    /// Evaluate the gradient of the penalized cost at `θ`.
    ///
    /// With an analytic gradient `g = ∇f(x)`, the penalty adds `ρ·JCᵀ·viol`
    /// and the sum is multiplied elementwise by `dx/dθ`. Otherwise the cost
    /// itself is finite-differenced in θ-space.
    ///
    /// # Errors
    /// - Problem errors other than `GradientNotImplemented`.
    /// - Validation errors for wrong gradient/Jacobian shapes or non-finite
    ///   entries.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        let x = self.transform.to_constrained(theta.view());
        match self.problem.gradient(&x) {
            Ok(mut g) => {
                validate_grad(&g, x.len())?;
                if let Some((viol, rho)) = self.violation(&x)? {
                    let jac = self.problem.jacobian(&x)?;
                    validate_jacobian(&jac, viol.len(), x.len())?;
                    g.scaled_add(rho, &jac.t().dot(&viol));
                }
                Ok(self.transform.chain_gradient(theta.view(), g.view()))
            }
            Err(OptError::GradientNotImplemented) => fd_gradient(theta, |t| self.cost(t)),
            Err(e) => Err(e.into()),
        }
    }
}

/// `C − clip(C, cl, cu)`: positive above `cu`, negative below `cl`, zero
/// inside the range.
pub fn range_violation(
    values: &Array1<f64>, lower: ArrayView1<f64>, upper: ArrayView1<f64>,
) -> Array1<f64> {
    let mut out = values.clone();
    Zip::from(&mut out).and(&lower).and(&upper).for_each(|c, &l, &u| {
        *c = if *c > u {
            *c - u
        } else if *c < l {
            *c - l
        } else {
            0.0
        };
    });
    out
}
