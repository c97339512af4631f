//! Priors and constraints on the parameter vector `x = (β, γ)`.
//!
//! Purpose
//! -------
//! Hold the optional prior information a fit can use, each validated when it
//! is built and again against the model dimension in [`Priors::validate`]:
//!
//! - [`BoxPrior`]: simple bounds `lb ≤ x ≤ ub` (default: β free, γ ≥ 0).
//! - [`GaussianPrior`]: adds `0.5·‖(x − mean)/std‖²` to the objective.
//! - [`RangeConstraints`]: `cl ≤ C(x) ≤ cu`, handed to the solver.
//! - [`Regularizer`]: adds `0.5·‖(H(x) − h₀)/h₁‖²` to the objective.
//!
//! Invariants & assumptions
//! ------------------------
//! - `lb ≤ ub` elementwise, no NaN; infinite bounds are allowed.
//! - The box never admits negative random-effect variances.
//! - Gaussian and regularizer scales are finite and strictly positive.
//! - The number of constraints / regularizer terms is discovered by
//!   evaluating the map at `x = 0` and must match the supplied ranges.
use ndarray::{Array1, Array2, ArrayView1};

use crate::model::{
    errors::{ModelError, ModelResult},
    maps::{VectorMap, checked_jacobian, checked_value},
};

/// Simple bounds on `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxPrior {
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl BoxPrior {
    /// # Errors
    /// - [`ModelError::PriorLengthMismatch`] if the vectors differ in length.
    /// - [`ModelError::InvalidBounds`] for NaN, `lb > ub`, `lb = +∞` or
    ///   `ub = −∞`.
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> ModelResult<Self> {
        if lower.len() != upper.len() {
            return Err(ModelError::PriorLengthMismatch {
                name: "box upper",
                expected: lower.len(),
                found: upper.len(),
            });
        }
        for (index, (&l, &u)) in lower.iter().zip(upper.iter()).enumerate() {
            if l.is_nan() || u.is_nan() || l > u || l == f64::INFINITY || u == f64::NEG_INFINITY {
                return Err(ModelError::InvalidBounds {
                    index,
                    lower: l,
                    upper: u,
                    reason: "Bounds must satisfy lb <= ub and leave a finite feasible value.",
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// β ∈ (−∞, ∞), γ ∈ [0, ∞).
    pub fn default_for(k_beta: usize, k_gamma: usize) -> Self {
        let mut lower = Array1::from_elem(k_beta + k_gamma, f64::NEG_INFINITY);
        lower.slice_mut(ndarray::s![k_beta..]).fill(0.0);
        Self { lower, upper: Array1::from_elem(k_beta + k_gamma, f64::INFINITY) }
    }

    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }
}

/// Independent Gaussian prior `x_j ~ N(mean_j, std_j²)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianPrior {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl GaussianPrior {
    /// # Errors
    /// - [`ModelError::PriorLengthMismatch`] if the vectors differ in length.
    /// - [`ModelError::NonFiniteLocation`] for a non-finite mean.
    /// - [`ModelError::NonPositiveScale`] for `std ≤ 0` or non-finite `std`.
    pub fn new(mean: Array1<f64>, std: Array1<f64>) -> ModelResult<Self> {
        if mean.len() != std.len() {
            return Err(ModelError::PriorLengthMismatch {
                name: "gaussian std",
                expected: mean.len(),
                found: std.len(),
            });
        }
        check_location("gaussian prior", mean.view())?;
        check_scale("gaussian prior", std.view())?;
        Ok(Self { mean, std })
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// `0.5·‖(x − mean)/std‖²`.
    pub fn value(&self, x: ArrayView1<f64>) -> f64 {
        let z = (&x - &self.mean) / &self.std;
        0.5 * z.dot(&z)
    }

    /// `(x − mean)/std²`.
    pub fn gradient(&self, x: ArrayView1<f64>) -> Array1<f64> {
        (&x - &self.mean) / &self.std.mapv(|s| s * s)
    }
}

/// Range constraints `cl ≤ C(x) ≤ cu`.
pub struct RangeConstraints {
    map: Box<dyn VectorMap>,
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl RangeConstraints {
    /// # Errors
    /// - [`ModelError::PriorLengthMismatch`] if `lower` and `upper` differ in length.
    /// - [`ModelError::InvalidRange`] for NaN or `cl > cu`.
    pub fn new(
        map: Box<dyn VectorMap>, lower: Array1<f64>, upper: Array1<f64>,
    ) -> ModelResult<Self> {
        check_range("constraints", &lower, &upper)?;
        Ok(Self { map, lower, upper })
    }

    pub fn num_constraints(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }

    /// `C(x)`, length-checked.
    pub fn value(&self, x: ArrayView1<f64>) -> ModelResult<Array1<f64>> {
        checked_value(self.map.as_ref(), x, "constraints", self.num_constraints())
    }

    /// `JC(x)`, shape-checked.
    pub fn jacobian(&self, x: ArrayView1<f64>) -> ModelResult<Array2<f64>> {
        checked_jacobian(self.map.as_ref(), x, "constraints", self.num_constraints())
    }
}

/// Regularizer `0.5·‖(H(x) − center)/scale‖²`.
pub struct Regularizer {
    map: Box<dyn VectorMap>,
    center: Array1<f64>,
    scale: Array1<f64>,
}

impl Regularizer {
    /// # Errors
    /// - [`ModelError::PriorLengthMismatch`] if `center` and `scale` differ in length.
    /// - [`ModelError::NonFiniteLocation`] / [`ModelError::NonPositiveScale`]
    ///   for invalid entries.
    pub fn new(
        map: Box<dyn VectorMap>, center: Array1<f64>, scale: Array1<f64>,
    ) -> ModelResult<Self> {
        if center.len() != scale.len() {
            return Err(ModelError::PriorLengthMismatch {
                name: "regularizer scale",
                expected: center.len(),
                found: scale.len(),
            });
        }
        check_location("regularizer", center.view())?;
        check_scale("regularizer", scale.view())?;
        Ok(Self { map, center, scale })
    }

    pub fn num_terms(&self) -> usize {
        self.center.len()
    }

    pub fn value(&self, x: ArrayView1<f64>) -> ModelResult<f64> {
        let h = checked_value(self.map.as_ref(), x, "regularizer", self.num_terms())?;
        let z = (&h - &self.center) / &self.scale;
        Ok(0.5 * z.dot(&z))
    }

    /// `JHᵀ·(H(x) − center)/scale²`.
    pub fn gradient(&self, x: ArrayView1<f64>) -> ModelResult<Array1<f64>> {
        let h = checked_value(self.map.as_ref(), x, "regularizer", self.num_terms())?;
        let jac = checked_jacobian(self.map.as_ref(), x, "regularizer", self.num_terms())?;
        let scaled = (&h - &self.center) / &self.scale.mapv(|s| s * s);
        Ok(jac.t().dot(&scaled))
    }
}

/// All optional prior information of a model.
#[derive(Default)]
pub struct Priors {
    pub box_prior: Option<BoxPrior>,
    pub gaussian: Option<GaussianPrior>,
    pub constraints: Option<RangeConstraints>,
    pub regularizer: Option<Regularizer>,
}

impl Priors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_box(mut self, prior: BoxPrior) -> Self {
        self.box_prior = Some(prior);
        self
    }

    pub fn with_gaussian(mut self, prior: GaussianPrior) -> Self {
        self.gaussian = Some(prior);
        self
    }

    pub fn with_constraints(mut self, constraints: RangeConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn with_regularizer(mut self, regularizer: Regularizer) -> Self {
        self.regularizer = Some(regularizer);
        self
    }

    /// Check every configured prior against `k = k_beta + k_gamma` and fill
    /// in the default box.
    ///
    /// # Errors
    /// - [`ModelError::PriorLengthMismatch`] for priors of the wrong length.
    /// - [`ModelError::InvalidBounds`] if the box admits `γ < 0`.
    /// - [`ModelError::MapOutputMismatch`] / [`ModelError::MapJacobianMismatch`]
    ///   if `C(0)` or `H(0)` disagree with their declared ranges.
    pub(crate) fn validate(&mut self, k_beta: usize, k_gamma: usize) -> ModelResult<()> {
        let k = k_beta + k_gamma;
        let prior = self.box_prior.get_or_insert_with(|| BoxPrior::default_for(k_beta, k_gamma));
        if prior.len() != k {
            return Err(ModelError::PriorLengthMismatch {
                name: "box prior",
                expected: k,
                found: prior.len(),
            });
        }
        for index in k_beta..k {
            if prior.lower[index] < 0.0 {
                return Err(ModelError::InvalidBounds {
                    index,
                    lower: prior.lower[index],
                    upper: prior.upper[index],
                    reason: "Random-effect variances must be bounded below by zero or more.",
                });
            }
        }
        if let Some(gaussian) = &self.gaussian {
            if gaussian.len() != k {
                return Err(ModelError::PriorLengthMismatch {
                    name: "gaussian prior",
                    expected: k,
                    found: gaussian.len(),
                });
            }
        }
        let origin = Array1::<f64>::zeros(k);
        if let Some(constraints) = &self.constraints {
            constraints.value(origin.view())?;
            constraints.jacobian(origin.view())?;
        }
        if let Some(regularizer) = &self.regularizer {
            regularizer.gradient(origin.view())?;
        }
        Ok(())
    }
}

// ---- Helper Methods ----

fn check_location(name: &'static str, values: ArrayView1<f64>) -> ModelResult<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ModelError::NonFiniteLocation { name, index, value: values[index] }),
        None => Ok(()),
    }
}

fn check_scale(name: &'static str, values: ArrayView1<f64>) -> ModelResult<()> {
    match values.iter().position(|v| !(v.is_finite() && *v > 0.0)) {
        Some(index) => Err(ModelError::NonPositiveScale { name, index, value: values[index] }),
        None => Ok(()),
    }
}

fn check_range(name: &'static str, lower: &Array1<f64>, upper: &Array1<f64>) -> ModelResult<()> {
    if lower.len() != upper.len() {
        return Err(ModelError::PriorLengthMismatch {
            name,
            expected: lower.len(),
            found: upper.len(),
        });
    }
    for (index, (&l, &u)) in lower.iter().zip(upper.iter()).enumerate() {
        if l.is_nan() || u.is_nan() || l > u {
            return Err(ModelError::InvalidRange { name, index, lower: l, upper: u });
        }
    }
    Ok(())
}
