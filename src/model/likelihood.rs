//! LimeModel — negative log-likelihood of a grouped nonlinear mixed-effects
//! model with optional trimming weights, priors and constraints.
//!
//! Purpose
//! -------
//! Evaluate, for `x = (β, γ)` and optional weights `w`,
//!
//!   f(x; w) = 0.5·N·log(2π) + 0.5·log det Σ + 0.5·Rᵀ Σ⁻¹ R
//!           + 0.5·‖(H(x) − h₀)/h₁‖² + 0.5·‖(x − m)/s‖²,
//!
//! where `R = √w ∘ (Y − F(β))`, and Σ is the structured covariance built
//! from `V^w` and the row-scaled design `√w ∘ Z`. Without weights every
//! observation enters with `w = 1`.
//!
//! Key behaviors
//! -------------
//! - [`LimeModel::objective`] / [`LimeModel::gradient`]: closed-form value and
//!   gradient through [`StructuredCovariance`].
//! - [`LimeModel::problem`]: wrap the model and a fixed weight vector as an
//!   [`NlpProblem`] for any [`crate::optimization::nlp::NlpSolver`].
//! - [`LimeModel::trimming_objective`]: the per-observation surrogate the
//!   weight controller descends at fixed `x`.
//! - [`LimeModel::objective_dense`] / [`LimeModel::gradient_check`]: O(N³)
//!   oracle and finite-difference check, for tests.
//!
//! Invariants & assumptions
//! ------------------------
//! - All configuration is validated in [`LimeModel::new`]; evaluation errors
//!   are limited to bad `x`/`w` inputs, inconsistent map outputs and
//!   covariance breakdowns.
//! - Evaluations are pure functions of `(x, w)` and the stored data.
//! - `N` in the constant term is always the full number of observations,
//!   trimmed or not.
use ndarray::{Array1, Array2, ArrayView1, Axis, concatenate, s};
use std::f64::consts::PI;

use crate::{
    covariance::StructuredCovariance,
    model::{
        data::GroupedData,
        errors::{ModelError, ModelResult},
        maps::{VectorMap, checked_jacobian, checked_value},
        priors::{BoxPrior, Priors},
    },
    optimization::{
        errors::{OptError, OptResult},
        nlp::{
            finite_diff::{GradientCheck, check_gradient},
            traits::NlpProblem,
            types::{Cost, Grad, Jacobian, Theta},
        },
    },
    trimming::{TrimmingConfig, TrimmingObjective},
};

/// Starting value of every random-effect variance in [`LimeModel::default_x0`].
pub const DEFAULT_GAMMA_START: f64 = 0.01;

/// Grouped mixed-effects model with a caller-supplied mean function.
///
/// Fields
/// ------
/// - `data`: observations, design and partition.
/// - `k_beta`: number of fixed effects (`≥ 1`).
/// - `mean`: `F(β)` and `JF(β)`, `N` outputs.
/// - `priors`: validated priors; the box prior is always present.
/// - `trimming`: inlier percentage.
pub struct LimeModel {
    data: GroupedData,
    k_beta: usize,
    mean: Box<dyn VectorMap>,
    priors: Priors,
    trimming: TrimmingConfig,
}

/// Residuals, mean Jacobian, design and variances after applying weights.
struct Weighted {
    resid: Array1<f64>,
    jf: Array2<f64>,
    z: Array2<f64>,
    v: Array1<f64>,
}

impl LimeModel {
    /// Validate the configuration and build the model.
    ///
    /// # Errors
    /// - [`ModelError::InvalidDimension`] if `k_beta == 0`.
    /// - [`ModelError::MapOutputMismatch`] / [`ModelError::MapJacobianMismatch`]
    ///   if `F(0)` is not length `N` or `JF(0)` is not `N × k_beta`, and the
    ///   same for the constraint and regularizer maps at `x = 0`.
    /// - Prior errors from [`Priors`] validation, including a box that admits
    ///   negative random-effect variances.
    pub fn new(
        data: GroupedData, k_beta: usize, mean: Box<dyn VectorMap>, mut priors: Priors,
        trimming: TrimmingConfig,
    ) -> ModelResult<Self> {
        if k_beta == 0 {
            return Err(ModelError::InvalidDimension {
                name: "k_beta",
                value: k_beta,
                reason: "At least one fixed effect is required.",
            });
        }
        let n = data.num_obs();
        let beta0 = Array1::<f64>::zeros(k_beta);
        checked_value(mean.as_ref(), beta0.view(), "mean", n)?;
        checked_jacobian(mean.as_ref(), beta0.view(), "mean", n)?;
        priors.validate(k_beta, data.num_random_effects())?;
        Ok(Self { data, k_beta, mean, priors, trimming })
    }

    // ---- Dimensions & accessors ----

    pub fn k_beta(&self) -> usize {
        self.k_beta
    }

    pub fn k_gamma(&self) -> usize {
        self.data.num_random_effects()
    }

    /// Length of `x`.
    pub fn k(&self) -> usize {
        self.k_beta + self.k_gamma()
    }

    pub fn num_obs(&self) -> usize {
        self.data.num_obs()
    }

    pub fn num_constraints(&self) -> usize {
        self.priors.constraints.as_ref().map_or(0, |c| c.num_constraints())
    }

    pub fn data(&self) -> &GroupedData {
        &self.data
    }

    pub fn priors(&self) -> &Priors {
        &self.priors
    }

    pub fn trimming(&self) -> &TrimmingConfig {
        &self.trimming
    }

    /// Split `x` into `(β, γ)`.
    ///
    /// # Errors
    /// [`ModelError::ParameterLengthMismatch`] if `x.len() != k`.
    pub fn split<'x>(
        &self, x: ArrayView1<'x, f64>,
    ) -> ModelResult<(ArrayView1<'x, f64>, ArrayView1<'x, f64>)> {
        if x.len() != self.k() {
            return Err(ModelError::ParameterLengthMismatch { expected: self.k(), found: x.len() });
        }
        Ok(x.split_at(Axis(0), self.k_beta))
    }

    /// Box bounds `(lb, ub)` on `x`.
    pub fn bounds(&self) -> (Array1<f64>, Array1<f64>) {
        match &self.priors.box_prior {
            Some(prior) => (prior.lower().clone(), prior.upper().clone()),
            None => {
                let prior = BoxPrior::default_for(self.k_beta, self.k_gamma());
                (prior.lower().clone(), prior.upper().clone())
            }
        }
    }

    /// `β = 0`, `γ = 0.01`, clamped into the box.
    pub fn default_x0(&self) -> Theta {
        let (lb, ub) = self.bounds();
        let mut x0 = Array1::<f64>::zeros(self.k());
        x0.slice_mut(s![self.k_beta..]).fill(DEFAULT_GAMMA_START);
        ndarray::Zip::from(&mut x0).and(&lb).and(&ub).for_each(|xi, &l, &u| {
            *xi = xi.clamp(l, u);
        });
        x0
    }

    /// Uniform starting weights `floor(p·N)/N`.
    pub fn initial_weights(&self) -> Array1<f64> {
        self.trimming.initial_weights(self.num_obs())
    }

    // ---- Likelihood ----

    /// Negative log-likelihood plus prior terms.
    ///
    /// # Errors
    /// - Input errors for bad `x` or `w`.
    /// - [`ModelError::Covariance`] if the covariance cannot be factored.
    pub fn objective(&self, x: ArrayView1<f64>, w: Option<ArrayView1<f64>>) -> ModelResult<f64> {
        let (_, gamma) = self.split(x)?;
        let weighted = self.weighted(x, w)?;
        let cov = StructuredCovariance::new(
            weighted.v,
            weighted.z.view(),
            gamma,
            self.data.partition(),
        )?;
        let solved = cov.inv_dot(weighted.resid.view())?;
        let base = self.constant_term() + 0.5 * cov.log_det() + 0.5 * weighted.resid.dot(&solved);
        Ok(base + self.prior_value(x)?)
    }

    /// Closed-form gradient of [`LimeModel::objective`].
    ///
    /// # Errors
    /// Same as [`LimeModel::objective`].
    pub fn gradient(
        &self, x: ArrayView1<f64>, w: Option<ArrayView1<f64>>,
    ) -> ModelResult<Array1<f64>> {
        let (_, gamma) = self.split(x)?;
        let weighted = self.weighted(x, w)?;
        let partition = self.data.partition();
        let cov = StructuredCovariance::new(weighted.v, weighted.z.view(), gamma, partition)?;

        // One multi-column solve for [R | Z].
        let rhs = concatenate![Axis(1), weighted.resid.view().insert_axis(Axis(1)), weighted.z];
        let solved = cov.inv_dot_mat(rhs.view())?;
        let inv_r = solved.column(0);
        let inv_z = solved.slice(s![.., 1..]);

        let grad_beta = -weighted.jf.t().dot(&inv_r);

        let trace_term = (&weighted.z * &inv_z).sum_axis(Axis(0));
        let scores = partition.segment_sum((&weighted.z * &inv_r.insert_axis(Axis(1))).view())?;
        let quad_term = scores.mapv(|u| u * u).sum_axis(Axis(0));
        let grad_gamma = 0.5 * (trace_term - quad_term);

        let grad = concatenate![Axis(0), grad_beta, grad_gamma];
        Ok(grad + self.prior_gradient(x)?)
    }

    /// [`LimeModel::objective`] through the dense `N × N` oracle. Testing only.
    ///
    /// # Errors
    /// Same as [`LimeModel::objective`], plus a singular dense matrix.
    pub fn objective_dense(
        &self, x: ArrayView1<f64>, w: Option<ArrayView1<f64>>,
    ) -> ModelResult<f64> {
        let (_, gamma) = self.split(x)?;
        let weighted = self.weighted(x, w)?;
        let cov = StructuredCovariance::new(
            weighted.v,
            weighted.z.view(),
            gamma,
            self.data.partition(),
        )?;
        let inverse = cov.dense_inverse()?;
        let quad = weighted.resid.dot(&inverse.dot(&weighted.resid));
        let base = self.constant_term() + 0.5 * cov.dense_log_det()? + 0.5 * quad;
        Ok(base + self.prior_value(x)?)
    }

    // ---- Constraints ----

    /// `C(x)`, empty when no constraints are configured.
    ///
    /// # Errors
    /// Bad `x` or a constraint map returning the wrong length.
    pub fn constraints(&self, x: ArrayView1<f64>) -> ModelResult<Array1<f64>> {
        self.split(x)?;
        match &self.priors.constraints {
            Some(c) => c.value(x),
            None => Ok(Array1::zeros(0)),
        }
    }

    /// `JC(x)`, `0 × k` when no constraints are configured.
    ///
    /// # Errors
    /// Bad `x` or a constraint Jacobian of the wrong shape.
    pub fn jacobian(&self, x: ArrayView1<f64>) -> ModelResult<Array2<f64>> {
        self.split(x)?;
        match &self.priors.constraints {
            Some(c) => c.jacobian(x),
            None => Ok(Array2::zeros((0, self.k()))),
        }
    }

    /// `(cl, cu)`, empty when no constraints are configured.
    pub fn constraint_bounds(&self) -> (Array1<f64>, Array1<f64>) {
        match &self.priors.constraints {
            Some(c) => (c.lower().clone(), c.upper().clone()),
            None => (Array1::zeros(0), Array1::zeros(0)),
        }
    }

    // ---- Trimming & solver boundary ----

    /// Trimming surrogate at fixed `x`: `r = (Y − F(β))²`, `t = (Z∘Z)·γ`, `V`.
    ///
    /// # Errors
    /// Bad `x`, a mean map of the wrong shape, or non-finite residuals.
    pub fn trimming_objective(&self, x: ArrayView1<f64>) -> ModelResult<TrimmingObjective> {
        let (beta, gamma) = self.split(x)?;
        let f = checked_value(self.mean.as_ref(), beta, "mean", self.num_obs())?;
        let r = (&self.data.y() - &f).mapv(|e| e * e);
        let z = self.data.z();
        let t = (&z * &z).dot(&gamma);
        Ok(TrimmingObjective::new(r, t, self.data.v().to_owned())?)
    }

    /// Wrap the model with a fixed weight vector as an [`NlpProblem`].
    ///
    /// # Errors
    /// [`ModelError::WeightLengthMismatch`] / [`ModelError::InvalidWeight`].
    pub fn problem(&self, w: Option<ArrayView1<f64>>) -> ModelResult<LikelihoodProblem<'_>> {
        if let Some(w) = w {
            self.check_weights(w)?;
        }
        Ok(LikelihoodProblem { model: self, weights: w.map(|w| w.to_owned()) })
    }

    /// Compare [`LimeModel::gradient`] with a central difference of the
    /// objective at `(x, w)`. Testing only.
    ///
    /// # Errors
    /// Evaluation errors at or around `x`.
    pub fn gradient_check(
        &self, x: ArrayView1<f64>, w: Option<ArrayView1<f64>>,
    ) -> OptResult<GradientCheck> {
        let problem = self.problem(w)?;
        check_gradient(&problem, &x.to_owned())
    }

    // ---- Helper Methods ----

    fn constant_term(&self) -> f64 {
        0.5 * self.num_obs() as f64 * (2.0 * PI).ln()
    }

    fn check_weights(&self, w: ArrayView1<f64>) -> ModelResult<()> {
        if w.len() != self.num_obs() {
            return Err(ModelError::WeightLengthMismatch {
                expected: self.num_obs(),
                found: w.len(),
            });
        }
        match w.iter().position(|wi| !(0.0..=1.0).contains(wi)) {
            Some(index) => Err(ModelError::InvalidWeight { index, value: w[index] }),
            None => Ok(()),
        }
    }

    fn weighted(&self, x: ArrayView1<f64>, w: Option<ArrayView1<f64>>) -> ModelResult<Weighted> {
        let (beta, _) = self.split(x)?;
        let n = self.num_obs();
        let f = checked_value(self.mean.as_ref(), beta, "mean", n)?;
        let mut jf = checked_jacobian(self.mean.as_ref(), beta, "mean", n)?;
        let mut resid = &self.data.y() - &f;
        let mut z = self.data.z().to_owned();
        let v = match w {
            None => self.data.v().to_owned(),
            Some(w) => {
                self.check_weights(w)?;
                let sqrt_w = w.mapv(f64::sqrt);
                let sqrt_col = sqrt_w.view().insert_axis(Axis(1));
                resid *= &sqrt_w;
                jf *= &sqrt_col;
                z *= &sqrt_col;
                let mut v = self.data.v().to_owned();
                ndarray::Zip::from(&mut v).and(&w).for_each(|vi, &wi| *vi = vi.powf(wi));
                v
            }
        };
        if let Some(index) = resid.iter().position(|e| !e.is_finite()) {
            return Err(ModelError::NonFiniteData { name: "mean", index, value: f[index] });
        }
        Ok(Weighted { resid, jf, z, v })
    }

    fn prior_value(&self, x: ArrayView1<f64>) -> ModelResult<f64> {
        let mut value = 0.0;
        if let Some(reg) = &self.priors.regularizer {
            value += reg.value(x)?;
        }
        if let Some(gaussian) = &self.priors.gaussian {
            value += gaussian.value(x);
        }
        Ok(value)
    }

    fn prior_gradient(&self, x: ArrayView1<f64>) -> ModelResult<Array1<f64>> {
        let mut grad = Array1::<f64>::zeros(self.k());
        if let Some(reg) = &self.priors.regularizer {
            grad += &reg.gradient(x)?;
        }
        if let Some(gaussian) = &self.priors.gaussian {
            grad += &gaussian.gradient(x);
        }
        Ok(grad)
    }
}

/// A [`LimeModel`] with weights held fixed, seen through [`NlpProblem`].
pub struct LikelihoodProblem<'a> {
    model: &'a LimeModel,
    weights: Option<Array1<f64>>,
}

impl LikelihoodProblem<'_> {
    pub fn weights(&self) -> Option<ArrayView1<'_, f64>> {
        self.weights.as_ref().map(|w| w.view())
    }
}

impl NlpProblem for LikelihoodProblem<'_> {
    fn num_variables(&self) -> usize {
        self.model.k()
    }

    fn objective(&self, x: &Theta) -> OptResult<Cost> {
        Ok(self.model.objective(x.view(), self.weights())?)
    }

    fn gradient(&self, x: &Theta) -> OptResult<Grad> {
        Ok(self.model.gradient(x.view(), self.weights())?)
    }

    fn bounds(&self) -> (Theta, Theta) {
        self.model.bounds()
    }

    fn num_constraints(&self) -> usize {
        self.model.num_constraints()
    }

    fn constraints(&self, x: &Theta) -> OptResult<Array1<f64>> {
        Ok(self.model.constraints(x.view())?)
    }

    fn jacobian(&self, x: &Theta) -> OptResult<Jacobian> {
        Ok(self.model.jacobian(x.view())?)
    }

    fn constraint_bounds(&self) -> (Array1<f64>, Array1<f64>) {
        self.model.constraint_bounds()
    }

    fn check(&self, x: &Theta) -> OptResult<()> {
        if x.len() != self.model.k() {
            return Err(OptError::ParameterLengthMismatch {
                expected: self.model.k(),
                found: x.len(),
            });
        }
        Ok(())
    }
}
