//! Caller-supplied vector maps: the mean function `F(β)`, the constraint map
//! `C(x)` and the regularizer map `H(x)`.
//!
//! A [`VectorMap`] returns a value and its Jacobian. The model never mutates a
//! map and checks the shape of every output before using it; a map whose
//! Jacobian is inconsistent with its value shows up as a gradient-check
//! failure, not as an error.
use ndarray::{Array1, Array2, ArrayView1};

use crate::model::errors::{ModelError, ModelResult};

/// A smooth map `ℝⁿ → ℝᵐ` with its Jacobian (`m × n`).
pub trait VectorMap {
    fn value(&self, x: ArrayView1<f64>) -> Array1<f64>;
    fn jacobian(&self, x: ArrayView1<f64>) -> Array2<f64>;
}

/// `x ↦ A·x` for a fixed matrix `A`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearMap {
    matrix: Array2<f64>,
}

impl LinearMap {
    pub fn new(matrix: Array2<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }
}

impl VectorMap for LinearMap {
    fn value(&self, x: ArrayView1<f64>) -> Array1<f64> {
        self.matrix.dot(&x)
    }

    fn jacobian(&self, _x: ArrayView1<f64>) -> Array2<f64> {
        self.matrix.clone()
    }
}

/// A map built from a value closure and a Jacobian closure.
pub struct FnMap<F, J> {
    value: F,
    jacobian: J,
}

impl<F, J> FnMap<F, J>
where
    F: Fn(ArrayView1<f64>) -> Array1<f64>,
    J: Fn(ArrayView1<f64>) -> Array2<f64>,
{
    pub fn new(value: F, jacobian: J) -> Self {
        Self { value, jacobian }
    }
}

impl<F, J> VectorMap for FnMap<F, J>
where
    F: Fn(ArrayView1<f64>) -> Array1<f64>,
    J: Fn(ArrayView1<f64>) -> Array2<f64>,
{
    fn value(&self, x: ArrayView1<f64>) -> Array1<f64> {
        (self.value)(x)
    }

    fn jacobian(&self, x: ArrayView1<f64>) -> Array2<f64> {
        (self.jacobian)(x)
    }
}

/// Evaluate `map` at `x` and check the output length.
pub(crate) fn checked_value(
    map: &dyn VectorMap, x: ArrayView1<f64>, name: &'static str, expected: usize,
) -> ModelResult<Array1<f64>> {
    let out = map.value(x);
    if out.len() != expected {
        return Err(ModelError::MapOutputMismatch { name, expected, found: out.len() });
    }
    Ok(out)
}

/// Evaluate the Jacobian of `map` at `x` and check its shape.
pub(crate) fn checked_jacobian(
    map: &dyn VectorMap, x: ArrayView1<f64>, name: &'static str, rows: usize,
) -> ModelResult<Array2<f64>> {
    let jac = map.jacobian(x);
    let expected = (rows, x.len());
    if jac.dim() != expected {
        return Err(ModelError::MapJacobianMismatch { name, expected, found: jac.dim() });
    }
    Ok(jac)
}
