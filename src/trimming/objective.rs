//! Trimming objective over the weights `w` for fixed `(β, γ)`.
//!
//! With squared residuals `r = (Y − F(β))²`, random-effect variance
//! contributions `t = (Z∘Z)·γ` and observation variances `V`:
//!
//!   v = V^w,  d = v + t·w,
//!   f(w) = 0.5·Σ r·w/d + 0.5·N·log(2π) + 0.5·Σ log d,
//!   ∂f/∂wᵢ = 0.5·rᵢ·vᵢ·(1 − log vᵢ)/dᵢ² + 0.5·(tᵢ + vᵢ·log Vᵢ)/dᵢ.
//!
//! This treats every observation as its own block, which is the diagonal of
//! the grouped covariance; it is the surrogate the weight controller descends.
use ndarray::{Array1, ArrayView1, Zip};
use std::f64::consts::PI;

use crate::trimming::errors::{TrimError, TrimResult};

/// Surrogate `f(w)` with its inputs `r`, `t` and `V` fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmingObjective {
    r: Array1<f64>,
    t: Array1<f64>,
    v: Array1<f64>,
    log_v: Array1<f64>,
}

impl TrimmingObjective {
    /// # Errors
    /// - [`TrimError::LengthMismatch`] if `t` or `v` differ in length from `r`.
    /// - [`TrimError::NonFiniteInput`] for non-finite `r` or `t`.
    /// - [`TrimError::NonPositiveVariance`] for `V ≤ 0` or non-finite `V`.
    pub fn new(r: Array1<f64>, t: Array1<f64>, v: Array1<f64>) -> TrimResult<Self> {
        for (name, len) in [("t", t.len()), ("v", v.len())] {
            if len != r.len() {
                return Err(TrimError::LengthMismatch { name, expected: r.len(), found: len });
            }
        }
        for (name, values) in [("r", &r), ("t", &t)] {
            check_finite(name, values.view())?;
        }
        if let Some(index) = v.iter().position(|x| !(x.is_finite() && *x > 0.0)) {
            return Err(TrimError::NonPositiveVariance { index, value: v[index] });
        }
        let log_v = v.mapv(f64::ln);
        Ok(Self { r, t, v, log_v })
    }

    pub fn num_obs(&self) -> usize {
        self.r.len()
    }

    /// `f(w)`.
    ///
    /// # Errors
    /// [`TrimError::LengthMismatch`] / [`TrimError::NonFiniteInput`] for bad `w`.
    pub fn value(&self, w: ArrayView1<f64>) -> TrimResult<f64> {
        self.check_weights(w)?;
        let n = self.num_obs() as f64;
        let mut quad = 0.0;
        let mut log_det = 0.0;
        Zip::from(&w).and(&self.r).and(&self.t).and(&self.log_v).for_each(|&wi, &ri, &ti, &lv| {
            let d = (wi * lv).exp() + ti * wi;
            quad += ri * wi / d;
            log_det += d.ln();
        });
        Ok(0.5 * quad + 0.5 * n * (2.0 * PI).ln() + 0.5 * log_det)
    }

    /// `∇f(w)`.
    ///
    /// # Errors
    /// [`TrimError::LengthMismatch`] / [`TrimError::NonFiniteInput`] for bad `w`.
    pub fn gradient(&self, w: ArrayView1<f64>) -> TrimResult<Array1<f64>> {
        self.check_weights(w)?;
        let mut grad = Array1::zeros(self.num_obs());
        Zip::from(&mut grad)
            .and(&w)
            .and(&self.r)
            .and(&self.t)
            .and(&self.log_v)
            .for_each(|g, &wi, &ri, &ti, &lv| {
                let log_vw = wi * lv;
                let vw = log_vw.exp();
                let d = vw + ti * wi;
                *g = 0.5 * ri * vw * (1.0 - log_vw) / (d * d) + 0.5 * (ti + vw * lv) / d;
            });
        Ok(grad)
    }

    fn check_weights(&self, w: ArrayView1<f64>) -> TrimResult<()> {
        if w.len() != self.num_obs() {
            return Err(TrimError::LengthMismatch {
                name: "w",
                expected: self.num_obs(),
                found: w.len(),
            });
        }
        check_finite("w", w)
    }
}

fn check_finite(name: &'static str, values: ArrayView1<f64>) -> TrimResult<()> {
    match values.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(TrimError::NonFiniteInput { name, index, value: values[index] }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn objective() -> TrimmingObjective {
        TrimmingObjective::new(
            array![0.4, 2.5, 0.01, 9.0],
            array![0.2, 0.0, 1.3, 0.5],
            array![0.25, 1.0, 0.04, 2.0],
        )
        .expect("valid objective")
    }

    #[test]
    // Purpose
    // -------
    // With unit weights and `t = 0` the value is the Gaussian negative
    // log-likelihood of independent observations.
    fn unit_weights_reduce_to_independent_gaussian() {
        let r = array![1.0, 4.0];
        let v = array![0.5, 2.0];
        let obj = TrimmingObjective::new(r.clone(), Array1::zeros(2), v.clone()).expect("valid");
        let expected = 0.5 * (1.0 / 0.5 + 4.0 / 2.0)
            + (2.0 * PI).ln()
            + 0.5 * (0.5f64.ln() + 2.0f64.ln());

        let value = obj.value(array![1.0, 1.0].view()).expect("value");
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // The closed-form gradient matches central differences at interior
    // weights.
    fn gradient_matches_central_differences() {
        let obj = objective();
        let w = array![0.9, 0.3, 0.6, 0.75];
        let grad = obj.gradient(w.view()).expect("gradient");
        let h = 1e-6;

        for i in 0..w.len() {
            let mut wp = w.clone();
            let mut wm = w.clone();
            wp[i] += h;
            wm[i] -= h;
            let fd = (obj.value(wp.view()).expect("value") - obj.value(wm.view()).expect("value"))
                / (2.0 * h);
            assert!((fd - grad[i]).abs() < 1e-6, "index {i}: fd {fd}, analytic {}", grad[i]);
        }
    }

    #[test]
    // Purpose
    // -------
    // Invalid inputs are rejected before any arithmetic.
    fn rejects_invalid_inputs() {
        assert_eq!(
            TrimmingObjective::new(array![1.0], array![0.0, 1.0], array![1.0]),
            Err(TrimError::LengthMismatch { name: "t", expected: 1, found: 2 })
        );
        assert_eq!(
            TrimmingObjective::new(array![1.0], array![0.0], array![0.0]),
            Err(TrimError::NonPositiveVariance { index: 0, value: 0.0 })
        );
        assert_eq!(
            objective().value(array![1.0].view()),
            Err(TrimError::LengthMismatch { name: "w", expected: 4, found: 1 })
        );
    }
}
