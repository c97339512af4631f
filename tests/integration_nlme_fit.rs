//! Integration tests for fitting grouped mixed-effects models.
//!
//! Purpose
//! -------
//! - Validate the end-to-end pipeline: synthetic grouped data, model
//!   construction, L-BFGS fitting with and without trimming, and the solver
//!   boundary for constrained problems.
//! - Use realistic sizes (10 groups of 5, three fixed effects, two random
//!   effects) and seeded randomness so that failures reproduce.
//!
//! Coverage
//! --------
//! - `model::LimeModel::fit`:
//!   - untrimmed fits recover β within a few GLS standard errors,
//!   - trimmed fits down-weight injected outliers,
//!   - a range constraint on γ is honored.
//! - `model::LimeModel::gradient_check` on random data with weights.
//! - `covariance::StructuredCovariance` as the source of GLS standard errors.
//!
//! Exclusions
//! ----------
//! - Low-level algebra, projection and transform edge cases; those are unit
//!   tested next to their code.
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, array};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rust_nlme::{
    covariance::StructuredCovariance,
    model::{
        FitOptions, FitStatus, GroupedData, LimeModel, LinearMap, Priors, RangeConstraints,
    },
    optimization::nlp::{LbfgsSolver, SolverOptions, Tolerances},
    trimming::{ProjectorOptions, TrimmingConfig},
};

const NUM_GROUPS: usize = 10;
const GROUP_SIZE: usize = 5;

/// Synthetic grouped data together with the values that generated it.
struct Synthetic {
    data: GroupedData,
    design: Array2<f64>,
    beta: Array1<f64>,
    gamma: Array1<f64>,
}

/// Purpose
/// -------
/// Draw `Y = Xβ + Z_i u_i + S·ε` with `u_i ~ N(0, diag γ)`, `ε ~ N(0, 1)`,
/// `S ~ U(0.1, 0.5)`, then add `shift` to the observations in `outliers`.
///
/// Layout
/// ------
/// - `X = [1, x₁, x₂]` with standard normal covariates.
/// - `Z = [1, z₁]` with a standard normal slope covariate.
/// - β = (1, −0.5, 2), γ = (0.3, 0.1).
fn synthetic(seed: u64, outliers: &[usize], shift: f64) -> Synthetic {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = NUM_GROUPS * GROUP_SIZE;
    let beta = array![1.0, -0.5, 2.0];
    let gamma = array![0.3, 0.1];

    let design = Array2::from_shape_fn((n, 3), |(_, j)| {
        if j == 0 { 1.0 } else { rng.sample::<f64, _>(StandardNormal) }
    });
    let z = Array2::from_shape_fn((n, 2), |(_, j)| {
        if j == 0 { 1.0 } else { rng.sample::<f64, _>(StandardNormal) }
    });
    let s = Array1::from_shape_fn(n, |_| rng.gen_range(0.1..0.5));

    let mut y = design.dot(&beta);
    for group in 0..NUM_GROUPS {
        let u: Array1<f64> =
            gamma.mapv(|g: f64| g.sqrt() * rng.sample::<f64, _>(StandardNormal));
        for row in group * GROUP_SIZE..(group + 1) * GROUP_SIZE {
            y[row] += z.row(row).dot(&u) + s[row] * rng.sample::<f64, _>(StandardNormal);
        }
    }
    for &row in outliers {
        y[row] += shift;
    }

    let data = GroupedData::new(vec![GROUP_SIZE; NUM_GROUPS], y, s, z).expect("valid data");
    Synthetic { data, design, beta, gamma }
}

fn build_model(sample: &Synthetic, priors: Priors, trimming: TrimmingConfig) -> LimeModel {
    LimeModel::new(
        sample.data.clone(),
        3,
        Box::new(LinearMap::new(sample.design.clone())),
        priors,
        trimming,
    )
    .expect("valid model")
}

fn solver() -> LbfgsSolver {
    let tols = Tolerances::new(Some(1e-6), Some(1e-12), None).expect("valid tolerances");
    LbfgsSolver::new(SolverOptions { tols, ..SolverOptions::default() })
}

/// GLS standard errors of β at the generating γ: sqrt(diag((Xᵀ Σ⁻¹ X)⁻¹)).
fn gls_standard_errors(sample: &Synthetic) -> Array1<f64> {
    let data = &sample.data;
    let cov = StructuredCovariance::new(
        data.v().to_owned(),
        data.z(),
        sample.gamma.view(),
        data.partition(),
    )
    .expect("covariance at true gamma");
    let solved = cov.inv_dot_mat(sample.design.view()).expect("solve");
    let info = sample.design.t().dot(&solved);
    let k = info.nrows();
    let inverse = DMatrix::from_fn(k, k, |i, j| info[[i, j]])
        .try_inverse()
        .expect("information matrix is invertible");
    Array1::from_shape_fn(k, |j| inverse[(j, j)].sqrt())
}

#[test]
// Purpose
// -------
// Untrimmed fits recover β within five GLS standard errors across seeds.
//
// Given
// -----
// - 10 groups of 5, three fixed effects, two random effects.
// - Seeds 7, 11 and 2024.
//
// Expect
// ------
// - |β̂_j − β_j| ≤ 5·SE_j for every coordinate.
// - γ̂ ≥ 0 and unit weights.
fn untrimmed_fit_recovers_beta() {
    for seed in [7_u64, 11, 2024] {
        let sample = synthetic(seed, &[], 0.0);
        let model = build_model(&sample, Priors::new(), TrimmingConfig::disabled());
        let opts = FitOptions::new(200, 1, 1.0, 1e-6, ProjectorOptions::default())
            .expect("valid options");

        let result = model.fit(&solver(), None, &opts).expect("fit");
        let se = gls_standard_errors(&sample);

        for j in 0..3 {
            let err = (result.beta[j] - sample.beta[j]).abs();
            assert!(
                err <= 5.0 * se[j],
                "seed {seed}, beta[{j}]: estimate {}, truth {}, se {}",
                result.beta[j],
                sample.beta[j],
                se[j]
            );
        }
        assert!(result.gamma.iter().all(|&g| g >= 0.0));
        assert_eq!(result.weights, Array1::<f64>::ones(NUM_GROUPS * GROUP_SIZE));
        assert_ne!(result.status, FitStatus::OuterMaxIterReached);
    }
}

#[test]
// Purpose
// -------
// Trimming isolates observations shifted far from the model.
//
// Given
// -----
// - Five observations shifted by +10, inlier percentage 0.9.
//
// Expect
// ------
// - Σw = floor(0.9·50) = 45.
// - Shifted observations get weight below 0.1, all others above 0.5.
// - β̂ lands close to the generating β.
fn trimmed_fit_downweights_outliers() {
    let outliers = [3_usize, 12, 25, 38, 47];
    let sample = synthetic(42, &outliers, 10.0);
    let model = build_model(
        &sample,
        Priors::new(),
        TrimmingConfig::new(0.9).expect("valid percentage"),
    );
    let opts =
        FitOptions::new(50, 100, 1.0, 1e-8, ProjectorOptions::default()).expect("valid options");

    let result = model.fit(&solver(), None, &opts).expect("fit");

    assert!((result.weights.sum() - 45.0).abs() < 1e-6);
    for (i, &w) in result.weights.iter().enumerate() {
        if outliers.contains(&i) {
            assert!(w < 0.1, "outlier {i} kept weight {w}");
        } else {
            assert!(w > 0.5, "inlier {i} trimmed to weight {w}");
        }
    }
    assert_eq!(result.trimmed(0.1), outliers.to_vec());
    for j in 0..3 {
        assert!((result.beta[j] - sample.beta[j]).abs() < 0.5, "beta {}", result.beta);
    }
    assert!(result.outer_iterations >= 1);
    assert!(result.trimming_objective.is_some_and(f64::is_finite));
}

#[test]
// Purpose
// -------
// A range constraint on the random-effect variances is honored by the
// penalty continuation.
//
// Given
// -----
// - γ₀ + γ₁ ≤ 0.05 while the generating γ sums to 0.4.
//
// Expect
// ------
// - γ̂₀ + γ̂₁ ≤ 0.05 up to a small violation.
fn constrained_fit_respects_gamma_cap() {
    let sample = synthetic(5, &[], 0.0);
    let constraints = RangeConstraints::new(
        Box::new(LinearMap::new(array![[0.0, 0.0, 0.0, 1.0, 1.0]])),
        array![f64::NEG_INFINITY],
        array![0.05],
    )
    .expect("valid constraints");
    let model =
        build_model(&sample, Priors::new().with_constraints(constraints), TrimmingConfig::disabled());
    let opts =
        FitOptions::new(200, 1, 1.0, 1e-6, ProjectorOptions::default()).expect("valid options");

    let result = model.fit(&solver(), None, &opts).expect("fit");

    assert!(result.gamma.sum() <= 0.05 + 1e-3, "gamma {}", result.gamma);
    assert!(result.gamma.iter().all(|&g| g >= 0.0));
    assert!(result.solver.penalty_rounds >= 1);
}

#[test]
// Purpose
// -------
// Analytic gradients agree with finite differences on random data with
// random interior weights.
fn gradient_check_on_random_data() {
    let sample = synthetic(99, &[], 0.0);
    let model = build_model(&sample, Priors::new(), TrimmingConfig::disabled());
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let w = Array1::from_shape_fn(NUM_GROUPS * GROUP_SIZE, |_| rng.gen_range(0.2..1.0));
    let x = array![0.8, -0.3, 1.5, 0.2, 0.15];

    for weights in [None, Some(w.view())] {
        let check = model.gradient_check(x.view(), weights).expect("gradient check");
        assert!(check.passes(1e-5), "{check:?}");
    }
}
