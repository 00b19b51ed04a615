//! Pooled baseline-category multinomial logistic regression.
//!
//! Purpose
//! -------
//! Fit `P(y = k | x) = exp(x·β_k) / Σ_m exp(x·β_m)` on an `(n × p)` feature
//! matrix whose first column is the intercept, with the reference class's
//! coefficients fixed at zero. The fit reuses the crate's L-BFGS maximizer
//! through the [`LogLikelihood`] trait.
//!
//! Key behaviors
//! -------------
//! - Objective: `Σ_i [x_i·β_{y_i} − logsumexp_k(x_i·β_k)] − λ Σ_{k≠ref} Σ_{j≥1} β_kj²`.
//!   The intercept column (`j = 0`) is not penalized.
//! - Parameter vector layout: the `p` coefficients of every non-reference
//!   class, in class order.
//! - [`MultinomialFit::predict_proba`] returns row-wise class probabilities
//!   computed with `log_sum_exp`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Labels are class indices in `0..n_classes`; `n_classes >= 2`.
//! - Column 0 of `x` is the intercept; it is the caller's job to add it.
use crate::{
    choice::errors::{ChoiceError, ChoiceResult},
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{
            maximize, validation::validate_theta_input, Grad, LogLikelihood, MLEOptions, Theta,
        },
        numerical_stability::log_sum_exp,
    },
};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::Serialize;

/// Default L2 strength for the pooled regression.
pub const DEFAULT_MN_L2: f64 = 1e-4;

/// Validated regression data.
#[derive(Debug, Clone, PartialEq)]
pub struct MultinomialData {
    pub x: Array2<f64>,
    pub y: Vec<usize>,
    pub n_classes: usize,
}

impl MultinomialData {
    /// Errors
    /// ------
    /// - [`ChoiceError::InvalidOption`] for an empty matrix, fewer than two
    ///   classes, or non-finite features.
    /// - [`ChoiceError::DimensionMismatch`] when `y.len() != x.nrows()`.
    /// - [`ChoiceError::InvalidClassLabel`] for a label `>= n_classes`.
    pub fn new(x: Array2<f64>, y: Vec<usize>, n_classes: usize) -> ChoiceResult<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ChoiceError::InvalidOption {
                name: "x",
                reason: "feature matrix must have at least one row and one column".to_string(),
            });
        }
        if n_classes < 2 {
            return Err(ChoiceError::InvalidOption {
                name: "n_classes",
                reason: format!("at least two classes are required, found {n_classes}"),
            });
        }
        if y.len() != x.nrows() {
            return Err(ChoiceError::DimensionMismatch {
                what: "class labels",
                expected: x.nrows(),
                found: y.len(),
            });
        }
        if let Some((row, &label)) = y.iter().enumerate().find(|(_, &l)| l >= n_classes) {
            return Err(ChoiceError::InvalidClassLabel { row, label, n_classes });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ChoiceError::InvalidOption {
                name: "x",
                reason: "features must be finite".to_string(),
            });
        }
        Ok(Self { x, y, n_classes })
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn n_params(&self) -> usize {
        (self.n_classes - 1) * self.n_features()
    }
}

/// Penalized multinomial log-likelihood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultinomialLogit {
    pub l2: f64,
    pub reference_class: usize,
}

impl MultinomialLogit {
    /// Errors
    /// ------
    /// - [`ChoiceError::InvalidRegularization`] for a negative or non-finite `l2`.
    pub fn new(l2: f64, reference_class: usize) -> ChoiceResult<Self> {
        if !l2.is_finite() || l2 < 0.0 {
            return Err(ChoiceError::InvalidRegularization { value: l2 });
        }
        Ok(Self { l2, reference_class })
    }

    /// `(n_classes × p)` coefficient matrix with a zero reference row.
    ///
    /// Callers must have passed [`LogLikelihood::check`] for `theta`.
    fn coefficient_matrix(&self, theta: &Theta, n_classes: usize, p: usize) -> Array2<f64> {
        let mut b = Array2::<f64>::zeros((n_classes, p));
        for (slot, k) in (0..n_classes).filter(|&k| k != self.reference_class).enumerate() {
            b.row_mut(k).assign(&theta.slice(s![slot * p..(slot + 1) * p]));
        }
        b
    }

    fn penalty(&self, b: &Array2<f64>) -> f64 {
        self.l2 * b.slice(s![.., 1..]).iter().map(|v| v * v).sum::<f64>()
    }
}

impl Default for MultinomialLogit {
    fn default() -> Self {
        Self { l2: DEFAULT_MN_L2, reference_class: 0 }
    }
}

impl LogLikelihood for MultinomialLogit {
    type Data = MultinomialData;

    fn value(&self, theta: &Theta, data: &MultinomialData) -> OptResult<f64> {
        Ok(self.value_and_grad(theta, data)?.0)
    }

    fn check(&self, theta: &Theta, data: &MultinomialData) -> OptResult<()> {
        if self.reference_class >= data.n_classes {
            return Err(OptError::InvalidLogLikInput {
                reason: format!(
                    "reference class {} is outside 0..{}",
                    self.reference_class, data.n_classes
                ),
            });
        }
        validate_theta_input(theta, data.n_params())
    }

    fn grad(&self, theta: &Theta, data: &MultinomialData) -> OptResult<Grad> {
        Ok(self.value_and_grad(theta, data)?.1)
    }

    fn value_and_grad(&self, theta: &Theta, data: &MultinomialData) -> OptResult<(f64, Grad)> {
        self.check(theta, data)?;
        let p = data.n_features();
        let b = self.coefficient_matrix(theta, data.n_classes, p);
        let scores = data.x.dot(&b.t());

        let mut ll = 0.0;
        let mut g = Array2::<f64>::zeros((data.n_classes, p));
        for ((row, x_i), &y_i) in scores.outer_iter().zip(data.x.outer_iter()).zip(&data.y) {
            let lse = log_sum_exp(row);
            ll += row[y_i] - lse;
            for (k, mut g_k) in g.outer_iter_mut().enumerate() {
                let indicator = if k == y_i { 1.0 } else { 0.0 };
                g_k.scaled_add(indicator - (row[k] - lse).exp(), &x_i);
            }
        }
        g.slice_mut(s![.., 1..]).scaled_add(-2.0 * self.l2, &b.slice(s![.., 1..]));

        let grad: Grad = (0..data.n_classes)
            .filter(|&k| k != self.reference_class)
            .flat_map(|k| g.row(k).to_vec())
            .collect();
        Ok((ll - self.penalty(&b), grad))
    }
}

/// Fitted multinomial regression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultinomialFit {
    /// `(n_classes × p)`; the reference row is zero.
    pub coefficients: Array2<f64>,
    pub reference_class: usize,
    /// Unpenalized log-likelihood at the estimate.
    pub log_likelihood: f64,
    pub penalized_log_likelihood: f64,
    pub converged: bool,
    pub iterations: usize,
    pub status: String,
}

impl MultinomialFit {
    pub fn n_classes(&self) -> usize {
        self.coefficients.nrows()
    }

    /// Row-wise class probabilities `(n × n_classes)`.
    ///
    /// Errors
    /// ------
    /// - [`ChoiceError::DimensionMismatch`] when `x` has the wrong width.
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> ChoiceResult<Array2<f64>> {
        if x.ncols() != self.coefficients.ncols() {
            return Err(ChoiceError::DimensionMismatch {
                what: "feature columns",
                expected: self.coefficients.ncols(),
                found: x.ncols(),
            });
        }
        let mut scores = x.dot(&self.coefficients.t());
        for mut row in scores.outer_iter_mut() {
            let lse = log_sum_exp(row.view());
            row.mapv_inplace(|s| (s - lse).exp());
        }
        Ok(scores)
    }

    /// Most probable class per row; ties go to the lowest index.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> ChoiceResult<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (k, &p)| if p > best.1 { (k, p) } else { best })
                    .0
            })
            .collect())
    }
}

/// Fit the pooled regression from zero coefficients.
///
/// Errors
/// ------
/// - [`ChoiceError::Optimization`] when the optimizer rejects the input.
///   Non-convergence is reported through [`MultinomialFit::converged`].
pub fn fit_multinomial(
    data: &MultinomialData, model: &MultinomialLogit, opts: &MLEOptions,
) -> ChoiceResult<MultinomialFit> {
    let theta0 = Array1::<f64>::zeros(data.n_params());
    let outcome = maximize(model, theta0, data, opts)?;
    let coefficients = model.coefficient_matrix(&outcome.theta_hat, data.n_classes, data.n_features());
    let log_likelihood = outcome.value + model.penalty(&coefficients);

    Ok(MultinomialFit {
        coefficients,
        reference_class: model.reference_class,
        log_likelihood,
        penalized_log_likelihood: outcome.value,
        converged: outcome.converged,
        iterations: outcome.iterations,
        status: outcome.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::finite_diff::gradient_discrepancy;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover input validation, the analytic gradient, recovery of
    // class frequencies by an intercept-only model, and prediction.
    // -------------------------------------------------------------------------

    fn three_class_data() -> MultinomialData {
        // Class 0 near x = -2, class 1 near 0, class 2 near +2, with overlap.
        let xs = [-2.5, -2.0, -1.5, -0.2, -1.0, 0.0, 0.4, 0.3, 1.6, 2.0, 2.4, 0.8];
        let ys = [0, 0, 0, 0, 1, 1, 1, 2, 2, 2, 2, 1];
        let x = Array2::from_shape_fn((xs.len(), 2), |(i, j)| if j == 0 { 1.0 } else { xs[i] });
        MultinomialData::new(x, ys.to_vec(), 3).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Malformed inputs are rejected with specific errors.
    //
    // Given
    // -----
    // - A label equal to `n_classes`, a short label vector, and one class.
    //
    // Expect
    // ------
    // - `InvalidClassLabel`, `DimensionMismatch`, `InvalidOption`.
    fn rejects_malformed_inputs() {
        let x = array![[1.0, 0.5], [1.0, -0.5]];

        let bad_label = MultinomialData::new(x.clone(), vec![0, 2], 2);
        let short = MultinomialData::new(x.clone(), vec![0], 2);
        let one_class = MultinomialData::new(x, vec![0, 0], 1);

        assert_eq!(bad_label.unwrap_err(), ChoiceError::InvalidClassLabel { row: 1, label: 2, n_classes: 2 });
        assert!(matches!(short, Err(ChoiceError::DimensionMismatch { expected: 2, found: 1, .. })));
        assert!(matches!(one_class, Err(ChoiceError::InvalidOption { name: "n_classes", .. })));
    }

    #[test]
    // Purpose
    // -------
    // A reference class outside `0..n_classes` or a mis-sized θ is an error
    // on every evaluation path, not an out-of-bounds slice.
    //
    // Given
    // -----
    // - Three-class data; a model built literally with `reference_class = 3`.
    // - The default model with a θ of length 3 instead of 4.
    //
    // Expect
    // ------
    // - `InvalidLogLikInput` from `value_and_grad`; an error from `value`.
    // - `ChoiceError::Optimization` from `fit_multinomial`.
    fn out_of_range_reference_is_rejected() {
        let data = three_class_data();
        let bad_ref = MultinomialLogit { l2: 0.0, reference_class: 3 };
        let theta = Array1::<f64>::zeros(data.n_params());

        let direct = bad_ref.value_and_grad(&theta, &data);
        let short = MultinomialLogit::default().value(&Array1::zeros(3), &data);
        let fitted = fit_multinomial(&data, &bad_ref, &MLEOptions::default());

        assert!(matches!(direct, Err(OptError::InvalidLogLikInput { .. })));
        assert!(short.is_err());
        assert!(matches!(fitted, Err(ChoiceError::Optimization(_))));
    }

    #[test]
    // Purpose
    // -------
    // The analytic gradient matches finite differences, penalty included.
    //
    // Given
    // -----
    // - Three classes, two features, `λ = 0.3`, reference class 1.
    //
    // Expect
    // ------
    // - Max absolute discrepancy below 1e-5.
    fn gradient_matches_finite_differences() {
        let data = three_class_data();
        let model = MultinomialLogit::new(0.3, 1).unwrap();
        let theta = array![0.2, -0.4, -0.1, 0.7];

        let gap = gradient_discrepancy(&model, &theta, &data).unwrap();

        assert!(gap < 1e-5, "gradient discrepancy {gap}");
    }

    #[test]
    // Purpose
    // -------
    // An intercept-only model reproduces the class frequencies, since the
    // intercept is unpenalized.
    //
    // Given
    // -----
    // - Labels `[0, 0, 1, 2]` with a constant column only.
    //
    // Expect
    // ------
    // - Converged fit; probabilities `[0.5, 0.25, 0.25]`; reference row zero.
    fn intercept_only_recovers_frequencies() {
        // Arrange
        let data = MultinomialData::new(Array2::ones((4, 1)), vec![0, 0, 1, 2], 3).unwrap();

        // Act
        let fit = fit_multinomial(&data, &MultinomialLogit::default(), &MLEOptions::default()).unwrap();
        let proba = fit.predict_proba(array![[1.0]].view()).unwrap();

        // Assert
        assert!(fit.converged);
        assert_eq!(fit.coefficients.row(0).to_vec(), vec![0.0]);
        assert_relative_eq!(proba[[0, 0]], 0.5, epsilon = 1e-5);
        assert_relative_eq!(proba[[0, 1]], 0.25, epsilon = 1e-5);
        assert_relative_eq!(proba[[0, 2]], 0.25, epsilon = 1e-5);
        assert_relative_eq!(fit.log_likelihood, 2.0 * 0.5f64.ln() + 2.0 * 0.25f64.ln(), epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // A fitted model orders classes along the feature and yields proper
    // probability rows.
    //
    // Given
    // -----
    // - Ordered classes along one feature.
    //
    // Expect
    // ------
    // - Rows of `predict_proba` sum to one.
    // - Predictions at x = -3, 0, 3 are classes 0, 1, 2.
    // - A wrong feature width is rejected.
    fn predicts_ordered_classes() {
        let data = three_class_data();

        let fit = fit_multinomial(&data, &MultinomialLogit::default(), &MLEOptions::default()).unwrap();
        let grid = array![[1.0, -3.0], [1.0, 0.0], [1.0, 3.0]];
        let proba = fit.predict_proba(grid.view()).unwrap();

        for row in proba.outer_iter() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        assert_eq!(fit.predict(grid.view()).unwrap(), vec![0, 1, 2]);
        assert!(fit.log_likelihood <= 0.0);
        assert!(matches!(
            fit.predict_proba(array![[1.0]].view()),
            Err(ChoiceError::DimensionMismatch { expected: 2, found: 1, .. })
        ));
    }
}
