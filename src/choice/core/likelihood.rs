//! Conditional-logit log-likelihood with an L2 penalty.
//!
//! For every task `t` with rows `r ∈ t`, utilities are `u_r = x_rᵀβ` and the
//! choice probabilities are the max-shifted softmax of `u` within the task.
//! The penalized objective maximized per unit is
//!
//! ```text
//! ℓ_λ(β) = Σ_t ln(p_{t,chosen} + ε) − λ‖β‖²
//! ∇ℓ_λ(β) = Σ_t Σ_{r∈t} (1[r chosen] − p_r) x_r − 2λβ
//! ```
//!
//! with `ε = LOG_PROB_EPS`. Evaluation is pure: the same `(β, design, λ)`
//! always yields the same value, and permuting rows within a task (with the
//! chosen index permuted accordingly) leaves it unchanged.
use crate::{
    choice::{
        core::design::DesignMatrix,
        errors::{ChoiceError, ChoiceResult},
    },
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{validation::validate_theta_input, Grad, LogLikelihood, Theta},
        numerical_stability::{stable_softmax_in_place, LOG_PROB_EPS},
    },
};
use ndarray::{s, Array1};

/// Default L2 regularization strength.
pub const DEFAULT_REG_STRENGTH: f64 = 1.0;

/// Conditional-logit likelihood for one [`DesignMatrix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MnlLikelihood {
    pub lambda: f64,
}

impl MnlLikelihood {
    /// Errors
    /// ------
    /// - [`ChoiceError::InvalidRegularization`] when `lambda` is negative or
    ///   non-finite.
    pub fn new(lambda: f64) -> ChoiceResult<Self> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(ChoiceError::InvalidRegularization { value: lambda });
        }
        Ok(Self { lambda })
    }

    fn penalty(&self, beta: &Theta) -> f64 {
        self.lambda * beta.dot(beta)
    }
}

impl Default for MnlLikelihood {
    fn default() -> Self {
        Self { lambda: DEFAULT_REG_STRENGTH }
    }
}

impl LogLikelihood for MnlLikelihood {
    type Data = DesignMatrix;

    fn value(&self, theta: &Theta, data: &DesignMatrix) -> OptResult<f64> {
        Ok(unpenalized_loglik(theta, data) - self.penalty(theta))
    }

    fn check(&self, theta: &Theta, data: &DesignMatrix) -> OptResult<()> {
        if !self.lambda.is_finite() || self.lambda < 0.0 {
            return Err(OptError::InvalidLogLikInput {
                reason: format!("regularization strength {} must be finite and >= 0", self.lambda),
            });
        }
        if data.n_tasks() == 0 || data.n_columns() == 0 {
            return Err(OptError::InvalidLogLikInput {
                reason: format!("design for unit '{}' is empty", data.unit_id),
            });
        }
        validate_theta_input(theta, data.n_columns())
    }

    fn grad(&self, theta: &Theta, data: &DesignMatrix) -> OptResult<Grad> {
        Ok(self.value_and_grad(theta, data)?.1)
    }

    fn value_and_grad(&self, theta: &Theta, data: &DesignMatrix) -> OptResult<(f64, Grad)> {
        let (ll, mut grad) = loglik_and_score(theta, data);
        grad.scaled_add(-2.0 * self.lambda, theta);
        Ok((ll - self.penalty(theta), grad))
    }
}

/// Row-wise choice probabilities: softmax of `Xβ` within every task.
pub fn choice_probabilities(beta: &Theta, design: &DesignMatrix) -> Array1<f64> {
    let mut p = design.x.dot(beta);
    for t in 0..design.n_tasks() {
        let (start, end) = design.task_range(t);
        stable_softmax_in_place(p.slice_mut(s![start..end]));
    }
    p
}

/// `Σ_t ln(p_{t,chosen} + ε)` without the penalty.
pub fn unpenalized_loglik(beta: &Theta, design: &DesignMatrix) -> f64 {
    let p = choice_probabilities(beta, design);
    (0..design.n_tasks())
        .map(|t| {
            let (start, _) = design.task_range(t);
            (p[start + design.chosen[t]] + LOG_PROB_EPS).ln()
        })
        .sum()
}

/// Unpenalized log-likelihood and its gradient (the score).
pub fn loglik_and_score(beta: &Theta, design: &DesignMatrix) -> (f64, Grad) {
    let p = choice_probabilities(beta, design);
    let mut ll = 0.0;
    let mut score = Array1::<f64>::zeros(design.n_columns());
    for t in 0..design.n_tasks() {
        let (start, end) = design.task_range(t);
        let chosen_row = start + design.chosen[t];
        ll += (p[chosen_row] + LOG_PROB_EPS).ln();
        for r in start..end {
            let weight = if r == chosen_row { 1.0 - p[r] } else { -p[r] };
            score.scaled_add(weight, &design.x.row(r));
        }
    }
    (ll, score)
}

/// Log-likelihood of the equal-probability model, `Σ_t ln(1 / size_t)`.
pub fn null_loglik(design: &DesignMatrix) -> f64 {
    design.task_sizes().iter().map(|&size| -(size as f64).ln()).sum()
}

/// McFadden pseudo-R², `1 − ℓ / ℓ₀`; zero when `ℓ₀` is zero.
pub fn pseudo_r2(loglik: f64, null_loglik: f64) -> f64 {
    if null_loglik == 0.0 {
        0.0
    } else {
        1.0 - loglik / null_loglik
    }
}
