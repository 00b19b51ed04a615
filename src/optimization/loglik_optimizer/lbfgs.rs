//! loglik_optimizer::lbfgs: limited-memory BFGS with Armijo backtracking.
//!
//! Purpose
//! -------
//! Maximize a [`LogLikelihood`] by minimizing `c(θ) = −ℓ(θ)` with a compact
//! L-BFGS driver. Search directions come from the standard two-loop
//! recursion over the last `m` correction pairs; step lengths come from
//! [`armijo_backtrack`](super::line_search::armijo_backtrack).
//!
//! Key behaviors
//! -------------
//! - Stops with `GradientTolerance` once `‖∇ℓ(θ)‖₂ < tol_grad`, or with
//!   `MaxIterations` after `max_iter` accepted steps. Neither is an error.
//! - A correction pair `(s, y)` enters the history only if `sᵀy > 1e-10`;
//!   the oldest pair is evicted beyond `m`.
//! - The initial inverse-Hessian scaling is `γ = sᵀy / yᵀy` from the newest
//!   pair (identity when the history is empty).
//! - If the quasi-Newton direction is not a descent direction, or its line
//!   search fails, the history is dropped and steepest descent is tried
//!   once. A second failure stops the run with `LineSearchFailed`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every accepted step strictly decreases the cost, so `ll_path` is
//!   non-decreasing.
//! - The returned `theta_hat` is always the last accepted point, which is
//!   also the best point visited.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        finite_diff::{fd_gradient, gradient_or_fd},
        line_search::armijo_backtrack,
        traits::{LogLikelihood, MLEOptions, OptimMethod, OptimOutcome, Termination},
        types::{Cost, FnEvalMap, Grad, Theta, CURVATURE_EPS},
        validation::{validate_grad, validate_value},
    },
};
use std::collections::VecDeque;

/// Bounded FIFO of L-BFGS correction pairs `(s, y, ρ = 1 / sᵀy)`.
#[derive(Debug, Clone)]
pub struct LbfgsHistory {
    pairs: VecDeque<(Theta, Grad, f64)>,
    mem: usize,
}

impl LbfgsHistory {
    pub fn new(mem: usize) -> Self {
        Self { pairs: VecDeque::with_capacity(mem), mem }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Store `(s, y)` if it carries enough curvature; returns whether it was kept.
    ///
    /// With `mem == 0` nothing is stored and the recursion reduces to
    /// steepest ascent.
    pub fn push(&mut self, s: Theta, y: Grad) -> bool {
        let sy = s.dot(&y);
        if self.mem == 0 || !(sy > CURVATURE_EPS) {
            return false;
        }
        while self.pairs.len() >= self.mem {
            self.pairs.pop_front();
        }
        self.pairs.push_back((s, y, 1.0 / sy));
        true
    }

    /// Two-loop recursion: approximate `H⁻¹ g` from the stored pairs.
    pub fn apply_inverse(&self, g: &Grad) -> Grad {
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(self.pairs.len());
        for (s, y, rho) in self.pairs.iter().rev() {
            let alpha = rho * s.dot(&q);
            q.scaled_add(-alpha, y);
            alphas.push(alpha);
        }
        let gamma = match self.pairs.back() {
            Some((s, y, _)) => {
                let yy = y.dot(y);
                if yy > 0.0 { s.dot(y) / yy } else { 1.0 }
            }
            None => 1.0,
        };
        q *= gamma;
        for ((s, y, rho), alpha) in self.pairs.iter().zip(alphas.iter().rev()) {
            let beta = rho * y.dot(&q);
            q.scaled_add(alpha - beta, s);
        }
        q
    }
}

/// Run L-BFGS from `theta0` and return a normalized [`OptimOutcome`].
///
/// Errors
/// ------
/// - Objective or gradient errors raised by `f` at an evaluated point.
/// - `OptError::NonFiniteCost` when `ℓ(θ₀)` is not finite.
/// - Validation errors for the final outcome.
pub fn run_lbfgs<F: LogLikelihood + ?Sized>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    let mut fn_evals = FnEvalMap::new();
    let mut theta = theta0;
    let (mut value, mut grad) = evaluate(f, &theta, data, &mut fn_evals)?;
    validate_value(value)?;
    let mut ll_path = vec![value];
    let mut history = LbfgsHistory::new(opts.lbfgs_mem);
    let mut iterations: u64 = 0;

    let termination = loop {
        // Cost-space gradient.
        let g: Grad = -&grad;
        if g.dot(&g).sqrt() < opts.tols.tol_grad {
            break Termination::GradientTolerance;
        }
        if iterations as usize >= opts.tols.max_iter {
            break Termination::MaxIterations;
        }

        let cost: Cost = -value;
        let mut direction = -history.apply_inverse(&g);
        let mut slope = g.dot(&direction);
        if !(slope < 0.0 && slope.is_finite()) {
            history.clear();
            direction = -&g;
            slope = -g.dot(&g);
        }

        let mut accepted = armijo_backtrack(
            f,
            data,
            &theta,
            cost,
            &direction,
            slope,
            &opts.line_search,
            &mut fn_evals,
        )?;
        if accepted.is_none() && !history.is_empty() {
            history.clear();
            direction = -&g;
            slope = -g.dot(&g);
            accepted = armijo_backtrack(
                f,
                data,
                &theta,
                cost,
                &direction,
                slope,
                &opts.line_search,
                &mut fn_evals,
            )?;
        }
        let Some(step) = accepted else {
            break Termination::LineSearchFailed;
        };

        let new_grad = gradient_or_fd(f, &step.theta, data)?;
        *fn_evals.entry("gradient_count".to_string()).or_insert(0) += 1;
        let s = &step.theta - &theta;
        let y: Grad = -&new_grad - &g;
        history.push(s, y);

        theta = step.theta;
        value = step.value;
        grad = new_grad;
        iterations += 1;
        ll_path.push(value);
    };

    OptimOutcome::new(
        Some(theta),
        value,
        termination,
        OptimMethod::Lbfgs,
        iterations,
        fn_evals,
        Some(&grad),
        ll_path,
    )
}

/// Joint value/gradient evaluation with a finite-difference fallback.
fn evaluate<F: LogLikelihood + ?Sized>(
    f: &F, theta: &Theta, data: &F::Data, fn_evals: &mut FnEvalMap,
) -> OptResult<(Cost, Grad)> {
    let (value, grad) = match f.value_and_grad(theta, data) {
        Ok(pair) => pair,
        Err(OptError::GradientNotImplemented) => {
            (f.value(theta, data)?, fd_gradient(f, theta, data)?)
        }
        Err(e) => return Err(e),
    };
    validate_grad(&grad, theta.len())?;
    *fn_evals.entry("cost_count".to_string()).or_insert(0) += 1;
    *fn_evals.entry("gradient_count".to_string()).or_insert(0) += 1;
    Ok((value, grad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::traits::Tolerances;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - History bookkeeping (curvature filter, FIFO eviction, γ scaling).
    // - Convergence on smooth concave objectives with analytic and FD gradients.
    // - Iteration caps and the monotone log-likelihood path.
    // -------------------------------------------------------------------------

    // ℓ(θ) = −½ Σ_k w_k (θ_k − c_k)², an ill-conditioned concave quadratic.
    struct WeightedQuadratic {
        weights: Theta,
        centre: Theta,
    }

    impl LogLikelihood for WeightedQuadratic {
        type Data = ();

        fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
            let d = theta - &self.centre;
            Ok(-0.5 * (&self.weights * &d).dot(&d))
        }

        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }

        fn grad(&self, theta: &Theta, _: &()) -> OptResult<Grad> {
            Ok(-(&self.weights * &(theta - &self.centre)))
        }
    }

    // ℓ(θ) = −Σ log cosh(θ_k − 2), smooth with no analytic gradient.
    struct LogCosh;

    impl LogLikelihood for LogCosh {
        type Data = ();

        fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
            Ok(-theta.iter().map(|t| (t - 2.0).cosh().ln()).sum::<f64>())
        }

        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // Pairs without positive curvature are rejected and the FIFO evicts the
    // oldest pair once `m` is reached.
    //
    // Given
    // -----
    // - `m = 2`; pushes of a negative-curvature pair and three valid pairs.
    //
    // Expect
    // ------
    // - The negative pair is refused; the history holds at most 2 pairs.
    fn history_filters_curvature_and_evicts() {
        let mut history = LbfgsHistory::new(2);

        let kept_bad = history.push(array![1.0], array![-1.0]);
        history.push(array![1.0], array![1.0]);
        history.push(array![1.0], array![2.0]);
        history.push(array![1.0], array![4.0]);

        assert!(!kept_bad);
        assert_eq!(history.len(), 2);
    }

    #[test]
    // Purpose
    // -------
    // A zero-memory history never grows and leaves the direction unscaled.
    //
    // Given
    // -----
    // - `m = 0`; three valid pairs pushed; `g = 3`.
    //
    // Expect
    // ------
    // - Every push is refused, the history stays empty, and `H⁻¹ g = g`.
    fn zero_memory_history_stays_empty() {
        let mut history = LbfgsHistory::new(0);

        let kept: Vec<bool> =
            (1..=3).map(|k| history.push(array![1.0], array![k as f64])).collect();

        assert_eq!(kept, [false, false, false]);
        assert!(history.is_empty());
        assert_eq!(history.apply_inverse(&array![3.0]), array![3.0]);
    }

    #[test]
    // Purpose
    // -------
    // With one pair on a 1-D quadratic, the two-loop recursion reproduces
    // the exact inverse curvature.
    //
    // Given
    // -----
    // - `s = 1`, `y = 4` (curvature 4) and `g = 8`.
    //
    // Expect
    // ------
    // - `H⁻¹ g = 2`.
    fn two_loop_recovers_inverse_curvature_in_one_dimension() {
        let mut history = LbfgsHistory::new(5);
        history.push(array![1.0], array![4.0]);

        let r = history.apply_inverse(&array![8.0]);

        assert!((r[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // L-BFGS reaches the maximizer of an ill-conditioned quadratic.
    //
    // Given
    // -----
    // - Weights `[1, 10, 100]`, centre `[1, −2, 0.5]`, start at zero.
    //
    // Expect
    // ------
    // - Converged with `GradientTolerance`, estimates within `1e-5`, and a
    //   non-decreasing `ll_path`.
    fn converges_on_weighted_quadratic() {
        let model = WeightedQuadratic {
            weights: array![1.0, 10.0, 100.0],
            centre: array![1.0, -2.0, 0.5],
        };

        let out = run_lbfgs(&model, Theta::zeros(3), &(), &MLEOptions::default())
            .expect("run succeeds");

        assert!(out.converged, "status = {}", out.status);
        for (est, target) in out.theta_hat.iter().zip(model.centre.iter()) {
            assert!((est - target).abs() < 1e-5);
        }
        assert!(out.ll_path.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(out.method, OptimMethod::Lbfgs);
    }

    #[test]
    // Purpose
    // -------
    // Finite differences stand in for a missing analytic gradient.
    //
    // Given
    // -----
    // - `LogCosh` in two dimensions, start at zero, `tol_grad = 1e-5`.
    //
    // Expect
    // ------
    // - Converged near `[2, 2]`.
    fn converges_with_finite_difference_gradient() {
        let opts = MLEOptions {
            tols: Tolerances::new(Some(1e-5), Some(500)).expect("valid tolerances"),
            ..MLEOptions::default()
        };

        let out = run_lbfgs(&LogCosh, Theta::zeros(2), &(), &opts).expect("run succeeds");

        assert!(out.converged, "status = {}", out.status);
        assert!((out.theta_hat[0] - 2.0).abs() < 1e-3);
        assert!((out.theta_hat[1] - 2.0).abs() < 1e-3);
    }

    #[test]
    // Purpose
    // -------
    // Hitting the iteration cap is reported, not raised.
    //
    // Given
    // -----
    // - The weighted quadratic with `max_iter = 1`.
    //
    // Expect
    // ------
    // - `Ok` with `converged = false`, one iteration, and `ll_path` of length 2.
    fn iteration_cap_is_not_an_error() {
        let model = WeightedQuadratic {
            weights: array![1.0, 10.0, 100.0],
            centre: array![1.0, -2.0, 0.5],
        };
        let opts = MLEOptions {
            tols: Tolerances::new(None, Some(1)).expect("valid tolerances"),
            ..MLEOptions::default()
        };

        let out = run_lbfgs(&model, Theta::zeros(3), &(), &opts).expect("run succeeds");

        assert!(!out.converged);
        assert_eq!(out.iterations, 1);
        assert_eq!(out.ll_path.len(), 2);
        assert!(out.ll_path[1] > out.ll_path[0]);
    }

    #[test]
    // Purpose
    // -------
    // A start point that already satisfies the tolerance returns immediately.
    //
    // Given
    // -----
    // - The weighted quadratic started at its centre.
    //
    // Expect
    // ------
    // - Zero iterations, converged, gradient norm zero.
    fn optimum_start_returns_immediately() {
        let model = WeightedQuadratic { weights: array![1.0, 2.0], centre: array![0.5, 0.5] };

        let out = run_lbfgs(&model, array![0.5, 0.5], &(), &MLEOptions::default())
            .expect("run succeeds");

        assert!(out.converged);
        assert_eq!(out.iterations, 0);
        assert_eq!(out.grad_norm, Some(0.0));
    }
}
