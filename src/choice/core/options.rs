//! Estimation options for conditional-logit fitting.
//!
//! [`EstimationOptions`] bundles the L2 strength, the optimizer settings
//! ([`MLEOptions`]), the estimation scope, and the parallelism flag. The
//! defaults match the reference behavior: λ = 1.0, L-BFGS with `m = 5`,
//! `max_iter = 200`, `tol_grad = 1e-6`, a Nelder–Mead fallback for
//! non-converged units, per-unit scope, sequential execution.
use crate::{
    choice::{
        core::likelihood::DEFAULT_REG_STRENGTH,
        errors::{ChoiceError, ChoiceResult},
    },
    optimization::loglik_optimizer::{FallbackMethod, MLEOptions},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Whether one model is fitted per unit or one model for all rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationScope {
    #[default]
    PerUnit,
    Pooled,
}

impl FromStr for EstimationScope {
    type Err = ChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "per_unit" | "individual" | "per_respondent" => Ok(EstimationScope::PerUnit),
            "pooled" | "aggregate" => Ok(EstimationScope::Pooled),
            _ => Err(ChoiceError::InvalidScope { name: s.to_string() }),
        }
    }
}

/// Id assigned to the single unit of a pooled fit.
pub const POOLED_UNIT_ID: &str = "pooled";

#[derive(Debug, Clone, PartialEq)]
pub struct EstimationOptions {
    pub reg_strength: f64,
    pub mle_opts: MLEOptions,
    pub scope: EstimationScope,
    pub parallel: bool,
}

impl EstimationOptions {
    /// Errors
    /// ------
    /// - [`ChoiceError::InvalidRegularization`] when `reg_strength` is
    ///   negative or non-finite.
    pub fn new(
        reg_strength: f64, mle_opts: MLEOptions, scope: EstimationScope, parallel: bool,
    ) -> ChoiceResult<Self> {
        if !reg_strength.is_finite() || reg_strength < 0.0 {
            return Err(ChoiceError::InvalidRegularization { value: reg_strength });
        }
        Ok(Self { reg_strength, mle_opts, scope, parallel })
    }
}

impl Default for EstimationOptions {
    fn default() -> Self {
        Self {
            reg_strength: DEFAULT_REG_STRENGTH,
            mle_opts: MLEOptions { fallback: FallbackMethod::NelderMead, ..MLEOptions::default() },
            scope: EstimationScope::PerUnit,
            parallel: false,
        }
    }
}
