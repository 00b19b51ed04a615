//! models: estimation entry points and result containers.
//!
//! Purpose
//! -------
//! Turn validated choice data into fitted models.
//!
//! - [`estimation`]: per-unit (or pooled) L2-penalized conditional logit with
//!   failure isolation and optional rayon parallelism.
//! - [`conjoint`]: [`ConjointModel`], the stateful `new` / `fit` / `reset`
//!   orchestrator that also fronts simulation, search, segmentation, and
//!   export.
//! - [`multinomial`]: pooled baseline-category multinomial logistic
//!   regression on a plain feature matrix.
//! - [`results`]: serializable result types.
//!
//! Conventions
//! -----------
//! - All models are fitted with `optimization::loglik_optimizer::maximize`
//!   from β = 0; non-convergence is a flag, never an error.

pub mod conjoint;
pub mod estimation;
pub mod multinomial;
pub mod results;

pub use self::conjoint::ConjointModel;
pub use self::estimation::{estimate, fit_unit};
pub use self::multinomial::{
    fit_multinomial, MultinomialData, MultinomialFit, MultinomialLogit, DEFAULT_MN_L2,
};
pub use self::results::{
    Convergence, DroppedRow, EstimationResult, FailedUnit, FitStatistics, UnitFit,
};
