//! numerical_stability: numerically robust probability transforms.
//!
//! Purpose
//! -------
//! Collect the stable scalar and vector transforms shared by the choice
//! models: max-shifted softmax, log-sum-exp, the logistic function, and the
//! guard constant applied before taking logs of probabilities.
//!
//! Conventions
//! -----------
//! - All routines operate on `ndarray` views or plain `f64` and never log,
//!   perform I/O, or touch global state.
//! - Inputs are assumed finite; shape and domain validation happens in the
//!   model layer.
//!
//! Downstream usage
//! ----------------
//! - The conditional-logit likelihood uses [`stable_softmax_in_place`] and
//!   [`LOG_PROB_EPS`] per choice task.
//! - Market simulation uses [`stable_softmax`] across products and
//!   [`safe_logistic`] for the optimizer's share-versus-outside-good score.
//! - The pooled multinomial regression uses [`log_sum_exp`].

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{
    log_sum_exp, safe_logistic, stable_softmax, stable_softmax_in_place, LOG_PROB_EPS,
};

// ---- Optional convenience prelude for downstream crates -------------------

pub mod prelude {
    pub use super::transformations::{
        log_sum_exp, safe_logistic, stable_softmax, stable_softmax_in_place, LOG_PROB_EPS,
    };
}
