//! optimization::errors: unified error surface for the optimizer layer.
//!
//! Every failure the optimizer can observe (bad configuration, non-finite
//! objective values, malformed gradients, backend solver errors) is
//! normalized into [`OptError`]. Model layers convert their own domain errors
//! into `OptError` at the [`LogLikelihood`](crate::optimization::loglik_optimizer::LogLikelihood)
//! boundary and convert back out when reporting to callers.
use argmin::core::{ArgminError, Error};
use thiserror::Error;

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that FD should be used
    #[error("Analytic gradient not implemented")]
    GradientNotImplemented,

    #[error("Gradient dimension mismatch: expected {expected}, found {found}")]
    GradientDimMismatch { expected: usize, found: usize },

    #[error("Invalid gradient at index {index}: {value}: {reason}")]
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- MLEOptions ----
    #[error("Invalid gradient tolerance {tol}: {reason}")]
    InvalidTolGrad { tol: f64, reason: &'static str },

    #[error("Invalid maximum iterations {max_iter}: {reason}")]
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    #[error("Invalid L-BFGS memory {mem}: {reason}")]
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    #[error("Invalid line search setting '{name}' = {value}: {reason}")]
    InvalidLineSearch { name: &'static str, value: f64, reason: &'static str },

    #[error("Invalid fallback method '{name}': {reason}")]
    InvalidFallback { name: String, reason: &'static str },

    // ---- Objective ----
    #[error("Non-finite objective value: {value}")]
    NonFiniteCost { value: f64 },

    #[error("Parameter dimension mismatch: expected {expected}, found {found}")]
    ThetaDimMismatch { expected: usize, found: usize },

    #[error("Invalid parameter input at index {index}: {value}, must be finite")]
    InvalidThetaInput { index: usize, value: f64 },

    #[error("Invalid log-likelihood input: {reason}")]
    InvalidLogLikInput { reason: String },

    // ---- Optimizer outcome ----
    #[error("Invalid estimated parameter at index {index}: {value}: {reason}")]
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    #[error("Missing estimated parameters (theta hat)")]
    MissingThetaHat,

    // ---- Argmin ----
    #[error("Invalid parameter: {text}")]
    InvalidParameter { text: String },

    #[error("Not implemented: {text}")]
    NotImplemented { text: String },

    #[error("Not initialized: {text}")]
    NotInitialized { text: String },

    #[error("Condition violated: {text}")]
    ConditionViolated { text: String },

    #[error("Potential bug: {text}")]
    PotentialBug { text: String },

    #[error("Backend error: {text}")]
    BackendError { text: String },

    // ---- Fallback ----
    #[error("Unknown error")]
    UnknownError,
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        // Errors raised by our own objective come back wrapped by argmin.
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast() {
            Ok(argmin_err) => match argmin_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}
