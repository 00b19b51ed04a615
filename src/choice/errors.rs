//! Errors for choice modeling (ingestion, design construction, estimation,
//! simulation, and segmentation).
//!
//! This module defines [`ChoiceError`], the single error type returned by the
//! `choice` layer, together with the [`ChoiceResult`] alias. Optimizer
//! failures are wrapped as [`ChoiceError::Optimization`]; with the
//! `python-bindings` feature every variant converts into a Python
//! `ValueError`.
//!
//! ## Conventions
//! - Row indices are **0-based** positions in the input record list.
//! - Per-unit failures (`EmptyDesign`, optimizer errors) are recorded in the
//!   batch result and never abort a batch; only `NoUnitsEstimated` does.
//! - `MalformedRow` values are collected on ingestion; the row is dropped.
use crate::optimization::errors::OptError;
use thiserror::Error;

/// Result alias for the choice layer.
pub type ChoiceResult<T> = Result<T, ChoiceError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChoiceError {
    // ---- Input / ingestion ----
    #[error("No input records were provided")]
    EmptyInput,

    #[error("Malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("Unknown attribute type '{name}': expected categorical, numeric_linear, numeric_quadratic, or price")]
    InvalidAttributeKind { name: String },

    #[error("Unknown reference-level policy '{name}': expected 'alphabetical' or 'most_frequent'")]
    InvalidReferencePolicy { name: String },

    #[error("Unknown numeric policy '{name}': expected 'drop_row' or 'coerce_to_zero'")]
    InvalidNumericPolicy { name: String },

    #[error("Unknown estimation scope '{name}': expected 'per_unit' or 'pooled'")]
    InvalidScope { name: String },

    #[error("Unsupported regularization '{name}': only 'L2' is available")]
    UnsupportedRegularization { name: String },

    #[error("No attributes were declared")]
    NoAttributes,

    #[error("Attribute '{name}' is declared more than once")]
    DuplicateAttribute { name: String },

    // ---- Design / estimation ----
    #[error("Empty design for unit '{unit_id}': {reason}")]
    EmptyDesign { unit_id: String, reason: String },

    #[error("Invalid regularization strength {value}: must be finite and >= 0")]
    InvalidRegularization { value: f64 },

    #[error("No unit could be estimated ({failed} failed)")]
    NoUnitsEstimated { failed: usize },

    #[error("Model has not been fitted yet")]
    ModelNotFitted,

    #[error("Optimization failed: {0}")]
    Optimization(#[from] OptError),

    // ---- Simulation / optimization / segmentation ----
    #[error("At least {required} products are required, found {found}")]
    TooFewProducts { required: usize, found: usize },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Invalid profile for '{product}': {reason}")]
    InvalidProfile { product: String, reason: String },

    #[error("Search space of {combinations} combinations exceeds the limit of {limit}")]
    CombinatorialLimitExceeded { combinations: u128, limit: u128 },

    #[error("Invalid option '{name}': {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("Invalid number of segments {k} for {n_units} units")]
    InvalidSegmentCount { k: usize, n_units: usize },

    #[error("Willingness to pay needs an attribute of type 'price'")]
    NoPriceAttribute,

    // ---- Multinomial regression ----
    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch { what: &'static str, expected: usize, found: usize },

    #[error("Invalid class label {label} at row {row}: {n_classes} classes declared")]
    InvalidClassLabel { row: usize, label: usize, n_classes: usize },

    // ---- Serialization ----
    #[error("Serialization error: {text}")]
    Serialization { text: String },

    #[error("CSV export failed: {text}")]
    Export { text: String },
}

impl From<serde_json::Error> for ChoiceError {
    fn from(err: serde_json::Error) -> Self {
        ChoiceError::Serialization { text: err.to_string() }
    }
}

impl From<csv::Error> for ChoiceError {
    fn from(err: csv::Error) -> Self {
        ChoiceError::Export { text: err.to_string() }
    }
}

impl From<std::string::FromUtf8Error> for ChoiceError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ChoiceError::Export { text: err.to_string() }
    }
}

#[cfg(feature = "python-bindings")]
impl From<ChoiceError> for pyo3::PyErr {
    fn from(err: ChoiceError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
