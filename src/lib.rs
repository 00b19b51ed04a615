//! rust_conjoint: choice-based conjoint estimation with Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the estimation pipeline to Python via the `_rust_conjoint`
//! extension module.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules: [`choice`] (conjoint data, models,
//!   diagnostics, simulation) and [`optimization`] (the generic
//!   log-likelihood maximizer).
//! - With the `python-bindings` feature, define `estimate_conjoint`, which
//!   takes the JSON estimation request and returns the JSON response.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; this file performs only
//!   FFI glue and error mapping.
//! - The GIL is released while a request is estimated.
//!
//! Conventions
//! -----------
//! - Errors from the core are `ChoiceError` values internally and become
//!   Python `ValueError`s at the PyO3 boundary.
//!
//! Downstream usage
//! ----------------
//! - Native Rust code depends on [`choice`] (or `choice::prelude`) directly
//!   and ignores the PyO3 items.
//! - The Python package imports `_rust_conjoint.estimate_conjoint` and wraps
//!   it in a user-facing API.

pub mod choice;
pub mod optimization;

#[cfg(feature = "python-bindings")]
use pyo3::prelude::*;

#[cfg(feature = "python-bindings")]
use crate::choice::io::request::estimate_json;

/// estimate_conjoint: run a JSON estimation request.
///
/// Parameters
/// ----------
/// - `payload`: `str`
///   JSON object with `data`, `attribute_metadata`, optional
///   `none_alternative_id`, `competitor_alternative_ids`, `model_options`,
///   and `column_mapping`.
///
/// Returns
/// -------
/// `str`
///   JSON response with `respondents`, `failed_respondents`,
///   `aggregate_summaries`, and batch statistics.
///
/// Raises
/// ------
/// ValueError
///   For malformed payloads, invalid options, or when no respondent could be
///   estimated.
#[cfg(feature = "python-bindings")]
#[pyfunction]
fn estimate_conjoint(py: Python<'_>, payload: &str) -> PyResult<String> {
    Ok(py.allow_threads(|| estimate_json(payload))?)
}

#[cfg(feature = "python-bindings")]
#[pymodule]
fn _rust_conjoint(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(estimate_conjoint, m)?)?;
    Ok(())
}
