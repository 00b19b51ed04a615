//! choice: discrete-choice (conjoint) modeling stack.
//!
//! Purpose
//! -------
//! Estimate part-worth utilities from choice-based conjoint data and use
//! them downstream. Each estimation unit (typically a respondent) gets its
//! own L2-penalized conditional logit; the batch is summarized, and the
//! fitted units drive market simulation, product search, and segmentation.
//!
//! Key behaviors
//! -------------
//! - [`core`]: attribute specifications, validated observations, per-unit
//!   design matrices, the conditional-logit likelihood, estimation options.
//! - [`models`]: batch estimation with failure isolation, the
//!   [`ConjointModel`] orchestrator, result containers, and a pooled
//!   multinomial logistic regression.
//! - [`diagnostics`]: attribute importance, cross-unit aggregation, and
//!   willingness to pay.
//! - [`simulation`]: market shares and economics, brute-force product
//!   optimization, k-means segmentation.
//! - [`io`]: JSON request handling and CSV export.
//! - [`errors`]: [`ChoiceError`] / [`ChoiceResult`].
//!
//! Invariants & assumptions
//! ------------------------
//! - A failing unit never aborts a batch; a batch fails only when no unit
//!   can be estimated.
//! - Non-convergence is reported as metadata, never as an error.
//! - Output order is deterministic: units in first-appearance order,
//!   attributes in declaration order, with or without parallel fitting.
//!
//! Conventions
//! -----------
//! - Coefficient keys: `attr__level` (categorical dummies), `attr` and
//!   `attr_sq` (numeric terms), `ASC_None`, `ASC_Competitor_{id}`.
//! - Row indices in errors are 0-based positions in the input records.
//! - Logging happens only at the batch layer (`models::estimation`) through
//!   `tracing`; everything else returns data.
//!
//! Downstream usage
//! ----------------
//! 1. Ingest rows with [`ChoiceData::from_records`] (or parse an
//!    [`EstimationRequest`]).
//! 2. Build a [`ConjointModel`] and call `fit`.
//! 3. Call `simulate`, `optimize`, `segment`, or `coefficients_csv` on the
//!    fitted model, or serialize the [`EstimationResult`] with `to_json`.
//!
//! Testing notes
//! -------------
//! - Every submodule carries unit tests; `tests/integration_conjoint_pipeline.rs`
//!   runs the public pipeline end to end.

pub mod core;
pub mod diagnostics;
pub mod errors;
pub mod io;
pub mod models;
pub mod simulation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    AttrValue, AttributeKind, AttributeSet, AttributeSpec, ChoiceData, ColumnMapping,
    DesignMatrix, EstimationOptions, EstimationScope, IngestOptions, MnlLikelihood,
    NumericPolicy, Record, ReferencePolicy,
};
pub use self::diagnostics::{willingness_to_pay, AggregateSummary, CoefficientStats, WtpSummary};
pub use self::errors::{ChoiceError, ChoiceResult};
pub use self::io::{coefficients_csv, estimate_json, EstimationRequest};
pub use self::models::{
    estimate, fit_multinomial, ConjointModel, EstimationResult, MultinomialData, MultinomialFit,
    MultinomialLogit, UnitFit,
};
pub use self::simulation::{
    optimize_product, segment_units, simulate_market, OptimizationResult, OptimizationSearch,
    ProductKind, ProductProfile, SegmentationOptions, SegmentationResult, SimulationOptions,
    SimulationResult,
};

// ---- Optional convenience prelude for downstream crates -------------------
//
//     use rust_conjoint::choice::prelude::*;

pub mod prelude {
    pub use super::{
        estimate, estimate_json, AttrValue, AttributeKind, ChoiceData, ChoiceError, ChoiceResult,
        ConjointModel, EstimationOptions, EstimationResult, IngestOptions, OptimizationSearch,
        ProductKind, ProductProfile, Record, SegmentationOptions, SimulationOptions, UnitFit,
    };
}
