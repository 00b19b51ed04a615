//! core: attribute specs, observation tables, designs, and the likelihood.
//!
//! Purpose
//! -------
//! Collect the building blocks shared by every choice model: typed
//! attribute specifications with explicit reference levels, validated
//! observation tables, per-unit design matrices, the L2-penalized
//! conditional-logit likelihood, and estimation options.
//!
//! Key behaviors
//! -------------
//! - [`ChoiceData::from_records`] validates raw column-mapped rows, drops
//!   malformed ones, and derives the global [`AttributeSet`].
//! - [`DesignMatrix::build`] encodes one unit's rows under the per-unit
//!   level policy and records skipped tasks.
//! - [`MnlLikelihood`] implements the optimizer's `LogLikelihood` trait with
//!   an analytic gradient.
//!
//! Invariants & assumptions
//! ------------------------
//! - The first level of every categorical [`AttributeSpec`] is its global
//!   reference; a unit that never saw it uses its first observed level.
//! - Design matrices always contain at least one task and one column; the
//!   empty case is reported as `ChoiceError::EmptyDesign`.
//!
//! Conventions
//! -----------
//! - Coefficient names: `attr__level`, `attr`, `attr_sq`, `ASC_None`,
//!   `ASC_Competitor_{id}` (see [`attributes`]).
//! - This module avoids logging; dropped rows and skipped tasks are returned
//!   as data and reported by the estimation layer.
//!
//! Testing notes
//! -------------
//! - Each submodule carries unit tests for its own invariants; the
//!   gradient check and null log-likelihood live in [`likelihood`].

pub mod attributes;
pub mod data;
pub mod design;
pub mod likelihood;
pub mod options;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::attributes::{
    competitor_key, is_asc_key, level_key, quadratic_key, AttrValue, AttributeKind, AttributeSet,
    AttributeSpec, ReferencePolicy, ASC_NONE,
};
pub use self::data::{ChoiceData, ColumnMapping, IngestOptions, NumericPolicy, Observation, Record};
pub use self::design::{ColumnRole, DesignColumn, DesignMatrix, SkippedTask};
pub use self::likelihood::{
    choice_probabilities, loglik_and_score, null_loglik, pseudo_r2, unpenalized_loglik,
    MnlLikelihood, DEFAULT_REG_STRENGTH,
};
pub use self::options::{EstimationOptions, EstimationScope, POOLED_UNIT_ID};
