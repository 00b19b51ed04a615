//! JSON estimation request.
//!
//! Purpose
//! -------
//! Deserialize the estimation payload used by the web front end and turn it
//! into ingestion and estimation options:
//!
//! ```json
//! {
//!   "data": [{"respondent_id": 1, "task_id": 1, "alternative_id": "A", "chosen": 1, "Color": "Red"}],
//!   "attribute_metadata": {"Color": {"type": "categorical"}},
//!   "none_alternative_id": null,
//!   "competitor_alternative_ids": [],
//!   "model_options": {"regularization": "L2", "reg_strength": 1.0}
//! }
//! ```
//!
//! Key behaviors
//! -------------
//! - `attribute_metadata` keeps its key order; it fixes the attribute order
//!   of every output.
//! - `model_options` may also carry `max_iter`, `lbfgs_mem`,
//!   `reference_policy`, `numeric_policy`, `fallback`, `scope`, and
//!   `parallel`; omitted fields take the library defaults.
//! - An empty `none_alternative_id` means "no none option".
//! - Only `"L2"` regularization is supported.
use crate::{
    choice::{
        core::{
            attributes::{AttributeKind, ReferencePolicy},
            data::{ColumnMapping, IngestOptions, NumericPolicy, Record},
            likelihood::DEFAULT_REG_STRENGTH,
            options::{EstimationOptions, EstimationScope},
        },
        errors::{ChoiceError, ChoiceResult},
        models::conjoint::ConjointModel,
    },
    optimization::loglik_optimizer::{FallbackMethod, LineSearchOptions, MLEOptions, Tolerances},
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::str::FromStr;

fn default_regularization() -> String {
    "L2".to_string()
}

fn default_reg_strength() -> f64 {
    DEFAULT_REG_STRENGTH
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttributeMetadata {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelOptions {
    #[serde(default = "default_regularization")]
    pub regularization: String,
    #[serde(default = "default_reg_strength")]
    pub reg_strength: f64,
    #[serde(default)]
    pub max_iter: Option<usize>,
    #[serde(default)]
    pub lbfgs_mem: Option<usize>,
    #[serde(default)]
    pub reference_policy: Option<String>,
    #[serde(default)]
    pub numeric_policy: Option<String>,
    #[serde(default)]
    pub fallback: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub parallel: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            regularization: default_regularization(),
            reg_strength: default_reg_strength(),
            max_iter: None,
            lbfgs_mem: None,
            reference_policy: None,
            numeric_policy: None,
            fallback: None,
            scope: None,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EstimationRequest {
    pub data: Vec<Record>,
    pub attribute_metadata: IndexMap<String, AttributeMetadata>,
    #[serde(default)]
    pub none_alternative_id: Option<String>,
    #[serde(default)]
    pub competitor_alternative_ids: Vec<String>,
    #[serde(default)]
    pub model_options: ModelOptions,
    #[serde(default)]
    pub column_mapping: ColumnMapping,
}

impl EstimationRequest {
    pub fn from_json(payload: &str) -> ChoiceResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Declared attribute kinds, in payload order.
    ///
    /// Errors
    /// ------
    /// - [`ChoiceError::InvalidAttributeKind`] for an unknown `type`.
    pub fn attribute_kinds(&self) -> ChoiceResult<IndexMap<String, AttributeKind>> {
        self.attribute_metadata
            .iter()
            .map(|(name, meta)| Ok((name.clone(), AttributeKind::from_str(&meta.kind)?)))
            .collect()
    }

    pub fn ingest_options(&self) -> ChoiceResult<IngestOptions> {
        let opts = &self.model_options;
        Ok(IngestOptions {
            mapping: self.column_mapping.clone(),
            reference_policy: opts
                .reference_policy
                .as_deref()
                .map(ReferencePolicy::from_str)
                .transpose()?
                .unwrap_or_default(),
            numeric_policy: opts
                .numeric_policy
                .as_deref()
                .map(NumericPolicy::from_str)
                .transpose()?
                .unwrap_or_default(),
            none_alternative: self.none_alternative_id.clone().filter(|id| !id.trim().is_empty()),
            competitor_alternatives: self.competitor_alternative_ids.clone(),
        })
    }

    /// Errors
    /// ------
    /// - [`ChoiceError::UnsupportedRegularization`] for anything but `"L2"`.
    /// - Parsing and validation errors of the individual options.
    pub fn estimation_options(&self) -> ChoiceResult<EstimationOptions> {
        let opts = &self.model_options;
        if !opts.regularization.eq_ignore_ascii_case("l2") {
            return Err(ChoiceError::UnsupportedRegularization { name: opts.regularization.clone() });
        }
        let defaults = EstimationOptions::default();
        let fallback = match opts.fallback.as_deref() {
            Some(name) => FallbackMethod::from_str(name)?,
            None => defaults.mle_opts.fallback,
        };
        let mle_opts = MLEOptions::new(
            Tolerances::new(None, opts.max_iter)?,
            LineSearchOptions::default(),
            opts.lbfgs_mem,
            fallback,
            false,
        )?;
        let scope = opts.scope.as_deref().map(EstimationScope::from_str).transpose()?.unwrap_or_default();
        EstimationOptions::new(opts.reg_strength, mle_opts, scope, opts.parallel)
    }

    /// Ingest the records and build an unfitted model.
    pub fn build_model(&self) -> ChoiceResult<ConjointModel> {
        ConjointModel::from_records(
            &self.data,
            &self.attribute_kinds()?,
            &self.ingest_options()?,
            self.estimation_options()?,
        )
    }
}

/// Run a JSON request end to end and return the JSON response.
///
/// Errors
/// ------
/// - [`ChoiceError::Serialization`] for a malformed payload.
/// - Option, ingestion, and batch-level estimation errors.
pub fn estimate_json(payload: &str) -> ChoiceResult<String> {
    let request = EstimationRequest::from_json(payload)?;
    let mut model = request.build_model()?;
    model.fit()?.to_json()
}
