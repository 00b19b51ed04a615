//! Result containers for conditional-logit estimation.
//!
//! Field names on the serialized form follow the established response
//! contract (`respondents`, `failed_respondents`, `respondent_id`, ...), so
//! JSON consumers written against it keep working.
use crate::{
    choice::{
        core::{attributes::is_asc_key, design::SkippedTask},
        diagnostics::aggregate::AggregateSummary,
        errors::{ChoiceError, ChoiceResult},
    },
    optimization::loglik_optimizer::OptimMethod,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;

/// Goodness-of-fit statistics of one unit.
///
/// `log_likelihood` excludes the L2 penalty; `penalized_log_likelihood` is
/// the objective the optimizer maximized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitStatistics {
    pub log_likelihood: f64,
    pub penalized_log_likelihood: f64,
    pub null_log_likelihood: f64,
    pub pseudo_r2: f64,
    pub n_tasks: usize,
    pub n_observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Convergence {
    pub converged: bool,
    pub method: OptimMethod,
    pub iterations: usize,
    pub status: String,
    pub grad_norm: Option<f64>,
}

/// Estimates and diagnostics of one successfully fitted unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFit {
    #[serde(rename = "respondent_id")]
    pub unit_id: String,
    /// Coefficients in design-column order.
    pub coefficients: IndexMap<String, f64>,
    /// Importance in percent per attribute, in attribute order.
    pub attribute_importance: IndexMap<String, f64>,
    /// Reference level the unit's dummies are measured against.
    pub reference_levels: IndexMap<String, String>,
    pub fit: FitStatistics,
    pub convergence: Convergence,
}

impl UnitFit {
    pub fn coefficient(&self, key: &str) -> Option<f64> {
        self.coefficients.get(key).copied()
    }

    /// Coefficients excluding alternative-specific constants.
    pub fn attribute_coefficients(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.coefficients.iter().filter(|(k, _)| !is_asc_key(k))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUnit {
    #[serde(rename = "respondent_id")]
    pub unit_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRow {
    pub row: usize,
    pub reason: String,
}

impl DroppedRow {
    /// `Some` for [`ChoiceError::MalformedRow`], `None` otherwise.
    pub fn from_error(err: &ChoiceError) -> Option<Self> {
        match err {
            ChoiceError::MalformedRow { row, reason } => {
                Some(Self { row: *row, reason: reason.clone() })
            }
            _ => None,
        }
    }
}

/// Outcome of a batch estimation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationResult {
    #[serde(rename = "respondents")]
    pub units: Vec<UnitFit>,
    #[serde(rename = "failed_respondents")]
    pub failed: Vec<FailedUnit>,
    pub aggregate_summaries: AggregateSummary,
    pub mean_pseudo_r2: f64,
    #[serde(rename = "mean_tasks_per_respondent")]
    pub mean_tasks_per_unit: f64,
    pub estimation_time_seconds: f64,
    pub dropped_rows: Vec<DroppedRow>,
    pub skipped_tasks: Vec<SkippedTask>,
}

impl EstimationResult {
    pub fn unit(&self, unit_id: &str) -> Option<&UnitFit> {
        self.units.iter().find(|u| u.unit_id == unit_id)
    }

    /// Sorted union of coefficient names across fitted units.
    pub fn coefficient_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.units.iter().flat_map(|u| u.coefficients.keys()).collect();
        names.into_iter().cloned().collect()
    }

    /// Serialize the full result as JSON.
    pub fn to_json(&self) -> ChoiceResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> ChoiceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
impl UnitFit {
    /// Minimal converged fit carrying only coefficients.
    pub(crate) fn with_coefficients(unit_id: &str, coefs: &[(&str, f64)]) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            coefficients: coefs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            attribute_importance: IndexMap::new(),
            reference_levels: IndexMap::new(),
            fit: FitStatistics {
                log_likelihood: 0.0,
                penalized_log_likelihood: 0.0,
                null_log_likelihood: 0.0,
                pseudo_r2: 0.0,
                n_tasks: 0,
                n_observations: 0,
            },
            convergence: Convergence {
                converged: true,
                method: OptimMethod::Lbfgs,
                iterations: 0,
                status: String::new(),
                grad_norm: None,
            },
        }
    }
}
