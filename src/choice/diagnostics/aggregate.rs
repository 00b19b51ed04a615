//! Cross-unit aggregation of part-worth utilities and importances.
//!
//! Purpose
//! -------
//! Summarize a batch of fitted units per (attribute, level): mean, population
//! standard deviation, minimum, and maximum of the coefficient across the
//! units that carry a value for it, plus the arithmetic mean importance per
//! attribute.
//!
//! Key behaviors
//! -------------
//! - For a categorical level a unit contributes its estimated coefficient,
//!   or `0.0` when the level is that unit's reference (including the
//!   degenerate case where the unit saw a single level of the attribute).
//!   Levels a unit never observed contribute nothing.
//! - Numeric terms (`attr`, `attr_sq`) and ASCs contribute the coefficient
//!   when the unit has it.
//! - Terms are listed in attribute order, levels in global level order, then
//!   the ASCs.
//!
//! Conventions
//! -----------
//! - Standard deviations are population SDs (divisor `n`).
//! - Statistics are computed with `statrs`' `Statistics` trait.
use crate::choice::{
    core::attributes::{
        competitor_key, level_key, quadratic_key, AttributeKind, AttributeSet, ASC_NONE,
    },
    models::results::UnitFit,
};
use indexmap::IndexMap;
use serde::Serialize;
use statrs::statistics::Statistics;

/// Summary statistics of one coefficient across units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoefficientStats {
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl CoefficientStats {
    /// `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        Some(Self {
            mean: Statistics::mean(values),
            sd: Statistics::population_std_dev(values),
            min: Statistics::min(values),
            max: Statistics::max(values),
            n: values.len(),
        })
    }
}

/// Aggregated coefficient of one term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermSummary {
    pub attribute: Option<String>,
    pub level: Option<String>,
    pub is_reference: bool,
    #[serde(flatten)]
    pub stats: CoefficientStats,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AggregateSummary {
    pub mean_attribute_importance: IndexMap<String, f64>,
    pub mean_utilities: IndexMap<String, TermSummary>,
}

/// Aggregate fitted units; terms with no contributing unit are omitted.
pub fn aggregate(units: &[UnitFit], attributes: &AttributeSet) -> AggregateSummary {
    let mut mean_utilities = IndexMap::new();
    let mut push = |key: String,
                    attribute: Option<&str>,
                    level: Option<&str>,
                    is_reference: bool,
                    values: Vec<f64>| {
        if let Some(stats) = CoefficientStats::from_values(&values) {
            mean_utilities.insert(
                key,
                TermSummary {
                    attribute: attribute.map(str::to_string),
                    level: level.map(str::to_string),
                    is_reference,
                    stats,
                },
            );
        }
    };

    for spec in &attributes.specs {
        match spec.kind {
            AttributeKind::Categorical => {
                for level in &spec.levels {
                    let key = level_key(&spec.name, level);
                    let values = units
                        .iter()
                        .filter_map(|u| {
                            u.coefficient(&key).or_else(|| {
                                let is_ref = u.reference_levels.get(&spec.name) == Some(level);
                                is_ref.then_some(0.0)
                            })
                        })
                        .collect();
                    let is_reference = spec.reference_level() == Some(level.as_str());
                    push(key, Some(spec.name.as_str()), Some(level.as_str()), is_reference, values);
                }
            }
            kind => {
                let mut keys = vec![spec.name.clone()];
                if kind == AttributeKind::NumericQuadratic {
                    keys.push(quadratic_key(&spec.name));
                }
                for key in keys {
                    let values = units.iter().filter_map(|u| u.coefficient(&key)).collect();
                    push(key, Some(spec.name.as_str()), None, false, values);
                }
            }
        }
    }

    let mut asc_keys: Vec<String> = Vec::new();
    if attributes.none_alternative.is_some() {
        asc_keys.push(ASC_NONE.to_string());
    }
    asc_keys.extend(attributes.competitor_alternatives.iter().map(|c| competitor_key(c)));
    for key in asc_keys {
        let values = units.iter().filter_map(|u| u.coefficient(&key)).collect();
        push(key, None, None, false, values);
    }

    AggregateSummary { mean_attribute_importance: mean_importance(units, attributes), mean_utilities }
}

/// Arithmetic mean of per-unit importance per attribute.
pub fn mean_importance(units: &[UnitFit], attributes: &AttributeSet) -> IndexMap<String, f64> {
    attributes
        .specs
        .iter()
        .map(|spec| {
            let values: Vec<f64> = units
                .iter()
                .filter_map(|u| u.attribute_importance.get(&spec.name).copied())
                .collect();
            let mean = if values.is_empty() { 0.0 } else { Statistics::mean(&values) };
            (spec.name.clone(), mean)
        })
        .collect()
}
