//! Willingness to pay derived from per-unit part-worths.
//!
//! Purpose
//! -------
//! Express each non-price term in money: for one unit, the willingness to
//! pay for a term with coefficient `b` is `-b / b_price`, where `b_price` is
//! the unit's coefficient on the price attribute. Values are summarized per
//! term across units.
//!
//! Key behaviors
//! -------------
//! - Categorical attributes report every level except the global reference.
//!   A unit contributes its dummy coefficient, `0.0` when the level is its
//!   own reference, and nothing when it never observed the level.
//! - Numeric attributes report their linear term `attr`; the quadratic term
//!   has no single money equivalent and is skipped.
//! - A unit without a price coefficient is treated as `b_price = 0`, so all
//!   its ratios are non-finite and dropped.
//! - Ratios that are non-finite or have `|wtp| >= WTP_LIMIT` are dropped;
//!   terms left without values are omitted.
//!
//! Conventions
//! -----------
//! - The price attribute is the first attribute of kind `price`.
//! - Standard deviations are population SDs, via `statrs`.
use crate::choice::{
    core::attributes::{level_key, AttributeKind, AttributeSet},
    errors::{ChoiceError, ChoiceResult},
    models::results::UnitFit,
};
use indexmap::IndexMap;
use serde::Serialize;
use statrs::statistics::Statistics;

/// Ratios at or beyond this magnitude are treated as degenerate.
pub const WTP_LIMIT: f64 = 10_000.0;

/// Willingness to pay for one term across units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WtpSummary {
    pub attribute: String,
    pub level: Option<String>,
    pub mean: f64,
    pub sd: f64,
    /// Units whose ratio survived the filter.
    pub n: usize,
}

fn ratios(units: &[UnitFit], price_key: &str, utility: impl Fn(&UnitFit) -> Option<f64>) -> Vec<f64> {
    units
        .iter()
        .filter_map(|u| {
            let b = utility(u)?;
            let b_price = u.coefficient(price_key).unwrap_or(0.0);
            Some(-b / b_price)
        })
        .filter(|v| v.is_finite() && v.abs() < WTP_LIMIT)
        .collect()
}

/// Mean and SD of the willingness to pay per term, keyed by coefficient name.
///
/// Errors
/// ------
/// - [`ChoiceError::NoPriceAttribute`] when no attribute has kind `price`.
/// - [`ChoiceError::NoUnitsEstimated`] when `units` is empty.
pub fn willingness_to_pay(
    units: &[UnitFit], attributes: &AttributeSet,
) -> ChoiceResult<IndexMap<String, WtpSummary>> {
    let price = attributes.price_attribute().ok_or(ChoiceError::NoPriceAttribute)?;
    if units.is_empty() {
        return Err(ChoiceError::NoUnitsEstimated { failed: 0 });
    }

    let mut out = IndexMap::new();
    let mut push = |key: String, attribute: &str, level: Option<&str>, values: Vec<f64>| {
        if values.is_empty() {
            return;
        }
        let summary = WtpSummary {
            attribute: attribute.to_string(),
            level: level.map(str::to_string),
            mean: Statistics::mean(&values),
            sd: Statistics::population_std_dev(&values),
            n: values.len(),
        };
        out.insert(key, summary);
    };

    for spec in attributes.specs.iter().filter(|s| s.name != price.name) {
        if spec.kind == AttributeKind::Categorical {
            for level in spec.levels.iter().skip(1) {
                let key = level_key(&spec.name, level);
                let values = ratios(units, &price.name, |u| {
                    u.coefficient(&key).or_else(|| {
                        (u.reference_levels.get(&spec.name) == Some(level)).then_some(0.0)
                    })
                });
                push(key, &spec.name, Some(level), values);
            }
        } else {
            let values = ratios(units, &price.name, |u| u.coefficient(&spec.name));
            push(spec.name.clone(), &spec.name, None, values);
        }
    }
    Ok(out)
}
