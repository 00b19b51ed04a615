//! Brute-force product-configuration search.
//!
//! Every combination of levels (categorical) or observed values (numeric) of
//! the selected attributes is scored by its mean utility across fitted units;
//! attributes outside the search stay at a fixed value (an explicit override
//! or the attribute's baseline: first level, smallest observed value). The
//! reported share is the logistic of the mean utility against an outside
//! option of utility zero, `100 · e^ū / (e^ū + 1)`.
//!
//! The search space is counted with checked `u128` arithmetic before any
//! evaluation and rejected with `CombinatorialLimitExceeded` when it exceeds
//! the configured ceiling.
use crate::{
    choice::{
        core::attributes::{AttrValue, AttributeSet},
        errors::{ChoiceError, ChoiceResult},
        models::results::UnitFit,
        simulation::market::{ProductProfile, ResolvedProfile},
    },
    optimization::numerical_stability::safe_logistic,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_COMBINATIONS: u128 = 100_000;
pub const DEFAULT_TOP_N: usize = 10;

/// Upper bound on the candidates buffer reserved before enumeration.
const MAX_PREALLOCATED: usize = 4096;

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_max_combinations() -> u128 {
    DEFAULT_MAX_COMBINATIONS
}

/// Search request.
///
/// - `attributes`: attributes whose levels are enumerated.
/// - `fixed`: values for attributes outside the search (baseline otherwise).
/// - `top_n`: number of ranked configurations returned.
/// - `max_combinations`: ceiling on the number of evaluated configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSearch {
    pub attributes: Vec<String>,
    #[serde(default)]
    pub fixed: IndexMap<String, AttrValue>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_max_combinations")]
    pub max_combinations: u128,
}

impl OptimizationSearch {
    pub fn new(attributes: Vec<String>) -> Self {
        Self {
            attributes,
            fixed: IndexMap::new(),
            top_n: DEFAULT_TOP_N,
            max_combinations: DEFAULT_MAX_COMBINATIONS,
        }
    }

    fn validate(&self, attributes: &AttributeSet) -> ChoiceResult<()> {
        if self.attributes.is_empty() {
            return Err(ChoiceError::InvalidOption {
                name: "attributes",
                reason: "select at least one attribute".to_string(),
            });
        }
        if self.top_n == 0 {
            return Err(ChoiceError::InvalidOption {
                name: "top_n",
                reason: "must be greater than zero".to_string(),
            });
        }
        for (i, name) in self.attributes.iter().enumerate() {
            if attributes.get(name).is_none() {
                return Err(ChoiceError::UnknownAttribute { name: name.clone() });
            }
            if self.attributes[..i].contains(name) {
                return Err(ChoiceError::InvalidOption {
                    name: "attributes",
                    reason: format!("'{name}' selected more than once"),
                });
            }
        }
        if let Some(name) = self.fixed.keys().find(|k| attributes.get(k).is_none()) {
            return Err(ChoiceError::UnknownAttribute { name: name.clone() });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedConfiguration {
    pub rank: usize,
    pub levels: IndexMap<String, AttrValue>,
    pub mean_utility: f64,
    /// `100 · σ(mean_utility)`.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub ranked: Vec<RankedConfiguration>,
    pub evaluated: usize,
}

/// Number of configurations, saturating at `u128::MAX`.
pub fn combination_count(candidate_counts: &[usize]) -> u128 {
    candidate_counts
        .iter()
        .try_fold(1u128, |acc, &n| acc.checked_mul(n as u128))
        .unwrap_or(u128::MAX)
}

/// Enumerate and rank product configurations.
///
/// Errors
/// ------
/// - [`ChoiceError::NoUnitsEstimated`] when `units` is empty.
/// - [`ChoiceError::UnknownAttribute`] / [`ChoiceError::InvalidOption`] for
///   an invalid search request.
/// - [`ChoiceError::CombinatorialLimitExceeded`] when the search space is
///   larger than `search.max_combinations`.
/// - [`ChoiceError::InvalidProfile`] when a fixed value is not a valid level.
pub fn optimize_product(
    units: &[UnitFit], attributes: &AttributeSet, search: &OptimizationSearch,
) -> ChoiceResult<OptimizationResult> {
    if units.is_empty() {
        return Err(ChoiceError::NoUnitsEstimated { failed: 0 });
    }
    search.validate(attributes)?;

    let candidates: Vec<(String, Vec<AttrValue>)> = search
        .attributes
        .iter()
        .filter_map(|name| attributes.get(name))
        .map(|spec| (spec.name.clone(), spec.candidates()))
        .collect();
    let counts: Vec<usize> = candidates.iter().map(|(_, c)| c.len()).collect();
    let combinations = combination_count(&counts);
    if combinations > search.max_combinations {
        return Err(ChoiceError::CombinatorialLimitExceeded {
            combinations,
            limit: search.max_combinations,
        });
    }
    if let Some((name, _)) = candidates.iter().find(|(_, c)| c.is_empty()) {
        return Err(ChoiceError::InvalidOption {
            name: "attributes",
            reason: format!("'{name}' has no levels to search"),
        });
    }

    let mut base: IndexMap<String, AttrValue> = IndexMap::new();
    for spec in &attributes.specs {
        let fixed = search.fixed.get(&spec.name).cloned().or_else(|| spec.baseline());
        if let Some(value) = fixed {
            base.insert(spec.name.clone(), value);
        }
    }

    // The count is bounded by `max_combinations`, which callers may raise.
    let capacity = usize::try_from(combinations).unwrap_or(usize::MAX).min(MAX_PREALLOCATED);
    let mut scored = Vec::with_capacity(capacity);
    let mut odometer = vec![0usize; candidates.len()];
    loop {
        let mut levels = base.clone();
        for ((name, values), &i) in candidates.iter().zip(&odometer) {
            levels.insert(name.clone(), values[i].clone());
        }
        let profile = ResolvedProfile::resolve(&ProductProfile::own("candidate", levels.clone()), attributes)?;
        let mean_utility =
            units.iter().map(|u| profile.utility(&u.coefficients)).sum::<f64>() / units.len() as f64;
        scored.push((levels, mean_utility));

        if !advance(&mut odometer, &counts) {
            break;
        }
    }

    let evaluated = scored.len();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    let ranked = scored
        .into_iter()
        .take(search.top_n)
        .enumerate()
        .map(|(i, (levels, mean_utility))| RankedConfiguration {
            rank: i + 1,
            levels,
            mean_utility,
            share: 100.0 * safe_logistic(mean_utility),
        })
        .collect();

    Ok(OptimizationResult { ranked, evaluated })
}

/// Step the mixed-radix counter; `false` once every combination was visited.
fn advance(odometer: &mut [usize], radices: &[usize]) -> bool {
    for (digit, &radix) in odometer.iter_mut().zip(radices).rev() {
        *digit += 1;
        if *digit < radix {
            return true;
        }
        *digit = 0;
    }
    false
}
