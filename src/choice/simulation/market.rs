//! Market-share simulation over fitted units.
//!
//! Purpose
//! -------
//! Predict the share of choices each candidate product receives: for every
//! fitted unit compute the utility of each product, apply a softmax across
//! products, and average the probabilities across units. Shares are then
//! combined with prices and costs into customers, margins, and profits.
//!
//! Key behaviors
//! -------------
//! - A product is resolved once into weighted coefficient terms
//!   ([`ResolvedProfile`]); a unit's utility is `Σ coef[key] · weight`, with
//!   missing coefficients (reference or unobserved levels) counting as 0.
//! - `Own` products use their attribute terms; `Competitor(id)` products add
//!   `ASC_Competitor_{id}`; the "none" product uses only `ASC_None`.
//! - When the attribute set has a `price` attribute that the product does not
//!   list, the product's `price` field supplies the value.
//!
//! Invariants & assumptions
//! ------------------------
//! - At least two products are required.
//! - Shares are percentages and sum to 100 across products.
use crate::{
    choice::{
        core::attributes::{
            competitor_key, level_key, quadratic_key, AttrValue, AttributeKind, AttributeSet,
            ASC_NONE,
        },
        errors::{ChoiceError, ChoiceResult},
        models::results::UnitFit,
    },
    optimization::numerical_stability::stable_softmax_in_place,
};
use indexmap::IndexMap;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Default number of customers in the simulated market.
pub const DEFAULT_MARKET_SIZE: u64 = 10_000;

/// Role of a product in the simulated choice set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum ProductKind {
    #[default]
    Own,
    Competitor(String),
    #[serde(rename = "none")]
    NoneOption,
}

/// A candidate product: attribute values plus optional economics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductProfile {
    pub name: String,
    #[serde(default)]
    pub kind: ProductKind,
    #[serde(default)]
    pub levels: IndexMap<String, AttrValue>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
}

impl ProductProfile {
    pub fn own(name: impl Into<String>, levels: IndexMap<String, AttrValue>) -> Self {
        Self { name: name.into(), kind: ProductKind::Own, levels, price: None, cost: None }
    }

    pub fn none_option(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ProductKind::NoneOption,
            levels: IndexMap::new(),
            price: None,
            cost: None,
        }
    }

    /// Price used for economics: the `price` attribute value when listed,
    /// otherwise the `price` field, otherwise 0.
    pub fn effective_price(&self, attributes: &AttributeSet) -> f64 {
        attributes
            .price_attribute()
            .and_then(|spec| self.levels.get(&spec.name))
            .and_then(AttrValue::as_number)
            .or(self.price)
            .unwrap_or(0.0)
    }
}

/// A product reduced to `(coefficient name, weight)` terms.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub terms: Vec<(String, f64)>,
}

impl ResolvedProfile {
    /// Resolve a product against the attribute specification.
    ///
    /// Errors
    /// ------
    /// - [`ChoiceError::UnknownAttribute`] for an attribute not in `attributes`.
    /// - [`ChoiceError::InvalidProfile`] for an unknown categorical level or a
    ///   non-numeric value of a numeric attribute.
    pub fn resolve(product: &ProductProfile, attributes: &AttributeSet) -> ChoiceResult<Self> {
        let mut terms = Vec::new();
        if product.kind == ProductKind::NoneOption {
            terms.push((ASC_NONE.to_string(), 1.0));
            return Ok(Self { terms });
        }

        for (name, value) in &product.levels {
            let spec = attributes
                .get(name)
                .ok_or_else(|| ChoiceError::UnknownAttribute { name: name.clone() })?;
            if spec.kind.is_numeric() {
                let x = value.as_number().ok_or_else(|| ChoiceError::InvalidProfile {
                    product: product.name.clone(),
                    reason: format!("value '{value}' of '{name}' is not numeric"),
                })?;
                terms.push((spec.name.clone(), x));
                if spec.kind == AttributeKind::NumericQuadratic {
                    terms.push((quadratic_key(&spec.name), x * x));
                }
            } else {
                let level = value.as_level();
                if !spec.has_level(&level) {
                    return Err(ChoiceError::InvalidProfile {
                        product: product.name.clone(),
                        reason: format!("unknown level '{level}' of '{name}'"),
                    });
                }
                terms.push((level_key(&spec.name, &level), 1.0));
            }
        }

        if let (Some(spec), Some(price)) = (attributes.price_attribute(), product.price) {
            if !product.levels.contains_key(&spec.name) {
                terms.push((spec.name.clone(), price));
            }
        }
        if let ProductKind::Competitor(id) = &product.kind {
            terms.push((competitor_key(id), 1.0));
        }
        Ok(Self { terms })
    }

    /// Utility under one unit's coefficients.
    pub fn utility(&self, coefficients: &IndexMap<String, f64>) -> f64 {
        self.terms.iter().map(|(key, w)| coefficients.get(key).copied().unwrap_or(0.0) * w).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationOptions {
    pub market_size: u64,
}

impl SimulationOptions {
    /// Errors
    /// ------
    /// - [`ChoiceError::InvalidOption`] when `market_size == 0`.
    pub fn new(market_size: u64) -> ChoiceResult<Self> {
        if market_size == 0 {
            return Err(ChoiceError::InvalidOption {
                name: "market_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self { market_size })
    }
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self { market_size: DEFAULT_MARKET_SIZE }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductShare {
    pub name: String,
    /// Predicted share in percent.
    pub share: f64,
    pub customers: u64,
    pub price: f64,
    pub cost: f64,
    pub margin: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub products: Vec<ProductShare>,
    pub n_units: usize,
}

/// Mean choice probability of every product across units, as fractions.
pub fn choice_shares(units: &[UnitFit], profiles: &[ResolvedProfile]) -> Array1<f64> {
    let mut shares = Array1::<f64>::zeros(profiles.len());
    if units.is_empty() {
        return shares;
    }
    for unit in units {
        let mut u: Array1<f64> = profiles.iter().map(|p| p.utility(&unit.coefficients)).collect();
        stable_softmax_in_place(u.view_mut());
        shares += &u;
    }
    shares / units.len() as f64
}

/// Simulate market shares and economics for a set of products.
///
/// Errors
/// ------
/// - [`ChoiceError::TooFewProducts`] for fewer than two products.
/// - [`ChoiceError::NoUnitsEstimated`] when `units` is empty.
/// - Resolution errors from [`ResolvedProfile::resolve`].
pub fn simulate_market(
    units: &[UnitFit], products: &[ProductProfile], attributes: &AttributeSet,
    opts: &SimulationOptions,
) -> ChoiceResult<SimulationResult> {
    if products.len() < 2 {
        return Err(ChoiceError::TooFewProducts { required: 2, found: products.len() });
    }
    if units.is_empty() {
        return Err(ChoiceError::NoUnitsEstimated { failed: 0 });
    }
    let profiles = products
        .iter()
        .map(|p| ResolvedProfile::resolve(p, attributes))
        .collect::<ChoiceResult<Vec<_>>>()?;
    let shares = choice_shares(units, &profiles);

    let market = opts.market_size as f64;
    let products = products
        .iter()
        .zip(shares.iter())
        .map(|(product, &share)| {
            let price = product.effective_price(attributes);
            let cost = product.cost.unwrap_or(0.0);
            let margin = price - cost;
            ProductShare {
                name: product.name.clone(),
                share: 100.0 * share,
                customers: (share * market).round() as u64,
                price,
                cost,
                margin,
                profit: share * market * margin,
            }
        })
        .collect();

    Ok(SimulationResult { products, n_units: units.len() })
}
