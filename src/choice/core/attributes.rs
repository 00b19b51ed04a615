//! Attribute specifications, level ordering, and coefficient naming.
//!
//! An attribute is either categorical (dummy coded against a reference
//! level) or numeric (`numeric_linear`, `price`, `numeric_quadratic`). The
//! global [`AttributeSet`] fixes, for every categorical attribute, the
//! ordered level list whose first entry is the **reference level**, and for
//! every numeric attribute the sorted distinct values observed in the data.
//!
//! Coefficient names follow one scheme everywhere (design columns, fitted
//! coefficient maps, CSV export, simulation lookups):
//! - categorical level: `"{attribute}__{level}"`
//! - numeric term: `"{attribute}"`, quadratic term: `"{attribute}_sq"`
//! - alternative-specific constants: `"ASC_None"`, `"ASC_Competitor_{id}"`
use crate::choice::errors::{ChoiceError, ChoiceResult};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

/// Coefficient name of the "none" alternative-specific constant.
pub const ASC_NONE: &str = "ASC_None";

/// Prefix shared by every alternative-specific constant.
pub const ASC_PREFIX: &str = "ASC_";

pub fn level_key(attribute: &str, level: &str) -> String {
    format!("{attribute}__{level}")
}

pub fn quadratic_key(attribute: &str) -> String {
    format!("{attribute}_sq")
}

pub fn competitor_key(alternative: &str) -> String {
    format!("ASC_Competitor_{alternative}")
}

pub fn is_asc_key(key: &str) -> bool {
    key.starts_with(ASC_PREFIX)
}

/// How an attribute enters the utility function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Categorical,
    NumericLinear,
    NumericQuadratic,
    Price,
}

impl AttributeKind {
    pub fn is_numeric(self) -> bool {
        !matches!(self, AttributeKind::Categorical)
    }
}

impl FromStr for AttributeKind {
    type Err = ChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "categorical" => Ok(AttributeKind::Categorical),
            "numeric_linear" | "numeric" | "linear" => Ok(AttributeKind::NumericLinear),
            "numeric_quadratic" | "quadratic" => Ok(AttributeKind::NumericQuadratic),
            "price" => Ok(AttributeKind::Price),
            _ => Err(ChoiceError::InvalidAttributeKind { name: s.to_string() }),
        }
    }
}

/// Rule selecting the reference level of a categorical attribute.
///
/// - `Alphabetical`: levels sorted lexicographically; the first is the reference.
/// - `MostFrequent`: levels sorted by descending row count (ties broken
///   lexicographically); the most frequent level is the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
    #[default]
    Alphabetical,
    MostFrequent,
}

impl FromStr for ReferencePolicy {
    type Err = ChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "alphabetical" => Ok(ReferencePolicy::Alphabetical),
            "most_frequent" | "mostfrequent" => Ok(ReferencePolicy::MostFrequent),
            _ => Err(ChoiceError::InvalidReferencePolicy { name: s.to_string() }),
        }
    }
}

impl ReferencePolicy {
    /// Order levels according to the policy; the result starts with the reference.
    pub fn order_levels(self, counts: &HashMap<String, usize>) -> Vec<String> {
        let mut levels: Vec<String> = counts.keys().cloned().collect();
        match self {
            ReferencePolicy::Alphabetical => levels.sort(),
            ReferencePolicy::MostFrequent => {
                levels.sort_by(|a, b| counts[b].cmp(&counts[a]).then_with(|| a.cmp(b)))
            }
        }
        levels
    }
}

/// A single attribute value: a categorical level or a numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Level(String),
}

impl AttrValue {
    /// Numeric view: numbers as-is, level strings parsed when possible.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Level(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    /// Level view: strings as-is, numbers formatted without trailing zeros.
    pub fn as_level(&self) -> String {
        match self {
            AttrValue::Level(s) => s.clone(),
            AttrValue::Number(v) => format!("{v}"),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Number(v) => write!(f, "{v}"),
            AttrValue::Level(s) => write!(f, "{s}"),
        }
    }
}

/// One attribute of the global specification.
///
/// - `levels`: categorical levels in policy order, reference first (empty
///   for numeric attributes).
/// - `values`: sorted distinct observed values (empty for categorical).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSpec {
    pub name: String,
    pub kind: AttributeKind,
    pub levels: Vec<String>,
    pub values: Vec<f64>,
}

impl AttributeSpec {
    pub fn categorical(name: impl Into<String>, levels: Vec<String>) -> Self {
        Self { name: name.into(), kind: AttributeKind::Categorical, levels, values: Vec::new() }
    }

    /// Numeric attribute; `values` are sorted and deduplicated.
    pub fn numeric(name: impl Into<String>, kind: AttributeKind, mut values: Vec<f64>) -> Self {
        values.retain(|v| v.is_finite());
        values.sort_by(f64::total_cmp);
        values.dedup();
        Self { name: name.into(), kind, levels: Vec::new(), values }
    }

    pub fn reference_level(&self) -> Option<&str> {
        self.levels.first().map(String::as_str)
    }

    /// Values a brute-force search enumerates for this attribute.
    pub fn candidates(&self) -> Vec<AttrValue> {
        if self.kind.is_numeric() {
            self.values.iter().map(|v| AttrValue::Number(*v)).collect()
        } else {
            self.levels.iter().cloned().map(AttrValue::Level).collect()
        }
    }

    /// First level (the reference) or smallest observed value.
    pub fn baseline(&self) -> Option<AttrValue> {
        self.candidates().into_iter().next()
    }

    pub fn has_level(&self, level: &str) -> bool {
        self.levels.iter().any(|l| l == level)
    }
}

/// Global attribute specification plus the special alternative ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSet {
    pub specs: Vec<AttributeSpec>,
    pub none_alternative: Option<String>,
    pub competitor_alternatives: Vec<String>,
}

impl AttributeSet {
    /// Build a set, rejecting duplicate attribute names.
    pub fn new(
        specs: Vec<AttributeSpec>, none_alternative: Option<String>,
        competitor_alternatives: Vec<String>,
    ) -> ChoiceResult<Self> {
        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|other| other.name == spec.name) {
                return Err(ChoiceError::DuplicateAttribute { name: spec.name.clone() });
            }
        }
        Ok(Self { specs, none_alternative, competitor_alternatives })
    }

    pub fn get(&self, name: &str) -> Option<&AttributeSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }

    /// First attribute of kind `price`, if any.
    pub fn price_attribute(&self) -> Option<&AttributeSpec> {
        self.specs.iter().find(|s| s.kind == AttributeKind::Price)
    }

    pub fn is_none_alternative(&self, alternative: &str) -> bool {
        self.none_alternative.as_deref() == Some(alternative)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
