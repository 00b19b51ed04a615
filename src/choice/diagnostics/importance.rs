//! Relative attribute importance.
//!
//! The importance of an attribute is the spread of part-worth utility it can
//! produce for one unit, expressed as a share of the total spread:
//!
//! - categorical: `max(β ∪ {0}) − min(β ∪ {0})` over the attribute's level
//!   coefficients, the `0` standing for the reference level;
//! - `numeric_linear` / `price`: `|β| · (x_max − x_min)` over the unit's
//!   observed values;
//! - `numeric_quadratic`: range of `β₁x + β₂x²` on `[x_min, x_max]`,
//!   including the vertex when it falls inside the interval.
//!
//! Alternative-specific constants are not attributes and never count.
//! Attributes without columns for the unit contribute a range of zero.
use crate::{
    choice::core::{
        attributes::{AttributeKind, AttributeSet},
        design::{ColumnRole, DesignMatrix},
    },
    optimization::loglik_optimizer::Theta,
};
use indexmap::IndexMap;

/// Utility range per attribute, in attribute order.
pub fn attribute_ranges(
    design: &DesignMatrix, beta: &Theta, attributes: &AttributeSet,
) -> IndexMap<String, f64> {
    attributes
        .specs
        .iter()
        .map(|spec| {
            let name = spec.name.as_str();
            let range = match spec.kind {
                AttributeKind::Categorical => {
                    let levels = column_coefs(design, beta, |r| {
                        matches!(r, ColumnRole::Level { attribute, .. } if attribute == name)
                    });
                    categorical_range(&levels)
                }
                kind => {
                    let (lo, hi) = design.numeric_ranges.get(name).copied().unwrap_or((0.0, 0.0));
                    let b1 = column_coefs(design, beta, |r| {
                        matches!(r, ColumnRole::Linear { attribute } if attribute == name)
                    })
                    .first()
                    .copied()
                    .unwrap_or(0.0);
                    if kind == AttributeKind::NumericQuadratic {
                        let b2 = column_coefs(design, beta, |r| {
                            matches!(r, ColumnRole::Quadratic { attribute } if attribute == name)
                        })
                        .first()
                        .copied()
                        .unwrap_or(0.0);
                        quadratic_range(b1, b2, lo, hi)
                    } else {
                        b1.abs() * (hi - lo)
                    }
                }
            };
            (spec.name.clone(), range)
        })
        .collect()
}

/// Percent share of each range in the total; all zeros when the total is zero.
pub fn importance_from_ranges(ranges: &IndexMap<String, f64>) -> IndexMap<String, f64> {
    let total: f64 = ranges.values().sum();
    ranges
        .iter()
        .map(|(name, r)| {
            let share = if total > 0.0 { 100.0 * r / total } else { 0.0 };
            (name.clone(), share)
        })
        .collect()
}

/// Attribute importance in percent for one fitted unit.
pub fn attribute_importance(
    design: &DesignMatrix, beta: &Theta, attributes: &AttributeSet,
) -> IndexMap<String, f64> {
    importance_from_ranges(&attribute_ranges(design, beta, attributes))
}

fn column_coefs(
    design: &DesignMatrix, beta: &Theta, pred: impl Fn(&ColumnRole) -> bool,
) -> Vec<f64> {
    design.columns.iter().zip(beta.iter()).filter(|(c, _)| pred(&c.role)).map(|(_, b)| *b).collect()
}

fn categorical_range(coefs: &[f64]) -> f64 {
    let hi = coefs.iter().copied().fold(0.0, f64::max);
    let lo = coefs.iter().copied().fold(0.0, f64::min);
    hi - lo
}

fn quadratic_range(b1: f64, b2: f64, lo: f64, hi: f64) -> f64 {
    let f = |x: f64| b1 * x + b2 * x * x;
    let mut points = vec![f(lo), f(hi)];
    if b2 != 0.0 {
        let vertex = -b1 / (2.0 * b2);
        if vertex > lo && vertex < hi {
            points.push(f(vertex));
        }
    }
    let max = points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = points.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}
