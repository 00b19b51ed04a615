//! Segmentation of fitted units by k-means on their part-worths.
//!
//! Purpose
//! -------
//! Group units with similar preferences and describe each group. Every unit
//! is represented by its non-ASC coefficients over the union of coefficient
//! names (missing coefficients count as 0); features are z-scored before
//! clustering so that attributes on different scales weigh equally.
//!
//! Key behaviors
//! -------------
//! - Standardization uses the population SD; a constant feature uses SD 1.
//! - Initial centroids are `k` distinct units drawn with a seeded
//!   [`StdRng`], so identical inputs and seeds give identical segments.
//! - Lloyd iterations stop when no assignment changes or after `max_iter`.
//!   An empty cluster keeps its previous centroid.
//! - Segment profiles are reported on the raw (unstandardized) scale.
//!
//! Invariants & assumptions
//! ------------------------
//! - `1 <= k <= n_units`; anything else is `InvalidSegmentCount`.
//! - Segment ids are `0..k`; `assignments` follows the input unit order.
use crate::choice::{
    core::attributes::AttributeSet,
    diagnostics::aggregate::CoefficientStats,
    errors::{ChoiceError, ChoiceResult},
    models::results::UnitFit,
};
use indexmap::IndexMap;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeSet;

pub const DEFAULT_MAX_ITER: usize = 100;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationOptions {
    pub k: usize,
    pub max_iter: usize,
    pub seed: u64,
}

impl SegmentationOptions {
    /// Errors
    /// ------
    /// - [`ChoiceError::InvalidOption`] when `k == 0` or `max_iter == 0`.
    pub fn new(k: usize, max_iter: usize, seed: u64) -> ChoiceResult<Self> {
        if k == 0 {
            return Err(ChoiceError::InvalidOption {
                name: "k",
                reason: "must be greater than zero".to_string(),
            });
        }
        if max_iter == 0 {
            return Err(ChoiceError::InvalidOption {
                name: "max_iter",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Self { k, max_iter, seed })
    }

    /// `k` segments with the default iteration cap and seed.
    pub fn with_k(k: usize) -> ChoiceResult<Self> {
        Self::new(k, DEFAULT_MAX_ITER, DEFAULT_SEED)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub id: usize,
    pub size: usize,
    pub members: Vec<String>,
    pub mean_importance: IndexMap<String, f64>,
    pub coefficients: IndexMap<String, CoefficientStats>,
    /// Attribute with the highest mean importance.
    pub top_attribute: Option<String>,
    pub mean_price_coefficient: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationResult {
    pub segments: Vec<Segment>,
    /// Segment id per unit, in input order.
    pub assignments: IndexMap<String, usize>,
    pub feature_names: Vec<String>,
    pub iterations: usize,
    pub converged: bool,
    /// Within-cluster sum of squares on the standardized scale.
    pub inertia: f64,
}

/// Raw k-means solution on a feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub assignments: Vec<usize>,
    pub centroids: Array2<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub inertia: f64,
}

/// Non-ASC coefficient matrix `(n_units × n_features)` and its column names.
///
/// Columns are the sorted union of coefficient names; a unit without a
/// coefficient contributes 0.
pub fn feature_matrix(units: &[UnitFit]) -> (Vec<String>, Array2<f64>) {
    let names: Vec<String> = units
        .iter()
        .flat_map(|u| u.attribute_coefficients().map(|(k, _)| k.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let x = Array2::from_shape_fn((units.len(), names.len()), |(i, j)| {
        units[i].coefficient(&names[j]).unwrap_or(0.0)
    });
    (names, x)
}

/// Z-score each column in place (population SD, 1 when the SD is 0).
pub fn standardize(x: &mut Array2<f64>) {
    for mut col in x.axis_iter_mut(Axis(1)) {
        let values = col.to_vec();
        let mean = Statistics::mean(&values);
        let sd = Statistics::population_std_dev(&values);
        let sd = if sd > 0.0 && sd.is_finite() { sd } else { 1.0 };
        col.mapv_inplace(|v| (v - mean) / sd);
    }
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(row: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    centroids
        .outer_iter()
        .map(|c| squared_distance(row, c))
        .enumerate()
        .fold((0, f64::INFINITY), |best, (j, d)| if d < best.1 { (j, d) } else { best })
}

/// Lloyd's algorithm with seeded, distinct initial centroids.
///
/// Errors
/// ------
/// - [`ChoiceError::InvalidSegmentCount`] unless `1 <= k <= x.nrows()`.
/// - [`ChoiceError::InvalidOption`] when `max_iter == 0`.
pub fn kmeans(x: ArrayView2<'_, f64>, k: usize, max_iter: usize, seed: u64) -> ChoiceResult<KMeansFit> {
    let n = x.nrows();
    if k == 0 || k > n {
        return Err(ChoiceError::InvalidSegmentCount { k, n_units: n });
    }
    // Every point needs at least one assignment pass.
    if max_iter == 0 {
        return Err(ChoiceError::InvalidOption {
            name: "max_iter",
            reason: "must be greater than zero".to_string(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let init = rand::seq::index::sample(&mut rng, n, k).into_vec();
    let mut centroids = x.select(Axis(0), &init);
    let mut assignments = vec![usize::MAX; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iter {
        iterations += 1;
        let mut changed = false;
        for (i, row) in x.outer_iter().enumerate() {
            let (j, _) = nearest(row, &centroids);
            if assignments[i] != j {
                assignments[i] = j;
                changed = true;
            }
        }
        if !changed {
            converged = true;
            break;
        }

        for (j, mut centroid) in centroids.outer_iter_mut().enumerate() {
            let members: Vec<usize> = (0..n).filter(|&i| assignments[i] == j).collect();
            if members.is_empty() {
                continue;
            }
            let sum = members.iter().fold(Array1::<f64>::zeros(x.ncols()), |acc, &i| acc + x.row(i));
            centroid.assign(&(sum / members.len() as f64));
        }
    }

    let inertia = x
        .outer_iter()
        .zip(&assignments)
        .map(|(row, &j)| squared_distance(row, centroids.row(j)))
        .sum();
    Ok(KMeansFit { assignments, centroids, iterations, converged, inertia })
}

/// Cluster fitted units and profile each segment.
///
/// Errors
/// ------
/// - [`ChoiceError::NoUnitsEstimated`] when `units` is empty.
/// - [`ChoiceError::InvalidSegmentCount`] when `opts.k > units.len()`.
pub fn segment_units(
    units: &[UnitFit], attributes: &AttributeSet, opts: &SegmentationOptions,
) -> ChoiceResult<SegmentationResult> {
    if units.is_empty() {
        return Err(ChoiceError::NoUnitsEstimated { failed: 0 });
    }
    let (feature_names, raw) = feature_matrix(units);
    let mut z = raw.clone();
    standardize(&mut z);
    let fit = kmeans(z.view(), opts.k, opts.max_iter, opts.seed)?;

    let segments = (0..opts.k)
        .map(|id| {
            let rows: Vec<usize> = (0..units.len()).filter(|&i| fit.assignments[i] == id).collect();
            profile_segment(id, &rows, units, &raw, &feature_names, attributes)
        })
        .collect();
    let assignments = units.iter().zip(&fit.assignments).map(|(u, &j)| (u.unit_id.clone(), j)).collect();

    Ok(SegmentationResult {
        segments,
        assignments,
        feature_names,
        iterations: fit.iterations,
        converged: fit.converged,
        inertia: fit.inertia,
    })
}

fn profile_segment(
    id: usize, rows: &[usize], units: &[UnitFit], raw: &Array2<f64>, feature_names: &[String],
    attributes: &AttributeSet,
) -> Segment {
    let members: Vec<&UnitFit> = rows.iter().map(|&i| &units[i]).collect();

    let mean_importance: IndexMap<String, f64> = attributes
        .specs
        .iter()
        .map(|spec| {
            let values: Vec<f64> =
                members.iter().filter_map(|u| u.attribute_importance.get(&spec.name).copied()).collect();
            let mean = if values.is_empty() { 0.0 } else { Statistics::mean(&values) };
            (spec.name.clone(), mean)
        })
        .collect();
    let top_attribute = mean_importance
        .iter()
        .fold(None::<(&String, f64)>, |best, (name, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((name, v)),
        })
        .map(|(name, _)| name.clone());

    let coefficients = feature_names
        .iter()
        .enumerate()
        .filter_map(|(j, name)| {
            let values: Vec<f64> = rows.iter().map(|&i| raw[[i, j]]).collect();
            CoefficientStats::from_values(&values).map(|stats| (name.clone(), stats))
        })
        .collect();

    let mean_price_coefficient = attributes.price_attribute().and_then(|spec| {
        let values: Vec<f64> = members.iter().filter_map(|u| u.coefficient(&spec.name)).collect();
        (!values.is_empty()).then(|| Statistics::mean(&values))
    });

    Segment {
        id,
        size: members.len(),
        members: members.iter().map(|u| u.unit_id.clone()).collect(),
        mean_importance,
        coefficients,
        top_attribute,
        mean_price_coefficient,
    }
}
