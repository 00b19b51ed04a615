//! Design-matrix construction for conditional-logit estimation.
//!
//! Purpose
//! -------
//! Convert the rows of one estimation unit into a dense `(n_obs × k)` design
//! matrix `X`, the index of the chosen alternative within every task, the
//! task sizes, and named columns.
//!
//! Key behaviors
//! -------------
//! - Rows are grouped into tasks by `(unit_id, task_id)` in first-appearance
//!   order; each task occupies a contiguous block of rows in `X`.
//! - Tasks without exactly one chosen alternative, or with fewer than two
//!   alternatives, are skipped and recorded in
//!   [`DesignMatrix::skipped_tasks`].
//! - Categorical attributes get one dummy column per **observed** non-reference
//!   level. The unit's reference is the first observed level in global order,
//!   so it equals the global reference whenever the unit saw that level. An
//!   attribute with at most one observed level gets no columns.
//! - `numeric_linear` and `price` add one raw-value column; `numeric_quadratic`
//!   adds the raw value and its square.
//! - A configured "none" alternative adds an `ASC_None` indicator; each
//!   configured competitor alternative adds `ASC_Competitor_{id}`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `task_offsets` has `n_tasks + 1` entries, starts at 0 and ends at
//!   `x.nrows()`; every task spans at least two rows.
//! - `chosen[t] < task_size(t)` for every task.
//! - Rows of the "none" alternative have zeros in every attribute column.
//!
//! Testing notes
//! -------------
//! - Unit tests cover column layout per attribute kind, degenerate
//!   attributes, per-unit reference selection, skipped tasks, ASC columns,
//!   and the empty-design error.
use crate::choice::{
    core::{
        attributes::{
            competitor_key, level_key, quadratic_key, AttributeKind, AttributeSet, ASC_NONE,
        },
        data::Observation,
    },
    errors::{ChoiceError, ChoiceResult},
};
use indexmap::IndexMap;
use ndarray::Array2;
use serde::Serialize;

/// What a design column encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ColumnRole {
    Level { attribute: String, level: String },
    Linear { attribute: String },
    Quadratic { attribute: String },
    NoneAsc,
    CompetitorAsc { alternative: String },
    /// Column supplied directly through [`DesignMatrix::from_parts`].
    Raw,
}

impl ColumnRole {
    /// Attribute the column belongs to; `None` for ASC and raw columns.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            ColumnRole::Level { attribute, .. }
            | ColumnRole::Linear { attribute }
            | ColumnRole::Quadratic { attribute } => Some(attribute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesignColumn {
    pub name: String,
    #[serde(flatten)]
    pub role: ColumnRole,
}

/// A task dropped during design construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub unit_id: String,
    pub task_id: String,
    pub reason: String,
}

/// Design matrix of one estimation unit.
///
/// - `x`: `(n_obs × k)` attribute encodings, tasks stacked contiguously.
/// - `task_offsets`: row where each task starts, plus a final `n_obs`.
/// - `chosen`: index of the chosen alternative within each task.
/// - `task_ids`: task id per task.
/// - `columns`: name and role per column of `x`.
/// - `reference_levels`: the unit's reference level per categorical
///   attribute with at least one observed level.
/// - `numeric_ranges`: observed `(min, max)` per numeric attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub unit_id: String,
    pub x: Array2<f64>,
    pub task_offsets: Vec<usize>,
    pub chosen: Vec<usize>,
    pub task_ids: Vec<String>,
    pub columns: Vec<DesignColumn>,
    pub reference_levels: IndexMap<String, String>,
    pub numeric_ranges: IndexMap<String, (f64, f64)>,
    pub skipped_tasks: Vec<SkippedTask>,
}

impl DesignMatrix {
    /// Build the design matrix for `unit_id` from its rows.
    ///
    /// Errors
    /// ------
    /// - [`ChoiceError::EmptyDesign`] when no valid task remains or no
    ///   estimable column exists.
    pub fn build(
        unit_id: &str, rows: &[&Observation], attributes: &AttributeSet,
    ) -> ChoiceResult<Self> {
        let empty = |reason: &str| ChoiceError::EmptyDesign {
            unit_id: unit_id.to_string(),
            reason: reason.to_string(),
        };
        if rows.is_empty() {
            return Err(empty("no valid rows"));
        }

        let mut tasks: IndexMap<(&str, &str), Vec<&Observation>> = IndexMap::new();
        for obs in rows {
            tasks.entry((obs.unit_id.as_str(), obs.task_id.as_str())).or_default().push(obs);
        }

        let mut kept: Vec<(&str, Vec<&Observation>, usize)> = Vec::with_capacity(tasks.len());
        let mut skipped_tasks = Vec::new();
        for ((owner, task_id), alternatives) in tasks {
            let n_chosen = alternatives.iter().filter(|o| o.chosen).count();
            let reason = if alternatives.len() < 2 {
                Some("fewer than two alternatives".to_string())
            } else if n_chosen != 1 {
                Some(format!("{n_chosen} alternatives marked chosen"))
            } else {
                None
            };
            match reason {
                Some(reason) => skipped_tasks.push(SkippedTask {
                    unit_id: owner.to_string(),
                    task_id: task_id.to_string(),
                    reason,
                }),
                None => {
                    let chosen = alternatives.iter().position(|o| o.chosen).unwrap_or(0);
                    kept.push((task_id, alternatives, chosen));
                }
            }
        }
        if kept.is_empty() {
            return Err(empty("no task with exactly one chosen alternative"));
        }

        let kept_rows: Vec<&Observation> =
            kept.iter().flat_map(|(_, alts, _)| alts.iter().copied()).collect();
        let layout = ColumnLayout::new(&kept_rows, attributes);
        if layout.columns.is_empty() {
            return Err(empty("no estimable columns"));
        }

        let k = layout.columns.len();
        let mut x = Array2::<f64>::zeros((kept_rows.len(), k));
        for (i, obs) in kept_rows.iter().enumerate() {
            let mut row = x.row_mut(i);
            for (c, column) in layout.columns.iter().enumerate() {
                row[c] = encode(obs, &column.role, attributes);
            }
        }

        let mut task_offsets = Vec::with_capacity(kept.len() + 1);
        let mut chosen = Vec::with_capacity(kept.len());
        let mut task_ids = Vec::with_capacity(kept.len());
        let mut offset = 0;
        for (task_id, alternatives, c) in &kept {
            task_offsets.push(offset);
            offset += alternatives.len();
            chosen.push(*c);
            task_ids.push(task_id.to_string());
        }
        task_offsets.push(offset);

        Ok(Self {
            unit_id: unit_id.to_string(),
            x,
            task_offsets,
            chosen,
            task_ids,
            columns: layout.columns,
            reference_levels: layout.reference_levels,
            numeric_ranges: layout.numeric_ranges,
            skipped_tasks,
        })
    }

    /// Assemble a design from an explicit matrix and task layout.
    ///
    /// Errors
    /// ------
    /// - [`ChoiceError::DimensionMismatch`] when sizes, choices, or names do
    ///   not fit `x`.
    /// - [`ChoiceError::EmptyDesign`] when `x` has no rows or no columns.
    pub fn from_parts(
        unit_id: &str, x: Array2<f64>, task_sizes: &[usize], chosen: Vec<usize>,
        names: Vec<String>,
    ) -> ChoiceResult<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ChoiceError::EmptyDesign {
                unit_id: unit_id.to_string(),
                reason: "empty matrix".to_string(),
            });
        }
        let total: usize = task_sizes.iter().sum();
        if total != x.nrows() {
            return Err(ChoiceError::DimensionMismatch {
                what: "task sizes",
                expected: x.nrows(),
                found: total,
            });
        }
        if names.len() != x.ncols() {
            return Err(ChoiceError::DimensionMismatch {
                what: "column names",
                expected: x.ncols(),
                found: names.len(),
            });
        }
        if chosen.len() != task_sizes.len() {
            return Err(ChoiceError::DimensionMismatch {
                what: "chosen indices",
                expected: task_sizes.len(),
                found: chosen.len(),
            });
        }
        if let Some((&size, &c)) = task_sizes.iter().zip(&chosen).find(|&(&s, &c)| c >= s) {
            return Err(ChoiceError::DimensionMismatch {
                what: "chosen index within task",
                expected: size,
                found: c,
            });
        }

        let mut task_offsets = Vec::with_capacity(task_sizes.len() + 1);
        let mut offset = 0;
        for size in task_sizes {
            task_offsets.push(offset);
            offset += size;
        }
        task_offsets.push(offset);

        Ok(Self {
            unit_id: unit_id.to_string(),
            x,
            task_offsets,
            task_ids: (0..chosen.len()).map(|t| t.to_string()).collect(),
            chosen,
            columns: names
                .into_iter()
                .map(|name| DesignColumn { name, role: ColumnRole::Raw })
                .collect(),
            reference_levels: IndexMap::new(),
            numeric_ranges: IndexMap::new(),
            skipped_tasks: Vec::new(),
        })
    }

    pub fn n_tasks(&self) -> usize {
        self.chosen.len()
    }

    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.x.ncols()
    }

    /// Row range `[start, end)` of task `t`.
    pub fn task_range(&self, t: usize) -> (usize, usize) {
        (self.task_offsets[t], self.task_offsets[t + 1])
    }

    pub fn task_sizes(&self) -> Vec<usize> {
        self.task_offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

struct ColumnLayout {
    columns: Vec<DesignColumn>,
    reference_levels: IndexMap<String, String>,
    numeric_ranges: IndexMap<String, (f64, f64)>,
}

impl ColumnLayout {
    fn new(rows: &[&Observation], attributes: &AttributeSet) -> Self {
        let mut columns = Vec::new();
        let mut reference_levels = IndexMap::new();
        let mut numeric_ranges = IndexMap::new();

        for (j, spec) in attributes.specs.iter().enumerate() {
            let values = rows.iter().filter_map(|o| o.values.as_ref().map(|v| &v[j]));
            match spec.kind {
                AttributeKind::Categorical => {
                    let seen: Vec<String> = values.map(|v| v.as_level()).collect();
                    let observed: Vec<&String> =
                        spec.levels.iter().filter(|l| seen.contains(l)).collect();
                    if let Some(reference) = observed.first() {
                        reference_levels.insert(spec.name.clone(), (*reference).clone());
                    }
                    for level in observed.iter().skip(1) {
                        columns.push(DesignColumn {
                            name: level_key(&spec.name, level),
                            role: ColumnRole::Level {
                                attribute: spec.name.clone(),
                                level: (*level).clone(),
                            },
                        });
                    }
                }
                kind => {
                    let (lo, hi) = values
                        .filter_map(|v| v.as_number())
                        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                            (lo.min(v), hi.max(v))
                        });
                    if lo <= hi {
                        numeric_ranges.insert(spec.name.clone(), (lo, hi));
                    }
                    columns.push(DesignColumn {
                        name: spec.name.clone(),
                        role: ColumnRole::Linear { attribute: spec.name.clone() },
                    });
                    if kind == AttributeKind::NumericQuadratic {
                        columns.push(DesignColumn {
                            name: quadratic_key(&spec.name),
                            role: ColumnRole::Quadratic { attribute: spec.name.clone() },
                        });
                    }
                }
            }
        }

        if attributes.none_alternative.is_some() {
            columns.push(DesignColumn { name: ASC_NONE.to_string(), role: ColumnRole::NoneAsc });
        }
        for alternative in &attributes.competitor_alternatives {
            columns.push(DesignColumn {
                name: competitor_key(alternative),
                role: ColumnRole::CompetitorAsc { alternative: alternative.clone() },
            });
        }

        Self { columns, reference_levels, numeric_ranges }
    }
}

fn encode(obs: &Observation, role: &ColumnRole, attributes: &AttributeSet) -> f64 {
    let value_of = |attribute: &str| {
        let j = attributes.position(attribute)?;
        obs.values.as_ref().map(|v| &v[j])
    };
    match role {
        ColumnRole::Level { attribute, level } => match value_of(attribute) {
            Some(v) if v.as_level() == *level => 1.0,
            _ => 0.0,
        },
        ColumnRole::Linear { attribute } => {
            value_of(attribute).and_then(|v| v.as_number()).unwrap_or(0.0)
        }
        ColumnRole::Quadratic { attribute } => {
            value_of(attribute).and_then(|v| v.as_number()).map_or(0.0, |v| v * v)
        }
        ColumnRole::NoneAsc => match &attributes.none_alternative {
            Some(none) if obs.is_alternative(none) => 1.0,
            _ => 0.0,
        },
        ColumnRole::CompetitorAsc { alternative } => {
            if obs.is_alternative(alternative) {
                1.0
            } else {
                0.0
            }
        }
        ColumnRole::Raw => 0.0,
    }
}
