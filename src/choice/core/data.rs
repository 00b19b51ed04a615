//! Observation tables for discrete-choice data.
//!
//! Purpose
//! -------
//! Turn column-mapped raw records (one row per alternative shown in a choice
//! task) into a validated [`ChoiceData`] table: typed attribute values, a
//! boolean chosen flag, and the global [`AttributeSet`] whose level lists fix
//! the reference level of every categorical attribute.
//!
//! Key behaviors
//! -------------
//! - [`ChoiceData::from_records`] validates each row independently. Rows with
//!   a missing id, an unparseable chosen indicator, or an unusable attribute
//!   value are dropped and recorded as [`ChoiceError::MalformedRow`].
//! - Global categorical levels are collected from the kept rows and ordered
//!   by the configured [`ReferencePolicy`].
//! - Unparseable numeric values follow [`NumericPolicy`]: the row is dropped
//!   (`DropRow`, the default) or the value becomes `0.0` (`CoerceToZero`).
//!
//! Invariants & assumptions
//! ------------------------
//! - Rows of the configured "none" alternative carry no attribute values
//!   (`Observation::values == None`); every other kept row has one value per
//!   attribute, in [`AttributeSet::specs`] order.
//! - A unit whose rows were all dropped is still listed in
//!   [`ChoiceData::units`], so estimation can report it as failed.
//!
//! Conventions
//! -----------
//! - Row indices are 0-based positions in the input slice.
//! - The chosen indicator accepts `true`/`false`, `1`/`0`, and the strings
//!   `"1"`, `"0"`, `"true"`, `"false"`, `"yes"`, `"no"`.
//! - Ids are compared as trimmed text; numeric ids are formatted with
//!   `serde_json`'s number formatting.
//!
//! Testing notes
//! -------------
//! - Unit tests cover happy-path ingestion, each malformed-row cause, both
//!   numeric policies, "none" rows, and unit ordering.
use crate::choice::{
    core::attributes::{AttrValue, AttributeKind, AttributeSet, AttributeSpec, ReferencePolicy},
    errors::{ChoiceError, ChoiceResult},
};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    str::FromStr,
};

/// One raw input row, keyed by column name.
pub type Record = HashMap<String, Value>;

/// Names of the id and outcome columns in the raw records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub unit_id: String,
    pub task_id: String,
    pub alternative_id: String,
    pub chosen: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            unit_id: "respondent_id".to_string(),
            task_id: "task_id".to_string(),
            alternative_id: "alternative_id".to_string(),
            chosen: "chosen".to_string(),
        }
    }
}

/// What to do with a numeric attribute value that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericPolicy {
    #[default]
    DropRow,
    CoerceToZero,
}

impl FromStr for NumericPolicy {
    type Err = ChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "drop_row" | "drop" => Ok(NumericPolicy::DropRow),
            "coerce_to_zero" | "coerce" => Ok(NumericPolicy::CoerceToZero),
            _ => Err(ChoiceError::InvalidNumericPolicy { name: s.to_string() }),
        }
    }
}

/// Ingestion settings.
///
/// - `mapping`: id and outcome column names.
/// - `reference_policy`: how categorical reference levels are chosen.
/// - `numeric_policy`: handling of unparseable numeric values.
/// - `none_alternative`: alternative id of the "no purchase" option, if any.
/// - `competitor_alternatives`: alternative ids that receive their own ASC.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IngestOptions {
    pub mapping: ColumnMapping,
    pub reference_policy: ReferencePolicy,
    pub numeric_policy: NumericPolicy,
    pub none_alternative: Option<String>,
    pub competitor_alternatives: Vec<String>,
}

/// One validated row.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub row: usize,
    pub unit_id: String,
    pub task_id: String,
    pub alternative_id: Option<String>,
    pub chosen: bool,
    /// Attribute values in `AttributeSet::specs` order; `None` for rows of
    /// the "none" alternative.
    pub values: Option<Vec<AttrValue>>,
}

impl Observation {
    pub fn is_alternative(&self, id: &str) -> bool {
        self.alternative_id.as_deref() == Some(id)
    }
}

/// Validated observation table plus the global attribute specification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceData {
    pub attributes: AttributeSet,
    pub observations: Vec<Observation>,
    /// `MalformedRow` errors for every dropped row, in row order.
    pub dropped_rows: Vec<ChoiceError>,
    unit_order: IndexSet<String>,
}

impl ChoiceData {
    /// Validate raw records and derive the global attribute specification.
    ///
    /// Parameters
    /// ----------
    /// - `records`: raw rows, one per alternative per task.
    /// - `declared`: attribute names and kinds, in output order.
    /// - `opts`: column mapping and ingestion policies.
    ///
    /// Errors
    /// ------
    /// - [`ChoiceError::EmptyInput`] when `records` is empty.
    /// - [`ChoiceError::NoAttributes`] when `declared` is empty.
    ///
    /// Malformed rows are not errors here; they are collected in
    /// [`ChoiceData::dropped_rows`].
    pub fn from_records(
        records: &[Record], declared: &IndexMap<String, AttributeKind>, opts: &IngestOptions,
    ) -> ChoiceResult<Self> {
        if records.is_empty() {
            return Err(ChoiceError::EmptyInput);
        }
        if declared.is_empty() {
            return Err(ChoiceError::NoAttributes);
        }

        let mut unit_order: IndexSet<String> = IndexSet::new();
        let mut observations = Vec::with_capacity(records.len());
        let mut dropped_rows = Vec::new();

        for (row, record) in records.iter().enumerate() {
            if let Some(unit) = cell_text(record.get(&opts.mapping.unit_id)) {
                unit_order.insert(unit);
            }
            match parse_row(row, record, declared, opts) {
                Ok(obs) => observations.push(obs),
                Err(err) => dropped_rows.push(err),
            }
        }

        let specs = declared
            .iter()
            .enumerate()
            .map(|(j, (name, kind))| global_spec(name, *kind, j, &observations, opts.reference_policy))
            .collect();
        let attributes = AttributeSet::new(
            specs,
            opts.none_alternative.clone(),
            opts.competitor_alternatives.clone(),
        )?;

        Ok(Self { attributes, observations, dropped_rows, unit_order })
    }

    /// Unit ids in order of first appearance, including units whose rows
    /// were all dropped.
    pub fn units(&self) -> Vec<&str> {
        self.unit_order.iter().map(String::as_str).collect()
    }

    /// Kept rows grouped by unit, in [`ChoiceData::units`] order.
    pub fn unit_groups(&self) -> Vec<(&str, Vec<&Observation>)> {
        let mut groups: IndexMap<&str, Vec<&Observation>> =
            self.unit_order.iter().map(|u| (u.as_str(), Vec::new())).collect();
        for obs in &self.observations {
            groups.entry(obs.unit_id.as_str()).or_default().push(obs);
        }
        groups.into_iter().collect()
    }

    pub fn n_units(&self) -> usize {
        self.unit_order.len()
    }
}

fn malformed(row: usize, reason: impl Into<String>) -> ChoiceError {
    ChoiceError::MalformedRow { row, reason: reason.into() }
}

/// Trimmed, non-empty text of a scalar cell.
fn cell_text(cell: Option<&Value>) -> Option<String> {
    let text = match cell? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn cell_number(cell: Option<&Value>) -> Option<f64> {
    match cell? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn parse_chosen(cell: Option<&Value>) -> Option<bool> {
    match cell? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_row(
    row: usize, record: &Record, declared: &IndexMap<String, AttributeKind>, opts: &IngestOptions,
) -> ChoiceResult<Observation> {
    let mapping = &opts.mapping;
    let unit_id = cell_text(record.get(&mapping.unit_id))
        .ok_or_else(|| malformed(row, format!("missing unit id column '{}'", mapping.unit_id)))?;
    let task_id = cell_text(record.get(&mapping.task_id))
        .ok_or_else(|| malformed(row, format!("missing task id column '{}'", mapping.task_id)))?;
    let chosen = parse_chosen(record.get(&mapping.chosen))
        .ok_or_else(|| malformed(row, format!("invalid chosen indicator in '{}'", mapping.chosen)))?;
    let alternative_id = cell_text(record.get(&mapping.alternative_id));

    let is_none = match (&alternative_id, &opts.none_alternative) {
        (Some(alt), Some(none)) => alt == none,
        _ => false,
    };
    let values = if is_none {
        None
    } else {
        let mut values = Vec::with_capacity(declared.len());
        for (name, kind) in declared {
            let cell = record.get(name);
            let value = if kind.is_numeric() {
                match (cell_number(cell), opts.numeric_policy) {
                    (Some(v), _) => AttrValue::Number(v),
                    (None, NumericPolicy::CoerceToZero) => AttrValue::Number(0.0),
                    (None, NumericPolicy::DropRow) => {
                        return Err(malformed(row, format!("non-numeric value for attribute '{name}'")))
                    }
                }
            } else {
                let level = cell_text(cell)
                    .ok_or_else(|| malformed(row, format!("missing level for attribute '{name}'")))?;
                AttrValue::Level(level)
            };
            values.push(value);
        }
        Some(values)
    };

    Ok(Observation { row, unit_id, task_id, alternative_id, chosen, values })
}

fn global_spec(
    name: &str, kind: AttributeKind, j: usize, observations: &[Observation], policy: ReferencePolicy,
) -> AttributeSpec {
    let column = observations.iter().filter_map(|o| o.values.as_ref().map(|v| &v[j]));
    if kind.is_numeric() {
        AttributeSpec::numeric(name, kind, column.filter_map(AttrValue::as_number).collect())
    } else {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in column {
            *counts.entry(value.as_level()).or_insert(0) += 1;
        }
        AttributeSpec::categorical(name, policy.order_levels(&counts))
    }
}
