//! Integration tests for the conjoint estimation pipeline.
//!
//! Purpose
//! -------
//! - Validate the end-to-end path from raw column-mapped records, through
//!   ingestion, per-unit design construction and penalized conditional-logit
//!   fitting, to diagnostics, aggregation, simulation, and export.
//! - Pin the numerical contracts of the likelihood and optimizer on small
//!   designs whose answers are known in closed form.
//!
//! Coverage
//! --------
//! - `optimization::numerical_stability`: softmax shift invariance.
//! - `choice::core`: gradient vs finite differences, null log-likelihood,
//!   per-unit reference levels, degenerate attributes.
//! - `optimization::loglik_optimizer`: monotone log-likelihood path.
//! - `choice::models`: batch estimation with partial failure, the
//!   `ConjointModel` lifecycle, JSON output.
//! - `choice::diagnostics` / `choice::simulation`: importance, aggregation,
//!   market shares.
//!
//! Exclusions
//! ----------
//! - Python bindings.
//! - Option parsing and individual error variants, covered by unit tests.
use approx::assert_relative_eq;
use indexmap::IndexMap;
use ndarray::{array, Array2};
use rust_conjoint::{
    choice::{
        core::{
            attributes::{AttrValue, AttributeKind, AttributeSet, AttributeSpec},
            data::{ChoiceData, IngestOptions, Record},
            design::DesignMatrix,
            likelihood::{null_loglik, MnlLikelihood},
            options::EstimationOptions,
        },
        errors::ChoiceError,
        models::{conjoint::ConjointModel, estimation::{estimate, fit_unit}},
        simulation::market::{ProductProfile, SimulationOptions},
    },
    optimization::{
        loglik_optimizer::{finite_diff::gradient_discrepancy, maximize, MLEOptions, Theta},
        numerical_stability::stable_softmax,
    },
};
use serde_json::json;

/// Purpose
/// -------
/// Build one record with the default column names.
fn row(unit: &str, task: usize, alt: &str, chosen: bool, color: &str, price: f64) -> Record {
    serde_json::from_value(json!({
        "respondent_id": unit, "task_id": task, "alternative_id": alt,
        "chosen": chosen, "Color": color, "Price": price,
    }))
    .expect("record literal is an object")
}

fn declared() -> IndexMap<String, AttributeKind> {
    IndexMap::from([
        ("Color".to_string(), AttributeKind::Categorical),
        ("Price".to_string(), AttributeKind::Price),
    ])
}

/// Purpose
/// -------
/// Six paired tasks for one unit: Red vs Blue, with prices crossed so that
/// both attributes are identified. The unit prefers Red and cheap options
/// but not deterministically.
fn unit_rows(unit: &str) -> Vec<Record> {
    let mut rows = Vec::new();
    let plan = [
        (10.0, 20.0, true),
        (20.0, 10.0, true),
        (10.0, 20.0, true),
        (20.0, 10.0, false),
        (15.0, 15.0, true),
        (20.0, 10.0, false),
    ];
    for (t, &(red_price, blue_price, red_chosen)) in plan.iter().enumerate() {
        rows.push(row(unit, t, "A", red_chosen, "Red", red_price));
        rows.push(row(unit, t, "B", !red_chosen, "Blue", blue_price));
    }
    rows
}

#[test]
// Purpose
// -------
// Softmax is invariant to adding a constant to every utility.
//
// Given
// -----
// - `u = [1, −2, 0.5, 3]` and shifts `c ∈ {−1000, 7.5, 1000}`.
//
// Expect
// ------
// - `softmax(u) == softmax(u + c)` element-wise within 1e-12.
fn softmax_is_shift_invariant() {
    let u = array![1.0, -2.0, 0.5, 3.0];
    let base = stable_softmax(u.view());

    for c in [-1000.0, 7.5, 1000.0] {
        let shifted = stable_softmax((&u + c).view());
        for (a, b) in base.iter().zip(shifted.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}

#[test]
// Purpose
// -------
// The analytic gradient agrees with finite differences on a small design.
//
// Given
// -----
// - Three tasks of sizes 2, 3, 2 with three columns; λ = 0.5.
//
// Expect
// ------
// - Max absolute discrepancy below 1e-4.
fn gradient_matches_finite_differences() {
    // Arrange
    let x = array![
        [1.0, 0.0, 10.0],
        [0.0, 1.0, 12.0],
        [0.0, 0.0, 8.0],
        [1.0, 0.0, 11.0],
        [0.0, 1.0, 9.0],
        [1.0, 1.0, 15.0],
        [0.0, 0.0, 7.0],
    ];
    let names = vec!["Color__Green".to_string(), "Color__Red".to_string(), "Price".to_string()];
    let design = DesignMatrix::from_parts("u", x, &[2, 3, 2], vec![1, 2, 0], names).unwrap();
    let f = MnlLikelihood::new(0.5).unwrap();

    // Act
    let gap = gradient_discrepancy(&f, &array![0.4, -0.3, -0.05], &design).unwrap();

    // Assert
    assert!(gap < 1e-4, "gradient discrepancy {gap}");
}

#[test]
// Purpose
// -------
// The null log-likelihood only depends on task sizes.
//
// Given
// -----
// - Tasks of sizes 2, 3, 4.
//
// Expect
// ------
// - `ln(1/2) + ln(1/3) + ln(1/4)`.
fn null_loglik_for_sizes_two_three_four() {
    let x = Array2::from_shape_fn((9, 1), |(i, _)| i as f64);
    let design = DesignMatrix::from_parts("u", x, &[2, 3, 4], vec![0, 1, 3], vec!["Price".into()]).unwrap();

    assert_relative_eq!(
        null_loglik(&design),
        (0.5f64).ln() + (1.0f64 / 3.0).ln() + (0.25f64).ln(),
        epsilon = 1e-12
    );
}

#[test]
// Purpose
// -------
// The log-likelihood path of L-BFGS never decreases.
//
// Given
// -----
// - A binary-choice design with overlapping outcomes, λ = 0.1.
//
// Expect
// ------
// - Converged fit; every step of `ll_path` is non-decreasing.
fn lbfgs_loglik_path_is_monotone() {
    // Arrange
    let x = array![
        [1.0, 2.0],
        [0.0, 1.0],
        [1.0, -1.0],
        [0.0, 0.5],
        [1.0, 0.0],
        [0.0, 3.0],
        [1.0, 1.5],
        [0.0, -2.0],
    ];
    let design =
        DesignMatrix::from_parts("u", x, &[2, 2, 2, 2], vec![0, 1, 0, 0], vec!["a".into(), "b".into()]).unwrap();
    let f = MnlLikelihood::new(0.1).unwrap();

    // Act
    let out = maximize(&f, Theta::zeros(2), &design, &MLEOptions::default()).unwrap();

    // Assert
    assert!(out.converged);
    assert!(out.ll_path.len() >= 2);
    for w in out.ll_path.windows(2) {
        assert!(w[1] >= w[0] - 1e-12, "ll decreased: {} -> {}", w[0], w[1]);
    }
}

#[test]
// Purpose
// -------
// The 2×2 Color scenario fits to a finite coefficient with a pseudo-R² in
// `[0, 1]`.
//
// Given
// -----
// - One unit, two tasks, levels `[Red (reference), Blue]`; Blue chosen in
//   task 1 and Red in task 2.
//
// Expect
// ------
// - Only `Color__Blue` is estimated; it is finite (≈ 0 by symmetry).
// - Pseudo-R² within `[0, 1]`.
fn two_by_two_color_scenario() {
    // Arrange
    let records = vec![
        row("1", 1, "A", false, "Red", 1.0),
        row("1", 1, "B", true, "Blue", 1.0),
        row("1", 2, "A", true, "Red", 1.0),
        row("1", 2, "B", false, "Blue", 1.0),
    ];
    let kinds = IndexMap::from([("Color".to_string(), AttributeKind::Categorical)]);
    let data = ChoiceData::from_records(&records, &kinds, &IngestOptions::default()).unwrap();
    let attrs = AttributeSet::new(
        vec![AttributeSpec::categorical("Color", vec!["Red".into(), "Blue".into()])],
        None,
        Vec::new(),
    )
    .unwrap();
    let groups = data.unit_groups();
    let design = DesignMatrix::build(groups[0].0, &groups[0].1, &attrs).unwrap();

    // Act
    let fit = fit_unit(&design, &attrs, &EstimationOptions::default()).unwrap();

    // Assert
    assert_eq!(fit.coefficients.keys().collect::<Vec<_>>(), vec!["Color__Blue"]);
    let blue = fit.coefficients["Color__Blue"];
    assert!(blue.is_finite());
    assert_relative_eq!(blue, 0.0, epsilon = 1e-6);
    assert!((0.0..=1.0).contains(&fit.fit.pseudo_r2));
    assert_eq!(fit.reference_levels["Color"], "Red");
}

#[test]
// Purpose
// -------
// A unit without any valid choice fails alone; the rest of the batch is
// estimated.
//
// Given
// -----
// - Units 1 and 3 with six valid tasks each.
// - Unit 2 where no alternative is ever chosen, plus one row whose chosen
//   flag is unparseable.
//
// Expect
// ------
// - Units 1 and 3 fitted, in input order.
// - Unit 2 in `failed` with a non-empty message.
// - The unparseable row reported in `dropped_rows`.
fn batch_isolates_unit_without_choices() {
    // Arrange
    let mut records = unit_rows("1");
    for t in 0..3 {
        records.push(row("2", t, "A", false, "Red", 10.0));
        records.push(row("2", t, "B", false, "Blue", 20.0));
    }
    let bad_row = records.len();
    let mut bad: Record = row("2", 9, "A", false, "Red", 10.0);
    bad.insert("chosen".into(), json!("perhaps"));
    records.push(bad);
    records.extend(unit_rows("3"));
    let data = ChoiceData::from_records(&records, &declared(), &IngestOptions::default()).unwrap();

    // Act
    let result = estimate(&data, &EstimationOptions::default()).unwrap();

    // Assert
    let fitted: Vec<&str> = result.units.iter().map(|u| u.unit_id.as_str()).collect();
    assert_eq!(fitted, vec!["1", "3"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].unit_id, "2");
    assert!(!result.failed[0].error.is_empty());
    assert_eq!(result.dropped_rows.len(), 1);
    assert_eq!(result.dropped_rows[0].row, bad_row);
}

#[test]
// Purpose
// -------
// Reference levels carry no coefficient and aggregate to exactly zero;
// importances of every fitted unit sum to 100.
//
// Given
// -----
// - Two units with the crossed Red/Blue design (alphabetical reference
//   `Blue`).
//
// Expect
// ------
// - No `Color__Blue` coefficient on any unit.
// - Aggregate `Color__Blue` has mean, SD, min, max all 0.
// - Importances sum to 100 per unit.
fn reference_is_zero_and_importance_sums_to_100() {
    let mut records = unit_rows("a");
    records.extend(unit_rows("b"));
    let data = ChoiceData::from_records(&records, &declared(), &IngestOptions::default()).unwrap();

    let result = estimate(&data, &EstimationOptions::default()).unwrap();

    for unit in &result.units {
        assert!(unit.coefficient("Color__Blue").is_none());
        assert!(unit.coefficient("Color__Red").is_some());
        let total: f64 = unit.attribute_importance.values().sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-9);
    }
    let blue = &result.aggregate_summaries.mean_utilities["Color__Blue"];
    assert!(blue.is_reference);
    assert_eq!((blue.stats.mean, blue.stats.sd, blue.stats.min, blue.stats.max), (0.0, 0.0, 0.0, 0.0));
}

#[test]
// Purpose
// -------
// An attribute with a single observed level is skipped for that unit
// without error.
//
// Given
// -----
// - A unit that only ever sees Red, with varying prices.
//
// Expect
// ------
// - The fit succeeds with a `Price` coefficient only.
// - Color importance is 0 and Price importance 100.
fn single_observed_level_contributes_no_columns() {
    let records = vec![
        row("solo", 1, "A", true, "Red", 10.0),
        row("solo", 1, "B", false, "Red", 20.0),
        row("solo", 2, "A", false, "Red", 25.0),
        row("solo", 2, "B", true, "Red", 15.0),
        row("solo", 3, "A", false, "Red", 30.0),
        row("solo", 3, "B", true, "Red", 10.0),
    ];
    let data = ChoiceData::from_records(&records, &declared(), &IngestOptions::default()).unwrap();

    let result = estimate(&data, &EstimationOptions::default()).unwrap();

    let unit = &result.units[0];
    assert_eq!(unit.coefficients.keys().collect::<Vec<_>>(), vec!["Price"]);
    assert!(unit.coefficients["Price"] < 0.0);
    assert_eq!(unit.attribute_importance.get("Color").copied().unwrap_or(0.0), 0.0);
    assert_relative_eq!(unit.attribute_importance["Price"], 100.0, epsilon = 1e-9);
}

#[test]
// Purpose
// -------
// The orchestrator runs the full pipeline and its outputs agree.
//
// Given
// -----
// - Three units with the crossed design; a Red-vs-Blue simulation at equal
//   prices.
//
// Expect
// ------
// - Red gets the larger share; shares sum to 100.
// - CSV has one row per unit plus the header; JSON uses `respondents`.
// - A batch where every unit fails returns `NoUnitsEstimated`.
fn conjoint_model_end_to_end() {
    // Arrange
    let mut records = Vec::new();
    for unit in ["x", "y", "z"] {
        records.extend(unit_rows(unit));
    }
    let mut model =
        ConjointModel::from_records(&records, &declared(), &IngestOptions::default(), EstimationOptions::default())
            .unwrap();
    let product = |name: &str, color: &str| {
        ProductProfile::own(
            name,
            IndexMap::from([
                ("Color".to_string(), AttrValue::Level(color.into())),
                ("Price".to_string(), AttrValue::Number(15.0)),
            ]),
        )
    };

    // Act
    model.fit().unwrap();
    let sim = model.simulate(&[product("red", "Red"), product("blue", "Blue")], &SimulationOptions::default()).unwrap();
    let csv = model.coefficients_csv().unwrap();
    let json = model.results().unwrap().to_json().unwrap();

    // Assert
    assert!(sim.products[0].share > sim.products[1].share);
    assert_relative_eq!(sim.products.iter().map(|p| p.share).sum::<f64>(), 100.0, epsilon = 1e-9);
    assert_eq!(csv.lines().count(), 4);
    assert!(json.contains("\"respondents\""));

    let never_chosen: Vec<Record> = (0..2)
        .flat_map(|t| vec![row("q", t, "A", false, "Red", 1.0), row("q", t, "B", false, "Blue", 2.0)])
        .collect();
    let data = ChoiceData::from_records(&never_chosen, &declared(), &IngestOptions::default()).unwrap();
    assert_eq!(
        estimate(&data, &EstimationOptions::default()).unwrap_err(),
        ChoiceError::NoUnitsEstimated { failed: 1 }
    );
}
