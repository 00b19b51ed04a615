//! Per-unit and batch conditional-logit estimation.
//!
//! Purpose
//! -------
//! Fit one L2-penalized conditional logit per estimation unit (or a single
//! pooled model), collect fit diagnostics, and isolate per-unit failures so
//! a batch always completes.
//!
//! Key behaviors
//! -------------
//! - [`fit_unit`] starts the optimizer at β = 0 and never treats
//!   non-convergence as an error; the flag travels in [`Convergence`].
//! - [`estimate`] builds a design per unit, fits it, and records any
//!   `EmptyDesign` or optimizer error as a [`FailedUnit`]. Only a batch in
//!   which no unit succeeds is an error (`NoUnitsEstimated`).
//! - With `EstimationOptions::parallel`, units are fitted on the rayon pool;
//!   results keep the input unit order either way.
//!
//! Conventions
//! -----------
//! - Logging goes through `tracing`: `debug!` per fitted unit, `warn!` for
//!   dropped rows, non-converged fits and failed units, `info!` for the
//!   batch summary.
use crate::{
    choice::{
        core::{
            attributes::AttributeSet,
            data::{ChoiceData, Observation},
            design::DesignMatrix,
            likelihood::{null_loglik, pseudo_r2, unpenalized_loglik, MnlLikelihood},
            options::{EstimationOptions, EstimationScope, POOLED_UNIT_ID},
        },
        diagnostics::{aggregate::aggregate, importance::attribute_importance},
        errors::{ChoiceError, ChoiceResult},
        models::results::{
            Convergence, DroppedRow, EstimationResult, FailedUnit, FitStatistics, UnitFit,
        },
    },
    optimization::loglik_optimizer::{maximize, OptimOutcome, Theta},
};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fit one unit's design matrix.
///
/// Errors
/// ------
/// - [`ChoiceError::InvalidRegularization`] for a bad `reg_strength`.
/// - [`ChoiceError::Optimization`] when the optimizer fails outright (for
///   example a non-finite objective); non-convergence is not an error.
pub fn fit_unit(
    design: &DesignMatrix, attributes: &AttributeSet, opts: &EstimationOptions,
) -> ChoiceResult<UnitFit> {
    let likelihood = MnlLikelihood::new(opts.reg_strength)?;
    let theta0 = Theta::zeros(design.n_columns());
    let outcome = maximize(&likelihood, theta0, design, &opts.mle_opts)?;
    Ok(summarize(design, attributes, &outcome))
}

fn summarize(design: &DesignMatrix, attributes: &AttributeSet, outcome: &OptimOutcome) -> UnitFit {
    let beta = &outcome.theta_hat;
    let log_likelihood = unpenalized_loglik(beta, design);
    let null_log_likelihood = null_loglik(design);

    UnitFit {
        unit_id: design.unit_id.clone(),
        coefficients: design
            .columns
            .iter()
            .map(|c| c.name.clone())
            .zip(beta.iter().copied())
            .collect(),
        attribute_importance: attribute_importance(design, beta, attributes),
        reference_levels: design.reference_levels.clone(),
        fit: FitStatistics {
            log_likelihood,
            penalized_log_likelihood: outcome.value,
            null_log_likelihood,
            pseudo_r2: pseudo_r2(log_likelihood, null_log_likelihood),
            n_tasks: design.n_tasks(),
            n_observations: design.n_obs(),
        },
        convergence: Convergence {
            converged: outcome.converged,
            method: outcome.method,
            iterations: outcome.iterations,
            status: outcome.status.clone(),
            grad_norm: outcome.grad_norm,
        },
    }
}

/// Estimation units: `(unit_id, rows)` in input order.
fn estimation_units(data: &ChoiceData, scope: EstimationScope) -> Vec<(&str, Vec<&Observation>)> {
    match scope {
        EstimationScope::PerUnit => data.unit_groups(),
        EstimationScope::Pooled => vec![(POOLED_UNIT_ID, data.observations.iter().collect())],
    }
}

type UnitOutcome = ChoiceResult<(UnitFit, DesignMatrix)>;

/// Fit every unit of `data` and summarize the batch.
///
/// Errors
/// ------
/// - [`ChoiceError::InvalidRegularization`] for a bad `reg_strength`.
/// - [`ChoiceError::NoUnitsEstimated`] when every unit failed.
pub fn estimate(data: &ChoiceData, opts: &EstimationOptions) -> ChoiceResult<EstimationResult> {
    MnlLikelihood::new(opts.reg_strength)?;
    let start = Instant::now();

    for err in &data.dropped_rows {
        warn!(error = %err, "dropped malformed row");
    }

    let groups = estimation_units(data, opts.scope);
    let fit_one = |(unit_id, rows): &(&str, Vec<&Observation>)| -> UnitOutcome {
        let design = DesignMatrix::build(unit_id, rows, &data.attributes)?;
        let fit = fit_unit(&design, &data.attributes, opts)?;
        Ok((fit, design))
    };
    let outcomes: Vec<UnitOutcome> = if opts.parallel {
        groups.par_iter().map(fit_one).collect()
    } else {
        groups.iter().map(fit_one).collect()
    };

    let mut units = Vec::with_capacity(outcomes.len());
    let mut failed = Vec::new();
    let mut skipped_tasks = Vec::new();
    for ((unit_id, _), outcome) in groups.iter().zip(outcomes) {
        match outcome {
            Ok((fit, design)) => {
                debug!(
                    unit_id = %fit.unit_id,
                    log_likelihood = fit.fit.log_likelihood,
                    pseudo_r2 = fit.fit.pseudo_r2,
                    iterations = fit.convergence.iterations,
                    method = %fit.convergence.method,
                    "fitted unit"
                );
                if !fit.convergence.converged {
                    warn!(
                        unit_id = %fit.unit_id,
                        status = %fit.convergence.status,
                        "unit did not converge"
                    );
                }
                for task in &design.skipped_tasks {
                    warn!(
                        unit_id = %task.unit_id,
                        task_id = %task.task_id,
                        reason = %task.reason,
                        "skipped task"
                    );
                }
                skipped_tasks.extend(design.skipped_tasks);
                units.push(fit);
            }
            Err(err) => {
                warn!(unit_id = %unit_id, error = %err, "unit estimation failed");
                failed.push(FailedUnit { unit_id: unit_id.to_string(), error: err.to_string() });
            }
        }
    }

    if units.is_empty() {
        return Err(ChoiceError::NoUnitsEstimated { failed: failed.len() });
    }

    let n = units.len() as f64;
    let mean_pseudo_r2 = units.iter().map(|u| u.fit.pseudo_r2).sum::<f64>() / n;
    let mean_tasks_per_unit = units.iter().map(|u| u.fit.n_tasks as f64).sum::<f64>() / n;
    let aggregate_summaries = aggregate(&units, &data.attributes);
    let estimation_time_seconds = start.elapsed().as_secs_f64();

    info!(
        fitted = units.len(),
        failed = failed.len(),
        dropped_rows = data.dropped_rows.len(),
        mean_pseudo_r2,
        seconds = estimation_time_seconds,
        "estimation finished"
    );

    Ok(EstimationResult {
        units,
        failed,
        aggregate_summaries,
        mean_pseudo_r2,
        mean_tasks_per_unit,
        estimation_time_seconds,
        dropped_rows: data.dropped_rows.iter().filter_map(DroppedRow::from_error).collect(),
        skipped_tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::core::{
        attributes::AttributeKind,
        data::{IngestOptions, Record},
    };
    use crate::optimization::loglik_optimizer::OptimMethod;
    use indexmap::IndexMap;
    use serde_json::json;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Single-unit fits: coefficient naming, fit statistics, convergence.
    // - Batch isolation of failing units and the all-failed error.
    // - Sequential and parallel runs producing identical output.
    // - Pooled scope.
    // -------------------------------------------------------------------------

    /// Two-attribute tasks; the unit mostly picks `Red`, every third task `Blue`.
    fn records_for(unit: &str, n_tasks: usize) -> Vec<Record> {
        let mut out = Vec::new();
        for t in 0..n_tasks {
            let red_first = t % 2 == 0;
            let price_a = 10 + 5 * (t % 3);
            let price_b = 20 - 5 * (t % 3);
            let (color_a, color_b) = if red_first { ("Red", "Blue") } else { ("Blue", "Red") };
            let a_wins = red_first != (t % 3 == 2);
            for (alt, color, price, chosen) in
                [("A", color_a, price_a, a_wins), ("B", color_b, price_b, !a_wins)]
            {
                out.push(
                    serde_json::from_value(json!({
                        "respondent_id": unit, "task_id": t, "alternative_id": alt,
                        "chosen": chosen, "Color": color, "Price": price
                    }))
                    .unwrap(),
                );
            }
        }
        out
    }

    fn declared() -> IndexMap<String, AttributeKind> {
        IndexMap::from([
            ("Color".to_string(), AttributeKind::Categorical),
            ("Price".to_string(), AttributeKind::Price),
        ])
    }

    #[test]
    // Purpose
    // -------
    // A single unit fits with named coefficients and consistent statistics.
    //
    // Given
    // -----
    // - Eight tasks for unit `r1`, default options.
    //
    // Expect
    // ------
    // - Coefficients `[Color__Red, Price]`, L-BFGS convergence.
    // - `ll ≥ null ll`, pseudo-R² in `[0, 1)`, importance summing to 100.
    fn fit_unit_reports_statistics() {
        // Arrange
        let data = ChoiceData::from_records(&records_for("r1", 8), &declared(), &IngestOptions::default())
            .unwrap();
        let rows: Vec<&Observation> = data.observations.iter().collect();
        let design = DesignMatrix::build("r1", &rows, &data.attributes).unwrap();

        // Act
        let fit = fit_unit(&design, &data.attributes, &EstimationOptions::default()).unwrap();

        // Assert
        assert_eq!(fit.coefficients.keys().collect::<Vec<_>>(), vec!["Color__Red", "Price"]);
        assert!(fit.convergence.converged);
        assert_eq!(fit.convergence.method, OptimMethod::Lbfgs);
        assert!(fit.fit.log_likelihood >= fit.fit.null_log_likelihood);
        assert!((0.0..1.0).contains(&fit.fit.pseudo_r2));
        assert!(fit.fit.penalized_log_likelihood <= fit.fit.log_likelihood);
        assert_eq!(fit.fit.n_tasks, 8);
        assert_eq!(fit.fit.n_observations, 16);
        let total: f64 = fit.attribute_importance.values().sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // A failing unit is recorded and the rest of the batch succeeds.
    //
    // Given
    // -----
    // - Units `a` and `c` with valid tasks; unit `b` whose tasks have no
    //   chosen alternative.
    //
    // Expect
    // ------
    // - Two fitted units in order `[a, c]`; `b` in `failed` with a
    //   non-empty message.
    fn estimate_isolates_failed_units() {
        // Arrange
        let mut records = records_for("a", 6);
        for t in 0..2 {
            for alt in ["A", "B"] {
                records.push(
                    serde_json::from_value(json!({
                        "respondent_id": "b", "task_id": t, "alternative_id": alt,
                        "chosen": 0, "Color": "Red", "Price": 10
                    }))
                    .unwrap(),
                );
            }
        }
        records.extend(records_for("c", 6));
        let data = ChoiceData::from_records(&records, &declared(), &IngestOptions::default()).unwrap();

        // Act
        let result = estimate(&data, &EstimationOptions::default()).unwrap();

        // Assert
        let ids: Vec<&str> = result.units.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].unit_id, "b");
        assert!(!result.failed[0].error.is_empty());
        assert_eq!(result.mean_tasks_per_unit, 6.0);
    }

    #[test]
    // Purpose
    // -------
    // A batch where every unit fails is a single error.
    //
    // Given
    // -----
    // - One unit whose only task has two chosen alternatives.
    //
    // Expect
    // ------
    // - `NoUnitsEstimated { failed: 1 }`.
    fn estimate_errors_when_nothing_fits() {
        let records: Vec<Record> = ["A", "B"]
            .iter()
            .map(|alt| {
                serde_json::from_value(json!({
                    "respondent_id": 1, "task_id": 1, "alternative_id": alt,
                    "chosen": 1, "Color": "Red", "Price": 1
                }))
                .unwrap()
            })
            .collect();
        let data = ChoiceData::from_records(&records, &declared(), &IngestOptions::default()).unwrap();

        let err = estimate(&data, &EstimationOptions::default()).unwrap_err();

        assert_eq!(err, ChoiceError::NoUnitsEstimated { failed: 1 });
    }

    #[test]
    // Purpose
    // -------
    // Parallel estimation returns the same units, in the same order, with
    // the same coefficients as the sequential run.
    //
    // Given
    // -----
    // - Four units of eight tasks each.
    //
    // Expect
    // ------
    // - Identical unit ids and coefficient maps.
    fn parallel_matches_sequential() {
        // Arrange
        let records: Vec<Record> = ["u1", "u2", "u3", "u4"].iter().flat_map(|u| records_for(u, 8)).collect();
        let data = ChoiceData::from_records(&records, &declared(), &IngestOptions::default()).unwrap();
        let sequential = EstimationOptions::default();
        let parallel = EstimationOptions { parallel: true, ..EstimationOptions::default() };

        // Act
        let a = estimate(&data, &sequential).unwrap();
        let b = estimate(&data, &parallel).unwrap();

        // Assert
        assert_eq!(a.units.len(), 4);
        for (x, y) in a.units.iter().zip(&b.units) {
            assert_eq!(x.unit_id, y.unit_id);
            assert_eq!(x.coefficients, y.coefficients);
        }
    }

    #[test]
    // Purpose
    // -------
    // The pooled scope fits a single unit over all rows without merging
    // tasks of different units.
    //
    // Given
    // -----
    // - Two units of six tasks each, both using task ids `0..6`.
    //
    // Expect
    // ------
    // - One unit named `pooled` with 12 tasks.
    fn pooled_scope_fits_one_unit() {
        let mut records = records_for("a", 6);
        records.extend(records_for("b", 6));
        let data = ChoiceData::from_records(&records, &declared(), &IngestOptions::default()).unwrap();
        let opts = EstimationOptions { scope: EstimationScope::Pooled, ..EstimationOptions::default() };

        let result = estimate(&data, &opts).unwrap();

        assert_eq!(result.units.len(), 1);
        assert_eq!(result.units[0].unit_id, POOLED_UNIT_ID);
        assert_eq!(result.units[0].fit.n_tasks, 12);
    }
}
