//! Tabular export of per-unit coefficients.
//!
//! The CSV has one row per fitted unit with header
//! `unit_id,pseudo_r2,<coefficient names sorted lexicographically>`. Values
//! are written with four decimals; a coefficient a unit does not have
//! (reference or unobserved level) is written as `0.0000`. Quoting is left to
//! the `csv` writer, which quotes only fields that need it.
use crate::choice::{errors::ChoiceResult, models::results::EstimationResult};
use csv::{Terminator, WriterBuilder};

/// Render the coefficient table of a batch result.
///
/// Errors
/// ------
/// - [`ChoiceError::Export`](crate::choice::errors::ChoiceError::Export) when
///   the writer fails or produces invalid UTF-8.
pub fn coefficients_csv(result: &EstimationResult) -> ChoiceResult<String> {
    let names = result.coefficient_names();
    let mut wtr = WriterBuilder::new().terminator(Terminator::Any(b'\n')).from_writer(Vec::new());

    let mut header = Vec::with_capacity(names.len() + 2);
    header.push("unit_id".to_string());
    header.push("pseudo_r2".to_string());
    header.extend(names.iter().cloned());
    wtr.write_record(&header)?;

    for unit in &result.units {
        let mut record = Vec::with_capacity(names.len() + 2);
        record.push(unit.unit_id.clone());
        record.push(format!("{:.4}", unit.fit.pseudo_r2));
        record.extend(
            names.iter().map(|name| format!("{:.4}", unit.coefficient(name).unwrap_or(0.0))),
        );
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::{diagnostics::aggregate::AggregateSummary, models::results::UnitFit};

    fn result(units: Vec<UnitFit>) -> EstimationResult {
        EstimationResult {
            units,
            failed: Vec::new(),
            aggregate_summaries: AggregateSummary::default(),
            mean_pseudo_r2: 0.0,
            mean_tasks_per_unit: 0.0,
            estimation_time_seconds: 0.0,
            dropped_rows: Vec::new(),
            skipped_tasks: Vec::new(),
        }
    }

    #[test]
    // Purpose
    // -------
    // Header columns are sorted and missing coefficients are written as 0.
    //
    // Given
    // -----
    // - Unit `a` with `Price` and `Color__Red`; unit `b,2` with `ASC_None`.
    //
    // Expect
    // ------
    // - Header `unit_id,pseudo_r2,ASC_None,Color__Red,Price`.
    // - Four-decimal values, zeros for absent coefficients, quoted id.
    fn writes_sorted_header_and_zero_fill() {
        let mut a = UnitFit::with_coefficients("a", &[("Price", -0.123456), ("Color__Red", 1.5)]);
        a.fit.pseudo_r2 = 0.25;
        let b = UnitFit::with_coefficients("b,2", &[("ASC_None", 2.0)]);

        let csv = coefficients_csv(&result(vec![a, b])).unwrap();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "unit_id,pseudo_r2,ASC_None,Color__Red,Price");
        assert_eq!(lines[1], "a,0.2500,0.0000,1.5000,-0.1235");
        assert_eq!(lines[2], "\"b,2\",0.0000,2.0000,0.0000,0.0000");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    // Purpose
    // -------
    // A result without fitted units yields only the header.
    //
    // Given
    // -----
    // - An empty unit list.
    //
    // Expect
    // ------
    // - `"unit_id,pseudo_r2\n"`.
    fn empty_result_is_header_only() {
        assert_eq!(coefficients_csv(&result(Vec::new())).unwrap(), "unit_id,pseudo_r2\n");
    }

    #[test]
    // Purpose
    // -------
    // Ids and coefficient names with quotes or line breaks survive as single
    // fields.
    //
    // Given
    // -----
    // - Unit `say "hi"` and unit `line\nbreak`, each with one coefficient.
    //
    // Expect
    // ------
    // - Embedded quotes are doubled and both ids are quoted.
    // - Reading the output back with `csv::Reader` yields three records of
    //   three fields each, with the original ids restored.
    fn quotes_fields_that_need_it() {
        let a = UnitFit::with_coefficients("say \"hi\"", &[("Size", 0.5)]);
        let b = UnitFit::with_coefficients("line\nbreak", &[("Size", -0.5)]);

        let out = coefficients_csv(&result(vec![a, b])).unwrap();

        assert!(out.contains("\"say \"\"hi\"\"\",0.0000,0.5000\n"));
        let mut rdr = csv::ReaderBuilder::new().has_headers(false).from_reader(out.as_bytes());
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 3));
        assert_eq!(&rows[1][0], "say \"hi\"");
        assert_eq!(&rows[2][0], "line\nbreak");
    }
}
