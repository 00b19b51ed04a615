//! Conjoint model: the stateful front door of the choice layer.
//!
//! [`ConjointModel`] owns the validated observations, the estimation
//! options, and (after [`ConjointModel::fit`]) the batch result. Downstream
//! analyses (market simulation, product search, segmentation, willingness
//! to pay, CSV export)
//! read the cached result and fail with `ModelNotFitted` before a fit.
//! [`ConjointModel::reset`] clears the cached result; there is no global
//! state.
use crate::choice::{
    core::{
        attributes::AttributeKind,
        data::{ChoiceData, IngestOptions, Record},
        options::EstimationOptions,
    },
    diagnostics::wtp::{willingness_to_pay, WtpSummary},
    errors::{ChoiceError, ChoiceResult},
    io::export::coefficients_csv,
    models::{estimation::estimate, results::EstimationResult},
    simulation::{
        market::{simulate_market, ProductProfile, SimulationOptions, SimulationResult},
        optimize::{optimize_product, OptimizationResult, OptimizationSearch},
        segmentation::{segment_units, SegmentationOptions, SegmentationResult},
    },
};
use indexmap::IndexMap;

/// Choice data, estimation options, and the cached estimation result.
#[derive(Debug, Clone, PartialEq)]
pub struct ConjointModel {
    pub data: ChoiceData,
    pub options: EstimationOptions,
    /// Batch result (populated after `fit`).
    pub results: Option<EstimationResult>,
}

impl ConjointModel {
    pub fn new(data: ChoiceData, options: EstimationOptions) -> Self {
        Self { data, options, results: None }
    }

    /// Ingest raw records and build an unfitted model.
    ///
    /// Errors
    /// ------
    /// - Ingestion errors from [`ChoiceData::from_records`].
    pub fn from_records(
        records: &[Record], attribute_kinds: &IndexMap<String, AttributeKind>,
        ingest: &IngestOptions, options: EstimationOptions,
    ) -> ChoiceResult<Self> {
        let data = ChoiceData::from_records(records, attribute_kinds, ingest)?;
        Ok(Self::new(data, options))
    }

    /// Estimate every unit and cache the result, replacing any previous one.
    ///
    /// Errors
    /// ------
    /// - [`ChoiceError::NoUnitsEstimated`] when no unit can be fitted; the
    ///   previous result is cleared in that case.
    pub fn fit(&mut self) -> ChoiceResult<&EstimationResult> {
        self.results = None;
        let result = estimate(&self.data, &self.options)?;
        Ok(self.results.insert(result))
    }

    pub fn reset(&mut self) {
        self.results = None;
    }

    pub fn is_fitted(&self) -> bool {
        self.results.is_some()
    }

    /// Errors
    /// ------
    /// - [`ChoiceError::ModelNotFitted`] before a successful `fit`.
    pub fn results(&self) -> ChoiceResult<&EstimationResult> {
        self.results.as_ref().ok_or(ChoiceError::ModelNotFitted)
    }

    pub fn simulate(
        &self, products: &[ProductProfile], opts: &SimulationOptions,
    ) -> ChoiceResult<SimulationResult> {
        simulate_market(&self.results()?.units, products, &self.data.attributes, opts)
    }

    pub fn optimize(&self, search: &OptimizationSearch) -> ChoiceResult<OptimizationResult> {
        optimize_product(&self.results()?.units, &self.data.attributes, search)
    }

    pub fn segment(&self, opts: &SegmentationOptions) -> ChoiceResult<SegmentationResult> {
        segment_units(&self.results()?.units, &self.data.attributes, opts)
    }

    pub fn willingness_to_pay(&self) -> ChoiceResult<IndexMap<String, WtpSummary>> {
        willingness_to_pay(&self.results()?.units, &self.data.attributes)
    }

    pub fn coefficients_csv(&self) -> ChoiceResult<String> {
        coefficients_csv(self.results()?)
    }
}
