//! simulation: what-if analysis on fitted units.
//!
//! Purpose
//! -------
//! Use a batch of fitted part-worths to answer downstream questions:
//! predicted market shares and economics of candidate products
//! ([`market`]), the best product configuration by exhaustive search
//! ([`optimize`]), and preference segments by k-means ([`segmentation`]).
//!
//! Key behaviors
//! -------------
//! - Every entry point takes `&[UnitFit]` plus the global `AttributeSet`;
//!   nothing here mutates a fit.
//! - Missing coefficients (reference levels, levels a unit never saw)
//!   contribute zero utility.
//!
//! Invariants & assumptions
//! ------------------------
//! - An empty unit slice is reported as `ChoiceError::NoUnitsEstimated`.
//! - Results are deterministic; segmentation is seeded.

pub mod market;
pub mod optimize;
pub mod segmentation;

pub use self::market::{
    choice_shares, simulate_market, ProductKind, ProductProfile, ProductShare, ResolvedProfile,
    SimulationOptions, SimulationResult, DEFAULT_MARKET_SIZE,
};
pub use self::optimize::{
    combination_count, optimize_product, OptimizationResult, OptimizationSearch,
    RankedConfiguration, DEFAULT_MAX_COMBINATIONS, DEFAULT_TOP_N,
};
pub use self::segmentation::{
    feature_matrix, kmeans, segment_units, standardize, KMeansFit, Segment, SegmentationOptions,
    SegmentationResult,
};
