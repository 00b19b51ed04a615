//! io: request parsing and result export.
//!
//! - [`request`]: the JSON estimation payload ([`EstimationRequest`]) and
//!   [`estimate_json`], which runs it end to end.
//! - [`export`]: the per-unit coefficient CSV.
//!
//! JSON output of results is provided by `EstimationResult::to_json`.

pub mod export;
pub mod request;

pub use self::export::coefficients_csv;
pub use self::request::{estimate_json, AttributeMetadata, EstimationRequest, ModelOptions};
