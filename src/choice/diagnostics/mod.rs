//! diagnostics: attribute importance and cross-unit aggregation.
//!
//! - [`importance`] turns one unit's coefficients into utility ranges and
//!   percent importances.
//! - [`aggregate`] summarizes a batch of fitted units per term and attribute.
//! - [`wtp`] converts part-worths into money through the price coefficient.
//!
//! Goodness-of-fit statistics (null log-likelihood, pseudo-R²) live next to
//! the likelihood in `choice::core::likelihood`.

pub mod aggregate;
pub mod importance;
pub mod wtp;

pub use self::aggregate::{aggregate, mean_importance, AggregateSummary, CoefficientStats, TermSummary};
pub use self::importance::{attribute_importance, attribute_ranges, importance_from_ranges};
pub use self::wtp::{willingness_to_pay, WtpSummary, WTP_LIMIT};
