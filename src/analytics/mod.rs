//! Shared analytics library.
//!
//! Window and aggregation primitives over in-memory [`Table`](crate::model::Table)s,
//! and the report catalog composed from them. Consumed by the `sbi run`,
//! `sbi export` and `sbi validate` CLI commands.
//!
//! # Module structure
//!
//! - [`types`] — errors, parameters, result structs
//! - [`window`] — ROW_NUMBER / RANK / DENSE_RANK / PERCENT_RANK / NTILE, LAG / LEAD, framed aggregates
//! - [`aggregate`] — predicates, GROUP BY, joins, ratio-to-total
//! - [`derive`] — guarded division and data-quality warnings
//! - [`bucketing`] — month truncation and month arithmetic
//! - [`rules`] — RFM segment rules and churn bands
//! - [`hierarchy`] — manager-tree resolution (depth, path, direct reports)
//! - [`format`] — currency / percent presentation and table rendering
//! - [`reports`] — the report catalog
//! - [`validate`] — snapshot integrity checks

pub mod aggregate;
pub mod bucketing;
pub mod derive;
pub mod format;
pub mod hierarchy;
pub mod reports;
pub mod rules;
pub mod types;
pub mod validate;
pub mod window;

// Re-export the most commonly used items at the crate::analytics level.
pub use reports::{ReportKind, run, run_report};
pub use types::{
    AnalyticsError, AnalyticsResult, ColumnKind, ColumnSpec, DataQualityWarning, Param,
    ReportParams, ReportResult,
};
pub use validate::{ValidateConfig, ValidationReport, run_validation};
