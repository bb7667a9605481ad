//! Shared types for the analytics library.
//!
//! These types are used by the report engine, the CLI and the export path,
//! keeping parameters, result shapes and the error taxonomy in one place.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::model::Value;
use crate::store::StoreError;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Analytics-specific error.
///
/// Every variant is fatal for the invocation that raised it. Guarded
/// divisions never produce an error; they surface as [`DataQualityWarning`]s.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Invalid window spec, unknown report, unsupported or out-of-range parameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Hierarchy cycle, or a reference the store should have kept consistent.
    #[error("structural error: {0}")]
    Structural(String),

    /// Upstream store failure, surfaced unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience alias.
pub type AnalyticsResult<T> = std::result::Result<T, AnalyticsError>;

/// A guarded division hit a zero or null denominator and resolved to the
/// null sentinel. Recoverable; reported alongside the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQualityWarning {
    /// Which derived metric was affected (e.g. `growth_rate`).
    pub metric: String,
    /// How many rows resolved to the sentinel.
    pub occurrences: usize,
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Parameter names recognised by at least one report.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    Limit,
    Year,
    Months,
    AsOf,
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit => write!(f, "limit"),
            Self::Year => write!(f, "year"),
            Self::Months => write!(f, "months"),
            Self::AsOf => write!(f, "as_of"),
        }
    }
}

/// Report parameters (library-side, no clap dependency).
///
/// `as_of` stands in for the database's `CURRENT_DATE`; reports that measure
/// recency require it to be resolved for reproducible output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportParams {
    pub limit: Option<usize>,
    pub year: Option<i32>,
    pub months: Option<usize>,
    pub as_of: Option<NaiveDate>,
}

impl ReportParams {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_months(mut self, months: usize) -> Self {
        self.months = Some(months);
        self
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Parse `key=value` style options. `year_filter` is accepted as an alias
    /// of `year`. Unknown keys and malformed values are configuration errors.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> AnalyticsResult<Self> {
        let mut params = Self::default();
        for (key, raw) in pairs {
            let raw = raw.trim();
            match key.trim() {
                "limit" => params.limit = Some(parse_param(key, raw)?),
                "year" | "year_filter" => params.year = Some(parse_param(key, raw)?),
                "months" => params.months = Some(parse_param(key, raw)?),
                "as_of" => {
                    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                        AnalyticsError::Configuration(format!("invalid as_of '{raw}': {e}"))
                    })?;
                    params.as_of = Some(date);
                }
                other => {
                    return Err(AnalyticsError::Configuration(format!(
                        "unsupported parameter '{other}'"
                    )));
                }
            }
        }
        Ok(params)
    }

    /// Names of the parameters that carry a value.
    pub fn provided(&self) -> Vec<Param> {
        let mut out = Vec::new();
        if self.limit.is_some() {
            out.push(Param::Limit);
        }
        if self.year.is_some() {
            out.push(Param::Year);
        }
        if self.months.is_some() {
            out.push(Param::Months);
        }
        if self.as_of.is_some() {
            out.push(Param::AsOf);
        }
        out
    }

    /// Resolve `as_of`, defaulting to today's UTC date.
    pub fn as_of_or_today(&self) -> NaiveDate {
        self.as_of
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }

    /// Resolve a row cap: `None` when neither the caller nor the report sets
    /// one. Zero or anything above `max` is rejected.
    pub fn resolve_limit(
        &self,
        default: Option<usize>,
        max: usize,
    ) -> AnalyticsResult<Option<usize>> {
        match self.limit {
            Some(n) if n == 0 || n > max => Err(AnalyticsError::Configuration(format!(
                "limit must be between 1 and {max}, got {n}"
            ))),
            Some(n) => Ok(Some(n)),
            None => Ok(default),
        }
    }
}

fn parse_param<T: std::str::FromStr>(key: &str, raw: &str) -> AnalyticsResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| AnalyticsError::Configuration(format!("invalid {key} '{raw}': {e}")))
}

// ---------------------------------------------------------------------------
// Result shape
// ---------------------------------------------------------------------------

/// Presentation hint for a result column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Currency,
    Decimal,
    /// A ratio in `[0, 1]` (or beyond, for growth) rendered as a percentage.
    Percent,
    Text,
    Date,
    /// `YYYY-MM` month key.
    Month,
}

/// One column of a report's fixed output shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

/// Output of one report invocation. Immutable once returned.
#[derive(Debug, Clone)]
pub struct ReportResult {
    /// Catalog name of the report that produced this result.
    pub report: &'static str,
    pub columns: &'static [ColumnSpec],
    /// Ordered rows; `rows[i][j]` belongs to `columns[j]`.
    pub rows: Vec<Vec<Value>>,
    pub warnings: Vec<DataQualityWarning>,
    /// Fetch + compute wall-time in milliseconds.
    pub elapsed_ms: u64,
}

impl ReportResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn col(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Value at `(row, column)`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let c = self.col(column)?;
        self.rows.get(row).map(|r| &r[c])
    }

    /// All values of a column in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let c = self.col(name)?;
        Some(self.rows.iter().map(|r| &r[c]).collect())
    }

    /// One JSON object per row, keys in column order.
    pub fn rows_json(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| {
                        (
                            c.name.to_string(),
                            serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect()
    }

    /// Produce the CLI-compatible JSON envelope.
    pub fn to_cli_json(&self) -> serde_json::Value {
        serde_json::json!({
            "report": self.report,
            "columns": self.columns,
            "rows": self.rows_json(),
            "row_count": self.rows.len(),
            "warnings": self.warnings,
            "_meta": {
                "elapsed_ms": self.elapsed_ms,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
