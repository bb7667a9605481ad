//! Dynamic row representation shared by the store adapter and every analytics
//! primitive.
//!
//! A [`Table`] is a fixed column list plus rows of [`Value`]s. Primitives
//! resolve field names to column indices once and then work on row indices,
//! so partitions and sort orders never copy row data.

use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::analytics::types::{AnalyticsError, AnalyticsResult};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single typed scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to decimals.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Int(i) => Some(Decimal::from(*i)),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) | Self::Decimal(_) => 1,
            Self::Date(_) => 2,
            Self::Text(_) => 3,
            Self::Null => 4,
        }
    }

    /// Total order used by ORDER BY and window ordering.
    ///
    /// NULL sorts after every non-null value, so ascending order puts nulls
    /// last and descending order puts them first. Integers and decimals
    /// compare numerically.
    pub fn sql_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Greater,
            (_, Self::Null) => Ordering::Less,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (a, b) => match (a.as_decimal(), b.as_decimal()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => a.type_rank().cmp(&b.type_rank()),
            },
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Ordering keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
    /// `NULLS LAST` regardless of direction.
    pub nulls_last: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
            nulls_last: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
            nulls_last: false,
        }
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls_last = true;
        self
    }
}

/// Sort keys resolved against a concrete table.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOrder(Vec<(usize, Direction, bool)>);

impl ResolvedOrder {
    pub(crate) fn resolve(table: &Table, keys: &[SortKey]) -> AnalyticsResult<Self> {
        keys.iter()
            .map(|k| Ok((table.col(&k.field)?, k.direction, k.nulls_last)))
            .collect::<AnalyticsResult<Vec<_>>>()
            .map(Self)
    }

    pub(crate) fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for &(col, dir, nulls_last) in &self.0 {
            let (x, y) = (&a[col], &b[col]);
            // A lone null keeps its ascending place when nulls go last.
            let pin_null = nulls_last && x.is_null() != y.is_null();
            let ord = match dir {
                Direction::Desc if !pin_null => x.sql_cmp(y).reverse(),
                _ => x.sql_cmp(y),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Column names plus rows of values. Every row has exactly one value per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> AnalyticsResult<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve a field name to its column index.
    pub fn col(&self, name: &str) -> AnalyticsResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AnalyticsError::Configuration(format!("unknown field '{name}'")))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> AnalyticsResult<()> {
        if row.len() != self.columns.len() {
            return Err(AnalyticsError::Configuration(format!(
                "row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Value at `(row, field)`, or `None` when either is out of range.
    pub fn get(&self, row: usize, field: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == field)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, field: &str) -> AnalyticsResult<Vec<&Value>> {
        let col = self.col(field)?;
        Ok(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// Append a derived column; `values[i]` belongs to row `i`.
    pub fn with_column(mut self, name: &str, values: Vec<Value>) -> AnalyticsResult<Self> {
        if self.has_column(name) {
            return Err(AnalyticsError::Configuration(format!(
                "duplicate field '{name}'"
            )));
        }
        if values.len() != self.rows.len() {
            return Err(AnalyticsError::Configuration(format!(
                "derived column '{name}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name.to_string());
        for (row, v) in self.rows.iter_mut().zip(values) {
            row.push(v);
        }
        Ok(self)
    }

    /// Rewrite one column in place.
    pub fn update_column(mut self, field: &str, f: impl Fn(&Value) -> Value) -> AnalyticsResult<Self> {
        let col = self.col(field)?;
        for row in &mut self.rows {
            row[col] = f(&row[col]);
        }
        Ok(self)
    }

    /// Keep rows matching `pred`.
    pub fn filter(mut self, pred: impl Fn(&[Value]) -> bool) -> Self {
        self.rows.retain(|r| pred(r));
        self
    }

    /// Project to the named columns, in the given order.
    pub fn select(&self, fields: &[&str]) -> AnalyticsResult<Self> {
        let idx = fields
            .iter()
            .map(|f| self.col(f))
            .collect::<AnalyticsResult<Vec<_>>>()?;
        Ok(Self {
            columns: fields.iter().map(|f| f.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// Stable sort by the given keys; equal rows keep their input order.
    pub fn order_by(mut self, keys: &[SortKey]) -> AnalyticsResult<Self> {
        let order = ResolvedOrder::resolve(&self, keys)?;
        self.rows.sort_by(|a, b| order.compare(a, b));
        Ok(self)
    }

    pub fn limit(mut self, n: Option<usize>) -> Self {
        if let Some(n) = n {
            self.rows.truncate(n);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
