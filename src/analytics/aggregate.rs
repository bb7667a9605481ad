//! Grouping, conditional aggregates, joins and ratio-to-total.
//!
//! These are the set-based building blocks the reports apply before any
//! windowing: `GROUP BY` with per-aggregate `FILTER (WHERE ..)`, equi-joins
//! with inner/left semantics, and partition-relative shares.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use rustc_hash::{FxHashMap, FxHashSet};

use super::derive::DivisionGuard;
use super::types::{AnalyticsError, AnalyticsResult};
use super::window::{self, Frame, WindowSpec};
use crate::model::{Table, Value};

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// A row predicate over named fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Lt(String, Value),
    Le(String, Value),
    IsNull(String),
    NotNull(String),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Eq(field.to_string(), value.into())
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self::Ne(field.to_string(), value.into())
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::Gt(field.to_string(), value.into())
    }

    pub fn not_null(field: &str) -> Self {
        Self::NotNull(field.to_string())
    }

    pub fn resolve(&self, table: &Table) -> AnalyticsResult<ResolvedPredicate> {
        Ok(match self {
            Self::Eq(f, v) => ResolvedPredicate::Cmp(table.col(f)?, CmpOp::Eq, v.clone()),
            Self::Ne(f, v) => ResolvedPredicate::Cmp(table.col(f)?, CmpOp::Ne, v.clone()),
            Self::Gt(f, v) => ResolvedPredicate::Cmp(table.col(f)?, CmpOp::Gt, v.clone()),
            Self::Ge(f, v) => ResolvedPredicate::Cmp(table.col(f)?, CmpOp::Ge, v.clone()),
            Self::Lt(f, v) => ResolvedPredicate::Cmp(table.col(f)?, CmpOp::Lt, v.clone()),
            Self::Le(f, v) => ResolvedPredicate::Cmp(table.col(f)?, CmpOp::Le, v.clone()),
            Self::IsNull(f) => ResolvedPredicate::IsNull(table.col(f)?, true),
            Self::NotNull(f) => ResolvedPredicate::IsNull(table.col(f)?, false),
            Self::And(ps) => ResolvedPredicate::And(
                ps.iter()
                    .map(|p| p.resolve(table))
                    .collect::<AnalyticsResult<_>>()?,
            ),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// A predicate bound to column indices of one table.
#[derive(Debug, Clone)]
pub enum ResolvedPredicate {
    Cmp(usize, CmpOp, Value),
    IsNull(usize, bool),
    And(Vec<ResolvedPredicate>),
}

impl ResolvedPredicate {
    /// SQL three-valued logic collapsed to bool: comparisons against NULL
    /// are never true.
    pub fn matches(&self, row: &[Value]) -> bool {
        match self {
            Self::Cmp(col, op, rhs) => {
                let lhs = &row[*col];
                if lhs.is_null() || rhs.is_null() {
                    return false;
                }
                let ord = lhs.sql_cmp(rhs);
                match op {
                    CmpOp::Eq => ord == Ordering::Equal,
                    CmpOp::Ne => ord != Ordering::Equal,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::Ge => ord != Ordering::Less,
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::Le => ord != Ordering::Greater,
                }
            }
            Self::IsNull(col, want_null) => row[*col].is_null() == *want_null,
            Self::And(ps) => ps.iter().all(|p| p.matches(row)),
        }
    }
}

/// Keep the rows of `table` matching `predicate`.
pub fn filter(table: Table, predicate: &Predicate) -> AnalyticsResult<Table> {
    let resolved = predicate.resolve(&table)?;
    Ok(table.filter(|row| resolved.matches(row)))
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFn {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
}

/// Fold values with SQL aggregate semantics: nulls are skipped, `SUM`/`AVG`/
/// `MIN`/`MAX` over no non-null input are null, counts are zero.
pub fn aggregate_values<'a>(func: AggFn, values: impl Iterator<Item = &'a Value>) -> Value {
    let mut non_null = values.filter(|v| !v.is_null());
    match func {
        AggFn::Count => Value::Int(non_null.count() as i64),
        AggFn::CountDistinct => {
            let distinct: FxHashSet<&Value> = non_null.collect();
            Value::Int(distinct.len() as i64)
        }
        AggFn::Sum => sum_values(non_null),
        AggFn::Avg => {
            let mut count = 0_i64;
            let mut total = Decimal::ZERO;
            for v in non_null {
                if let Some(d) = v.as_decimal() {
                    total = total.saturating_add(d);
                    count += 1;
                }
            }
            if count == 0 {
                Value::Null
            } else {
                Value::Decimal(total / Decimal::from(count))
            }
        }
        AggFn::Min => non_null
            .min_by(|a, b| a.sql_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        AggFn::Max => non_null
            .max_by(|a, b| a.sql_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
    }
}

/// Integer sums stay integers; any decimal input widens the result.
fn sum_values<'a>(values: impl Iterator<Item = &'a Value>) -> Value {
    let mut int_total: i64 = 0;
    let mut dec_total = Decimal::ZERO;
    let mut seen = false;
    let mut widened = false;
    for v in values {
        match v {
            Value::Int(i) if !widened => {
                int_total = int_total.saturating_add(*i);
                seen = true;
            }
            other => {
                if let Some(d) = other.as_decimal() {
                    if !widened {
                        dec_total = Decimal::from(int_total);
                        widened = true;
                    }
                    dec_total = dec_total.saturating_add(d);
                    seen = true;
                }
            }
        }
    }
    match (seen, widened) {
        (false, _) => Value::Null,
        (true, false) => Value::Int(int_total),
        (true, true) => Value::Decimal(dec_total),
    }
}

/// One named aggregate column of a `group_by`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub name: String,
    pub func: AggFn,
    /// `None` only for `COUNT(*)`.
    pub field: Option<String>,
    /// Restricts this aggregate's input rows; group membership is unaffected.
    pub filter: Option<Predicate>,
}

impl Aggregate {
    fn over(name: &str, func: AggFn, field: &str) -> Self {
        Self {
            name: name.to_string(),
            func,
            field: Some(field.to_string()),
            filter: None,
        }
    }

    /// `COUNT(*)`.
    pub fn count_rows(name: &str) -> Self {
        Self {
            name: name.to_string(),
            func: AggFn::Count,
            field: None,
            filter: None,
        }
    }

    pub fn count(name: &str, field: &str) -> Self {
        Self::over(name, AggFn::Count, field)
    }

    pub fn count_distinct(name: &str, field: &str) -> Self {
        Self::over(name, AggFn::CountDistinct, field)
    }

    pub fn sum(name: &str, field: &str) -> Self {
        Self::over(name, AggFn::Sum, field)
    }

    pub fn avg(name: &str, field: &str) -> Self {
        Self::over(name, AggFn::Avg, field)
    }

    pub fn min(name: &str, field: &str) -> Self {
        Self::over(name, AggFn::Min, field)
    }

    pub fn max(name: &str, field: &str) -> Self {
        Self::over(name, AggFn::Max, field)
    }

    /// Equivalent of `FILTER (WHERE predicate)`.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }
}

struct ResolvedAggregate {
    func: AggFn,
    col: Option<usize>,
    filter: Option<ResolvedPredicate>,
}

/// `SELECT keys.., aggregates.. FROM table GROUP BY keys`.
///
/// Output columns are the keys followed by the aggregate names. Groups appear
/// in order of first occurrence in the input. With no keys the whole table is
/// one group, which yields exactly one row even for empty input.
pub fn group_by(table: &Table, keys: &[&str], aggregates: &[Aggregate]) -> AnalyticsResult<Table> {
    let key_cols = keys
        .iter()
        .map(|k| table.col(k))
        .collect::<AnalyticsResult<Vec<_>>>()?;

    let resolved = aggregates
        .iter()
        .map(|a| {
            let col = match (&a.field, a.func) {
                (Some(f), _) => Some(table.col(f)?),
                (None, AggFn::Count) => None,
                (None, func) => {
                    return Err(AnalyticsError::Configuration(format!(
                        "aggregate '{}' ({func:?}) needs a field",
                        a.name
                    )));
                }
            };
            let filter = a.filter.as_ref().map(|p| p.resolve(table)).transpose()?;
            Ok(ResolvedAggregate {
                func: a.func,
                col,
                filter,
            })
        })
        .collect::<AnalyticsResult<Vec<_>>>()?;

    let mut index: FxHashMap<Vec<Value>, usize> = FxHashMap::default();
    let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
    for (i, row) in table.rows().iter().enumerate() {
        let key: Vec<Value> = key_cols.iter().map(|&c| row[c].clone()).collect();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(i);
    }
    if key_cols.is_empty() && groups.is_empty() {
        groups.push((Vec::new(), Vec::new()));
    }

    let columns: Vec<String> = keys
        .iter()
        .map(|k| k.to_string())
        .chain(aggregates.iter().map(|a| a.name.clone()))
        .collect();
    let rows = table.rows();
    let mut out = Table::new(columns);
    for (key, members) in groups {
        let mut row = key;
        for agg in &resolved {
            let inputs = members
                .iter()
                .map(|&i| &rows[i])
                .filter(|r| agg.filter.as_ref().is_none_or(|p| p.matches(r)));
            let value = match agg.col {
                Some(c) => aggregate_values(agg.func, inputs.map(|r| &r[c])),
                None => Value::Int(inputs.count() as i64),
            };
            row.push(value);
        }
        out.push_row(row)?;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Joins
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    /// Unmatched left rows are kept with NULL in every right column.
    Left,
}

/// Equi-join `left.left_key = right.right_key`.
///
/// The right key column is dropped from the output; any other column name
/// present on both sides is ambiguous and rejected. NULL keys never match.
/// Output order: left rows in input order, each followed by its matches in
/// right input order.
pub fn join(
    left: &Table,
    right: &Table,
    left_key: &str,
    right_key: &str,
    kind: JoinKind,
) -> AnalyticsResult<Table> {
    let lk = left.col(left_key)?;
    let rk = right.col(right_key)?;

    let right_cols: Vec<usize> = (0..right.columns().len()).filter(|&c| c != rk).collect();
    for &c in &right_cols {
        let name = &right.columns()[c];
        if left.has_column(name) {
            return Err(AnalyticsError::Configuration(format!(
                "ambiguous field '{name}' in join on {left_key} = {right_key}"
            )));
        }
    }

    let mut index: FxHashMap<&Value, Vec<usize>> = FxHashMap::default();
    for (i, row) in right.rows().iter().enumerate() {
        if !row[rk].is_null() {
            index.entry(&row[rk]).or_default().push(i);
        }
    }

    let columns = left
        .columns()
        .iter()
        .cloned()
        .chain(right_cols.iter().map(|&c| right.columns()[c].clone()));
    let mut out = Table::new(columns);
    for lrow in left.rows() {
        match index.get(&lrow[lk]) {
            Some(matches) if !lrow[lk].is_null() => {
                for &m in matches {
                    let rrow = &right.rows()[m];
                    let mut row = lrow.clone();
                    row.extend(right_cols.iter().map(|&c| rrow[c].clone()));
                    out.push_row(row)?;
                }
            }
            _ if kind == JoinKind::Left => {
                let mut row = lrow.clone();
                row.extend(std::iter::repeat_n(Value::Null, right_cols.len()));
                out.push_row(row)?;
            }
            _ => {}
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Ratio to total
// ---------------------------------------------------------------------------

/// Each row's `field` divided by the sum of `field` over its partition
/// (`value / SUM(value) OVER (PARTITION BY ..)`), guarded against zero totals.
pub fn ratio_to_total(
    table: &Table,
    field: &str,
    partition_by: &[&str],
    guard: &mut DivisionGuard,
    metric: &'static str,
) -> AnalyticsResult<Vec<Value>> {
    let spec = WindowSpec::new()
        .partition_by(partition_by)
        .frame(Frame::Unbounded);
    let totals = window::moving_aggregate(table, &spec, AggFn::Sum, field)?;
    let col = table.col(field)?;
    Ok(table
        .rows()
        .iter()
        .zip(&totals)
        .map(|(row, total)| guard.ratio_values(metric, &row[col], total))
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
