//! Window functions over partitioned, ordered row sets.
//!
//! A partition is a sorted vector of row indices into the source [`Table`];
//! row data is never copied. Every function returns one value per input row,
//! aligned with the table's row order, ready for [`Table::with_column`].
//!
//! Ordering is stable: rows whose order keys compare equal keep their input
//! position, which is what makes `ROW_NUMBER` and `NTILE` reproducible.

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use super::aggregate::{AggFn, aggregate_values};
use super::types::{AnalyticsError, AnalyticsResult};
use crate::model::value::ResolvedOrder;
use crate::model::{SortKey, Table, Value};

// ---------------------------------------------------------------------------
// Window spec
// ---------------------------------------------------------------------------

/// Frame of an aggregate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Frame {
    /// No frame; only valid for ranking and offset functions.
    #[default]
    None,
    /// The whole partition, broadcast to every row (`AVG(x) OVER ()`).
    Unbounded,
    /// `ROWS BETWEEN n PRECEDING AND CURRENT ROW`.
    Preceding(usize),
}

/// `OVER (PARTITION BY .. ORDER BY .. <frame>)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSpec {
    pub partition_by: Vec<String>,
    pub order_by: Vec<SortKey>,
    pub frame: Frame,
}

impl WindowSpec {
    /// Empty spec: one partition, no order, no frame.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_by(mut self, fields: &[&str]) -> Self {
        self.partition_by = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn order_by(mut self, keys: Vec<SortKey>) -> Self {
        self.order_by = keys;
        self
    }

    pub fn frame(mut self, frame: Frame) -> Self {
        self.frame = frame;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankKind {
    RowNumber,
    Rank,
    DenseRank,
    PercentRank,
    Ntile(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetKind {
    Lag,
    Lead,
}

// ---------------------------------------------------------------------------
// Partitioning
// ---------------------------------------------------------------------------

/// Split `table` into partitions (first-appearance order) and sort each one
/// by `order`, keeping input order among equal keys.
fn partitions(table: &Table, spec: &WindowSpec, order: &ResolvedOrder) -> AnalyticsResult<Vec<Vec<usize>>> {
    let key_cols = spec
        .partition_by
        .iter()
        .map(|f| table.col(f))
        .collect::<AnalyticsResult<Vec<_>>>()?;
    let rows = table.rows();

    let mut parts: Vec<Vec<usize>> = Vec::new();
    if key_cols.is_empty() {
        parts.push((0..rows.len()).collect());
    } else {
        let mut index: FxHashMap<Vec<&Value>, usize> = FxHashMap::default();
        for (i, row) in rows.iter().enumerate() {
            let key: Vec<&Value> = key_cols.iter().map(|&c| &row[c]).collect();
            let slot = *index.entry(key).or_insert_with(|| {
                parts.push(Vec::new());
                parts.len() - 1
            });
            parts[slot].push(i);
        }
    }

    if !order.is_empty() {
        for part in &mut parts {
            part.sort_by(|&a, &b| order.compare(&rows[a], &rows[b]));
        }
    }
    Ok(parts)
}

fn require_order(spec: &WindowSpec, what: &str) -> AnalyticsResult<()> {
    if spec.order_by.is_empty() {
        return Err(AnalyticsError::Configuration(format!(
            "{what} requires at least one ORDER BY key"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// 1-based NTILE bucket of the row at 0-based `position` in a partition of
/// `len` rows split into `buckets` buckets.
///
/// The first `len % buckets` buckets hold one extra row.
pub fn ntile_bucket(position: usize, len: usize, buckets: usize) -> usize {
    let base = len / buckets;
    let extra = len % buckets;
    let large_rows = extra * (base + 1);
    if position < large_rows {
        position / (base + 1) + 1
    } else {
        extra + (position - large_rows) / base + 1
    }
}

/// `ROW_NUMBER` / `RANK` / `DENSE_RANK` / `PERCENT_RANK` / `NTILE(n)`.
///
/// Peers (equal order keys) share `RANK`, `DENSE_RANK` and `PERCENT_RANK`.
pub fn rank_like(table: &Table, kind: RankKind, spec: &WindowSpec) -> AnalyticsResult<Vec<Value>> {
    require_order(spec, "ranking window")?;
    let buckets = match kind {
        RankKind::Ntile(n) if n <= 0 => {
            return Err(AnalyticsError::Configuration(format!(
                "NTILE bucket count must be positive, got {n}"
            )));
        }
        RankKind::Ntile(n) => usize::try_from(n).map_err(|_| {
            AnalyticsError::Configuration(format!("NTILE bucket count {n} out of range"))
        })?,
        _ => 0,
    };

    let order = ResolvedOrder::resolve(table, &spec.order_by)?;
    let rows = table.rows();
    let mut out = vec![Value::Null; rows.len()];

    for part in partitions(table, spec, &order)? {
        let len = part.len();
        let mut rank = 0_usize;
        let mut dense = 0_usize;
        for (pos, &idx) in part.iter().enumerate() {
            let new_peer_group =
                pos == 0 || order.compare(&rows[part[pos - 1]], &rows[idx]).is_ne();
            if new_peer_group {
                rank = pos + 1;
                dense += 1;
            }
            out[idx] = match kind {
                RankKind::RowNumber => Value::Int(pos as i64 + 1),
                RankKind::Rank => Value::Int(rank as i64),
                RankKind::DenseRank => Value::Int(dense as i64),
                RankKind::PercentRank => Value::Decimal(if len <= 1 {
                    Decimal::ZERO
                } else {
                    Decimal::from(rank as i64 - 1) / Decimal::from(len as i64 - 1)
                }),
                RankKind::Ntile(_) => Value::Int(ntile_bucket(pos, len, buckets) as i64),
            };
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Offsets
// ---------------------------------------------------------------------------

/// `LAG(field, n, default)` / `LEAD(field, n, default)`.
pub fn offset(
    table: &Table,
    kind: OffsetKind,
    spec: &WindowSpec,
    field: &str,
    n: usize,
    default: Value,
) -> AnalyticsResult<Vec<Value>> {
    require_order(spec, "offset window")?;
    let col = table.col(field)?;
    let order = ResolvedOrder::resolve(table, &spec.order_by)?;
    let rows = table.rows();
    let mut out = vec![Value::Null; rows.len()];

    for part in partitions(table, spec, &order)? {
        for (pos, &idx) in part.iter().enumerate() {
            let source = match kind {
                OffsetKind::Lag => pos.checked_sub(n),
                OffsetKind::Lead => pos.checked_add(n).filter(|&p| p < part.len()),
            };
            out[idx] = match source {
                Some(p) => rows[part[p]][col].clone(),
                None => default.clone(),
            };
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Aggregate windows
// ---------------------------------------------------------------------------

/// `func(field) OVER (spec)`.
///
/// [`Frame::Unbounded`] broadcasts the partition aggregate to every row and
/// needs no order. [`Frame::Preceding`] aggregates the current row and up to
/// `n` rows before it, and requires an order.
pub fn moving_aggregate(
    table: &Table,
    spec: &WindowSpec,
    func: AggFn,
    field: &str,
) -> AnalyticsResult<Vec<Value>> {
    let col = table.col(field)?;
    let rows = table.rows();
    let mut out = vec![Value::Null; rows.len()];

    match spec.frame {
        Frame::None => Err(AnalyticsError::Configuration(
            "aggregate window requires a frame".into(),
        )),
        Frame::Unbounded => {
            let order = ResolvedOrder::resolve(table, &spec.order_by)?;
            for part in partitions(table, spec, &order)? {
                let value = aggregate_values(func, part.iter().map(|&i| &rows[i][col]));
                for &i in &part {
                    out[i] = value.clone();
                }
            }
            Ok(out)
        }
        Frame::Preceding(n) => {
            require_order(spec, "moving window")?;
            let order = ResolvedOrder::resolve(table, &spec.order_by)?;
            for part in partitions(table, spec, &order)? {
                for pos in 0..part.len() {
                    let start = pos.saturating_sub(n);
                    out[part[pos]] =
                        aggregate_values(func, part[start..=pos].iter().map(|&i| &rows[i][col]));
                }
            }
            Ok(out)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Value {
        Value::Decimal(s.parse().unwrap())
    }

    fn ints(values: &[Value]) -> Vec<i64> {
        values.iter().map(|v| v.as_i64().unwrap()).collect()
    }

    fn staff() -> Table {
        Table::from_rows(
            ["name", "dept", "salary"],
            vec![
                vec!["a".into(), "eng".into(), 90.into()],
                vec!["b".into(), "ops".into(), 50.into()],
                vec!["c".into(), "eng".into(), 70.into()],
                vec!["d".into(), "eng".into(), 70.into()],
                vec!["e".into(), "ops".into(), 60.into()],
            ],
        )
        .unwrap()
    }

    fn by_salary() -> WindowSpec {
        WindowSpec::new().order_by(vec![SortKey::asc("salary")])
    }

    #[test]
    fn ntile_bucket_leftovers_go_first() {
        // 10 rows in 4 buckets: sizes 3,3,2,2.
        let buckets: Vec<usize> = (0..10).map(|p| ntile_bucket(p, 10, 4)).collect();
        assert_eq!(buckets, vec![1, 1, 1, 2, 2, 2, 3, 3, 4, 4]);
        // Fewer rows than buckets.
        let buckets: Vec<usize> = (0..3).map(|p| ntile_bucket(p, 3, 4)).collect();
        assert_eq!(buckets, vec![1, 2, 3]);
    }

    #[test]
    fn ranks_handle_ties() {
        let t = staff();
        let rn = rank_like(&t, RankKind::RowNumber, &by_salary()).unwrap();
        let rank = rank_like(&t, RankKind::Rank, &by_salary()).unwrap();
        let dense = rank_like(&t, RankKind::DenseRank, &by_salary()).unwrap();
        // Sorted: b 50, e 60, c 70, d 70, a 90.
        assert_eq!(ints(&rn), vec![5, 1, 3, 4, 2]);
        assert_eq!(ints(&rank), vec![5, 1, 3, 3, 2]);
        assert_eq!(ints(&dense), vec![4, 1, 3, 3, 2]);
    }

    #[test]
    fn percent_rank_uses_shared_rank() {
        let t = staff();
        let pr = rank_like(&t, RankKind::PercentRank, &by_salary()).unwrap();
        assert_eq!(pr[1], d("0"));
        assert_eq!(pr[2], d("0.5"));
        assert_eq!(pr[3], d("0.5"));
        assert_eq!(pr[0], d("1"));
    }

    #[test]
    fn single_row_partition_percent_rank_is_zero() {
        let t = Table::from_rows(["v"], vec![vec![1.into()]]).unwrap();
        let spec = WindowSpec::new().order_by(vec![SortKey::asc("v")]);
        let pr = rank_like(&t, RankKind::PercentRank, &spec).unwrap();
        assert_eq!(pr, vec![d("0")]);
    }

    #[test]
    fn partitioned_dense_rank_desc() {
        let t = staff();
        let spec = WindowSpec::new()
            .partition_by(&["dept"])
            .order_by(vec![SortKey::desc("salary")]);
        let dense = rank_like(&t, RankKind::DenseRank, &spec).unwrap();
        assert_eq!(ints(&dense), vec![1, 2, 2, 2, 1]);
    }

    #[test]
    fn ntile_follows_stable_input_order_on_ties() {
        let t = staff();
        let nt = rank_like(&t, RankKind::Ntile(2), &by_salary()).unwrap();
        // 5 rows / 2 buckets: first bucket gets 3 (b, e, c).
        assert_eq!(ints(&nt), vec![2, 1, 1, 2, 1]);
    }

    #[test]
    fn ranking_without_order_is_configuration_error() {
        let err = rank_like(&staff(), RankKind::RowNumber, &WindowSpec::new()).unwrap_err();
        assert!(matches!(err, AnalyticsError::Configuration(_)));
        let err = offset(&staff(), OffsetKind::Lag, &WindowSpec::new(), "salary", 1, Value::Null)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Configuration(_)));
    }

    #[test]
    fn ntile_non_positive_is_configuration_error() {
        for n in [0, -3] {
            let err = rank_like(&staff(), RankKind::Ntile(n), &by_salary()).unwrap_err();
            assert!(matches!(err, AnalyticsError::Configuration(_)));
        }
    }

    #[test]
    fn lag_and_lead_with_defaults() {
        let t = staff();
        let lag = offset(&t, OffsetKind::Lag, &by_salary(), "name", 1, Value::Null).unwrap();
        assert_eq!(lag[1], Value::Null);
        assert_eq!(lag[4], Value::from("b"));
        assert_eq!(lag[0], Value::from("d"));
        let lead = offset(&t, OffsetKind::Lead, &by_salary(), "salary", 2, Value::Int(0)).unwrap();
        assert_eq!(lead[1], Value::Int(70));
        assert_eq!(lead[3], Value::Int(0));
        assert_eq!(lead[0], Value::Int(0));
    }

    #[test]
    fn moving_average_two_preceding() {
        let t = Table::from_rows(
            ["month", "revenue"],
            vec![
                vec!["2024-03".into(), 0.into()],
                vec!["2024-01".into(), 100.into()],
                vec!["2024-02".into(), 150.into()],
                vec!["2024-04".into(), 50.into()],
            ],
        )
        .unwrap();
        let spec = WindowSpec::new()
            .order_by(vec![SortKey::asc("month")])
            .frame(Frame::Preceding(2));
        let avg = moving_aggregate(&t, &spec, AggFn::Avg, "revenue").unwrap();
        assert_eq!(avg[1], d("100"));
        assert_eq!(avg[2], d("125"));
        assert_eq!(avg[0], Value::Decimal(Decimal::from(250) / Decimal::from(3)));
        assert_eq!(avg[3], Value::Decimal(Decimal::from(200) / Decimal::from(3)));
    }

    #[test]
    fn unbounded_frame_broadcasts_partition_aggregate() {
        let t = staff();
        let company = WindowSpec::new().frame(Frame::Unbounded);
        let avg = moving_aggregate(&t, &company, AggFn::Avg, "salary").unwrap();
        assert!(avg.iter().all(|v| *v == d("68")));

        let per_dept = company.partition_by(&["dept"]);
        let sum = moving_aggregate(&t, &per_dept, AggFn::Sum, "salary").unwrap();
        assert_eq!(ints(&sum), vec![230, 110, 230, 230, 110]);
    }

    #[test]
    fn aggregate_window_requires_frame() {
        let err = moving_aggregate(&staff(), &WindowSpec::new(), AggFn::Sum, "salary").unwrap_err();
        assert!(matches!(err, AnalyticsError::Configuration(_)));
        let no_order = WindowSpec::new().frame(Frame::Preceding(2));
        assert!(moving_aggregate(&staff(), &no_order, AggFn::Avg, "salary").is_err());
    }

    #[test]
    fn unknown_partition_field_is_rejected() {
        let spec = by_salary().partition_by(&["nope"]);
        assert!(rank_like(&staff(), RankKind::Rank, &spec).is_err());
    }
}
