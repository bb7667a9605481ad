//! Sales-centred reports: monthly trend, product ranking, regional funnel,
//! year-over-year pivot, category analysis and the summary counts.

use chrono::Datelike;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use super::{ReportContext, check_range, coalesce, derive, having_positive};
use crate::analytics::aggregate::{
    AggFn, Aggregate, JoinKind, Predicate, aggregate_values, group_by, join, ratio_to_total,
};
use crate::analytics::bucketing::{month_key, month_name};
use crate::analytics::types::{AnalyticsResult, Param};
use crate::analytics::window::{
    Frame, OffsetKind, RankKind, WindowSpec, moving_aggregate, offset, rank_like,
};
use crate::model::{SaleStatus, SortKey, Table, Value};
use crate::store::EntityKind;

pub(super) fn monthly_trend(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let months = check_range(Param::Months, ctx.params.months.unwrap_or(12), 36)?;
    let sales = ctx.completed_sales()?;
    let c_date = sales.col("sale_date")?;
    let sales = derive(sales, "month", |r| r[c_date].as_date().map(month_key).into())?;

    let monthly = group_by(
        &sales,
        &["month"],
        &[
            Aggregate::count_rows("transaction_count"),
            Aggregate::sum("revenue", "total_amount"),
        ],
    )?;
    ctx.stage("grouped", &monthly);

    // Windows see the full history; the month cap applies afterwards.
    let by_month = WindowSpec::new().order_by(vec![SortKey::asc("month")]);
    let prev = offset(&monthly, OffsetKind::Lag, &by_month, "revenue", 1, Value::Null)?;
    let moving = moving_aggregate(
        &monthly,
        &by_month.clone().frame(Frame::Preceding(2)),
        AggFn::Avg,
        "revenue",
    )?;

    let c_revenue = monthly.col("revenue")?;
    let growth = monthly
        .rows()
        .iter()
        .zip(&prev)
        .map(|(row, prev)| {
            // The earliest month has nothing to grow from.
            if prev.is_null() {
                return Value::Null;
            }
            let change = row[c_revenue]
                .as_decimal()
                .zip(prev.as_decimal())
                .and_then(|(cur, p)| cur.checked_sub(p));
            ctx.guard.ratio("growth_rate", change, prev.as_decimal()).into()
        })
        .collect();

    Ok(monthly
        .with_column("prev_month_revenue", prev)?
        .with_column("growth_rate", growth)?
        .with_column("three_month_avg", moving)?
        .order_by(&[SortKey::desc("month")])?
        .limit(Some(months)))
}

pub(super) fn product_ranking(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let limit = ctx.params.resolve_limit(Some(20), 50)?;
    let products = ctx.entities(EntityKind::Products, "product_id")?;
    let sales = ctx
        .completed_sales()?
        .select(&["sale_id", "product_id", "quantity", "total_amount"])?;
    let joined = join(&products, &sales, "product_id", "product_id", JoinKind::Left)?;

    let ranked = group_by(
        &joined,
        &["product_id", "product_name", "category", "cost_price", "selling_price"],
        &[
            Aggregate::count("times_sold", "sale_id"),
            Aggregate::sum("total_quantity", "quantity"),
            Aggregate::sum("revenue", "total_amount"),
        ],
    )?;
    let ranked = having_positive(ranked, "revenue")?;
    ctx.stage("grouped", &ranked);

    let by_revenue = WindowSpec::new().order_by(vec![SortKey::desc("revenue")]);
    let rank = rank_like(&ranked, RankKind::DenseRank, &by_revenue)?;
    let category_rank = rank_like(
        &ranked,
        RankKind::DenseRank,
        &by_revenue.clone().partition_by(&["category"]),
    )?;
    let share = ratio_to_total(&ranked, "revenue", &[], &mut ctx.guard, "revenue_share")?;

    let c_cost = ranked.col("cost_price")?;
    let c_price = ranked.col("selling_price")?;
    let ranked = derive(ranked, "profit_margin", |r| {
        let price = r[c_price].as_decimal();
        let margin = price
            .zip(r[c_cost].as_decimal())
            .and_then(|(p, c)| p.checked_sub(c));
        ctx.guard.ratio("profit_margin", margin, price).into()
    })?;

    Ok(ranked
        .with_column("rank", rank)?
        .with_column("category_rank", category_rank)?
        .with_column("revenue_share", share)?
        .order_by(&[SortKey::desc("revenue")])?
        .limit(limit))
}

/// Keep sales dated in `year`, when one is given.
fn in_year(sales: Table, year: Option<i32>) -> AnalyticsResult<Table> {
    let Some(year) = year else {
        return Ok(sales);
    };
    let c_date = sales.col("sale_date")?;
    Ok(sales.filter(|r| r[c_date].as_date().is_some_and(|d| d.year() == year)))
}

pub(super) fn funnel(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let sales = ctx.entities(EntityKind::Sales, "sale_id")?;
    let sales = in_year(sales, ctx.params.year)?;

    let status_is = |s: SaleStatus| Predicate::eq("status", s.as_str());
    let regions = group_by(
        &sales,
        &["region"],
        &[
            Aggregate::count_rows("total_transactions"),
            Aggregate::count_rows("pending").filter(status_is(SaleStatus::Pending)),
            Aggregate::count_rows("cancelled").filter(status_is(SaleStatus::Cancelled)),
            Aggregate::count_rows("completed").filter(status_is(SaleStatus::Completed)),
            Aggregate::sum("completed_revenue", "total_amount")
                .filter(status_is(SaleStatus::Completed)),
        ],
    )?;
    let regions = coalesce(regions, "completed_revenue", Value::Decimal(Decimal::ZERO))?;
    ctx.stage("grouped", &regions);

    let c_total = regions.col("total_transactions")?;
    let c_completed = regions.col("completed")?;
    let c_cancelled = regions.col("cancelled")?;
    let completion = regions
        .rows()
        .iter()
        .map(|r| ctx.guard.ratio_values("completion_rate", &r[c_completed], &r[c_total]))
        .collect();
    let cancellation = regions
        .rows()
        .iter()
        .map(|r| ctx.guard.ratio_values("cancellation_rate", &r[c_cancelled], &r[c_total]))
        .collect();

    regions
        .with_column("completion_rate", completion)?
        .with_column("cancellation_rate", cancellation)?
        .order_by(&[SortKey::desc("completed_revenue"), SortKey::asc("region")])
}

pub(super) fn yoy_pivot(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let mut out = Table::new([
        "month_number",
        "month_name",
        "previous_year_revenue",
        "current_year_revenue",
        "revenue_change",
        "yoy_growth",
    ]);

    let sales = ctx.completed_sales()?;
    let c_date = sales.col("sale_date")?;
    let latest = sales
        .rows()
        .iter()
        .filter_map(|r| r[c_date].as_date())
        .map(|d| d.year())
        .max();
    let Some(year) = ctx.params.year.or(latest) else {
        return Ok(out);
    };

    let sales = derive(sales, "sale_year", |r| {
        r[c_date].as_date().map(|d| i64::from(d.year())).into()
    })?;
    let sales = derive(sales, "month_number", |r| {
        r[c_date].as_date().map(|d| i64::from(d.month())).into()
    })?;
    let by_month = group_by(
        &sales,
        &["month_number"],
        &[
            Aggregate::sum("current", "total_amount")
                .filter(Predicate::eq("sale_year", i64::from(year))),
            Aggregate::sum("previous", "total_amount")
                .filter(Predicate::eq("sale_year", i64::from(year) - 1)),
        ],
    )?;
    ctx.stage("grouped", &by_month);

    let c_month = by_month.col("month_number")?;
    let c_current = by_month.col("current")?;
    let c_previous = by_month.col("previous")?;
    let totals: FxHashMap<i64, (Decimal, Decimal)> = by_month
        .rows()
        .iter()
        .filter_map(|r| {
            let month = r[c_month].as_i64()?;
            let current = r[c_current].as_decimal().unwrap_or_default();
            let previous = r[c_previous].as_decimal().unwrap_or_default();
            Some((month, (previous, current)))
        })
        .collect();

    for month in 1..=12_u32 {
        let (previous, current) = totals
            .get(&i64::from(month))
            .copied()
            .unwrap_or_default();
        let change = current.checked_sub(previous);
        let growth = ctx.guard.ratio("yoy_growth", change, Some(previous));
        out.push_row(vec![
            Value::Int(i64::from(month)),
            Value::from(month_name(month)),
            Value::Decimal(previous),
            Value::Decimal(current),
            change.into(),
            growth.into(),
        ])?;
    }
    Ok(out)
}

pub(super) fn category_analysis(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let products = ctx.entities(EntityKind::Products, "product_id")?;
    let sales = ctx
        .completed_sales()?
        .select(&["sale_id", "product_id", "quantity", "total_amount"])?;
    let overall = aggregate_values(AggFn::Sum, sales.column_values("total_amount")?.into_iter());

    let joined = join(&products, &sales, "product_id", "product_id", JoinKind::Left)?;
    let categories = group_by(
        &joined,
        &["category"],
        &[
            Aggregate::count_distinct("product_count", "product_id"),
            Aggregate::count("times_sold", "sale_id"),
            Aggregate::sum("units_sold", "quantity"),
            Aggregate::sum("total_revenue", "total_amount"),
            Aggregate::avg("avg_transaction", "total_amount"),
        ],
    )?;
    ctx.stage("grouped", &categories);

    let c_revenue = categories.col("total_revenue")?;
    let share = categories
        .rows()
        .iter()
        .map(|r| ctx.guard.ratio_values("revenue_share", &r[c_revenue], &overall))
        .collect();

    categories
        .with_column("revenue_share", share)?
        .order_by(&[SortKey::desc("total_revenue").nulls_last()])
}

pub(super) fn summary(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let mut out = Table::new(["metric", "value"]);
    let mut revenue = Value::Decimal(Decimal::ZERO);
    for kind in EntityKind::ALL {
        let table = ctx.fetch(kind, None)?;
        if kind == EntityKind::Sales {
            let total = aggregate_values(AggFn::Sum, table.column_values("total_amount")?.into_iter());
            if !total.is_null() {
                revenue = total;
            }
        }
        out.push_row(vec![Value::from(kind.as_str()), Value::Int(table.len() as i64)])?;
    }
    out.push_row(vec![Value::from("total_revenue"), revenue])?;
    out.order_by(&[SortKey::asc("metric")])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::analytics::reports::{ReportKind, run};
    use crate::analytics::types::{AnalyticsError, ReportParams};
    use crate::model::{Product, Sale, SaleStatus, Snapshot, Value};
    use crate::store::SnapshotStore;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn dv(s: &str) -> Value {
        Value::Decimal(d(s))
    }

    fn ymd(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sale(id: i64, product: i64, date: NaiveDate, amount: &str, region: &str, status: SaleStatus) -> Sale {
        Sale {
            sale_id: id,
            sale_code: None,
            customer_id: 1,
            emp_id: 1,
            product_id: product,
            quantity: 2,
            unit_price: d(amount),
            discount_percent: Decimal::ZERO,
            total_amount: d(amount),
            sale_date: date,
            region: region.into(),
            payment_method: None,
            status,
        }
    }

    fn product(id: i64, name: &str, category: &str, cost: &str, price: &str) -> Product {
        Product {
            product_id: id,
            product_code: None,
            product_name: name.into(),
            category: category.into(),
            sub_category: None,
            cost_price: d(cost),
            selling_price: d(price),
            stock_quantity: 0,
        }
    }

    fn completed(id: i64, date: NaiveDate, amount: &str) -> Sale {
        sale(id, 1, date, amount, "North", SaleStatus::Completed)
    }

    #[test]
    fn monthly_trend_growth_and_moving_average() {
        let store = SnapshotStore::new(Snapshot {
            sales: vec![
                completed(1, ymd(2024, 1, 5), "60"),
                completed(2, ymd(2024, 1, 20), "40"),
                completed(3, ymd(2024, 2, 10), "150"),
                completed(4, ymd(2024, 3, 1), "0"),
                sale(5, 1, ymd(2024, 3, 2), "500", "North", SaleStatus::Pending),
            ],
            ..Default::default()
        });
        let result = run(&store, ReportKind::MonthlyTrend, &ReportParams::default()).unwrap();
        assert_eq!(result.len(), 3);
        // Most recent first.
        assert_eq!(result.get(0, "month"), Some(&Value::from("2024-03")));
        assert_eq!(result.get(0, "revenue"), Some(&dv("0")));
        assert_eq!(result.get(0, "prev_month_revenue"), Some(&dv("150")));
        assert_eq!(result.get(0, "growth_rate"), Some(&dv("-1")));
        assert_eq!(result.get(0, "three_month_avg"), Some(&dv("83.33")));
        assert_eq!(result.get(1, "growth_rate"), Some(&dv("0.5")));
        assert_eq!(result.get(2, "transaction_count"), Some(&Value::Int(2)));
        assert_eq!(result.get(2, "prev_month_revenue"), Some(&Value::Null));
        assert_eq!(result.get(2, "growth_rate"), Some(&Value::Null));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn monthly_trend_caps_after_windowing() {
        let store = SnapshotStore::new(Snapshot {
            sales: vec![
                completed(1, ymd(2024, 1, 5), "100"),
                completed(2, ymd(2024, 2, 5), "200"),
                completed(3, ymd(2024, 3, 5), "300"),
            ],
            ..Default::default()
        });
        let params = ReportParams::default().with_months(1);
        let result = run(&store, ReportKind::MonthlyTrend, &params).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get(0, "prev_month_revenue"), Some(&dv("200")));
        assert_eq!(result.get(0, "three_month_avg"), Some(&dv("200")));
    }

    #[test]
    fn monthly_trend_zero_previous_month_is_guarded() {
        let store = SnapshotStore::new(Snapshot {
            sales: vec![
                completed(1, ymd(2024, 1, 5), "0"),
                completed(2, ymd(2024, 2, 5), "10"),
            ],
            ..Default::default()
        });
        let result = run(&store, ReportKind::MonthlyTrend, &ReportParams::default()).unwrap();
        assert_eq!(result.get(0, "growth_rate"), Some(&Value::Null));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].metric, "growth_rate");
        assert_eq!(result.warnings[0].occurrences, 1);
    }

    #[test]
    fn monthly_trend_months_out_of_range() {
        let params = ReportParams::default().with_months(37);
        let err = run(&SnapshotStore::default(), ReportKind::MonthlyTrend, &params).unwrap_err();
        assert!(matches!(err, AnalyticsError::Configuration(_)));
    }

    fn catalog_store() -> SnapshotStore {
        SnapshotStore::new(Snapshot {
            products: vec![
                product(1, "Laptop", "Electronics", "600", "1000"),
                product(2, "Phone", "Electronics", "300", "500"),
                product(3, "Desk", "Furniture", "150", "200"),
                product(4, "Lamp", "Furniture", "10", "0"),
            ],
            sales: vec![
                sale(1, 1, ymd(2024, 1, 5), "1000", "North", SaleStatus::Completed),
                sale(2, 2, ymd(2024, 1, 6), "500", "South", SaleStatus::Completed),
                sale(3, 3, ymd(2024, 2, 6), "500", "North", SaleStatus::Completed),
                sale(4, 1, ymd(2024, 2, 7), "1000", "South", SaleStatus::Cancelled),
                sale(5, 2, ymd(2024, 2, 8), "500", "South", SaleStatus::Pending),
            ],
            ..Default::default()
        })
    }

    #[test]
    fn product_ranking_dense_ranks_and_shares() {
        let result = run(&catalog_store(), ReportKind::ProductRanking, &ReportParams::default()).unwrap();
        // Lamp never sold and is dropped.
        assert_eq!(result.len(), 3);
        assert_eq!(result.get(0, "product_name"), Some(&Value::from("Laptop")));
        assert_eq!(result.get(0, "rank"), Some(&Value::Int(1)));
        assert_eq!(result.get(1, "rank"), Some(&Value::Int(2)));
        assert_eq!(result.get(2, "rank"), Some(&Value::Int(2)));
        assert_eq!(result.get(2, "product_name"), Some(&Value::from("Desk")));
        assert_eq!(result.get(2, "category_rank"), Some(&Value::Int(1)));
        assert_eq!(result.get(0, "revenue_share"), Some(&dv("0.5")));
        assert_eq!(result.get(0, "profit_margin"), Some(&dv("0.4")));
        assert_eq!(result.get(0, "total_quantity"), Some(&Value::Int(2)));
    }

    #[test]
    fn funnel_counts_statuses_per_region() {
        let result = run(&catalog_store(), ReportKind::Funnel, &ReportParams::default()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(0, "region"), Some(&Value::from("North")));
        assert_eq!(result.get(0, "completed_revenue"), Some(&dv("1500")));
        assert_eq!(result.get(0, "completion_rate"), Some(&dv("1")));
        assert_eq!(result.get(1, "total_transactions"), Some(&Value::Int(3)));
        assert_eq!(result.get(1, "pending"), Some(&Value::Int(1)));
        assert_eq!(result.get(1, "cancelled"), Some(&Value::Int(1)));
        assert_eq!(result.get(1, "completed"), Some(&Value::Int(1)));
        assert_eq!(result.get(1, "completion_rate"), Some(&dv("0.3333")));
        assert_eq!(result.get(1, "cancellation_rate"), Some(&dv("0.3333")));
    }

    #[test]
    fn funnel_year_filter() {
        let params = ReportParams::default().with_year(2023);
        let result = run(&catalog_store(), ReportKind::Funnel, &params).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn yoy_pivot_zero_fills_and_guards() {
        let store = SnapshotStore::new(Snapshot {
            sales: vec![
                completed(1, ymd(2023, 1, 5), "100"),
                completed(2, ymd(2024, 1, 5), "150"),
                completed(3, ymd(2024, 2, 5), "80"),
            ],
            ..Default::default()
        });
        let result = run(&store, ReportKind::YoyPivot, &ReportParams::default()).unwrap();
        assert_eq!(result.len(), 12);
        assert_eq!(result.get(0, "month_name"), Some(&Value::from("January")));
        assert_eq!(result.get(0, "previous_year_revenue"), Some(&dv("100")));
        assert_eq!(result.get(0, "current_year_revenue"), Some(&dv("150")));
        assert_eq!(result.get(0, "revenue_change"), Some(&dv("50")));
        assert_eq!(result.get(0, "yoy_growth"), Some(&dv("0.5")));
        assert_eq!(result.get(1, "yoy_growth"), Some(&Value::Null));
        assert_eq!(result.get(11, "current_year_revenue"), Some(&dv("0")));
        // February through December have no prior-year revenue.
        assert_eq!(result.warnings[0].occurrences, 11);
    }

    #[test]
    fn yoy_pivot_explicit_year_and_empty_store() {
        let params = ReportParams::default().with_year(2020);
        let result = run(&catalog_store(), ReportKind::YoyPivot, &params).unwrap();
        assert_eq!(result.len(), 12);
        assert!(result.column("current_year_revenue").unwrap().iter().all(|v| **v == dv("0")));

        let result = run(&SnapshotStore::default(), ReportKind::YoyPivot, &ReportParams::default())
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn category_analysis_shares_of_completed_revenue() {
        let result = run(&catalog_store(), ReportKind::CategoryAnalysis, &ReportParams::default()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(0, "category"), Some(&Value::from("Electronics")));
        assert_eq!(result.get(0, "product_count"), Some(&Value::Int(2)));
        assert_eq!(result.get(0, "times_sold"), Some(&Value::Int(2)));
        assert_eq!(result.get(0, "units_sold"), Some(&Value::Int(4)));
        assert_eq!(result.get(0, "total_revenue"), Some(&dv("1500")));
        assert_eq!(result.get(0, "avg_transaction"), Some(&dv("750")));
        assert_eq!(result.get(0, "revenue_share"), Some(&dv("0.75")));
        assert_eq!(result.get(1, "product_count"), Some(&Value::Int(2)));
        assert_eq!(result.get(1, "revenue_share"), Some(&dv("0.25")));
    }

    #[test]
    fn category_without_sales_keeps_null_sums_and_sorts_last() {
        let store = SnapshotStore::new(Snapshot {
            products: vec![
                product(1, "Lamp", "Home", "5", "10"),
                product(2, "Desk", "Office", "50", "90"),
            ],
            sales: vec![sale(1, 2, ymd(2024, 1, 5), "180", "North", SaleStatus::Completed)],
            ..Default::default()
        });
        let result = run(&store, ReportKind::CategoryAnalysis, &ReportParams::default()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(0, "category"), Some(&Value::from("Office")));
        assert_eq!(result.get(0, "revenue_share"), Some(&dv("1")));
        assert_eq!(result.get(1, "category"), Some(&Value::from("Home")));
        assert_eq!(result.get(1, "product_count"), Some(&Value::Int(1)));
        assert_eq!(result.get(1, "times_sold"), Some(&Value::Int(0)));
        assert_eq!(result.get(1, "units_sold"), Some(&Value::Null));
        assert_eq!(result.get(1, "total_revenue"), Some(&Value::Null));
        assert_eq!(result.get(1, "avg_transaction"), Some(&Value::Null));
        assert_eq!(result.get(1, "revenue_share"), Some(&Value::Null));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn summary_counts_and_revenue() {
        let result = run(&catalog_store(), ReportKind::Summary, &ReportParams::default()).unwrap();
        let metrics: Vec<String> = result
            .column("metric")
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(
            metrics,
            vec!["customers", "departments", "employees", "products", "sales", "total_revenue"]
        );
        assert_eq!(result.get(3, "value"), Some(&Value::Int(4)));
        assert_eq!(result.get(4, "value"), Some(&Value::Int(5)));
        assert_eq!(result.get(5, "value"), Some(&dv("3500")));
    }
}
