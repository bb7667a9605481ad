//! Customer-centred reports: RFM segmentation, cohort retention and
//! lifetime value with churn banding.

use chrono::Datelike;

use super::{ReportContext, derive, full_name, having_positive};
use crate::analytics::aggregate::{AggFn, Aggregate, JoinKind, Predicate, group_by, join};
use crate::analytics::bucketing::{days_between, month_key, months_between};
use crate::analytics::rules::{churn_risk, rfm_segment};
use crate::analytics::types::AnalyticsResult;
use crate::analytics::window::{Frame, RankKind, WindowSpec, moving_aggregate, rank_like};
use crate::model::{SortKey, Table, Value};
use crate::store::EntityKind;

/// Customers left-joined to their completed sales.
fn customer_sales(ctx: &ReportContext<'_>) -> AnalyticsResult<Table> {
    let customers = ctx.entities(EntityKind::Customers, "customer_id")?;
    let sales = ctx
        .completed_sales()?
        .select(&["sale_id", "customer_id", "total_amount", "sale_date"])?;
    join(&customers, &sales, "customer_id", "customer_id", JoinKind::Left)
}

pub(super) fn rfm(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let limit = ctx.params.resolve_limit(Some(50), 200)?;
    let as_of = ctx.params.as_of_or_today();
    let joined = customer_sales(ctx)?;

    let scored = group_by(
        &joined,
        &["customer_id", "first_name", "last_name"],
        &[
            Aggregate::max("last_purchase", "sale_date"),
            Aggregate::count_distinct("frequency", "sale_id"),
            Aggregate::sum("monetary_value", "total_amount"),
            Aggregate::count("purchases", "sale_id"),
        ],
    )?;
    let scored = having_positive(scored, "purchases")?;
    let scored = full_name(scored, "customer_name")?;
    let c_last = scored.col("last_purchase")?;
    let scored = derive(scored, "recency_days", |r| {
        r[c_last]
            .as_date()
            .map(|last| days_between(last, as_of))
            .into()
    })?;
    ctx.stage("scored", &scored);

    // Older purchases land in the low recency buckets.
    let quintile = |key: SortKey| WindowSpec::new().order_by(vec![key]);
    let r = rank_like(&scored, RankKind::Ntile(5), &quintile(SortKey::desc("recency_days")))?;
    let f = rank_like(&scored, RankKind::Ntile(5), &quintile(SortKey::asc("frequency")))?;
    let m = rank_like(&scored, RankKind::Ntile(5), &quintile(SortKey::asc("monetary_value")))?;
    let scored = scored
        .with_column("r_score", r)?
        .with_column("f_score", f)?
        .with_column("m_score", m)?;

    let c_r = scored.col("r_score")?;
    let c_f = scored.col("f_score")?;
    let c_m = scored.col("m_score")?;
    let scored = derive(scored, "segment", |row| {
        match (row[c_r].as_i64(), row[c_f].as_i64(), row[c_m].as_i64()) {
            (Some(r), Some(f), Some(m)) => Value::from(rfm_segment(r, f, m).label()),
            _ => Value::Null,
        }
    })?;

    Ok(scored
        .order_by(&[SortKey::desc("monetary_value")])?
        .limit(limit))
}

/// `(offset, count column, retention column)`; offset 0 is the cohort size.
const COHORT_OFFSETS: &[(i64, &str, Option<&str>)] = &[
    (0, "month_0", None),
    (1, "month_1", Some("retention_1m")),
    (2, "month_2", None),
    (3, "month_3", Some("retention_3m")),
    (6, "month_6", Some("retention_6m")),
    (12, "month_12", Some("retention_12m")),
];

pub(super) fn cohort_retention(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let limit = ctx.params.resolve_limit(None, 120)?;
    let sales = ctx
        .completed_sales()?
        .select(&["sale_id", "customer_id", "sale_date"])?;

    let per_customer = WindowSpec::new()
        .partition_by(&["customer_id"])
        .frame(Frame::Unbounded);
    let first = moving_aggregate(&sales, &per_customer, AggFn::Min, "sale_date")?;
    let activity = sales.with_column("first_purchase", first)?;

    let c_date = activity.col("sale_date")?;
    let c_first = activity.col("first_purchase")?;
    let activity = derive(activity, "cohort_month", |r| {
        r[c_first].as_date().map(month_key).into()
    })?;
    let activity = derive(activity, "months_since_first", |r| {
        r[c_first]
            .as_date()
            .zip(r[c_date].as_date())
            .map(|(first, date)| months_between(first, date))
            .into()
    })?;
    let activity = match ctx.params.year {
        Some(year) => activity.filter(|r| r[c_first].as_date().is_some_and(|d| d.year() == year)),
        None => activity,
    };

    let counts: Vec<Aggregate> = COHORT_OFFSETS
        .iter()
        .map(|&(offset, name, _)| {
            Aggregate::count_distinct(name, "customer_id")
                .filter(Predicate::eq("months_since_first", offset))
        })
        .collect();
    let mut cohorts = group_by(&activity, &["cohort_month"], &counts)?;
    ctx.stage("grouped", &cohorts);

    let c_size = cohorts.col("month_0")?;
    for &(_, count, retention) in COHORT_OFFSETS {
        let Some(metric) = retention else {
            continue;
        };
        let c_count = cohorts.col(count)?;
        let values = cohorts
            .rows()
            .iter()
            .map(|r| ctx.guard.ratio_values(metric, &r[c_count], &r[c_size]))
            .collect();
        cohorts = cohorts.with_column(metric, values)?;
    }

    Ok(cohorts
        .order_by(&[SortKey::asc("cohort_month")])?
        .limit(limit))
}

pub(super) fn customer_value(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let limit = ctx.params.resolve_limit(Some(50), 200)?;
    let as_of = ctx.params.as_of_or_today();
    let joined = customer_sales(ctx)?;

    let lifetime = group_by(
        &joined,
        &["customer_id", "first_name", "last_name", "customer_segment"],
        &[
            Aggregate::count("total_purchases", "sale_id"),
            Aggregate::sum("total_spent", "total_amount"),
            Aggregate::avg("avg_order_value", "total_amount"),
            Aggregate::min("first_purchase", "sale_date"),
            Aggregate::max("last_purchase", "sale_date"),
        ],
    )?;
    let lifetime = having_positive(lifetime, "total_purchases")?;

    let c_first = lifetime.col("first_purchase")?;
    let c_last = lifetime.col("last_purchase")?;
    let lifetime = derive(lifetime, "customer_lifespan_days", |r| {
        r[c_first]
            .as_date()
            .zip(r[c_last].as_date())
            .map(|(first, last)| days_between(first, last))
            .into()
    })?;
    // Single-day customers have no rate to project from.
    let c_lifespan = lifetime.col("customer_lifespan_days")?;
    let lifetime = lifetime.filter(|r| r[c_lifespan].as_i64().is_some_and(|days| days > 0));
    let lifetime = derive(lifetime, "days_since_last_purchase", |r| {
        r[c_last]
            .as_date()
            .map(|last| days_between(last, as_of))
            .into()
    })?;
    ctx.stage("lifetime", &lifetime);

    let c_total = lifetime.col("total_purchases")?;
    let c_span = lifetime.col("customer_lifespan_days")?;
    let lifetime = derive(lifetime, "purchases_per_year", |r| {
        ctx.guard
            .ratio("purchases_per_year", r[c_total].as_decimal(), r[c_span].as_decimal())
            .and_then(|rate| rate.checked_mul(365.into()))
            .into()
    })?;

    let c_avg = lifetime.col("avg_order_value")?;
    let c_rate = lifetime.col("purchases_per_year")?;
    let lifetime = derive(lifetime, "projected_3yr_value", |r| {
        r[c_avg]
            .as_decimal()
            .zip(r[c_rate].as_decimal())
            .and_then(|(avg, rate)| avg.checked_mul(rate))
            .and_then(|v| v.checked_mul(3.into()))
            .into()
    })?;

    let c_since = lifetime.col("days_since_last_purchase")?;
    let lifetime = derive(lifetime, "churn_risk", |r| {
        r[c_since]
            .as_i64()
            .map(|days| churn_risk(days).label())
            .into()
    })?;
    let lifetime = full_name(lifetime, "customer_name")?;

    Ok(lifetime
        .order_by(&[SortKey::desc("projected_3yr_value")])?
        .limit(limit))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};
    use rust_decimal::Decimal;

    use crate::analytics::reports::{ReportKind, run};
    use crate::analytics::types::ReportParams;
    use crate::model::{Customer, Sale, SaleStatus, Snapshot, Value};
    use crate::store::SnapshotStore;

    fn ymd(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dv(s: &str) -> Value {
        Value::Decimal(s.parse().unwrap())
    }

    fn customer(id: i64, first: &str) -> Customer {
        Customer {
            customer_id: id,
            customer_code: None,
            first_name: first.into(),
            last_name: "Doe".into(),
            city: None,
            state: None,
            registration_date: None,
            customer_segment: Some("Regular".into()),
        }
    }

    fn sale(id: i64, customer_id: i64, date: NaiveDate, amount: i64) -> Sale {
        Sale {
            sale_id: id,
            sale_code: None,
            customer_id,
            emp_id: 1,
            product_id: 1,
            quantity: 1,
            unit_price: Decimal::from(amount),
            discount_percent: Decimal::ZERO,
            total_amount: Decimal::from(amount),
            sale_date: date,
            region: "North".into(),
            payment_method: None,
            status: SaleStatus::Completed,
        }
    }

    /// Customer `k` buys `k` times for `100 * k` each, most recently in
    /// month `7 + k` of 2024. Customer 6 never buys.
    fn rfm_store() -> SnapshotStore {
        let mut sales = Vec::new();
        let mut id = 0;
        for k in 1..=5_i64 {
            let last = ymd(2024, 7 + k as u32, 1);
            for i in 0..k {
                id += 1;
                let date = last.checked_sub_days(Days::new(i as u64)).unwrap();
                sales.push(sale(id, k, date, 100 * k));
            }
        }
        SnapshotStore::new(Snapshot {
            customers: ["Ada", "Ben", "Cy", "Di", "Ed", "Flo"]
                .iter()
                .enumerate()
                .map(|(i, name)| customer(i as i64 + 1, name))
                .collect(),
            sales,
            ..Default::default()
        })
    }

    #[test]
    fn rfm_scores_and_segments() {
        let params = ReportParams::default().with_as_of(ymd(2024, 12, 31));
        let result = run(&rfm_store(), ReportKind::Rfm, &params).unwrap();
        assert_eq!(result.len(), 5);

        assert_eq!(result.get(0, "customer_name"), Some(&Value::from("Ed Doe")));
        assert_eq!(result.get(0, "recency_days"), Some(&Value::Int(30)));
        assert_eq!(result.get(0, "frequency"), Some(&Value::Int(5)));
        assert_eq!(result.get(0, "monetary_value"), Some(&dv("2500")));
        for score in ["r_score", "f_score", "m_score"] {
            assert_eq!(result.get(0, score), Some(&Value::Int(5)));
            assert_eq!(result.get(4, score), Some(&Value::Int(1)));
        }
        assert_eq!(result.get(0, "segment"), Some(&Value::from("Champions")));
        assert_eq!(result.get(2, "segment"), Some(&Value::from("Loyal")));
        assert_eq!(result.get(4, "customer_name"), Some(&Value::from("Ada Doe")));
        assert_eq!(result.get(4, "segment"), Some(&Value::from("Lost")));
    }

    #[test]
    fn rfm_limit() {
        let params = ReportParams::default()
            .with_as_of(ymd(2024, 12, 31))
            .with_limit(2);
        let result = run(&rfm_store(), ReportKind::Rfm, &params).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn cohort_counts_and_retention() {
        let store = SnapshotStore::new(Snapshot {
            customers: vec![customer(1, "Ada"), customer(2, "Ben")],
            sales: vec![
                sale(1, 1, ymd(2024, 1, 10), 10),
                sale(2, 1, ymd(2024, 1, 25), 10),
                sale(3, 1, ymd(2024, 2, 3), 10),
                sale(4, 1, ymd(2024, 4, 30), 10),
                sale(5, 2, ymd(2024, 2, 14), 10),
            ],
            ..Default::default()
        });
        let result = run(&store, ReportKind::CohortRetention, &ReportParams::default()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(0, "cohort_month"), Some(&Value::from("2024-01")));
        assert_eq!(result.get(0, "month_0"), Some(&Value::Int(1)));
        assert_eq!(result.get(0, "month_1"), Some(&Value::Int(1)));
        assert_eq!(result.get(0, "month_2"), Some(&Value::Int(0)));
        assert_eq!(result.get(0, "month_3"), Some(&Value::Int(1)));
        assert_eq!(result.get(0, "retention_3m"), Some(&dv("1")));
        assert_eq!(result.get(0, "retention_6m"), Some(&dv("0")));
        assert_eq!(result.get(1, "month_0"), Some(&Value::Int(1)));
        assert_eq!(result.get(1, "retention_1m"), Some(&dv("0")));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn cohort_year_filter_uses_first_purchase() {
        let store = SnapshotStore::new(Snapshot {
            sales: vec![
                sale(1, 1, ymd(2023, 12, 10), 10),
                sale(2, 1, ymd(2024, 1, 10), 10),
                sale(3, 2, ymd(2024, 3, 1), 10),
            ],
            ..Default::default()
        });
        let params = ReportParams::default().with_year(2024);
        let result = run(&store, ReportKind::CohortRetention, &params).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get(0, "cohort_month"), Some(&Value::from("2024-03")));
    }

    #[test]
    fn customer_value_projection_and_churn() {
        let store = SnapshotStore::new(Snapshot {
            customers: vec![customer(1, "Ada"), customer(2, "Ben"), customer(3, "Cy")],
            sales: vec![
                // 2 purchases over 73 days: 10 per year.
                sale(1, 1, ymd(2024, 1, 1), 100),
                sale(2, 1, ymd(2024, 3, 14), 300),
                // One day only; excluded.
                sale(3, 2, ymd(2024, 5, 1), 50),
                // 2 purchases over 365 days.
                sale(4, 3, ymd(2023, 1, 1), 10),
                sale(5, 3, ymd(2024, 1, 1), 10),
            ],
            ..Default::default()
        });
        let params = ReportParams::default().with_as_of(ymd(2024, 12, 31));
        let result = run(&store, ReportKind::CustomerValue, &params).unwrap();
        assert_eq!(result.len(), 2);

        assert_eq!(result.get(0, "customer_name"), Some(&Value::from("Ada Doe")));
        assert_eq!(result.get(0, "customer_segment"), Some(&Value::from("Regular")));
        assert_eq!(result.get(0, "total_spent"), Some(&dv("400")));
        assert_eq!(result.get(0, "avg_order_value"), Some(&dv("200")));
        assert_eq!(result.get(0, "customer_lifespan_days"), Some(&Value::Int(73)));
        assert_eq!(result.get(0, "purchases_per_year"), Some(&dv("10")));
        assert_eq!(result.get(0, "projected_3yr_value"), Some(&dv("6000")));
        assert_eq!(result.get(0, "days_since_last_purchase"), Some(&Value::Int(292)));
        assert_eq!(result.get(0, "churn_risk"), Some(&Value::from("High")));
        assert_eq!(result.get(0, "first_purchase"), Some(&Value::Date(ymd(2024, 1, 1))));

        assert_eq!(result.get(1, "purchases_per_year"), Some(&dv("2")));
        assert_eq!(result.get(1, "projected_3yr_value"), Some(&dv("60")));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn customer_value_skips_same_day_repeat_buyers() {
        let store = SnapshotStore::new(Snapshot {
            customers: vec![customer(1, "Ada"), customer(2, "Ben")],
            sales: vec![
                sale(1, 1, ymd(2024, 6, 1), 20),
                sale(2, 1, ymd(2024, 6, 1), 30),
                sale(3, 2, ymd(2024, 1, 1), 40),
                sale(4, 2, ymd(2024, 2, 1), 40),
            ],
            ..Default::default()
        });
        let params = ReportParams::default().with_as_of(ymd(2024, 12, 31));
        let result = run(&store, ReportKind::CustomerValue, &params).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get(0, "customer_name"), Some(&Value::from("Ben Doe")));
        assert_eq!(result.get(0, "customer_lifespan_days"), Some(&Value::Int(31)));
        // Zero-day spans are dropped before the rate, so no division warning.
        assert!(result.warnings.is_empty());
    }
}
