//! The fixed report catalog.
//!
//! Each report is a pure function of one store snapshot and its parameters:
//! fetch entity tables, join, filter, group, window, derive labels, order,
//! limit. Nothing is cached between invocations, so reports can run in
//! parallel against a shared store.

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{debug, info};

use super::derive::{DivisionGuard, round_half_up};
use super::types::{
    AnalyticsError, AnalyticsResult, ColumnKind, ColumnSpec, Param, ReportParams, ReportResult,
};
use crate::model::{SaleStatus, SortKey, Table, Value};
use crate::store::{EntityFilter, EntityKind, RecordStore};

mod customers;
mod people;
mod sales;

use super::types::ColumnKind::{Currency, Date, Integer, Month, Percent, Text};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReportKind {
    SalaryDistribution,
    MonthlyTrend,
    Rfm,
    ProductRanking,
    EmployeeLeaderboard,
    CohortRetention,
    Funnel,
    Hierarchy,
    CustomerValue,
    YoyPivot,
    DepartmentPerformance,
    CategoryAnalysis,
    Summary,
}

impl ReportKind {
    pub const ALL: [Self; 13] = [
        Self::SalaryDistribution,
        Self::MonthlyTrend,
        Self::Rfm,
        Self::ProductRanking,
        Self::EmployeeLeaderboard,
        Self::CohortRetention,
        Self::Funnel,
        Self::Hierarchy,
        Self::CustomerValue,
        Self::YoyPivot,
        Self::DepartmentPerformance,
        Self::CategoryAnalysis,
        Self::Summary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SalaryDistribution => "salary_distribution",
            Self::MonthlyTrend => "monthly_trend",
            Self::Rfm => "rfm",
            Self::ProductRanking => "product_ranking",
            Self::EmployeeLeaderboard => "employee_leaderboard",
            Self::CohortRetention => "cohort_retention",
            Self::Funnel => "funnel",
            Self::Hierarchy => "hierarchy",
            Self::CustomerValue => "customer_value",
            Self::YoyPivot => "yoy_pivot",
            Self::DepartmentPerformance => "department_performance",
            Self::CategoryAnalysis => "category_analysis",
            Self::Summary => "summary",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::SalaryDistribution => "Salary quartiles and percentile ranks of active employees",
            Self::MonthlyTrend => "Monthly revenue with month-over-month growth and 3-month moving average",
            Self::Rfm => "Recency/frequency/monetary quintile scores and customer segments",
            Self::ProductRanking => "Products ranked by completed revenue, overall and within category",
            Self::EmployeeLeaderboard => "Active employees ranked by completed revenue",
            Self::CohortRetention => "Customer retention by first-purchase month",
            Self::Funnel => "Transaction status funnel per region",
            Self::Hierarchy => "Reporting lines with depth and path",
            Self::CustomerValue => "Customer lifetime value, 3-year projection and churn risk",
            Self::YoyPivot => "Monthly revenue, selected year against the year before",
            Self::DepartmentPerformance => "Headcount, salary and revenue per department",
            Self::CategoryAnalysis => "Sales volume and revenue share per product category",
            Self::Summary => "Entity counts and total revenue",
        }
    }

    /// Fixed output shape.
    pub fn columns(&self) -> &'static [ColumnSpec] {
        match self {
            Self::SalaryDistribution => SALARY_DISTRIBUTION,
            Self::MonthlyTrend => MONTHLY_TREND,
            Self::Rfm => RFM,
            Self::ProductRanking => PRODUCT_RANKING,
            Self::EmployeeLeaderboard => EMPLOYEE_LEADERBOARD,
            Self::CohortRetention => COHORT_RETENTION,
            Self::Funnel => FUNNEL,
            Self::Hierarchy => HIERARCHY,
            Self::CustomerValue => CUSTOMER_VALUE,
            Self::YoyPivot => YOY_PIVOT,
            Self::DepartmentPerformance => DEPARTMENT_PERFORMANCE,
            Self::CategoryAnalysis => CATEGORY_ANALYSIS,
            Self::Summary => SUMMARY,
        }
    }

    /// Parameters this report recognises; anything else is rejected.
    pub fn accepted_params(&self) -> &'static [Param] {
        match self {
            Self::SalaryDistribution
            | Self::ProductRanking
            | Self::EmployeeLeaderboard
            | Self::Hierarchy => &[Param::Limit],
            Self::MonthlyTrend => &[Param::Months],
            Self::Rfm | Self::CustomerValue => &[Param::Limit, Param::AsOf],
            Self::CohortRetention => &[Param::Year, Param::Limit],
            Self::Funnel | Self::YoyPivot => &[Param::Year],
            Self::DepartmentPerformance | Self::CategoryAnalysis | Self::Summary => &[],
        }
    }

    pub fn accepts(&self, param: Param) -> bool {
        self.accepted_params().contains(&param)
    }

    fn compute(&self, ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
        match self {
            Self::SalaryDistribution => people::salary_distribution(ctx),
            Self::MonthlyTrend => sales::monthly_trend(ctx),
            Self::Rfm => customers::rfm(ctx),
            Self::ProductRanking => sales::product_ranking(ctx),
            Self::EmployeeLeaderboard => people::employee_leaderboard(ctx),
            Self::CohortRetention => customers::cohort_retention(ctx),
            Self::Funnel => sales::funnel(ctx),
            Self::Hierarchy => people::hierarchy(ctx),
            Self::CustomerValue => customers::customer_value(ctx),
            Self::YoyPivot => sales::yoy_pivot(ctx),
            Self::DepartmentPerformance => people::department_performance(ctx),
            Self::CategoryAnalysis => sales::category_analysis(ctx),
            Self::Summary => sales::summary(ctx),
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| AnalyticsError::Configuration(format!("unknown report '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Column sets
// ---------------------------------------------------------------------------

const fn col(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec::new(name, kind)
}

static SALARY_DISTRIBUTION: &[ColumnSpec] = &[
    col("employee_name", Text),
    col("position", Text),
    col("dept_name", Text),
    col("salary", Currency),
    col("salary_quartile", Integer),
    col("percentile_rank", Percent),
    col("company_avg_salary", Currency),
    col("dept_avg_salary", Currency),
];

static MONTHLY_TREND: &[ColumnSpec] = &[
    col("month", Month),
    col("transaction_count", Integer),
    col("revenue", Currency),
    col("prev_month_revenue", Currency),
    col("growth_rate", Percent),
    col("three_month_avg", Currency),
];

static RFM: &[ColumnSpec] = &[
    col("customer_name", Text),
    col("recency_days", Integer),
    col("frequency", Integer),
    col("monetary_value", Currency),
    col("r_score", Integer),
    col("f_score", Integer),
    col("m_score", Integer),
    col("segment", Text),
];

static PRODUCT_RANKING: &[ColumnSpec] = &[
    col("product_name", Text),
    col("category", Text),
    col("times_sold", Integer),
    col("total_quantity", Integer),
    col("revenue", Currency),
    col("rank", Integer),
    col("category_rank", Integer),
    col("revenue_share", Percent),
    col("profit_margin", Percent),
];

static EMPLOYEE_LEADERBOARD: &[ColumnSpec] = &[
    col("rank", Integer),
    col("employee_name", Text),
    col("position", Text),
    col("dept_name", Text),
    col("total_sales", Integer),
    col("total_revenue", Currency),
    col("avg_sale_value", Currency),
    col("unique_customers", Integer),
    col("dept_rank", Integer),
    col("dept_revenue_share", Percent),
];

static COHORT_RETENTION: &[ColumnSpec] = &[
    col("cohort_month", Month),
    col("month_0", Integer),
    col("month_1", Integer),
    col("month_2", Integer),
    col("month_3", Integer),
    col("month_6", Integer),
    col("month_12", Integer),
    col("retention_1m", Percent),
    col("retention_3m", Percent),
    col("retention_6m", Percent),
    col("retention_12m", Percent),
];

static FUNNEL: &[ColumnSpec] = &[
    col("region", Text),
    col("total_transactions", Integer),
    col("pending", Integer),
    col("cancelled", Integer),
    col("completed", Integer),
    col("completed_revenue", Currency),
    col("completion_rate", Percent),
    col("cancellation_rate", Percent),
];

static HIERARCHY: &[ColumnSpec] = &[
    col("emp_id", Integer),
    col("employee_name", Text),
    col("position", Text),
    col("dept_name", Text),
    col("manager_name", Text),
    col("depth", Integer),
    col("direct_reports", Integer),
    col("hierarchy_path", Text),
];

static CUSTOMER_VALUE: &[ColumnSpec] = &[
    col("customer_name", Text),
    col("customer_segment", Text),
    col("total_purchases", Integer),
    col("total_spent", Currency),
    col("avg_order_value", Currency),
    col("first_purchase", Date),
    col("last_purchase", Date),
    col("customer_lifespan_days", Integer),
    col("days_since_last_purchase", Integer),
    col("purchases_per_year", ColumnKind::Decimal),
    col("projected_3yr_value", Currency),
    col("churn_risk", Text),
];

static YOY_PIVOT: &[ColumnSpec] = &[
    col("month_number", Integer),
    col("month_name", Text),
    col("previous_year_revenue", Currency),
    col("current_year_revenue", Currency),
    col("revenue_change", Currency),
    col("yoy_growth", Percent),
];

static DEPARTMENT_PERFORMANCE: &[ColumnSpec] = &[
    col("dept_name", Text),
    col("location", Text),
    col("employee_count", Integer),
    col("avg_salary", Currency),
    col("total_sales", Integer),
    col("total_revenue", Currency),
    col("revenue_per_employee", Currency),
];

static CATEGORY_ANALYSIS: &[ColumnSpec] = &[
    col("category", Text),
    col("product_count", Integer),
    col("times_sold", Integer),
    col("units_sold", Integer),
    col("total_revenue", Currency),
    col("avg_transaction", Currency),
    col("revenue_share", Percent),
];

static SUMMARY: &[ColumnSpec] = &[col("metric", Text), col("value", ColumnKind::Decimal)];

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Per-invocation state handed to each report.
pub(crate) struct ReportContext<'a> {
    store: &'a dyn RecordStore,
    pub params: &'a ReportParams,
    pub guard: DivisionGuard,
    report: &'static str,
}

impl ReportContext<'_> {
    fn fetch(&self, kind: EntityKind, filter: Option<EntityFilter>) -> AnalyticsResult<Table> {
        let table = self.store.fetch(kind, filter.as_ref())?;
        debug!(report = self.report, entity = %kind, rows = table.len(), "fetched");
        Ok(table)
    }

    /// Entity table ordered by its identity column, so ties in later
    /// orderings resolve by row identity.
    pub fn entities(&self, kind: EntityKind, id: &str) -> AnalyticsResult<Table> {
        self.fetch(kind, None)?
            .order_by(&[SortKey::asc(id)])
    }

    /// `status = 'completed'` sales, re-checked after push-down.
    pub fn completed_sales(&self) -> AnalyticsResult<Table> {
        let status = self
            .fetch(EntityKind::Sales, Some(EntityFilter::Status(SaleStatus::Completed)))?;
        let col = status.col("status")?;
        let wanted = Value::from(SaleStatus::Completed.as_str());
        status
            .filter(|r| r[col] == wanted)
            .order_by(&[SortKey::asc("sale_id")])
    }

    /// `is_active = true` employees, re-checked after push-down.
    pub fn active_employees(&self) -> AnalyticsResult<Table> {
        let employees = self.fetch(EntityKind::Employees, Some(EntityFilter::ActiveOnly))?;
        let col = employees.col("is_active")?;
        employees
            .filter(|r| r[col] == Value::Bool(true))
            .order_by(&[SortKey::asc("emp_id")])
    }

    pub fn stage(&self, stage: &str, table: &Table) {
        debug!(report = self.report, stage, rows = table.len(), "stage");
    }
}

/// Run a report by catalog name.
pub fn run_report(
    store: &dyn RecordStore,
    name: &str,
    params: &ReportParams,
) -> AnalyticsResult<ReportResult> {
    run(store, name.parse()?, params)
}

/// Run one report.
pub fn run(
    store: &dyn RecordStore,
    kind: ReportKind,
    params: &ReportParams,
) -> AnalyticsResult<ReportResult> {
    if let Some(p) = params.provided().into_iter().find(|p| !kind.accepts(*p)) {
        return Err(AnalyticsError::Configuration(format!(
            "report '{kind}' does not accept parameter '{p}'"
        )));
    }

    let query_start = std::time::Instant::now();
    let mut ctx = ReportContext {
        store,
        params,
        guard: DivisionGuard::new(),
        report: kind.name(),
    };
    let table = kind.compute(&mut ctx)?;
    let rows = finish(&table, kind.columns())?;
    let warnings = ctx.guard.into_warnings(kind.name());
    let elapsed_ms = query_start.elapsed().as_millis() as u64;

    info!(
        report = kind.name(),
        rows = rows.len(),
        warnings = warnings.len(),
        elapsed_ms,
        "report complete"
    );
    Ok(ReportResult {
        report: kind.name(),
        columns: kind.columns(),
        rows,
        warnings,
        elapsed_ms,
    })
}

/// Project to the report's column list and round decimals for output:
/// money to cents, ratios to four places (two as a percentage).
fn finish(table: &Table, columns: &[ColumnSpec]) -> AnalyticsResult<Vec<Vec<Value>>> {
    let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
    let projected = table.select(&names)?;
    Ok(projected
        .into_rows()
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(columns)
                .map(|(v, c)| match (v, c.kind) {
                    (Value::Decimal(d), Percent) => Value::Decimal(round_half_up(d, 4)),
                    (Value::Decimal(d), Currency | ColumnKind::Decimal) => {
                        Value::Decimal(round_half_up(d, 2))
                    }
                    (v, _) => v,
                })
                .collect()
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Shared report helpers
// ---------------------------------------------------------------------------

/// Append a column computed from each row.
pub(crate) fn derive(
    table: Table,
    name: &str,
    mut f: impl FnMut(&[Value]) -> Value,
) -> AnalyticsResult<Table> {
    let values = table.rows().iter().map(|r| f(r)).collect();
    table.with_column(name, values)
}

/// `first_name || ' ' || last_name AS name`.
pub(crate) fn full_name(table: Table, name: &str) -> AnalyticsResult<Table> {
    let first = table.col("first_name")?;
    let last = table.col("last_name")?;
    derive(table, name, |r| Value::Text(format!("{} {}", r[first], r[last])))
}

/// `COALESCE(field, default)`.
pub(crate) fn coalesce(table: Table, field: &str, default: Value) -> AnalyticsResult<Table> {
    table.update_column(field, |v| {
        if v.is_null() {
            default.clone()
        } else {
            v.clone()
        }
    })
}

/// Keep rows where `field` is a number greater than zero (`HAVING x > 0`).
pub(crate) fn having_positive(table: Table, field: &str) -> AnalyticsResult<Table> {
    let col = table.col(field)?;
    Ok(table.filter(|r| r[col].as_decimal().is_some_and(|d| d > Decimal::ZERO)))
}

/// Reject a numeric parameter outside `1..=max`.
pub(crate) fn check_range(param: Param, value: usize, max: usize) -> AnalyticsResult<usize> {
    if value == 0 || value > max {
        return Err(AnalyticsError::Configuration(format!(
            "{param} must be between 1 and {max}, got {value}"
        )));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
