//! Employee-centred reports: salary distribution, leaderboard, org hierarchy
//! and department performance.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{ReportContext, coalesce, full_name, having_positive};
use crate::analytics::aggregate::{AggFn, Aggregate, JoinKind, group_by, join, ratio_to_total};
use crate::analytics::hierarchy::{self, HierarchyEntry};
use crate::analytics::types::{AnalyticsError, AnalyticsResult};
use crate::analytics::window::{Frame, RankKind, WindowSpec, moving_aggregate, rank_like};
use crate::model::{SortKey, Table, Value};
use crate::store::EntityKind;

pub(super) fn salary_distribution(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let limit = ctx.params.resolve_limit(Some(50), 200)?;
    let employees = ctx.active_employees()?;
    let departments = ctx.entities(EntityKind::Departments, "dept_id")?;
    check_departments(&employees, &departments)?;
    let staff = join(&employees, &departments, "dept_id", "dept_id", JoinKind::Inner)?;
    let staff = full_name(staff, "employee_name")?;
    ctx.stage("joined", &staff);

    let by_salary = WindowSpec::new().order_by(vec![SortKey::asc("salary")]);
    let company = WindowSpec::new().frame(Frame::Unbounded);
    let per_dept = WindowSpec::new()
        .partition_by(&["dept_id"])
        .frame(Frame::Unbounded);

    let quartile = rank_like(&staff, RankKind::Ntile(4), &by_salary)?;
    let percentile = rank_like(&staff, RankKind::PercentRank, &by_salary)?;
    let company_avg = moving_aggregate(&staff, &company, AggFn::Avg, "salary")?;
    let dept_avg = moving_aggregate(&staff, &per_dept, AggFn::Avg, "salary")?;

    Ok(staff
        .with_column("salary_quartile", quartile)?
        .with_column("percentile_rank", percentile)?
        .with_column("company_avg_salary", company_avg)?
        .with_column("dept_avg_salary", dept_avg)?
        .order_by(&[SortKey::desc("salary")])?
        .limit(limit))
}

/// Fail on an employee whose department does not exist, rather than letting
/// the inner join drop the row.
fn check_departments(employees: &Table, departments: &Table) -> AnalyticsResult<()> {
    let known: FxHashSet<i64> = departments
        .column_values("dept_id")?
        .into_iter()
        .filter_map(Value::as_i64)
        .collect();
    let c_emp = employees.col("emp_id")?;
    let c_dept = employees.col("dept_id")?;
    for row in employees.rows() {
        if let Some(dept) = row[c_dept].as_i64()
            && !known.contains(&dept)
        {
            return Err(AnalyticsError::Structural(format!(
                "employee {} references missing department {dept}",
                row[c_emp]
            )));
        }
    }
    Ok(())
}

pub(super) fn employee_leaderboard(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let limit = ctx.params.resolve_limit(Some(15), 200)?;
    let employees = ctx.active_employees()?;
    let departments = ctx.entities(EntityKind::Departments, "dept_id")?;
    let sales = ctx
        .completed_sales()?
        .select(&["sale_id", "emp_id", "customer_id", "total_amount"])?;

    check_departments(&employees, &departments)?;
    let staff = join(&employees, &departments, "dept_id", "dept_id", JoinKind::Inner)?;
    let joined = join(&staff, &sales, "emp_id", "emp_id", JoinKind::Left)?;
    let perf = group_by(
        &joined,
        &["emp_id", "first_name", "last_name", "position", "dept_id", "dept_name"],
        &[
            Aggregate::count("total_sales", "sale_id"),
            Aggregate::sum("total_revenue", "total_amount"),
            Aggregate::avg("avg_sale_value", "total_amount"),
            Aggregate::count_distinct("unique_customers", "customer_id"),
        ],
    )?;
    let perf = having_positive(perf, "total_sales")?;
    let perf = full_name(perf, "employee_name")?;
    ctx.stage("grouped", &perf);

    let by_revenue = WindowSpec::new().order_by(vec![SortKey::desc("total_revenue")]);
    let rank = rank_like(&perf, RankKind::RowNumber, &by_revenue)?;
    let dept_rank = rank_like(
        &perf,
        RankKind::Rank,
        &by_revenue.clone().partition_by(&["dept_id"]),
    )?;
    let share = ratio_to_total(
        &perf,
        "total_revenue",
        &["dept_id"],
        &mut ctx.guard,
        "dept_revenue_share",
    )?;

    Ok(perf
        .with_column("rank", rank)?
        .with_column("dept_rank", dept_rank)?
        .with_column("dept_revenue_share", share)?
        .order_by(&[SortKey::desc("total_revenue")])?
        .limit(limit))
}

pub(super) fn hierarchy(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let limit = ctx.params.resolve_limit(None, 10_000)?;
    let employees = ctx.entities(EntityKind::Employees, "emp_id")?;
    let departments = ctx.entities(EntityKind::Departments, "dept_id")?;
    let staff = join(&employees, &departments, "dept_id", "dept_id", JoinKind::Left)?;
    let staff = full_name(staff, "employee_name")?;

    let c_id = staff.col("emp_id")?;
    let c_manager = staff.col("manager_id")?;
    let c_name = staff.col("employee_name")?;
    let c_position = staff.col("position")?;
    let c_dept = staff.col("dept_name")?;

    let mut row_of: FxHashMap<i64, usize> = FxHashMap::default();
    let mut entries = Vec::with_capacity(staff.len());
    for (i, row) in staff.rows().iter().enumerate() {
        let id = row[c_id]
            .as_i64()
            .ok_or_else(|| AnalyticsError::Structural(format!("employee row {i} has no emp_id")))?;
        row_of.insert(id, i);
        entries.push(HierarchyEntry::new(
            id,
            row[c_manager].as_i64(),
            row[c_name].to_string(),
        ));
    }

    let nodes = hierarchy::resolve(&entries)?;
    let mut out = Table::new([
        "emp_id",
        "employee_name",
        "position",
        "dept_name",
        "manager_name",
        "depth",
        "direct_reports",
        "hierarchy_path",
    ]);
    for node in nodes {
        let row = &staff.rows()[row_of[&node.id]];
        let manager_name = node
            .parent_id
            .and_then(|p| row_of.get(&p))
            .map_or(Value::Null, |&m| staff.rows()[m][c_name].clone());
        out.push_row(vec![
            Value::Int(node.id),
            Value::Text(node.name),
            row[c_position].clone(),
            row[c_dept].clone(),
            manager_name,
            Value::Int(node.depth as i64),
            Value::Int(node.direct_reports as i64),
            Value::Text(node.path),
        ])?;
    }
    ctx.stage("resolved", &out);
    Ok(out.limit(limit))
}

pub(super) fn department_performance(ctx: &mut ReportContext<'_>) -> AnalyticsResult<Table> {
    let departments = ctx
        .entities(EntityKind::Departments, "dept_id")?
        .select(&["dept_id", "dept_name", "location"])?;
    let employees = ctx
        .active_employees()?
        .select(&["emp_id", "dept_id", "salary"])?;
    let sales = ctx
        .completed_sales()?
        .select(&["sale_id", "emp_id", "total_amount"])?;

    // Salary stats over distinct employees; revenue over their sales.
    let headcount = group_by(
        &employees,
        &["dept_id"],
        &[
            Aggregate::count_distinct("employee_count", "emp_id"),
            Aggregate::avg("avg_salary", "salary"),
        ],
    )?;
    let staff_sales = join(&employees, &sales, "emp_id", "emp_id", JoinKind::Left)?;
    let revenue = group_by(
        &staff_sales,
        &["dept_id"],
        &[
            Aggregate::count("total_sales", "sale_id"),
            Aggregate::sum("total_revenue", "total_amount"),
        ],
    )?;

    let perf = join(&departments, &headcount, "dept_id", "dept_id", JoinKind::Left)?;
    let perf = join(&perf, &revenue, "dept_id", "dept_id", JoinKind::Left)?;
    let perf = coalesce(perf, "employee_count", Value::Int(0))?;
    let perf = coalesce(perf, "total_sales", Value::Int(0))?;
    ctx.stage("grouped", &perf);

    let c_revenue = perf.col("total_revenue")?;
    let c_count = perf.col("employee_count")?;
    let per_employee = perf
        .rows()
        .iter()
        .map(|r| {
            ctx.guard
                .ratio_values("revenue_per_employee", &r[c_revenue], &r[c_count])
        })
        .collect();

    perf.with_column("revenue_per_employee", per_employee)?
        .order_by(&[SortKey::desc("total_revenue").nulls_last()])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
