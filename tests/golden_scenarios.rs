//! End-to-end scenarios with hand-computed expected output.

mod util;

use smart_bi_engine::analytics::format::{format_currency, format_percent};
use smart_bi_engine::analytics::hierarchy::{self, HierarchyEntry};
use smart_bi_engine::analytics::rules::{RfmSegment, rfm_segment};
use smart_bi_engine::analytics::{ReportKind, ReportParams, run};
use smart_bi_engine::model::Value;
use util::{SnapshotBuilder, dec, ymd};

fn int(v: Option<&Value>) -> i64 {
    v.and_then(Value::as_i64).expect("integer cell")
}

#[test]
fn salary_quartiles_fill_earliest_buckets() {
    let store = SnapshotBuilder::new()
        .department(1, "Sales")
        .employee(1, "Low", 1, 50_000, None)
        .employee(2, "Mid", 1, 70_000, Some(1))
        .employee(3, "High", 1, 90_000, Some(1))
        .store();
    let result = run(&store, ReportKind::SalaryDistribution, &ReportParams::default()).unwrap();

    // Ordered by salary descending.
    let quartiles: Vec<i64> = (0..3).map(|i| int(result.get(i, "salary_quartile"))).collect();
    assert_eq!(quartiles, vec![3, 2, 1]);
    assert_eq!(result.get(0, "percentile_rank"), Some(&Value::Decimal(dec("1"))));
    assert_eq!(result.get(1, "percentile_rank"), Some(&Value::Decimal(dec("0.5"))));
    assert_eq!(result.get(2, "percentile_rank"), Some(&Value::Decimal(dec("0"))));
    assert_eq!(result.get(0, "company_avg_salary"), Some(&Value::Decimal(dec("70000"))));
}

#[test]
fn monthly_growth_with_zero_month() {
    let store = SnapshotBuilder::new()
        .sale(1, 1, 1, ymd(2024, 1, 10), "100")
        .sale(2, 1, 1, ymd(2024, 2, 10), "150")
        .sale(3, 1, 1, ymd(2024, 3, 10), "0")
        .store();
    let result = run(&store, ReportKind::MonthlyTrend, &ReportParams::default()).unwrap();
    assert_eq!(result.len(), 3);

    let march = result.get(0, "growth_rate").and_then(Value::as_decimal).unwrap();
    assert_eq!(format_percent(march), "-100.00%");
    assert_eq!(result.get(2, "month"), Some(&Value::from("2024-01")));
    assert_eq!(result.get(2, "growth_rate"), Some(&Value::Null));
    assert!(result.warnings.is_empty());
}

#[test]
fn cohort_with_gap_month() {
    let store = SnapshotBuilder::new()
        .customer(1, "Solo")
        .sale(1, 1, 1, ymd(2024, 1, 5), "10")
        .sale(2, 1, 1, ymd(2024, 2, 5), "10")
        .sale(3, 1, 1, ymd(2024, 4, 5), "10")
        .store();
    let result = run(&store, ReportKind::CohortRetention, &ReportParams::default()).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(int(result.get(0, "month_0")), 1);
    assert_eq!(int(result.get(0, "month_1")), 1);
    assert_eq!(int(result.get(0, "month_2")), 0);
    assert_eq!(int(result.get(0, "month_3")), 1);
    let r3 = result.get(0, "retention_3m").and_then(Value::as_decimal).unwrap();
    assert_eq!(format_percent(r3), "100.00%");
}

#[test]
fn hierarchy_depths_and_paths() {
    let nodes = hierarchy::resolve(&[
        HierarchyEntry::new(1, None, "A"),
        HierarchyEntry::new(2, Some(1), "B"),
        HierarchyEntry::new(3, Some(1), "C"),
        HierarchyEntry::new(4, Some(2), "D"),
    ])
    .unwrap();
    let by_id = |id: i64| nodes.iter().find(|n| n.id == id).unwrap();
    assert_eq!(
        [1, 2, 3, 4].map(|id| by_id(id).depth),
        [1, 2, 2, 3]
    );
    assert_eq!(by_id(1).path, "A");
    assert_eq!(by_id(2).path, "A > B");
    assert_eq!(by_id(3).path, "A > C");
    assert_eq!(by_id(4).path, "A > B > D");

    let store = SnapshotBuilder::new()
        .department(1, "Ops")
        .employee(1, "A", 1, 1, None)
        .employee(2, "B", 1, 1, Some(1))
        .employee(3, "C", 1, 1, Some(1))
        .employee(4, "D", 1, 1, Some(2))
        .store();
    let result = run(&store, ReportKind::Hierarchy, &ReportParams::default()).unwrap();
    let ids: Vec<i64> = (0..4).map(|i| int(result.get(i, "emp_id"))).collect();
    assert_eq!(ids, vec![1, 2, 4, 3]);
    assert_eq!(
        result.get(2, "hierarchy_path"),
        Some(&Value::from("A Test > B Test > D Test"))
    );
    assert_eq!(int(result.get(0, "direct_reports")), 2);
}

#[test]
fn rfm_extremes() {
    assert_eq!(rfm_segment(5, 5, 5), RfmSegment::Champions);
    assert_eq!(rfm_segment(1, 1, 1), RfmSegment::Lost);
    assert_eq!(rfm_segment(5, 5, 5).to_string(), "Champions");
}

#[test]
fn currency_presentation() {
    assert_eq!(format_currency(dec("1234.5")), "$1,234.50");
    assert_eq!(format_currency(dec("0.005")), "$0.01");
}
