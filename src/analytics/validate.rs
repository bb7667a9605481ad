//! Snapshot validation library.
//!
//! Provides deterministic checks for:
//! - **Identity** — every entity's id column is unique.
//! - **References** — employee department/manager and sale customer/employee/
//!   product ids resolve to existing rows.
//! - **Hierarchy** — the manager relation is acyclic.
//! - **Amounts** — sale totals are non-negative.
//!
//! Output is a structured [`ValidationReport`] that serialises to JSON
//! for `sbi validate --json`.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::model::Snapshot;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Severity level for a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single validation check result.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub id: String,
    pub ok: bool,
    pub severity: Severity,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Entity row counts seen by the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RowCounts {
    pub departments: usize,
    pub employees: usize,
    pub products: usize,
    pub customers: usize,
    pub sales: usize,
}

/// Report metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub elapsed_ms: u64,
    pub rows: RowCounts,
    pub path: String,
}

/// Full validation report.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<Check>,
    pub _meta: ReportMeta,
}

impl ValidationReport {
    /// True if every check passed.
    pub fn all_ok(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }

    /// Count of checks that failed with a given severity.
    pub fn count_failures(&self, sev: Severity) -> usize {
        self.checks
            .iter()
            .filter(|c| !c.ok && c.severity == sev)
            .count()
    }

    /// Produce the JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::json!({"error": "serialization failed"}))
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Controls how much detail failing checks carry.
#[derive(Debug, Clone)]
pub struct ValidateConfig {
    /// Maximum number of offending ids listed in a failing check's details.
    pub max_examples: usize,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self { max_examples: 5 }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Run the full validation suite and return a structured report.
pub fn run_validation(snapshot: &Snapshot, path: &str, config: &ValidateConfig) -> ValidationReport {
    let start = std::time::Instant::now();
    let mut checks = Vec::new();

    checks.extend(validate_unique_ids(snapshot, config));
    checks.extend(validate_employee_refs(snapshot, config));
    checks.push(validate_manager_cycles(snapshot, config));
    checks.extend(validate_sale_refs(snapshot, config));
    checks.push(validate_non_negative_amounts(snapshot, config));

    let elapsed_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        checks = checks.len(),
        failures = checks.iter().filter(|c| !c.ok).count(),
        elapsed_ms,
        "snapshot validation complete"
    );

    ValidationReport {
        checks,
        _meta: ReportMeta {
            elapsed_ms,
            rows: RowCounts {
                departments: snapshot.departments.len(),
                employees: snapshot.employees.len(),
                products: snapshot.products.len(),
                customers: snapshot.customers.len(),
                sales: snapshot.sales.len(),
            },
            path: path.into(),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `"3 (ids: 4, 9, 12)"`, truncated to `max` examples.
fn describe_offenders(offenders: &[i64], max: usize) -> String {
    let shown: Vec<String> = offenders.iter().take(max).map(i64::to_string).collect();
    let more = if offenders.len() > max { ", ..." } else { "" };
    format!("{} (ids: {}{more})", offenders.len(), shown.join(", "))
}

fn check_from_offenders(
    id: &str,
    subject: &str,
    offenders: &[i64],
    severity: Severity,
    action: &str,
    config: &ValidateConfig,
) -> Check {
    if offenders.is_empty() {
        Check {
            id: id.into(),
            ok: true,
            severity: Severity::Info,
            details: format!("{subject}: none"),
            suggested_action: None,
        }
    } else {
        Check {
            id: id.into(),
            ok: false,
            severity,
            details: format!("{subject}: {}", describe_offenders(offenders, config.max_examples)),
            suggested_action: Some(action.into()),
        }
    }
}

/// Ids that occur more than once, in first-repeat order.
fn duplicates(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut seen = FxHashSet::default();
    let mut reported = FxHashSet::default();
    let mut out = Vec::new();
    for id in ids {
        if !seen.insert(id) && reported.insert(id) {
            out.push(id);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn validate_unique_ids(snapshot: &Snapshot, config: &ValidateConfig) -> Vec<Check> {
    let per_entity: [(&str, Vec<i64>); 5] = [
        ("departments", duplicates(snapshot.departments.iter().map(|d| d.dept_id))),
        ("employees", duplicates(snapshot.employees.iter().map(|e| e.emp_id))),
        ("products", duplicates(snapshot.products.iter().map(|p| p.product_id))),
        ("customers", duplicates(snapshot.customers.iter().map(|c| c.customer_id))),
        ("sales", duplicates(snapshot.sales.iter().map(|s| s.sale_id))),
    ];
    per_entity
        .iter()
        .map(|(entity, dups)| {
            check_from_offenders(
                &format!("ids.unique.{entity}"),
                &format!("duplicate {entity} ids"),
                dups,
                Severity::Error,
                "Deduplicate the snapshot export; joins fan out on repeated ids",
                config,
            )
        })
        .collect()
}

fn validate_employee_refs(snapshot: &Snapshot, config: &ValidateConfig) -> Vec<Check> {
    let depts: FxHashSet<i64> = snapshot.departments.iter().map(|d| d.dept_id).collect();
    let emps: FxHashSet<i64> = snapshot.employees.iter().map(|e| e.emp_id).collect();

    let missing_dept: Vec<i64> = snapshot
        .employees
        .iter()
        .filter(|e| !depts.contains(&e.dept_id))
        .map(|e| e.emp_id)
        .collect();
    let missing_manager: Vec<i64> = snapshot
        .employees
        .iter()
        .filter(|e| e.manager_id.is_some_and(|m| !emps.contains(&m)))
        .map(|e| e.emp_id)
        .collect();

    vec![
        check_from_offenders(
            "employees.dept_ref",
            "employees referencing unknown departments",
            &missing_dept,
            Severity::Error,
            "Export the missing departments or clear the employees' dept_id",
            config,
        ),
        check_from_offenders(
            "employees.manager_ref",
            "employees referencing unknown managers",
            &missing_manager,
            Severity::Error,
            "The hierarchy report fails until every manager_id resolves",
            config,
        ),
    ]
}

/// Walk each manager chain once; a chain that re-enters the current walk is a
/// cycle. Dangling managers end the walk (reported by `employees.manager_ref`).
fn validate_manager_cycles(snapshot: &Snapshot, config: &ValidateConfig) -> Check {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum State {
        OnPath,
        Done,
    }

    let manager: FxHashMap<i64, Option<i64>> = snapshot
        .employees
        .iter()
        .map(|e| (e.emp_id, e.manager_id))
        .collect();
    let mut state: FxHashMap<i64, State> = FxHashMap::default();
    let mut in_cycle: Vec<i64> = Vec::new();

    for e in &snapshot.employees {
        let mut path = Vec::new();
        let mut cur = Some(e.emp_id);
        while let Some(id) = cur {
            match state.get(&id) {
                Some(State::Done) => break,
                Some(State::OnPath) => {
                    if let Some(pos) = path.iter().position(|&p| p == id) {
                        in_cycle.extend_from_slice(&path[pos..]);
                    }
                    break;
                }
                None => {}
            }
            let Some(next) = manager.get(&id) else {
                break;
            };
            state.insert(id, State::OnPath);
            path.push(id);
            cur = *next;
        }
        for id in path {
            state.insert(id, State::Done);
        }
    }
    in_cycle.sort_unstable();

    check_from_offenders(
        "employees.manager_cycle",
        "employees on manager cycles",
        &in_cycle,
        Severity::Error,
        "Break the cycle by clearing one manager_id; the hierarchy report rejects cyclic data",
        config,
    )
}

fn validate_sale_refs(snapshot: &Snapshot, config: &ValidateConfig) -> Vec<Check> {
    let customers: FxHashSet<i64> = snapshot.customers.iter().map(|c| c.customer_id).collect();
    let employees: FxHashSet<i64> = snapshot.employees.iter().map(|e| e.emp_id).collect();
    let products: FxHashSet<i64> = snapshot.products.iter().map(|p| p.product_id).collect();

    let dangling = |known: &FxHashSet<i64>, key: fn(&crate::model::Sale) -> i64| -> Vec<i64> {
        snapshot
            .sales
            .iter()
            .filter(|s| !known.contains(&key(s)))
            .map(|s| s.sale_id)
            .collect()
    };

    vec![
        check_from_offenders(
            "sales.customer_ref",
            "sales referencing unknown customers",
            &dangling(&customers, |s| s.customer_id),
            Severity::Error,
            "Reports joining customers silently drop these sales",
            config,
        ),
        check_from_offenders(
            "sales.employee_ref",
            "sales referencing unknown employees",
            &dangling(&employees, |s| s.emp_id),
            Severity::Error,
            "Reports joining employees silently drop these sales",
            config,
        ),
        check_from_offenders(
            "sales.product_ref",
            "sales referencing unknown products",
            &dangling(&products, |s| s.product_id),
            Severity::Error,
            "Reports joining products silently drop these sales",
            config,
        ),
    ]
}

fn validate_non_negative_amounts(snapshot: &Snapshot, config: &ValidateConfig) -> Check {
    let negative: Vec<i64> = snapshot
        .sales
        .iter()
        .filter(|s| s.total_amount.is_sign_negative() && !s.total_amount.is_zero())
        .map(|s| s.sale_id)
        .collect();
    check_from_offenders(
        "sales.non_negative_amount",
        "sales with negative total_amount",
        &negative,
        Severity::Warning,
        "Refunds should be exported as cancelled sales",
        config,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
