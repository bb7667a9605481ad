//! Snapshot-backed record store.
//!
//! Serves entity tables from a [`Snapshot`] held in memory, loaded either from
//! a JSON file or handed over directly (tests, benchmarks, embedding callers).

use std::path::Path;

use tracing::{debug, info};

use super::{EntityFilter, EntityKind, RecordStore, StoreError};
use crate::model::{Customer, Department, Employee, Product, Sale, Snapshot, Table, Value};

/// Immutable, thread-safe store over one snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshot: Snapshot,
}

impl SnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot JSON document from disk.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let snapshot = Snapshot::from_json(&content)?;
        info!(
            path = %path.display(),
            departments = snapshot.departments.len(),
            employees = snapshot.employees.len(),
            products = snapshot.products.len(),
            customers = snapshot.customers.len(),
            sales = snapshot.sales.len(),
            "Loaded snapshot"
        );
        Ok(Self { snapshot })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl RecordStore for SnapshotStore {
    fn fetch(&self, kind: EntityKind, filter: Option<&EntityFilter>) -> Result<Table, StoreError> {
        if let Some(f) = filter
            && !f.applies_to(kind)
        {
            return Err(StoreError::UnsupportedFilter {
                kind,
                filter: f.clone(),
            });
        }

        let s = &self.snapshot;
        let rows: Vec<Vec<Value>> = match kind {
            EntityKind::Departments => s.departments.iter().map(department_row).collect(),
            EntityKind::Employees => s
                .employees
                .iter()
                .filter(|e| filter.is_none() || e.is_active)
                .map(employee_row)
                .collect(),
            EntityKind::Products => s.products.iter().map(product_row).collect(),
            EntityKind::Customers => s.customers.iter().map(customer_row).collect(),
            EntityKind::Sales => s
                .sales
                .iter()
                .filter(|sale| match filter {
                    Some(EntityFilter::Status(status)) => sale.status == *status,
                    _ => true,
                })
                .map(sale_row)
                .collect(),
        };
        debug!(entity = %kind, rows = rows.len(), filtered = filter.is_some(), "fetch");

        Table::from_rows(kind.columns().iter().copied(), rows)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

fn department_row(d: &Department) -> Vec<Value> {
    vec![
        d.dept_id.into(),
        d.dept_name.as_str().into(),
        d.location.clone().into(),
        d.budget.into(),
    ]
}

fn employee_row(e: &Employee) -> Vec<Value> {
    vec![
        e.emp_id.into(),
        e.emp_code.clone().into(),
        e.first_name.as_str().into(),
        e.last_name.as_str().into(),
        e.email.clone().into(),
        e.dept_id.into(),
        e.position.as_str().into(),
        e.salary.into(),
        e.manager_id.into(),
        e.join_date.into(),
        e.is_active.into(),
    ]
}

fn product_row(p: &Product) -> Vec<Value> {
    vec![
        p.product_id.into(),
        p.product_code.clone().into(),
        p.product_name.as_str().into(),
        p.category.as_str().into(),
        p.sub_category.clone().into(),
        p.cost_price.into(),
        p.selling_price.into(),
        p.stock_quantity.into(),
    ]
}

fn customer_row(c: &Customer) -> Vec<Value> {
    vec![
        c.customer_id.into(),
        c.customer_code.clone().into(),
        c.first_name.as_str().into(),
        c.last_name.as_str().into(),
        c.city.clone().into(),
        c.state.clone().into(),
        c.registration_date.into(),
        c.customer_segment.clone().into(),
    ]
}

fn sale_row(s: &Sale) -> Vec<Value> {
    vec![
        s.sale_id.into(),
        s.sale_code.clone().into(),
        s.customer_id.into(),
        s.emp_id.into(),
        s.product_id.into(),
        s.quantity.into(),
        s.unit_price.into(),
        s.discount_percent.into(),
        s.total_amount.into(),
        s.sale_date.into(),
        s.region.as_str().into(),
        s.payment_method.clone().into(),
        s.status.as_str().into(),
    ]
}
