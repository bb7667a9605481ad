//! Record store adapter.
//!
//! The engine never talks to a database directly. It pulls whole entity
//! tables through [`RecordStore::fetch`], once per report invocation, and
//! works on the materialized rows from there.

use thiserror::Error;

use crate::model::{SaleStatus, Table};

pub mod snapshot;

pub use snapshot::SnapshotStore;

/// Errors raised by a store implementation. Reports surface these unchanged.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("filter {filter:?} does not apply to {kind}")]
    UnsupportedFilter { kind: EntityKind, filter: EntityFilter },
}

/// The entity streams a store can serve.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Departments,
    Employees,
    Products,
    Customers,
    Sales,
}

impl EntityKind {
    pub const ALL: [Self; 5] = [
        Self::Departments,
        Self::Employees,
        Self::Products,
        Self::Customers,
        Self::Sales,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Departments => "departments",
            Self::Employees => "employees",
            Self::Products => "products",
            Self::Customers => "customers",
            Self::Sales => "sales",
        }
    }

    /// Fixed field set shared by every row of this kind.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Departments => &["dept_id", "dept_name", "location", "budget"],
            Self::Employees => &[
                "emp_id",
                "emp_code",
                "first_name",
                "last_name",
                "email",
                "dept_id",
                "position",
                "salary",
                "manager_id",
                "join_date",
                "is_active",
            ],
            Self::Products => &[
                "product_id",
                "product_code",
                "product_name",
                "category",
                "sub_category",
                "cost_price",
                "selling_price",
                "stock_quantity",
            ],
            Self::Customers => &[
                "customer_id",
                "customer_code",
                "first_name",
                "last_name",
                "city",
                "state",
                "registration_date",
                "customer_segment",
            ],
            Self::Sales => &[
                "sale_id",
                "sale_code",
                "customer_id",
                "emp_id",
                "product_id",
                "quantity",
                "unit_price",
                "discount_percent",
                "total_amount",
                "sale_date",
                "region",
                "payment_method",
                "status",
            ],
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters a store may push down. Reports re-apply their own predicates, so
/// a store that ignores these is still correct, only slower.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityFilter {
    /// `is_active = true` (employees).
    ActiveOnly,
    /// `status = <status>` (sales).
    Status(SaleStatus),
}

impl EntityFilter {
    pub fn applies_to(&self, kind: EntityKind) -> bool {
        matches!(
            (self, kind),
            (Self::ActiveOnly, EntityKind::Employees) | (Self::Status(_), EntityKind::Sales)
        )
    }
}

/// Source of typed tabular records.
///
/// Implementations must be shareable across threads: concurrent report
/// invocations each call `fetch` independently and hold no shared state.
pub trait RecordStore: Send + Sync {
    /// Return every row of `kind`, optionally pre-filtered.
    fn fetch(&self, kind: EntityKind, filter: Option<&EntityFilter>) -> Result<Table, StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn fetch(&self, kind: EntityKind, filter: Option<&EntityFilter>) -> Result<Table, StoreError> {
        (**self).fetch(kind, filter)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn fetch(&self, kind: EntityKind, filter: Option<&EntityFilter>) -> Result<Table, StoreError> {
        (**self).fetch(kind, filter)
    }
}
