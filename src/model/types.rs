//! Normalized entity structs.
//!
//! These mirror the relational schema the engine reads from. The store adapter
//! converts them into [`Table`](super::value::Table)s on fetch; reports never
//! see the typed structs directly.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a sale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    #[default]
    Completed,
    Pending,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Department {
    pub dept_id: i64,
    pub dept_name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub budget: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Employee {
    pub emp_id: i64,
    #[serde(default)]
    pub emp_code: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub dept_id: i64,
    pub position: String,
    pub salary: Decimal,
    /// Reporting line; `None` for department heads.
    #[serde(default)]
    pub manager_id: Option<i64>,
    #[serde(default)]
    pub join_date: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Employee {
    /// "First Last", the display name every report uses.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub product_id: i64,
    #[serde(default)]
    pub product_code: Option<String>,
    pub product_name: String,
    pub category: String,
    #[serde(default)]
    pub sub_category: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub stock_quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub customer_id: i64,
    #[serde(default)]
    pub customer_code: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub registration_date: Option<NaiveDate>,
    /// Marketing segment assigned at registration (Premium / Regular / Occasional).
    #[serde(default)]
    pub customer_segment: Option<String>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub sale_id: i64,
    #[serde(default)]
    pub sale_code: Option<String>,
    pub customer_id: i64,
    pub emp_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount_percent: Decimal,
    pub total_amount: Decimal,
    pub sale_date: NaiveDate,
    pub region: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub status: SaleStatus,
}

/// A full point-in-time copy of every entity the engine reads.
///
/// Serialized as a single JSON document; this is the on-disk format consumed by
/// [`SnapshotStore`](crate::store::SnapshotStore).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub sales: Vec<Sale>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
