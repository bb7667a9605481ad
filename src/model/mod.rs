//! Entity records and the dynamic row model.

pub mod types;
pub mod value;

pub use types::{Customer, Department, Employee, Product, Sale, SaleStatus, Snapshot};
pub use value::{Direction, SortKey, Table, Value};
