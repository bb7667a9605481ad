use chrono::NaiveDate;
use rust_decimal::Decimal;
use smart_bi_engine::model::{Customer, Department, Employee, Product, Sale, SaleStatus, Snapshot};
use smart_bi_engine::store::SnapshotStore;
use std::path::PathBuf;
use tempfile::TempDir;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// Path of a file under `tests/fixtures/`.
#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[allow(dead_code)]
pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[allow(dead_code)]
pub fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

/// Fluent snapshot builder. Ids are assigned by the caller; everything else
/// gets a plausible default.
#[allow(dead_code)]
#[derive(Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

#[allow(dead_code)]
impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn department(mut self, id: i64, name: &str) -> Self {
        self.snapshot.departments.push(Department {
            dept_id: id,
            dept_name: name.into(),
            location: Some("HQ".into()),
            budget: None,
        });
        self
    }

    pub fn employee(
        mut self,
        id: i64,
        first_name: &str,
        dept_id: i64,
        salary: i64,
        manager_id: Option<i64>,
    ) -> Self {
        self.snapshot.employees.push(Employee {
            emp_id: id,
            emp_code: None,
            first_name: first_name.into(),
            last_name: "Test".into(),
            email: None,
            dept_id,
            position: "Associate".into(),
            salary: Decimal::from(salary),
            manager_id,
            join_date: None,
            is_active: true,
        });
        self
    }

    pub fn product(mut self, id: i64, name: &str, category: &str, cost: i64, price: i64) -> Self {
        self.snapshot.products.push(Product {
            product_id: id,
            product_code: None,
            product_name: name.into(),
            category: category.into(),
            sub_category: None,
            cost_price: Decimal::from(cost),
            selling_price: Decimal::from(price),
            stock_quantity: 10,
        });
        self
    }

    pub fn customer(mut self, id: i64, first_name: &str) -> Self {
        self.snapshot.customers.push(Customer {
            customer_id: id,
            customer_code: None,
            first_name: first_name.into(),
            last_name: "Buyer".into(),
            city: None,
            state: None,
            registration_date: None,
            customer_segment: Some("Regular".into()),
        });
        self
    }

    /// A completed single-unit sale.
    pub fn sale(self, id: i64, customer_id: i64, emp_id: i64, date: NaiveDate, amount: &str) -> Self {
        self.sale_with(id, customer_id, emp_id, 1, date, amount, SaleStatus::Completed)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sale_with(
        mut self,
        id: i64,
        customer_id: i64,
        emp_id: i64,
        product_id: i64,
        date: NaiveDate,
        amount: &str,
        status: SaleStatus,
    ) -> Self {
        self.snapshot.sales.push(Sale {
            sale_id: id,
            sale_code: None,
            customer_id,
            emp_id,
            product_id,
            quantity: 1,
            unit_price: dec(amount),
            discount_percent: Decimal::ZERO,
            total_amount: dec(amount),
            sale_date: date,
            region: "North".into(),
            payment_method: None,
            status,
        });
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }

    pub fn store(self) -> SnapshotStore {
        SnapshotStore::new(self.snapshot)
    }

    /// Write the snapshot as JSON into a fresh temp dir.
    pub fn write(self) -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("snapshot.json");
        let json = serde_json::to_string_pretty(&self.snapshot).expect("serialize snapshot");
        std::fs::write(&path, json).expect("write snapshot");
        (dir, path)
    }
}
