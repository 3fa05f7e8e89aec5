//! Test fixtures and database helpers.
//!
//! Provides convenience constructors for test databases and a populated
//! scenario that covers every required backup table.

use std::path::PathBuf;

use tempfile::TempDir;
use tilldb_core::{
    Customer, Database, InventoryItem, Invoice, InvoiceKind, Settings, StoreResult, Table, User,
};

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self {
            db: Database::open_in_memory().expect("failed to open in-memory database"),
            _temp_dir: None,
        }
    }

    /// Creates a new file-based test database in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("till")).expect("failed to open database");
        Self {
            db,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database path if file-based, `None` if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("till"))
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test against a fresh in-memory database.
pub fn with_test_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test against a fresh file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &std::path::Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("file database has a path");
    f(&test_db.db, &path)
}

/// Populates a database with representative rows in every table a backup
/// requires, returning the id of each created invoice's customer.
pub fn populate_representative(db: &Database) -> StoreResult<Vec<String>> {
    db.add(Table::Users, &User::new("Admin", "admin@shop.test", "admin"))?;
    db.add(Table::Settings, &Settings::new())?;

    let mut customer_ids = Vec::new();
    for name in ["Asha Patel", "Meera Shah", "Ravi Kumar"] {
        customer_ids.push(db.add(Table::Customers, &Customer::new(name))?);
    }

    for (name, category, price) in [
        ("Gold Ring", "Rings", 2_500_000),
        ("Silver Chain", "Chains", 350_000),
        ("Diamond Pendant", "Pendants", 8_000_000),
    ] {
        db.add(Table::Inventory, &InventoryItem::new(name, category, price))?;
    }

    for customer_id in &customer_ids {
        db.add(
            Table::Invoices,
            &Invoice::new(customer_id.clone(), InvoiceKind::Invoice),
        )?;
    }

    Ok(customer_ids)
}
