//! # TillDB Core
//!
//! An embedded, journaled document database for retail back-office data.
//!
//! TillDB splits its records across two stores: a **business store** for
//! tenant-owned data (customers, inventory, invoices, settings) and a
//! **reference store** for shared taxonomies (the master catalog). Both are
//! fronted by a single [`Database`] facade that routes each operation by
//! its [`Table`], so callers never deal with store boundaries.
//!
//! On top of the stores sit two subsystems:
//!
//! - the [`MasterCatalog`], which seeds, deduplicates, and refreshes the
//!   reference taxonomies, and
//! - the [`BackupEngine`], which serializes the whole business store to a
//!   portable JSON snapshot and restores from one atomically.
//!
//! ## Quick Start
//!
//! ```rust
//! use tilldb_core::{Customer, Database, MasterKind, Table};
//!
//! let db = Database::open_in_memory()?;
//!
//! let id = db.add(Table::Customers, &Customer::new("Asha"))?;
//! let found: Option<Customer> = db.get(Table::Customers, &id)?;
//! assert!(found.is_some());
//!
//! // The master catalog is seeded at open.
//! let categories = db.masters_by_type(MasterKind::Category)?;
//! assert!(!categories.is_empty());
//! # Ok::<(), tilldb_core::StoreError>(())
//! ```
//!
//! ## Durability
//!
//! Every mutation is framed and appended to the owning store's journal
//! before the in-memory tables change. Opening a database replays both
//! journals; a torn tail frame from a crash is discarded, so a multi-op
//! batch (a restore, a bulk delete) applies in full or not at all.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backup;
pub mod database;
pub mod dir;
pub mod document;
pub mod error;
pub mod journal;
pub mod keygen;
pub mod masters;
pub mod model;
pub mod schema;
pub mod signal;
pub mod store;

pub use backup::{BackupEngine, BackupOutcome, RestoreOutcome, REQUIRED_TABLES};
pub use database::{Database, DatabaseConfig, TypedTable};
pub use document::{document_id, Document, IndexKey};
pub use error::{StoreError, StoreResult};
pub use journal::JournalOp;
pub use keygen::generate_id;
pub use masters::{MasterCatalog, SeedReport};
pub use model::{
    Analytics, BackupHistory, BackupHistoryEntry, BookingInvoice, Customer, Entity, FirmInfo,
    ImageRecord, InventoryItem, Invoice, InvoiceKind, InvoiceLine, InvoiceStatus, Master,
    MasterKind, NotificationPrefs, Payment, Purchase, Settings, TemplatePrefs, User, SETTINGS_ID,
};
pub use schema::{Schema, StoreKind, Table};
pub use signal::{InvalidationCause, InvalidationEvent, InvalidationFeed};
pub use store::RecordStore;
