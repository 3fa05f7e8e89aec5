//! Database facade: one polymorphic entry point over both stores.
//!
//! A [`Database`] owns the business and reference stores, routes every
//! operation to the right one by table, and wires up the master catalog,
//! the backup engine, and the invalidation feed. Callers never learn which
//! store holds a table.
//!
//! ```rust,ignore
//! use tilldb_core::{Database, Customer, Table};
//!
//! let db = Database::open(Path::new("till_data"))?;
//! let id = db.add(Table::Customers, &Customer::new("Asha"))?;
//! let found: Option<Customer> = db.get(Table::Customers, &id)?;
//! db.close()?;
//! ```

use std::marker::PhantomData;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tilldb_storage::{FileBackend, JournalBackend, MemoryBackend};

use crate::backup::{BackupEngine, BackupOutcome, RestoreOutcome};
use crate::dir::DatabaseDir;
use crate::document::{document_id, IndexKey};
use crate::error::{StoreError, StoreResult};
use crate::keygen;
use crate::masters::{MasterCatalog, SeedReport};
use crate::model::{from_document, to_document, Entity, Master, MasterKind};
use crate::schema::{StoreKind, Table};
use crate::signal::{InvalidationCause, InvalidationEvent, InvalidationFeed};
use crate::store::RecordStore;

/// Options for opening a database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Create the database directory if it does not exist.
    pub create_if_missing: bool,
    /// Force every write to durable storage before returning. Slower but
    /// crash-safe; defaults to on.
    pub sync_on_write: bool,
    /// Seed and deduplicate the master catalog during open.
    pub initialize_masters: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            initialize_masters: true,
        }
    }
}

impl DatabaseConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether every write syncs to durable storage.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets whether opening runs the master-catalog startup sequence.
    #[must_use]
    pub const fn initialize_masters(mut self, value: bool) -> Self {
        self.initialize_masters = value;
        self
    }
}

/// The main database handle.
///
/// Owns both record stores for its lifetime. Clones are not provided;
/// share a database behind an `Arc` instead.
pub struct Database {
    business: Arc<RecordStore>,
    reference: Arc<RecordStore>,
    masters: MasterCatalog,
    backup: BackupEngine,
    feed: Arc<InvalidationFeed>,
    _dir: Option<DatabaseDir>,
}

impl Database {
    /// Opens or creates a persistent database in `path`.
    ///
    /// Takes an exclusive lock on the directory, replays both journals,
    /// and runs the master-catalog startup sequence.
    ///
    /// # Errors
    ///
    /// Fails if another process holds the lock, or if either journal is
    /// corrupt or from a newer schema version.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, DatabaseConfig::default())
    }

    /// Opens a persistent database with explicit options.
    pub fn open_with_config(path: &Path, config: DatabaseConfig) -> StoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing)?;
        let business = FileBackend::open(&dir.journal_path(StoreKind::Business))?;
        let reference = FileBackend::open(&dir.journal_path(StoreKind::Reference))?;
        Self::assemble(
            Box::new(business),
            Box::new(reference),
            Some(dir),
            &config,
        )
    }

    /// Opens an ephemeral in-memory database, mostly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open_with_backends(
            Box::new(MemoryBackend::new()),
            Box::new(MemoryBackend::new()),
            DatabaseConfig::default().sync_on_write(false),
        )
    }

    /// Opens a database over caller-supplied journal backends.
    pub fn open_with_backends(
        business: Box<dyn JournalBackend>,
        reference: Box<dyn JournalBackend>,
        config: DatabaseConfig,
    ) -> StoreResult<Self> {
        Self::assemble(business, reference, None, &config)
    }

    fn assemble(
        business: Box<dyn JournalBackend>,
        reference: Box<dyn JournalBackend>,
        dir: Option<DatabaseDir>,
        config: &DatabaseConfig,
    ) -> StoreResult<Self> {
        let business = Arc::new(RecordStore::open(
            business,
            StoreKind::Business,
            config.sync_on_write,
        )?);
        let reference = Arc::new(RecordStore::open(
            reference,
            StoreKind::Reference,
            config.sync_on_write,
        )?);
        let feed = Arc::new(InvalidationFeed::new());
        let masters = MasterCatalog::new(Arc::clone(&reference));
        let backup = BackupEngine::new(Arc::clone(&business), Arc::clone(&feed));

        let db = Self {
            business,
            reference,
            masters,
            backup,
            feed,
            _dir: dir,
        };
        if config.initialize_masters {
            let report = db.masters.initialize()?;
            if report.attempted > 0 {
                tracing::info!(
                    inserted = report.inserted,
                    attempted = report.attempted,
                    "master catalog seeded at open"
                );
            }
        }
        Ok(db)
    }

    /// Inserts a record, returning its id.
    ///
    /// A record that serializes without an `id` gets one generated with the
    /// table's prefix.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if the record's id is taken and
    /// [`StoreError::Validation`] if the record does not serialize to a
    /// JSON object.
    pub fn add<T: Serialize>(&self, table: Table, record: &T) -> StoreResult<String> {
        let mut doc = to_document(record)?;
        let id = match document_id(&doc) {
            Some(id) => id.to_string(),
            None => {
                let id = keygen::generate_id(table.id_prefix());
                doc.insert("id".to_string(), serde_json::Value::String(id.clone()));
                id
            }
        };
        self.store_for(table).insert(table, doc)?;
        Ok(id)
    }

    /// Point lookup by id. A missing record is `None`, not an error.
    pub fn get<T: DeserializeOwned>(&self, table: Table, id: &str) -> StoreResult<Option<T>> {
        self.store_for(table)
            .get(table, id)?
            .map(from_document)
            .transpose()
    }

    /// Full scan. Order is unspecified; sort at the call site.
    pub fn get_all<T: DeserializeOwned>(&self, table: Table) -> StoreResult<Vec<T>> {
        self.store_for(table)
            .get_all(table)?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Merges `changes` into the record under `id`.
    ///
    /// Only the top-level fields the patch serializes are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the record does not exist and
    /// [`StoreError::Validation`] if the patch does not serialize to a JSON
    /// object.
    pub fn update<P: Serialize>(&self, table: Table, id: &str, changes: &P) -> StoreResult<()> {
        let patch = to_document(changes)?;
        self.store_for(table).update(table, id, patch)
    }

    /// Deletes the record under `id`. Deleting a missing id is a no-op.
    pub fn remove(&self, table: Table, id: &str) -> StoreResult<()> {
        self.store_for(table).remove(table, id)
    }

    /// Equality lookup against a declared secondary index.
    pub fn get_by_index<T: DeserializeOwned>(
        &self,
        table: Table,
        field: &str,
        key: &IndexKey,
    ) -> StoreResult<Vec<T>> {
        self.store_for(table)
            .get_by_index(table, field, key)?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Returns a typed view over one entity's table.
    #[must_use]
    pub fn typed<E: Entity>(&self) -> TypedTable<'_, E> {
        TypedTable {
            db: self,
            _entity: PhantomData,
        }
    }

    /// Returns the masters of one taxonomy, sorted by display order.
    pub fn masters_by_type(&self, kind: MasterKind) -> StoreResult<Vec<Master>> {
        self.masters.masters_by_kind(kind)
    }

    /// Clears the master catalog and reseeds the built-in taxonomy,
    /// signaling subscribers that reference reads went stale.
    ///
    /// Destructive: user-added master values are lost.
    pub fn refresh_masters(&self) -> StoreResult<SeedReport> {
        let report = self.masters.hard_refresh()?;
        self.feed.emit(InvalidationCause::MastersRefreshed);
        Ok(report)
    }

    /// Generates a collision-resistant record id with the given prefix.
    #[must_use]
    pub fn generate_id(&self, prefix: &str) -> String {
        keygen::generate_id(prefix)
    }

    /// Serializes the business store into a snapshot. See
    /// [`BackupEngine::create_backup`].
    pub fn create_backup(&self) -> BackupOutcome {
        self.backup.create_backup()
    }

    /// Replaces the business store from a snapshot. See
    /// [`BackupEngine::restore_backup`].
    pub fn restore_backup(&self, data: &str) -> RestoreOutcome {
        self.backup.restore_backup(data)
    }

    /// Subscribes to invalidation events from restores and refreshes.
    pub fn subscribe_invalidations(&self) -> Receiver<InvalidationEvent> {
        self.feed.subscribe()
    }

    /// Returns the master catalog for lifecycle operations.
    #[must_use]
    pub fn masters(&self) -> &MasterCatalog {
        &self.masters
    }

    /// Rewrites both journals down to their live rows.
    pub fn compact(&self) -> StoreResult<()> {
        self.business.compact()?;
        self.reference.compact()
    }

    /// Flushes and closes both stores. Closing twice is harmless.
    pub fn close(&self) -> StoreResult<()> {
        self.business.close()?;
        self.reference.close()
    }

    fn store_for(&self, table: Table) -> &RecordStore {
        match table.store_kind() {
            StoreKind::Business => &self.business,
            StoreKind::Reference => &self.reference,
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("business", &self.business)
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

/// Typed access to the table an [`Entity`] lives in.
///
/// Obtained from [`Database::typed`]; the table routing comes from the
/// entity type, so a typed call site cannot name an unknown table.
pub struct TypedTable<'db, E: Entity> {
    db: &'db Database,
    _entity: PhantomData<E>,
}

impl<E: Entity> TypedTable<'_, E> {
    /// Inserts an entity, returning its id.
    pub fn add(&self, entity: &E) -> StoreResult<String> {
        self.db.add(E::TABLE, entity)
    }

    /// Point lookup by id.
    pub fn get(&self, id: &str) -> StoreResult<Option<E>> {
        self.db.get(E::TABLE, id)
    }

    /// Full scan.
    pub fn all(&self) -> StoreResult<Vec<E>> {
        self.db.get_all(E::TABLE)
    }

    /// Merges a patch into the entity under `id`.
    pub fn update<P: Serialize>(&self, id: &str, changes: &P) -> StoreResult<()> {
        self.db.update(E::TABLE, id, changes)
    }

    /// Deletes the entity under `id`.
    pub fn remove(&self, id: &str) -> StoreResult<()> {
        self.db.remove(E::TABLE, id)
    }
}
