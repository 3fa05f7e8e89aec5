//! Record stores: named tables of documents, replayed from a journal.
//!
//! A [`RecordStore`] owns the tables of one [`StoreKind`]. All tables are
//! created eagerly at open time from the store's schema, so a lookup against
//! a declared table can never race table creation. Rows live in memory,
//! ordered by id; every mutation is journaled before it is applied.
//!
//! Writes are serialized through a single store-wide lock. Reads take a
//! shared lock and never block each other.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeBounds;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tilldb_storage::JournalBackend;

use crate::document::{document_id, Document, IndexKey};
use crate::error::{StoreError, StoreResult};
use crate::journal::{Journal, JournalOp};
use crate::schema::{Schema, StoreKind, Table};

/// One table's rows and secondary indexes.
#[derive(Debug, Default)]
struct TableState {
    rows: BTreeMap<String, Document>,
    indexes: BTreeMap<&'static str, BTreeMap<IndexKey, BTreeSet<String>>>,
}

impl TableState {
    fn new(table: Table) -> Self {
        let mut indexes = BTreeMap::new();
        for field in table.indexed_fields() {
            indexes.insert(*field, BTreeMap::new());
        }
        Self {
            rows: BTreeMap::new(),
            indexes,
        }
    }

    fn index_insert(&mut self, id: &str, doc: &Document) {
        for (field, index) in &mut self.indexes {
            let key = IndexKey::for_field(doc, field);
            index.entry(key).or_default().insert(id.to_string());
        }
    }

    fn index_remove(&mut self, id: &str, doc: &Document) {
        for (field, index) in &mut self.indexes {
            let key = IndexKey::for_field(doc, field);
            if let Some(ids) = index.get_mut(&key) {
                ids.remove(id);
                if ids.is_empty() {
                    index.remove(&key);
                }
            }
        }
    }

    fn put(&mut self, id: String, doc: Document) {
        if let Some(old) = self.rows.remove(&id) {
            self.index_remove(&id, &old);
        }
        self.index_insert(&id, &doc);
        self.rows.insert(id, doc);
    }

    fn delete(&mut self, id: &str) -> bool {
        match self.rows.remove(id) {
            Some(old) => {
                self.index_remove(id, &old);
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        self.rows.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
    }
}

/// A journaled document store holding the tables of one store kind.
pub struct RecordStore {
    schema: Schema,
    journal: Journal,
    tables: RwLock<BTreeMap<Table, TableState>>,
    write_lock: Mutex<()>,
    sync_writes: bool,
    closed: AtomicBool,
}

impl RecordStore {
    /// Opens a store on `backend` at the current schema version, replaying
    /// any journaled state.
    ///
    /// # Errors
    ///
    /// Fails if the journal is corrupt, belongs to a different store kind,
    /// or was written by a newer schema version.
    pub fn open(
        backend: Box<dyn JournalBackend>,
        kind: StoreKind,
        sync_writes: bool,
    ) -> StoreResult<Self> {
        let schema = Schema::current(kind);
        let (journal, replay) = Journal::open(backend, kind, schema.version())?;

        let mut tables: BTreeMap<Table, TableState> = schema
            .tables()
            .into_iter()
            .map(|table| (table, TableState::new(table)))
            .collect();
        for op in &replay.ops {
            apply_op(&mut tables, op)?;
        }

        tracing::debug!(
            store = kind.name(),
            version = schema.version(),
            ops = replay.ops.len(),
            "store opened"
        );

        Ok(Self {
            schema,
            journal,
            tables: RwLock::new(tables),
            write_lock: Mutex::new(()),
            sync_writes,
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the store kind.
    #[must_use]
    pub const fn kind(&self) -> StoreKind {
        self.schema.kind()
    }

    /// Returns the schema version the store is running at.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema.version()
    }

    /// Returns the tables this store holds, in schema order.
    #[must_use]
    pub fn tables(&self) -> Vec<Table> {
        self.schema.tables()
    }

    /// Point lookup by primary key.
    ///
    /// A missing id is not an error; the result is `None`.
    pub fn get(&self, table: Table, id: &str) -> StoreResult<Option<Document>> {
        self.ensure_open()?;
        let tables = self.tables.read();
        Ok(self.table_state(&tables, table)?.rows.get(id).cloned())
    }

    /// Full scan, in ascending id order.
    pub fn get_all(&self, table: Table) -> StoreResult<Vec<Document>> {
        self.ensure_open()?;
        let tables = self.tables.read();
        Ok(self
            .table_state(&tables, table)?
            .rows
            .values()
            .cloned()
            .collect())
    }

    /// Equality lookup against a declared index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexNotFound`] if `field` is not indexed on
    /// this table.
    pub fn get_by_index(
        &self,
        table: Table,
        field: &str,
        key: &IndexKey,
    ) -> StoreResult<Vec<Document>> {
        self.ensure_open()?;
        let tables = self.tables.read();
        let state = self.table_state(&tables, table)?;
        let index = state
            .indexes
            .get(field)
            .ok_or_else(|| StoreError::IndexNotFound {
                table: table.name().to_string(),
                field: field.to_string(),
            })?;
        let mut docs = Vec::new();
        if let Some(ids) = index.get(key) {
            for id in ids {
                if let Some(doc) = state.rows.get(id) {
                    docs.push(doc.clone());
                }
            }
        }
        Ok(docs)
    }

    /// Range scan against a declared index, in ascending key order.
    pub fn range_by_index<R>(&self, table: Table, field: &str, range: R) -> StoreResult<Vec<Document>>
    where
        R: RangeBounds<IndexKey>,
    {
        self.ensure_open()?;
        let tables = self.tables.read();
        let state = self.table_state(&tables, table)?;
        let index = state
            .indexes
            .get(field)
            .ok_or_else(|| StoreError::IndexNotFound {
                table: table.name().to_string(),
                field: field.to_string(),
            })?;
        let mut docs = Vec::new();
        for (_, ids) in index.range(range) {
            for id in ids {
                if let Some(doc) = state.rows.get(id) {
                    docs.push(doc.clone());
                }
            }
        }
        Ok(docs)
    }

    /// Returns the number of rows in a table.
    pub fn count(&self, table: Table) -> StoreResult<usize> {
        self.ensure_open()?;
        let tables = self.tables.read();
        Ok(self.table_state(&tables, table)?.rows.len())
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self, table: Table) -> StoreResult<bool> {
        Ok(self.count(table)? == 0)
    }

    /// Inserts a new document.
    ///
    /// The document must carry a string `id` field; the façade generates one
    /// before it gets here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if the id is already taken and
    /// [`StoreError::Validation`] if the document has no string id.
    pub fn insert(&self, table: Table, doc: Document) -> StoreResult<()> {
        let _write = self.write_lock.lock();
        self.ensure_open()?;
        let id = require_id(table, &doc)?;
        {
            let tables = self.tables.read();
            if self.table_state(&tables, table)?.rows.contains_key(&id) {
                return Err(StoreError::duplicate_key(table.name(), id));
            }
        }
        self.commit_op(JournalOp::Put { table, id, doc })
    }

    /// Merges `changes` into the existing document under `id`.
    ///
    /// Only the top-level fields present in `changes` are overwritten; the
    /// rest of the document is untouched. The `id` field cannot be changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no document exists under `id`.
    pub fn update(&self, table: Table, id: &str, changes: Document) -> StoreResult<()> {
        let _write = self.write_lock.lock();
        self.ensure_open()?;
        if let Some(new_id) = document_id(&changes) {
            if new_id != id {
                return Err(StoreError::validation(format!(
                    "cannot change record id from {id} to {new_id}"
                )));
            }
        }
        let merged = {
            let tables = self.tables.read();
            let mut doc = self
                .table_state(&tables, table)?
                .rows
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(table.name(), id))?;
            for (field, value) in changes {
                doc.insert(field, value);
            }
            doc
        };
        self.commit_op(JournalOp::Put {
            table,
            id: id.to_string(),
            doc: merged,
        })
    }

    /// Deletes the document under `id`.
    ///
    /// Deleting an id that does not exist is a no-op, not an error.
    pub fn remove(&self, table: Table, id: &str) -> StoreResult<()> {
        let _write = self.write_lock.lock();
        self.ensure_open()?;
        {
            let tables = self.tables.read();
            if !self.table_state(&tables, table)?.rows.contains_key(id) {
                return Ok(());
            }
        }
        self.commit_op(JournalOp::Delete {
            table,
            id: id.to_string(),
        })
    }

    /// Inserts a batch of documents as one journaled unit.
    ///
    /// Validation runs up front: if any document lacks an id or collides
    /// with an existing or in-batch id, nothing is inserted.
    pub fn bulk_insert(&self, table: Table, docs: Vec<Document>) -> StoreResult<()> {
        let _write = self.write_lock.lock();
        self.ensure_open()?;
        let mut ids = Vec::with_capacity(docs.len());
        {
            let tables = self.tables.read();
            let state = self.table_state(&tables, table)?;
            let mut batch_ids = BTreeSet::new();
            for doc in &docs {
                let id = require_id(table, doc)?;
                if state.rows.contains_key(&id) || !batch_ids.insert(id.clone()) {
                    return Err(StoreError::duplicate_key(table.name(), id));
                }
                ids.push(id);
            }
        }
        let ops: Vec<JournalOp> = ids
            .into_iter()
            .zip(docs)
            .map(|(id, doc)| JournalOp::Put { table, id, doc })
            .collect();
        self.commit_batch(&ops)
    }

    /// Deletes a batch of ids as one journaled unit, returning how many
    /// existed. Missing ids are skipped.
    pub fn bulk_delete(&self, table: Table, ids: &[String]) -> StoreResult<usize> {
        let _write = self.write_lock.lock();
        self.ensure_open()?;
        let ops: Vec<JournalOp> = {
            let tables = self.tables.read();
            let state = self.table_state(&tables, table)?;
            ids.iter()
                .filter(|id| state.rows.contains_key(*id))
                .map(|id| JournalOp::Delete {
                    table,
                    id: id.clone(),
                })
                .collect()
        };
        let deleted = ops.len();
        self.commit_batch(&ops)?;
        Ok(deleted)
    }

    /// Removes every row in the table.
    pub fn clear(&self, table: Table) -> StoreResult<()> {
        let _write = self.write_lock.lock();
        self.ensure_open()?;
        {
            let tables = self.tables.read();
            self.table_state(&tables, table)?;
        }
        self.commit_op(JournalOp::Clear { table })
    }

    /// Applies a mixed batch of operations across tables as one journaled
    /// unit. This is the bulk path the backup engine restores through: the
    /// batch either replays in full or not at all.
    pub fn apply_batch(&self, ops: Vec<JournalOp>) -> StoreResult<()> {
        let _write = self.write_lock.lock();
        self.ensure_open()?;
        {
            let tables = self.tables.read();
            for op in &ops {
                self.table_state(&tables, op.table())?;
                if let JournalOp::Put { doc, id, table } = op {
                    let doc_id = require_id(*table, doc)?;
                    if doc_id != *id {
                        return Err(StoreError::validation(format!(
                            "batch op id {id} does not match document id {doc_id}"
                        )));
                    }
                }
            }
        }
        self.commit_batch(&ops)
    }

    /// Rewrites the journal to contain only the live rows.
    ///
    /// Run at quiescent points; the journal grows with every overwrite and
    /// delete until compacted.
    pub fn compact(&self) -> StoreResult<()> {
        let _write = self.write_lock.lock();
        self.ensure_open()?;
        let ops: Vec<JournalOp> = {
            let tables = self.tables.read();
            tables
                .iter()
                .flat_map(|(table, state)| {
                    state.rows.iter().map(|(id, doc)| JournalOp::Put {
                        table: *table,
                        id: id.clone(),
                        doc: doc.clone(),
                    })
                })
                .collect()
        };
        self.journal
            .rewrite(self.schema.kind(), self.schema.version(), &ops)
    }

    /// Flushes and syncs the journal, then marks the store closed.
    ///
    /// Further operations fail with [`StoreError::DatabaseClosed`]. Closing
    /// twice is harmless.
    pub fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.journal.sync()?;
        tracing::debug!(store = self.schema.kind().name(), "store closed");
        Ok(())
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::DatabaseClosed);
        }
        Ok(())
    }

    fn table_state<'a>(
        &self,
        tables: &'a BTreeMap<Table, TableState>,
        table: Table,
    ) -> StoreResult<&'a TableState> {
        tables
            .get(&table)
            .ok_or_else(|| StoreError::table_not_found(table.name()))
    }

    /// Journals one op, then applies it to memory. Callers hold the write
    /// lock.
    fn commit_op(&self, op: JournalOp) -> StoreResult<()> {
        self.journal.append_op(&op)?;
        if self.sync_writes {
            self.journal.sync()?;
        }
        let mut tables = self.tables.write();
        apply_op(&mut tables, &op)
    }

    /// Journals a batch frame, then applies it to memory. Callers hold the
    /// write lock.
    fn commit_batch(&self, ops: &[JournalOp]) -> StoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        self.journal.append_batch(ops)?;
        if self.sync_writes {
            self.journal.sync()?;
        }
        let mut tables = self.tables.write();
        for op in ops {
            apply_op(&mut tables, op)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("kind", &self.schema.kind())
            .field("version", &self.schema.version())
            .finish_non_exhaustive()
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn require_id(table: Table, doc: &Document) -> StoreResult<String> {
    document_id(doc)
        .map(str::to_string)
        .ok_or_else(|| {
            StoreError::validation(format!(
                "record for table {} has no string id",
                table.name()
            ))
        })
}

/// Applies one op to the in-memory tables. Used both for journal replay at
/// open and for live mutations after their journal append. The tables map
/// is built from the schema, so an op against an undeclared table fails
/// here.
fn apply_op(tables: &mut BTreeMap<Table, TableState>, op: &JournalOp) -> StoreResult<()> {
    let table = op.table();
    let state = tables
        .get_mut(&table)
        .ok_or_else(|| StoreError::table_not_found(table.name()))?;
    match op {
        JournalOp::Put { id, doc, .. } => state.put(id.clone(), doc.clone()),
        JournalOp::Delete { id, .. } => {
            state.delete(id);
        }
        JournalOp::Clear { .. } => state.clear(),
    }
    Ok(())
}
