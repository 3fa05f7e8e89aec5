//! Whole-store backup and restore.
//!
//! A backup is a single JSON document holding one array per business table
//! plus a `schemaVersion` field, serialized to text and handed back to the
//! caller. The engine never touches the filesystem; saving the bytes is the
//! caller's job. Restore replaces the business store's contents from such a
//! document in one journaled batch, so a failed restore leaves nothing
//! half-applied.
//!
//! Both entry points convert every internal failure into an outcome value
//! instead of returning errors. Their callers are UI flows that need a
//! message to show, not a panic to catch.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::document::{document_id, Document};
use crate::error::{StoreError, StoreResult};
use crate::journal::JournalOp;
use crate::keygen;
use crate::model::{to_document, Settings, SETTINGS_ID};
use crate::schema::Table;
use crate::signal::{InvalidationCause, InvalidationFeed};
use crate::store::RecordStore;

/// Key carrying the snapshot's schema version.
const SCHEMA_VERSION_KEY: &str = "schemaVersion";

/// Snapshots that predate the version field are treated as this version.
const LEGACY_SNAPSHOT_VERSION: u64 = 1;

/// Backup and restore history entries kept per list.
const HISTORY_LIMIT: usize = 3;

/// Tables a snapshot must contain to be restorable.
pub const REQUIRED_TABLES: [Table; 5] = [
    Table::Users,
    Table::Customers,
    Table::Inventory,
    Table::Invoices,
    Table::Settings,
];

/// Result of a backup attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    /// Whether the backup completed.
    pub success: bool,
    /// Suggested filename for the snapshot, on success.
    pub filename: Option<String>,
    /// The serialized snapshot, on success.
    pub data: Option<String>,
    /// What went wrong, on failure.
    pub error: Option<String>,
}

impl BackupOutcome {
    fn completed(filename: String, data: String) -> Self {
        Self {
            success: true,
            filename: Some(filename),
            data: Some(data),
            error: None,
        }
    }

    fn failed(error: &StoreError) -> Self {
        Self {
            success: false,
            filename: None,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Result of a restore attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Whether the restore completed.
    pub success: bool,
    /// What went wrong, on failure.
    pub error: Option<String>,
}

impl RestoreOutcome {
    fn completed() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: &StoreError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Serializes and restores the business store.
pub struct BackupEngine {
    store: Arc<RecordStore>,
    feed: Arc<InvalidationFeed>,
}

impl BackupEngine {
    /// Creates an engine over the business store.
    #[must_use]
    pub fn new(store: Arc<RecordStore>, feed: Arc<InvalidationFeed>) -> Self {
        Self { store, feed }
    }

    /// Serializes every business table into a snapshot.
    ///
    /// Required tables appear even when empty; other tables appear only
    /// when they hold rows. As a side effect the settings singleton's
    /// export history gains a `{timestamp, filename}` entry, keeping the
    /// most recent three.
    pub fn create_backup(&self) -> BackupOutcome {
        match self.build_snapshot() {
            Ok((filename, data)) => {
                if let Err(error) = self.record_export(&filename) {
                    tracing::warn!(%error, "failed to record backup history");
                }
                tracing::info!(filename, bytes = data.len(), "backup created");
                BackupOutcome::completed(filename, data)
            }
            Err(error) => {
                tracing::error!(%error, "backup failed");
                BackupOutcome::failed(&error)
            }
        }
    }

    /// Replaces the business store's contents from a serialized snapshot.
    ///
    /// Validation runs before anything is touched: the text must parse to a
    /// JSON object and every required table must be present. The clear and
    /// reload then apply as one journaled batch. On success an invalidation
    /// event tells subscribers to drop cached reads.
    pub fn restore_backup(&self, data: &str) -> RestoreOutcome {
        match self.apply_snapshot(data) {
            Ok(()) => {
                self.feed.emit(InvalidationCause::Restored);
                tracing::info!("restore completed");
                RestoreOutcome::completed()
            }
            Err(error) => {
                tracing::error!(%error, "restore failed");
                RestoreOutcome::failed(&error)
            }
        }
    }

    fn build_snapshot(&self) -> StoreResult<(String, String)> {
        let mut snapshot = Map::new();
        snapshot.insert(
            SCHEMA_VERSION_KEY.to_string(),
            json!(self.store.schema_version()),
        );
        for table in self.store.tables() {
            let docs = self.store.get_all(table)?;
            if docs.is_empty() && !REQUIRED_TABLES.contains(&table) {
                continue;
            }
            let rows: Vec<Value> = docs.into_iter().map(Value::Object).collect();
            snapshot.insert(table.name().to_string(), Value::Array(rows));
        }

        let filename = Utc::now()
            .format("tilldb-backup-%Y%m%d-%H%M%S.json")
            .to_string();
        let data = serde_json::to_string_pretty(&Value::Object(snapshot))?;
        Ok((filename, data))
    }

    /// Prepends an export entry to the settings singleton's history. A
    /// missing settings record is created with defaults first.
    fn record_export(&self, filename: &str) -> StoreResult<()> {
        let existing = self.store.get(Table::Settings, SETTINGS_ID)?;
        let had_settings = existing.is_some();
        let mut doc = match existing {
            Some(doc) => doc,
            None => to_document(&Settings::new())?,
        };
        prepend_history(&mut doc, "exported", filename);
        if had_settings {
            self.store.update(Table::Settings, SETTINGS_ID, doc)
        } else {
            self.store.insert(Table::Settings, doc)
        }
    }

    fn apply_snapshot(&self, data: &str) -> StoreResult<()> {
        let root: Value = serde_json::from_str(data)
            .map_err(|e| StoreError::validation(format!("backup is not valid JSON: {e}")))?;
        let Value::Object(snapshot) = root else {
            return Err(StoreError::validation(
                "backup document must be a JSON object",
            ));
        };

        let version = snapshot
            .get(SCHEMA_VERSION_KEY)
            .map_or(Some(LEGACY_SNAPSHOT_VERSION), Value::as_u64)
            .ok_or_else(|| StoreError::validation("schemaVersion must be a number"))?;
        if version > u64::from(self.store.schema_version()) {
            return Err(StoreError::validation(format!(
                "backup was written at schema version {version}, \
                 but this build supports up to {}",
                self.store.schema_version()
            )));
        }

        let missing: Vec<String> = REQUIRED_TABLES
            .iter()
            .filter(|table| !snapshot.contains_key(table.name()))
            .map(|table| table.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::missing_tables(missing));
        }

        let mut ops: Vec<JournalOp> = self
            .store
            .tables()
            .into_iter()
            .map(|table| JournalOp::Clear { table })
            .collect();
        let mut restored_settings = false;

        for (key, value) in &snapshot {
            if key == SCHEMA_VERSION_KEY {
                continue;
            }
            let Ok(table) = key.parse::<Table>() else {
                tracing::warn!(table = %key, "skipping unknown table in backup");
                continue;
            };
            if table.store_kind() != self.store.kind() {
                tracing::warn!(table = %key, "skipping foreign-store table in backup");
                continue;
            }
            let Value::Array(rows) = value else {
                return Err(StoreError::validation(format!(
                    "table {key} in backup must be an array"
                )));
            };
            for row in rows {
                let Value::Object(mut doc) = row.clone() else {
                    return Err(StoreError::validation(format!(
                        "table {key} in backup contains a non-object record"
                    )));
                };
                let id = match document_id(&doc) {
                    Some(id) => id.to_string(),
                    None => {
                        let id = keygen::generate_id(table.id_prefix());
                        doc.insert("id".to_string(), Value::String(id.clone()));
                        id
                    }
                };
                if table == Table::Settings && id == SETTINGS_ID {
                    prepend_history(&mut doc, "restored", &restore_note());
                    restored_settings = true;
                }
                ops.push(JournalOp::Put { table, id, doc });
            }
        }

        // A snapshot with an empty settings array still gets the restore
        // recorded, in a fresh singleton.
        if !restored_settings {
            let mut doc = to_document(&Settings::new())?;
            prepend_history(&mut doc, "restored", &restore_note());
            ops.push(JournalOp::Put {
                table: Table::Settings,
                id: SETTINGS_ID.to_string(),
                doc,
            });
        }

        self.store.apply_batch(ops)
    }
}

impl std::fmt::Debug for BackupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupEngine").finish_non_exhaustive()
    }
}

fn restore_note() -> String {
    format!(
        "Restored from backup on {}",
        Utc::now().format("%d %b %Y, %H:%M")
    )
}

/// Prepends `{timestamp, filename}` to one of the settings document's
/// history lists, keeping at most [`HISTORY_LIMIT`] entries. Works on the
/// raw JSON so a hand-edited or older settings record cannot fail the
/// operation.
fn prepend_history(doc: &mut Document, list: &str, filename: &str) {
    let history = doc
        .entry("backupHistory".to_string())
        .or_insert_with(|| json!({}));
    if !history.is_object() {
        *history = json!({});
    }
    let entries = history
        .as_object_mut()
        .and_then(|h| {
            h.entry(list.to_string())
                .or_insert_with(|| json!([]))
                .as_array_mut()
        });
    if let Some(entries) = entries {
        entries.insert(
            0,
            json!({"timestamp": keygen::now_millis(), "filename": filename}),
        );
        entries.truncate(HISTORY_LIMIT);
    }
    doc.insert("updatedAt".to_string(), json!(Utc::now()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{from_document, Customer, InventoryItem, User};
    use crate::schema::StoreKind;
    use serde_json::json;
    use tilldb_storage::MemoryBackend;

    fn engine() -> BackupEngine {
        let store = Arc::new(
            RecordStore::open(Box::new(MemoryBackend::new()), StoreKind::Business, false)
                .unwrap(),
        );
        BackupEngine::new(store, Arc::new(InvalidationFeed::new()))
    }

    fn populate(engine: &BackupEngine) {
        for entity in [
            to_document(&User::new("admin", "admin@shop.test", "admin")).unwrap(),
            to_document(&Settings::new()).unwrap(),
        ] {
            let table = if entity.contains_key("role") {
                Table::Users
            } else {
                Table::Settings
            };
            engine.store.insert(table, entity).unwrap();
        }
        for name in ["Asha", "Meera"] {
            engine
                .store
                .insert(Table::Customers, to_document(&Customer::new(name)).unwrap())
                .unwrap();
        }
        engine
            .store
            .insert(
                Table::Inventory,
                to_document(&InventoryItem::new("Gold Ring", "Rings", 250_000)).unwrap(),
            )
            .unwrap();
    }

    fn parse(data: &str) -> Map<String, Value> {
        serde_json::from_str::<Value>(data)
            .unwrap()
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn backup_always_includes_required_tables() {
        let engine = engine();
        let outcome = engine.create_backup();
        assert!(outcome.success);

        let snapshot = parse(&outcome.data.unwrap());
        for table in REQUIRED_TABLES {
            assert!(snapshot.contains_key(table.name()), "{}", table.name());
        }
        // Empty optional tables are left out entirely.
        assert!(!snapshot.contains_key("purchases"));
        assert!(!snapshot.contains_key("analytics"));
    }

    #[test]
    fn backup_carries_the_schema_version() {
        let engine = engine();
        let snapshot = parse(&engine.create_backup().data.unwrap());
        assert_eq!(
            snapshot.get(SCHEMA_VERSION_KEY).unwrap().as_u64().unwrap(),
            u64::from(engine.store.schema_version())
        );
    }

    #[test]
    fn backup_filename_is_date_stamped_json() {
        let engine = engine();
        let filename = engine.create_backup().filename.unwrap();
        assert!(filename.starts_with("tilldb-backup-"));
        assert!(filename.ends_with(".json"));
    }

    #[test]
    fn backup_records_export_history() {
        let engine = engine();
        populate(&engine);
        let outcome = engine.create_backup();

        let settings = engine
            .store
            .get(Table::Settings, SETTINGS_ID)
            .unwrap()
            .unwrap();
        let exported = settings["backupHistory"]["exported"].as_array().unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(
            exported[0]["filename"].as_str().unwrap(),
            outcome.filename.unwrap()
        );
    }

    #[test]
    fn export_history_keeps_the_newest_three() {
        let engine = engine();
        populate(&engine);
        for _ in 0..5 {
            assert!(engine.create_backup().success);
        }
        let settings = engine
            .store
            .get(Table::Settings, SETTINGS_ID)
            .unwrap()
            .unwrap();
        let exported = settings["backupHistory"]["exported"].as_array().unwrap();
        assert_eq!(exported.len(), HISTORY_LIMIT);
    }

    #[test]
    fn backup_without_settings_creates_the_singleton() {
        let engine = engine();
        assert!(engine.create_backup().success);
        let settings = engine.store.get(Table::Settings, SETTINGS_ID).unwrap();
        assert!(settings.is_some());
    }

    #[test]
    fn round_trip_preserves_record_counts() {
        let source = engine();
        populate(&source);
        let data = source.create_backup().data.unwrap();

        let target = engine();
        assert!(target.restore_backup(&data).success);

        for table in [Table::Users, Table::Customers, Table::Inventory] {
            assert_eq!(
                target.store.count(table).unwrap(),
                source.store.count(table).unwrap(),
                "{}",
                table.name()
            );
        }
        let names: Vec<String> = target
            .store
            .get_all(Table::Customers)
            .unwrap()
            .into_iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert!(names.contains(&"Asha".to_string()));
        assert!(names.contains(&"Meera".to_string()));
    }

    #[test]
    fn restore_replaces_existing_rows() {
        let source = engine();
        populate(&source);
        let data = source.create_backup().data.unwrap();

        let target = engine();
        target
            .store
            .insert(
                Table::Customers,
                to_document(&Customer::new("Stale")).unwrap(),
            )
            .unwrap();
        assert!(target.restore_backup(&data).success);

        let names: Vec<String> = target
            .store
            .get_all(Table::Customers)
            .unwrap()
            .into_iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert!(!names.contains(&"Stale".to_string()));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn restore_rejects_invalid_json() {
        let engine = engine();
        let outcome = engine.restore_backup("{ not json");
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("JSON"));
    }

    #[test]
    fn restore_rejects_non_object_documents() {
        let engine = engine();
        let outcome = engine.restore_backup("[1, 2, 3]");
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("object"));
    }

    #[test]
    fn restore_names_missing_tables_and_leaves_the_store_alone() {
        let engine = engine();
        populate(&engine);
        let before = engine.store.count(Table::Customers).unwrap();

        let partial = json!({
            "users": [], "inventory": [], "invoices": [], "settings": []
        });
        let outcome = engine.restore_backup(&partial.to_string());
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("customers"));
        assert_eq!(engine.store.count(Table::Customers).unwrap(), before);
    }

    #[test]
    fn restore_rejects_snapshots_from_newer_schemas() {
        let engine = engine();
        let snapshot = json!({
            "schemaVersion": 99,
            "users": [], "customers": [], "inventory": [],
            "invoices": [], "settings": []
        });
        let outcome = engine.restore_backup(&snapshot.to_string());
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("99"));
    }

    #[test]
    fn restore_accepts_snapshots_without_a_version_field() {
        let engine = engine();
        let snapshot = json!({
            "users": [], "customers": [], "inventory": [],
            "invoices": [], "settings": []
        });
        assert!(engine.restore_backup(&snapshot.to_string()).success);
    }

    #[test]
    fn restore_skips_unknown_tables() {
        let engine = engine();
        let snapshot = json!({
            "users": [], "customers": [], "inventory": [],
            "invoices": [], "settings": [],
            "payroll": [{"id": "x"}]
        });
        assert!(engine.restore_backup(&snapshot.to_string()).success);
    }

    #[test]
    fn restore_generates_ids_for_records_without_one() {
        let engine = engine();
        let snapshot = json!({
            "users": [], "inventory": [], "invoices": [], "settings": [],
            "customers": [{"name": "No Id"}]
        });
        assert!(engine.restore_backup(&snapshot.to_string()).success);
        let customers = engine.store.get_all(Table::Customers).unwrap();
        assert_eq!(customers.len(), 1);
        assert!(document_id(&customers[0]).unwrap().starts_with("cust-"));
    }

    #[test]
    fn restore_prepends_to_the_restore_history() {
        let source = engine();
        populate(&source);
        let data = source.create_backup().data.unwrap();

        let target = engine();
        assert!(target.restore_backup(&data).success);
        assert!(target.restore_backup(&data).success);

        let settings = target
            .store
            .get(Table::Settings, SETTINGS_ID)
            .unwrap()
            .unwrap();
        let restored = settings["backupHistory"]["restored"].as_array().unwrap();
        // Each restore replays the snapshot's history, then prepends one
        // entry, so the additive depth here is the snapshot's plus one.
        assert_eq!(restored.len(), 1);
        assert!(restored[0]["filename"]
            .as_str()
            .unwrap()
            .starts_with("Restored from backup on"));
    }

    #[test]
    fn restore_history_is_additive_across_chained_snapshots() {
        let engine = engine();
        populate(&engine);
        // Restore, back up the restored state, restore again: the second
        // restore sees the first restore's entry in the snapshot and keeps
        // it behind the new one.
        let first = engine.create_backup().data.unwrap();
        assert!(engine.restore_backup(&first).success);
        let second = engine.create_backup().data.unwrap();
        assert!(engine.restore_backup(&second).success);

        let settings = engine
            .store
            .get(Table::Settings, SETTINGS_ID)
            .unwrap()
            .unwrap();
        let restored = settings["backupHistory"]["restored"].as_array().unwrap();
        assert_eq!(restored.len(), 2);
    }

    #[test]
    fn restore_with_empty_settings_still_records_the_restore() {
        let engine = engine();
        let snapshot = json!({
            "users": [], "customers": [], "inventory": [],
            "invoices": [], "settings": []
        });
        assert!(engine.restore_backup(&snapshot.to_string()).success);
        let settings = engine
            .store
            .get(Table::Settings, SETTINGS_ID)
            .unwrap()
            .unwrap();
        let restored = settings["backupHistory"]["restored"].as_array().unwrap();
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn restore_emits_an_invalidation_event() {
        let store = Arc::new(
            RecordStore::open(Box::new(MemoryBackend::new()), StoreKind::Business, false)
                .unwrap(),
        );
        let feed = Arc::new(InvalidationFeed::new());
        let engine = BackupEngine::new(store, Arc::clone(&feed));
        let rx = feed.subscribe();

        let snapshot = json!({
            "users": [], "customers": [], "inventory": [],
            "invoices": [], "settings": []
        });
        assert!(engine.restore_backup(&snapshot.to_string()).success);
        assert_eq!(rx.recv().unwrap().cause, InvalidationCause::Restored);
    }

    #[test]
    fn failed_restore_emits_nothing() {
        let store = Arc::new(
            RecordStore::open(Box::new(MemoryBackend::new()), StoreKind::Business, false)
                .unwrap(),
        );
        let feed = Arc::new(InvalidationFeed::new());
        let engine = BackupEngine::new(store, Arc::clone(&feed));
        let rx = feed.subscribe();

        assert!(!engine.restore_backup("nope").success);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn restored_settings_deserialize_as_typed_entities() {
        let engine = engine();
        populate(&engine);
        let data = engine.create_backup().data.unwrap();
        assert!(engine.restore_backup(&data).success);

        let doc = engine
            .store
            .get(Table::Settings, SETTINGS_ID)
            .unwrap()
            .unwrap();
        let settings: Settings = from_document(doc).unwrap();
        assert_eq!(settings.backup_history.restored.len(), 1);
    }
}
