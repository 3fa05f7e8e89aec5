//! Reference-data lifecycle: seeding, deduplication, hard refresh.
//!
//! The master catalog owns the reference store's `masters` table. It seeds
//! the built-in taxonomy on first run, deduplicates case-insensitive value
//! collisions within each taxonomy, and supports a destructive refresh back
//! to the canonical list. Business data is never touched from here.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::document::IndexKey;
use crate::error::StoreResult;
use crate::model::{from_document, to_document, Master, MasterKind};
use crate::schema::Table;
use crate::store::RecordStore;

/// The built-in taxonomy seeded into an empty catalog.
///
/// Suppliers have no canonical values; they are user-entered.
const DEFAULT_TAXONOMY: &[(MasterKind, &[&str])] = &[
    (
        MasterKind::Category,
        &[
            "Rings",
            "Necklaces",
            "Earrings",
            "Bracelets",
            "Chains",
            "Pendants",
            "Bangles",
            "Coins",
        ],
    ),
    (
        MasterKind::Status,
        &["Paid", "Unpaid", "Overdue", "Booking"],
    ),
    (
        MasterKind::PaymentMethod,
        &["Cash", "Card", "UPI", "Bank Transfer", "Cheque"],
    ),
    (MasterKind::Unit, &["Gram", "Piece", "Carat", "Milligram"]),
    (
        MasterKind::Purity,
        &["24K", "22K", "18K", "14K", "916", "750"],
    ),
    (
        MasterKind::Metal,
        &["Gold", "Silver", "Platinum", "Diamond"],
    ),
    (
        MasterKind::LabelConfig,
        &["Standard", "Small", "Large"],
    ),
];

/// Outcome of a seeding pass.
///
/// `attempted` of zero means the catalog was already populated and seeding
/// was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    /// Records the pass tried to insert.
    pub attempted: usize,
    /// Records actually inserted.
    pub inserted: usize,
}

/// Manages the reference store's master taxonomy.
///
/// Cheap to clone via `Arc`; the catalog serializes its own lifecycle
/// passes, so two startup sequences racing into `initialize` cannot
/// double-seed.
pub struct MasterCatalog {
    store: Arc<RecordStore>,
    lifecycle: Mutex<()>,
}

impl MasterCatalog {
    /// Creates a catalog over the reference store.
    #[must_use]
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self {
            store,
            lifecycle: Mutex::new(()),
        }
    }

    /// Startup sequence: seed if empty, then deduplicate.
    pub fn initialize(&self) -> StoreResult<SeedReport> {
        let report = self.seed_if_empty()?;
        self.deduplicate()?;
        Ok(report)
    }

    /// Seeds the built-in taxonomy if the catalog holds no masters at all.
    ///
    /// Safe to call redundantly; a populated catalog is left alone.
    pub fn seed_if_empty(&self) -> StoreResult<SeedReport> {
        let _guard = self.lifecycle.lock();
        if !self.store.is_empty(Table::Masters)? {
            return Ok(SeedReport {
                attempted: 0,
                inserted: 0,
            });
        }
        Ok(self.seed())
    }

    /// Clears the catalog and reseeds the canonical taxonomy.
    ///
    /// Destructive: user-added master values are lost. Not a merge.
    pub fn hard_refresh(&self) -> StoreResult<SeedReport> {
        let report = {
            let _guard = self.lifecycle.lock();
            self.store.clear(Table::Masters)?;
            self.seed()
        };
        self.deduplicate()?;
        Ok(report)
    }

    /// Removes case-insensitive duplicate values within each taxonomy.
    ///
    /// Within a [`MasterKind`], records are ordered by `displayOrder`
    /// ascending and the first occurrence of each case-folded value
    /// survives. Everything else is bulk-deleted in one journaled unit.
    /// Returns the number of records removed.
    pub fn deduplicate(&self) -> StoreResult<usize> {
        let _guard = self.lifecycle.lock();
        let mut doomed = Vec::new();

        for kind in MasterKind::ALL {
            let mut masters = self.masters_of_kind(kind)?;
            masters.sort_by_key(|m| m.display_order);

            let mut seen: HashSet<String> = HashSet::new();
            for master in masters {
                let folded = master.value.to_lowercase();
                if !seen.insert(folded) {
                    doomed.push(master.id);
                }
            }
        }

        if doomed.is_empty() {
            return Ok(0);
        }
        let removed = self.store.bulk_delete(Table::Masters, &doomed)?;
        tracing::debug!(removed, "deduplicated master catalog");
        Ok(removed)
    }

    /// Returns the masters of one taxonomy, sorted by `displayOrder`.
    ///
    /// Inactive values are included; pickers filter on `isActive`.
    pub fn masters_by_kind(&self, kind: MasterKind) -> StoreResult<Vec<Master>> {
        let mut masters = self.masters_of_kind(kind)?;
        masters.sort_by_key(|m| m.display_order);
        Ok(masters)
    }

    /// Inserts the canonical taxonomy, logging and skipping individual
    /// failures so one bad record cannot abort the rest. Callers hold the
    /// lifecycle lock.
    fn seed(&self) -> SeedReport {
        let mut attempted = 0;
        let mut inserted = 0;

        for (kind, values) in DEFAULT_TAXONOMY {
            for (position, value) in values.iter().enumerate() {
                attempted += 1;
                let master = Master::new(*kind, *value, position as i64 + 1);
                let outcome = to_document(&master)
                    .and_then(|doc| self.store.insert(Table::Masters, doc));
                match outcome {
                    Ok(()) => inserted += 1,
                    Err(error) => {
                        tracing::warn!(
                            kind = kind.as_str(),
                            value,
                            %error,
                            "failed to seed master record"
                        );
                    }
                }
            }
        }

        tracing::info!(attempted, inserted, "seeded master catalog");
        SeedReport {
            attempted,
            inserted,
        }
    }

    fn masters_of_kind(&self, kind: MasterKind) -> StoreResult<Vec<Master>> {
        self.store
            .get_by_index(Table::Masters, "type", &IndexKey::text(kind.as_str()))?
            .into_iter()
            .map(from_document)
            .collect()
    }
}

impl std::fmt::Debug for MasterCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterCatalog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StoreKind;
    use tilldb_storage::MemoryBackend;

    fn catalog() -> MasterCatalog {
        let store = Arc::new(
            RecordStore::open(Box::new(MemoryBackend::new()), StoreKind::Reference, false)
                .unwrap(),
        );
        MasterCatalog::new(store)
    }

    fn default_count() -> usize {
        DEFAULT_TAXONOMY.iter().map(|(_, values)| values.len()).sum()
    }

    fn add(catalog: &MasterCatalog, kind: MasterKind, value: &str, order: i64) -> String {
        let master = Master::new(kind, value, order);
        let id = master.id.clone();
        catalog
            .store
            .insert(Table::Masters, to_document(&master).unwrap())
            .unwrap();
        id
    }

    #[test]
    fn seeding_an_empty_catalog_inserts_the_taxonomy() {
        let catalog = catalog();
        let report = catalog.seed_if_empty().unwrap();
        assert_eq!(report.attempted, default_count());
        assert_eq!(report.inserted, default_count());
        assert!(!catalog
            .masters_by_kind(MasterKind::Category)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn seeding_twice_is_idempotent() {
        let catalog = catalog();
        catalog.seed_if_empty().unwrap();
        let count = catalog.store.count(Table::Masters).unwrap();

        let second = catalog.seed_if_empty().unwrap();
        assert_eq!(second.attempted, 0);
        assert_eq!(second.inserted, 0);
        assert_eq!(catalog.store.count(Table::Masters).unwrap(), count);
    }

    #[test]
    fn seed_orders_values_sequentially_within_a_kind() {
        let catalog = catalog();
        catalog.seed_if_empty().unwrap();
        let categories = catalog.masters_by_kind(MasterKind::Category).unwrap();
        let orders: Vec<i64> = categories.iter().map(|m| m.display_order).collect();
        assert_eq!(orders, (1..=orders.len() as i64).collect::<Vec<_>>());
    }

    #[test]
    fn dedup_keeps_the_lowest_display_order_survivor() {
        let catalog = catalog();
        catalog.seed_if_empty().unwrap();
        add(&catalog, MasterKind::Category, "Gold", 5);
        add(&catalog, MasterKind::Category, "gold", 1);

        catalog.deduplicate().unwrap();

        let survivors: Vec<Master> = catalog
            .masters_by_kind(MasterKind::Category)
            .unwrap()
            .into_iter()
            .filter(|m| m.value.eq_ignore_ascii_case("gold"))
            .collect();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].value, "gold");
        assert_eq!(survivors[0].display_order, 1);
    }

    #[test]
    fn dedup_removes_exactly_the_duplicates() {
        let catalog = catalog();
        // Five units, two of which collide case-insensitively with earlier
        // values.
        add(&catalog, MasterKind::Unit, "Gram", 1);
        add(&catalog, MasterKind::Unit, "Piece", 2);
        add(&catalog, MasterKind::Unit, "gram", 3);
        add(&catalog, MasterKind::Unit, "Carat", 4);
        add(&catalog, MasterKind::Unit, "PIECE", 5);

        let removed = catalog.deduplicate().unwrap();
        assert_eq!(removed, 2);

        let units = catalog.masters_by_kind(MasterKind::Unit).unwrap();
        assert_eq!(units.len(), 3);
        let values: Vec<&str> = units.iter().map(|m| m.value.as_str()).collect();
        assert_eq!(values, vec!["Gram", "Piece", "Carat"]);
    }

    #[test]
    fn dedup_does_not_cross_taxonomies() {
        let catalog = catalog();
        add(&catalog, MasterKind::Metal, "Gold", 1);
        add(&catalog, MasterKind::Category, "Gold", 1);

        let removed = catalog.deduplicate().unwrap();
        assert_eq!(removed, 0);
        assert_eq!(catalog.store.count(Table::Masters).unwrap(), 2);
    }

    #[test]
    fn dedup_on_a_clean_catalog_removes_nothing() {
        let catalog = catalog();
        catalog.seed_if_empty().unwrap();
        assert_eq!(catalog.deduplicate().unwrap(), 0);
    }

    #[test]
    fn hard_refresh_discards_user_added_values() {
        let catalog = catalog();
        catalog.seed_if_empty().unwrap();
        add(&catalog, MasterKind::Category, "Custom Category", 99);

        let report = catalog.hard_refresh().unwrap();
        assert_eq!(report.inserted, default_count());

        let categories = catalog.masters_by_kind(MasterKind::Category).unwrap();
        assert!(categories.iter().all(|m| m.value != "Custom Category"));
    }

    #[test]
    fn initialize_seeds_and_deduplicates() {
        let catalog = catalog();
        add(&catalog, MasterKind::Status, "Paid", 1);
        add(&catalog, MasterKind::Status, "paid", 2);

        // Catalog is non-empty, so initialize only deduplicates.
        let report = catalog.initialize().unwrap();
        assert_eq!(report.attempted, 0);
        let statuses = catalog.masters_by_kind(MasterKind::Status).unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].value, "Paid");
    }

    #[test]
    fn masters_by_kind_sorts_by_display_order() {
        let catalog = catalog();
        add(&catalog, MasterKind::Purity, "18K", 3);
        add(&catalog, MasterKind::Purity, "24K", 1);
        add(&catalog, MasterKind::Purity, "22K", 2);

        let purities = catalog.masters_by_kind(MasterKind::Purity).unwrap();
        let values: Vec<&str> = purities.iter().map(|m| m.value.as_str()).collect();
        assert_eq!(values, vec!["24K", "22K", "18K"]);
    }
}
