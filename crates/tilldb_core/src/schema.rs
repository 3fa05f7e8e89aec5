//! Table registry and versioned store schemas.
//!
//! The set of tables is closed at compile time: routing a table name through
//! [`Table`] either yields a known table or a `TableNotFound` error, and no
//! code path can create a table the schema does not declare. Each table
//! belongs to exactly one store, carries its id prefix, and declares the
//! fields its store indexes.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Current schema version of the business store.
pub const BUSINESS_SCHEMA_VERSION: u32 = 2;

/// Current schema version of the reference store.
pub const REFERENCE_SCHEMA_VERSION: u32 = 1;

/// Which physical store a table lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// Transactional business data: customers, stock, invoices, settings.
    Business,
    /// Slow-changing reference data: the master catalog.
    Reference,
}

impl StoreKind {
    /// Returns the store's on-disk name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Reference => "reference",
        }
    }

    /// Returns the current schema version for this store.
    #[must_use]
    pub const fn current_version(self) -> u32 {
        match self {
            Self::Business => BUSINESS_SCHEMA_VERSION,
            Self::Reference => REFERENCE_SCHEMA_VERSION,
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every table the database knows about.
///
/// Multi-word tables use camelCase wire names to match the field convention
/// of stored documents, so `Table::BookingInvoices.name()` is
/// `"bookingInvoices"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// Till operators and admins.
    Users,
    /// Customer ledger.
    Customers,
    /// Stock items.
    Inventory,
    /// Sales and purchase invoices.
    Invoices,
    /// Long-running booking invoices with accumulated payments.
    BookingInvoices,
    /// Supplier purchase records.
    Purchases,
    /// The settings singleton.
    Settings,
    /// Daily analytics rollups.
    Analytics,
    /// Stored image blobs, keyed by filename.
    Images,
    /// Reference-data master records.
    Masters,
}

impl Table {
    /// All tables, in schema order.
    pub const ALL: [Self; 10] = [
        Self::Users,
        Self::Customers,
        Self::Inventory,
        Self::Invoices,
        Self::BookingInvoices,
        Self::Purchases,
        Self::Settings,
        Self::Analytics,
        Self::Images,
        Self::Masters,
    ];

    /// Returns the table's wire name, used in journals and snapshots.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Customers => "customers",
            Self::Inventory => "inventory",
            Self::Invoices => "invoices",
            Self::BookingInvoices => "bookingInvoices",
            Self::Purchases => "purchases",
            Self::Settings => "settings",
            Self::Analytics => "analytics",
            Self::Images => "images",
            Self::Masters => "masters",
        }
    }

    /// Returns the store this table lives in.
    #[must_use]
    pub const fn store_kind(self) -> StoreKind {
        match self {
            Self::Masters => StoreKind::Reference,
            _ => StoreKind::Business,
        }
    }

    /// Returns the prefix new record ids in this table are generated with.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Users => "user",
            Self::Customers => "cust",
            Self::Inventory => "item",
            Self::Invoices => "inv",
            Self::BookingInvoices => "binv",
            Self::Purchases => "pur",
            Self::Settings => "set",
            Self::Analytics => "ana",
            Self::Images => "img",
            Self::Masters => "mstr",
        }
    }

    /// Returns the document fields this table keeps secondary indexes on.
    #[must_use]
    pub const fn indexed_fields(self) -> &'static [&'static str] {
        match self {
            Self::Users => &["email"],
            Self::Customers => &["name", "email", "phone"],
            Self::Inventory => &["name", "category", "barcode"],
            Self::Invoices => &["customerId", "type", "status"],
            Self::BookingInvoices => &["customerId"],
            Self::Purchases => &["supplier"],
            Self::Masters => &["type", "value"],
            Self::Settings | Self::Analytics | Self::Images => &[],
        }
    }

    /// Returns the schema version that introduced this table.
    #[must_use]
    pub const fn since_version(self) -> u32 {
        match self {
            Self::Users
            | Self::Customers
            | Self::Inventory
            | Self::Invoices
            | Self::Settings
            | Self::Masters => 1,
            Self::BookingInvoices | Self::Purchases | Self::Analytics | Self::Images => 2,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|table| table.name() == name)
            .ok_or_else(|| StoreError::table_not_found(name))
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Table {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl Visitor<'_> for TableVisitor {
            type Value = Table;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a known table name")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Table, E> {
                value
                    .parse()
                    .map_err(|_| E::unknown_variant(value, &["users", "customers", "masters"]))
            }
        }

        deserializer.deserialize_str(TableVisitor)
    }
}

impl Serialize for StoreKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for StoreKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KindVisitor;

        impl Visitor<'_> for KindVisitor {
            type Value = StoreKind;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a store kind name")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<StoreKind, E> {
                match value {
                    "business" => Ok(StoreKind::Business),
                    "reference" => Ok(StoreKind::Reference),
                    other => Err(E::unknown_variant(other, &["business", "reference"])),
                }
            }
        }

        deserializer.deserialize_str(KindVisitor)
    }
}

/// A store schema: the tables a store holds at a given version.
///
/// Versions are additive. A later version only ever introduces tables, so a
/// journal written at version N replays cleanly into a store opened at any
/// version >= N.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    kind: StoreKind,
    version: u32,
}

impl Schema {
    /// The current schema for a store.
    #[must_use]
    pub const fn current(kind: StoreKind) -> Self {
        Self {
            kind,
            version: kind.current_version(),
        }
    }

    /// A historical schema, used when replaying old journals.
    #[must_use]
    pub const fn at_version(kind: StoreKind, version: u32) -> Self {
        Self { kind, version }
    }

    /// Returns the store this schema describes.
    #[must_use]
    pub const fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Returns the schema version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the tables present at this schema version, in schema order.
    #[must_use]
    pub fn tables(&self) -> Vec<Table> {
        Table::ALL
            .iter()
            .copied()
            .filter(|table| {
                table.store_kind() == self.kind && table.since_version() <= self.version
            })
            .collect()
    }

    /// Returns true if the table exists at this schema version.
    #[must_use]
    pub fn contains(&self, table: Table) -> bool {
        table.store_kind() == self.kind && table.since_version() <= self.version
    }
}
