//! Typed entities stored in the database.
//!
//! Everything here serializes to camelCase JSON documents; the stores only
//! ever see [`Document`] maps. Timestamps are set by whoever writes the
//! record, never by the store itself.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::keygen;
use crate::schema::Table;

/// Id of the settings singleton. There is exactly one settings record per
/// database.
pub const SETTINGS_ID: &str = "settings";

/// A serde type bound to the table its records live in.
///
/// Implementing this gives access to the typed façade on
/// [`Database`](crate::Database): `db.typed::<Customer>()`.
pub trait Entity: Serialize + DeserializeOwned {
    /// Table records of this type are stored in.
    const TABLE: Table;
}

/// Serializes an entity into a stored document.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] if the entity does not serialize to a
/// JSON object.
pub fn to_document<T: Serialize>(entity: &T) -> StoreResult<Document> {
    match serde_json::to_value(entity)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::validation(format!(
            "entity must serialize to an object, got {other}"
        ))),
    }
}

/// Deserializes a stored document into an entity.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
}

/// A till operator or administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Record id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login email, indexed.
    pub email: String,
    /// Role label, e.g. `"admin"` or `"staff"`.
    pub role: String,
    /// Creation time, set by the writer.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the writer.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a user with a generated id and current timestamps.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: keygen::generate_id(Table::Users.id_prefix()),
            name: name.into(),
            email: email.into(),
            role: role.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for User {
    const TABLE: Table = Table::Users;
}

/// A customer ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Record id.
    pub id: String,
    /// Customer name, indexed.
    pub name: String,
    /// Phone number, indexed.
    #[serde(default)]
    pub phone: Option<String>,
    /// Email address, indexed.
    #[serde(default)]
    pub email: Option<String>,
    /// Postal address.
    #[serde(default)]
    pub address: Option<String>,
    /// Creation time, set by the writer.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the writer.
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Creates a customer with a generated id and current timestamps.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: keygen::generate_id(Table::Customers.id_prefix()),
            name: name.into(),
            phone: None,
            email: None,
            address: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Customer {
    const TABLE: Table = Table::Customers;
}

/// A stock item.
///
/// Monetary amounts are integer paise/cents; weights are integer
/// milligrams. Floats never touch money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    /// Record id.
    pub id: String,
    /// Item name, indexed.
    pub name: String,
    /// Category value from the master catalog, indexed.
    pub category: String,
    /// Barcode, indexed.
    #[serde(default)]
    pub barcode: Option<String>,
    /// Units in stock.
    pub quantity: i64,
    /// Sale price per unit, in cents.
    pub price_cents: i64,
    /// Metal value from the master catalog.
    #[serde(default)]
    pub metal: Option<String>,
    /// Purity value from the master catalog.
    #[serde(default)]
    pub purity: Option<String>,
    /// Item weight in milligrams.
    #[serde(default)]
    pub weight_milligrams: Option<i64>,
    /// Stored image id, if an image was uploaded.
    #[serde(default)]
    pub image_id: Option<String>,
    /// Creation time, set by the writer.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the writer.
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Creates an item with a generated id and current timestamps.
    #[must_use]
    pub fn new(name: impl Into<String>, category: impl Into<String>, price_cents: i64) -> Self {
        let now = Utc::now();
        Self {
            id: keygen::generate_id(Table::Inventory.id_prefix()),
            name: name.into(),
            category: category.into(),
            barcode: None,
            quantity: 0,
            price_cents,
            metal: None,
            purity: None,
            weight_milligrams: None,
            image_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for InventoryItem {
    const TABLE: Table = Table::Inventory;
}

/// Distinguishes plain invoices from bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceKind {
    /// A settled-at-sale invoice.
    Invoice,
    /// A booking paid off over time.
    Booking,
}

/// Payment status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Fully paid.
    Paid,
    /// Issued, not yet paid.
    Unpaid,
    /// Past its due date.
    Overdue,
    /// Held open as a booking.
    Booking,
}

/// One line on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    /// Inventory item this line sells, when stock-backed.
    #[serde(default)]
    pub item_id: Option<String>,
    /// Free-text description.
    pub description: String,
    /// Units sold.
    pub quantity: i64,
    /// Unit price in cents.
    pub unit_price_cents: i64,
    /// Line total in cents.
    pub total_cents: i64,
}

/// A sales invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Record id.
    pub id: String,
    /// Customer this invoice bills, indexed.
    pub customer_id: String,
    /// Invoice or booking, indexed. Stored under the `type` key.
    #[serde(rename = "type")]
    pub kind: InvoiceKind,
    /// Payment status, indexed.
    pub status: InvoiceStatus,
    /// Line items.
    pub lines: Vec<InvoiceLine>,
    /// Sum of line totals, in cents.
    pub subtotal_cents: i64,
    /// Tax in cents.
    pub tax_cents: i64,
    /// Grand total in cents.
    pub total_cents: i64,
    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Creation time, set by the writer.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the writer.
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates an empty invoice for a customer.
    ///
    /// Bookings start in [`InvoiceStatus::Booking`], plain invoices in
    /// [`InvoiceStatus::Unpaid`].
    #[must_use]
    pub fn new(customer_id: impl Into<String>, kind: InvoiceKind) -> Self {
        let now = Utc::now();
        let status = match kind {
            InvoiceKind::Invoice => InvoiceStatus::Unpaid,
            InvoiceKind::Booking => InvoiceStatus::Booking,
        };
        Self {
            id: keygen::generate_id(Table::Invoices.id_prefix()),
            customer_id: customer_id.into(),
            kind,
            status,
            lines: Vec::new(),
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Invoice {
    const TABLE: Table = Table::Invoices;
}

/// A payment against a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Amount paid, in cents.
    pub amount_cents: i64,
    /// Payment method value from the master catalog.
    pub method: String,
    /// When the payment was taken.
    pub paid_at: DateTime<Utc>,
}

/// A booking ledger entry tracking accumulated payments toward a total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInvoice {
    /// Record id.
    pub id: String,
    /// Customer the booking belongs to, indexed.
    pub customer_id: String,
    /// The invoice this booking settles into, once closed.
    #[serde(default)]
    pub invoice_id: Option<String>,
    /// Agreed total, in cents.
    pub total_cents: i64,
    /// Sum of payments taken so far, in cents.
    pub accumulated_cents: i64,
    /// Individual payments, newest last.
    #[serde(default)]
    pub payments: Vec<Payment>,
    /// Creation time, set by the writer.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the writer.
    pub updated_at: DateTime<Utc>,
}

impl BookingInvoice {
    /// Opens a booking for a customer at an agreed total.
    #[must_use]
    pub fn new(customer_id: impl Into<String>, total_cents: i64) -> Self {
        let now = Utc::now();
        Self {
            id: keygen::generate_id(Table::BookingInvoices.id_prefix()),
            customer_id: customer_id.into(),
            invoice_id: None,
            total_cents,
            accumulated_cents: 0,
            payments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Records a payment, updating the accumulated total.
    pub fn record_payment(&mut self, payment: Payment) {
        self.accumulated_cents += payment.amount_cents;
        self.updated_at = payment.paid_at;
        self.payments.push(payment);
    }

    /// Amount still owed, in cents.
    #[must_use]
    pub const fn outstanding_cents(&self) -> i64 {
        self.total_cents - self.accumulated_cents
    }

    /// True once payments cover the agreed total.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.outstanding_cents() <= 0
    }
}

impl Entity for BookingInvoice {
    const TABLE: Table = Table::BookingInvoices;
}

/// A purchase from a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    /// Record id.
    pub id: String,
    /// Supplier value from the master catalog, indexed.
    pub supplier: String,
    /// What was bought.
    pub description: String,
    /// Total paid, in cents.
    pub total_cents: i64,
    /// Creation time, set by the writer.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the writer.
    pub updated_at: DateTime<Utc>,
}

impl Entity for Purchase {
    const TABLE: Table = Table::Purchases;
}

/// Firm details shown on invoices and labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmInfo {
    /// Firm name.
    #[serde(default)]
    pub name: String,
    /// Street address.
    #[serde(default)]
    pub address: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Tax registration number.
    #[serde(default)]
    pub gst_number: Option<String>,
    /// Stored logo image id.
    #[serde(default)]
    pub logo_image_id: Option<String>,
}

/// Notification switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPrefs {
    /// Warn when stock runs low.
    #[serde(default = "default_true")]
    pub low_stock_alerts: bool,
    /// Remind about unpaid invoices.
    #[serde(default = "default_true")]
    pub payment_reminders: bool,
    /// Remind when the last backup is stale.
    #[serde(default = "default_true")]
    pub backup_reminders: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            low_stock_alerts: true,
            payment_reminders: true,
            backup_reminders: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Print template choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePrefs {
    /// Invoice print template name.
    #[serde(default = "TemplatePrefs::default_template")]
    pub invoice_template: String,
    /// Label print template name.
    #[serde(default = "TemplatePrefs::default_template")]
    pub label_template: String,
}

impl TemplatePrefs {
    fn default_template() -> String {
        "standard".to_string()
    }
}

impl Default for TemplatePrefs {
    fn default() -> Self {
        Self {
            invoice_template: Self::default_template(),
            label_template: Self::default_template(),
        }
    }
}

/// One backup or restore event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupHistoryEntry {
    /// Event time in unix milliseconds.
    pub timestamp: u64,
    /// Backup filename, or a restore description.
    pub filename: String,
}

/// Recent backup and restore events, newest first, at most three each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupHistory {
    /// Recent exports.
    #[serde(default)]
    pub exported: Vec<BackupHistoryEntry>,
    /// Recent restores.
    #[serde(default)]
    pub restored: Vec<BackupHistoryEntry>,
}

/// The per-database settings singleton, stored under [`SETTINGS_ID`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Always [`SETTINGS_ID`].
    pub id: String,
    /// Firm details.
    #[serde(default)]
    pub firm: FirmInfo,
    /// Notification switches.
    #[serde(default)]
    pub notifications: NotificationPrefs,
    /// Print template choices.
    #[serde(default)]
    pub templates: TemplatePrefs,
    /// Recent backup and restore events.
    #[serde(default)]
    pub backup_history: BackupHistory,
    /// Creation time, set by the writer.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the writer.
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    /// Creates the default settings singleton.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SETTINGS_ID.to_string(),
            firm: FirmInfo::default(),
            notifications: NotificationPrefs::default(),
            templates: TemplatePrefs::default(),
            backup_history: BackupHistory::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity for Settings {
    const TABLE: Table = Table::Settings;
}

/// A daily sales rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    /// Record id.
    pub id: String,
    /// Day this rollup covers, `YYYY-MM-DD`.
    pub date: String,
    /// Sales total for the day, in cents.
    pub sales_total_cents: i64,
    /// Invoices issued that day.
    pub invoice_count: i64,
    /// Creation time, set by the writer.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the writer.
    pub updated_at: DateTime<Utc>,
}

impl Entity for Analytics {
    const TABLE: Table = Table::Analytics;
}

/// A stored image, keyed by filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Record id; always equals `filename`.
    pub id: String,
    /// Original filename.
    pub filename: String,
    /// MIME type, e.g. `"image/png"`.
    pub mime_type: String,
    /// Image bytes, base64 encoded.
    pub data: String,
    /// Creation time, set by the writer.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the writer.
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Creates an image record. The filename doubles as the id.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        let filename = filename.into();
        let now = Utc::now();
        Self {
            id: filename.clone(),
            filename,
            mime_type: mime_type.into(),
            data: data.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for ImageRecord {
    const TABLE: Table = Table::Images;
}

/// Taxonomy a master record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterKind {
    /// Inventory categories.
    Category,
    /// Invoice statuses.
    Status,
    /// Payment methods.
    PaymentMethod,
    /// Measurement units.
    Unit,
    /// Metal purity grades.
    Purity,
    /// Metals.
    Metal,
    /// Suppliers.
    Supplier,
    /// Label print configurations.
    LabelConfig,
}

impl MasterKind {
    /// All taxonomies, in seed order.
    pub const ALL: [Self; 8] = [
        Self::Category,
        Self::Status,
        Self::PaymentMethod,
        Self::Unit,
        Self::Purity,
        Self::Metal,
        Self::Supplier,
        Self::LabelConfig,
    ];

    /// Returns the stored `type` value for this taxonomy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Status => "status",
            Self::PaymentMethod => "payment_method",
            Self::Unit => "unit",
            Self::Purity => "purity",
            Self::Metal => "metal",
            Self::Supplier => "supplier",
            Self::LabelConfig => "label_config",
        }
    }
}

impl std::fmt::Display for MasterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reference-taxonomy value, e.g. a single category.
///
/// Within a [`MasterKind`], `value` is unique under case-insensitive
/// comparison; the lifecycle manager enforces this during deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Master {
    /// Record id.
    pub id: String,
    /// Taxonomy this value belongs to. Stored under the `type` key.
    #[serde(rename = "type")]
    pub kind: MasterKind,
    /// The taxonomy value, e.g. `"Gold"`.
    pub value: String,
    /// Inactive values stay stored but are hidden from pickers.
    pub is_active: bool,
    /// Presentation order; also the dedup tie-break, lowest wins.
    pub display_order: i64,
    /// Creation time, set by the writer.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the writer.
    pub updated_at: DateTime<Utc>,
}

impl Master {
    /// Creates an active master value with a generated id.
    #[must_use]
    pub fn new(kind: MasterKind, value: impl Into<String>, display_order: i64) -> Self {
        let now = Utc::now();
        Self {
            id: keygen::generate_id(Table::Masters.id_prefix()),
            kind,
            value: value.into(),
            is_active: true,
            display_order,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Master {
    const TABLE: Table = Table::Masters;
}
