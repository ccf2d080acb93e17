//! Catalog, ledger and unmatched-item records.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::invoice::{Invoice, InvoiceLine};

/// A stock-keeping unit in the product catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Catalog identifier.
    pub id: String,

    /// Display name, searched by the keyword and first-word tiers.
    pub name: String,

    /// Unit of measure (kg, pz, lt, ...).
    pub unit: String,

    /// Quantity currently in stock.
    #[serde(default)]
    pub quantity_on_hand: Decimal,

    /// Known supplier article codes.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub supplier_codes: BTreeSet<SupplierCode>,
}

/// A (supplier, code) pair identifying an article in one supplier's numbering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupplierCode {
    pub supplier: String,
    pub code: String,
}

impl CatalogEntry {
    /// Create an entry with no stock and no supplier codes.
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit: unit.into(),
            quantity_on_hand: Decimal::ZERO,
            supplier_codes: BTreeSet::new(),
        }
    }

    /// Set the quantity on hand.
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity_on_hand = quantity;
        self
    }

    /// Register a supplier article code.
    pub fn with_supplier_code(mut self, supplier: impl Into<String>, code: impl Into<String>) -> Self {
        self.supplier_codes.insert(SupplierCode {
            supplier: supplier.into(),
            code: code.into(),
        });
        self
    }

    /// Exact, case-sensitive lookup of a supplier code.
    pub fn has_supplier_code(&self, supplier: &str, code: &str) -> bool {
        self.supplier_codes
            .iter()
            .any(|c| c.supplier == supplier && c.code == code)
    }
}

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods received. The only kind the intake pipeline produces.
    Inbound,
    /// Goods consumed or sold, written by other parts of the system.
    Outbound,
}

/// An immutable ledger record of a stock change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    /// Store-assigned sequence number (0 until appended).
    #[serde(default)]
    pub id: u64,

    pub kind: MovementKind,
    pub catalog_entry_id: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub total_value: Decimal,
    pub supplier_name: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub source_file: String,

    /// Audit note with the original description and supplier code.
    pub note: String,

    /// Set for movements posted without operator involvement.
    pub automatic: bool,

    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Build the inbound movement for a line matched to `entry`.
    pub fn inbound(invoice: &Invoice, line: &InvoiceLine, entry: &CatalogEntry, note: String) -> Self {
        Self {
            id: 0,
            kind: MovementKind::Inbound,
            catalog_entry_id: entry.id.clone(),
            quantity: line.quantity,
            unit: entry.unit.clone(),
            unit_price: line.unit_price,
            total_value: line.line_total,
            supplier_name: invoice.supplier_name.clone(),
            invoice_number: invoice.invoice_number.clone(),
            invoice_date: invoice.invoice_date,
            source_file: invoice.source_file.clone(),
            note,
            automatic: true,
            created_at: Utc::now(),
        }
    }
}

/// Review state of an unmatched item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedStatus {
    /// Waiting for manual review. Every item starts here.
    #[default]
    Pending,
    /// Linked to a catalog entry by an operator.
    Resolved,
    /// Dismissed by an operator.
    Ignored,
}

impl UnmatchedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnmatchedStatus::Pending => "pending",
            UnmatchedStatus::Resolved => "resolved",
            UnmatchedStatus::Ignored => "ignored",
        }
    }
}

/// An invoice line that could not be matched to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedItem {
    /// Store-assigned sequence number (0 until appended).
    #[serde(default)]
    pub id: u64,

    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_code: Option<String>,

    pub quantity: Decimal,
    pub supplier_name: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub source_file: String,
    pub detected_at: DateTime<Utc>,

    #[serde(default)]
    pub status: UnmatchedStatus,
}

impl UnmatchedItem {
    /// Build a pending item for an unmatched line.
    pub fn pending(invoice: &Invoice, line: &InvoiceLine) -> Self {
        Self {
            id: 0,
            description: line.description.clone(),
            supplier_code: line.supplier_code.clone(),
            quantity: line.quantity,
            supplier_name: invoice.supplier_name.clone(),
            invoice_number: invoice.invoice_number.clone(),
            invoice_date: invoice.invoice_date,
            source_file: invoice.source_file.clone(),
            detected_at: Utc::now(),
            status: UnmatchedStatus::Pending,
        }
    }
}
