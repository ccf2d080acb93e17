//! Persistence for the catalog, the stock ledger and unmatched items.
//!
//! The pipeline only talks to the traits in this module. Two backends are
//! provided: [`memory`] for tests and embedding, [`json`] for a plain data
//! directory on disk.

pub mod json;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::models::inventory::{CatalogEntry, StockMovement, UnmatchedItem};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Read/write access to catalog entries.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All entries, in catalog order.
    async fn entries(&self) -> Result<Vec<CatalogEntry>>;

    /// Fetch one entry.
    async fn get(&self, id: &str) -> Result<CatalogEntry>;

    /// Insert or replace an entry.
    async fn upsert(&self, entry: CatalogEntry) -> Result<()>;

    /// Add `delta` to an entry's quantity on hand and return the new quantity.
    async fn adjust_quantity(&self, id: &str, delta: Decimal) -> Result<Decimal>;
}

/// Append-only stock movement ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append a movement and return it with its assigned id.
    async fn append(&self, movement: StockMovement) -> Result<StockMovement>;

    /// All movements in append order.
    async fn movements(&self) -> Result<Vec<StockMovement>>;

    /// Whether any movement was posted from this supplier's invoice.
    async fn has_invoice(&self, supplier: &str, invoice_number: &str) -> Result<bool> {
        Ok(self
            .movements()
            .await?
            .iter()
            .any(|m| m.supplier_name == supplier && m.invoice_number == invoice_number))
    }
}

/// Registry of lines waiting for manual reconciliation.
#[async_trait]
pub trait UnmatchedRegistry: Send + Sync {
    /// Record an item and return it with its assigned id.
    async fn record(&self, item: UnmatchedItem) -> Result<UnmatchedItem>;

    /// All items in insertion order.
    async fn items(&self) -> Result<Vec<UnmatchedItem>>;

    /// Whether any item was recorded from this supplier's invoice.
    async fn has_invoice(&self, supplier: &str, invoice_number: &str) -> Result<bool> {
        Ok(self
            .items()
            .await?
            .iter()
            .any(|i| i.supplier_name == supplier && i.invoice_number == invoice_number))
    }
}

/// The three stores the pipeline writes to.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub unmatched: Arc<dyn UnmatchedRegistry>,
}

impl Stores {
    /// In-memory stores seeded with `catalog`.
    pub fn in_memory(catalog: Vec<CatalogEntry>) -> Self {
        Self {
            catalog: Arc::new(memory::MemoryCatalog::new(catalog)),
            ledger: Arc::new(memory::MemoryLedger::default()),
            unmatched: Arc::new(memory::MemoryUnmatched::default()),
        }
    }

    /// File-backed stores rooted at `data_dir`.
    pub fn json(data_dir: &Path) -> Self {
        Self {
            catalog: Arc::new(json::JsonCatalog::new(data_dir)),
            ledger: Arc::new(json::JsonLedger::new(data_dir)),
            unmatched: Arc::new(json::JsonUnmatched::new(data_dir)),
        }
    }

    /// Whether the invoice already left records in the ledger or the registry.
    pub async fn invoice_seen(&self, supplier: &str, invoice_number: &str) -> Result<bool> {
        Ok(self.ledger.has_invoice(supplier, invoice_number).await?
            || self.unmatched.has_invoice(supplier, invoice_number).await?)
    }
}
