//! In-memory stores.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::inventory::{CatalogEntry, StockMovement, UnmatchedItem};

use super::{CatalogStore, LedgerStore, Result, UnmatchedRegistry};

/// Catalog held in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
}

impl MemoryCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn entries(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.entries.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<CatalogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn upsert(&self, entry: CatalogEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    async fn adjust_quantity(&self, id: &str, delta: Decimal) -> Result<Decimal> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        entry.quantity_on_hand += delta;
        Ok(entry.quantity_on_hand)
    }
}

/// Ledger held in memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    movements: RwLock<Vec<StockMovement>>,
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn append(&self, mut movement: StockMovement) -> Result<StockMovement> {
        let mut movements = self.movements.write().await;
        movement.id = movements.len() as u64 + 1;
        movements.push(movement.clone());
        Ok(movement)
    }

    async fn movements(&self) -> Result<Vec<StockMovement>> {
        Ok(self.movements.read().await.clone())
    }
}

/// Unmatched registry held in memory.
#[derive(Debug, Default)]
pub struct MemoryUnmatched {
    items: RwLock<Vec<UnmatchedItem>>,
}

#[async_trait]
impl UnmatchedRegistry for MemoryUnmatched {
    async fn record(&self, mut item: UnmatchedItem) -> Result<UnmatchedItem> {
        let mut items = self.items.write().await;
        item.id = items.len() as u64 + 1;
        items.push(item.clone());
        Ok(item)
    }

    async fn items(&self) -> Result<Vec<UnmatchedItem>> {
        Ok(self.items.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_adjust_quantity() {
        let catalog = MemoryCatalog::new(vec![
            CatalogEntry::new("farina-00", "Farina 00", "kg").with_quantity(Decimal::new(10, 0)),
        ]);

        let quantity = catalog.adjust_quantity("farina-00", Decimal::new(25, 0)).await.unwrap();
        assert_eq!(quantity, Decimal::new(35, 0));
        assert_eq!(catalog.get("farina-00").await.unwrap().quantity_on_hand, Decimal::new(35, 0));
    }

    #[tokio::test]
    async fn test_adjust_unknown_entry() {
        let catalog = MemoryCatalog::default();
        let err = catalog.adjust_quantity("nope", Decimal::ONE).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let catalog = MemoryCatalog::default();
        catalog.upsert(CatalogEntry::new("sale", "Sale fino", "kg")).await.unwrap();
        catalog.upsert(CatalogEntry::new("sale", "Sale grosso", "kg")).await.unwrap();

        let entries = catalog.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Sale grosso");
    }
}
