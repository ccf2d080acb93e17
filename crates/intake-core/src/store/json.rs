//! File-backed stores in a plain data directory.
//!
//! - `catalog.json` holds the catalog as a JSON array and is rewritten
//!   through a temporary file and a rename, so readers never see a partial
//!   catalog.
//! - `movements.jsonl` and `unmatched.jsonl` hold one record per line and
//!   are only ever appended to.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::models::inventory::{CatalogEntry, StockMovement, UnmatchedItem};

use super::{CatalogStore, LedgerStore, Result, UnmatchedRegistry};

pub const CATALOG_FILE: &str = "catalog.json";
pub const MOVEMENTS_FILE: &str = "movements.jsonl";
pub const UNMATCHED_FILE: &str = "unmatched.jsonl";

/// Catalog stored in `catalog.json`.
///
/// The file is re-read on every call so edits made outside the pipeline
/// are picked up without a restart.
#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonCatalog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CATALOG_FILE),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<CatalogEntry>> {
        match fs::read(&self.path).await {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No catalog at {}, starting empty", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, entries: &[CatalogEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&serde_json::to_vec_pretty(entries)?).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for JsonCatalog {
    async fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn get(&self, id: &str) -> Result<CatalogEntry> {
        self.entries()
            .await?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn upsert(&self, entry: CatalogEntry) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        self.store(&entries).await
    }

    async fn adjust_quantity(&self, id: &str, delta: Decimal) -> Result<Decimal> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        entry.quantity_on_hand += delta;
        let quantity = entry.quantity_on_hand;
        self.store(&entries).await?;
        Ok(quantity)
    }
}

/// Records carrying a store-assigned sequence number.
pub trait Sequenced {
    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
}

impl Sequenced for StockMovement {
    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

impl Sequenced for UnmatchedItem {
    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Append-only JSON Lines file.
#[derive(Debug)]
pub struct JsonLines {
    path: PathBuf,
    /// Last assigned id, loaded lazily from the file.
    last_id: Mutex<Option<u64>>,
}

impl JsonLines {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_id: Mutex::new(None),
        }
    }

    /// Read every record. Lines that do not parse are skipped with a warning.
    pub async fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed record {}:{}: {}", self.path.display(), n + 1, e),
            }
        }
        Ok(records)
    }

    /// Assign the next id to `record` and append it.
    pub async fn append<T>(&self, mut record: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Sequenced + Send,
    {
        let mut last_id = self.last_id.lock().await;
        let current = match *last_id {
            Some(id) => id,
            None => self
                .read_all::<T>()
                .await?
                .iter()
                .map(Sequenced::id)
                .max()
                .unwrap_or(0),
        };

        record.set_id(current + 1);
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let old_len = file.metadata().await?.len();
        if old_len > 0 && !self.ends_with_newline(old_len).await? {
            // Left over from an interrupted write
            line.insert(0, b'\n');
        }

        if let Err(e) = write_line(&mut file, &line).await {
            *last_id = None;
            if let Err(trunc) = file.set_len(old_len).await {
                error!(
                    "Cannot roll back {} to {} bytes after failed append: {}",
                    self.path.display(),
                    old_len,
                    trunc
                );
            }
            return Err(e.into());
        }

        *last_id = Some(current + 1);
        Ok(record)
    }

    async fn ends_with_newline(&self, len: u64) -> Result<bool> {
        let mut file = fs::File::open(&self.path).await?;
        file.seek(std::io::SeekFrom::Start(len - 1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        Ok(last[0] == b'\n')
    }
}

async fn write_line(file: &mut fs::File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await?;
    file.sync_data().await
}

/// Ledger stored in `movements.jsonl`.
#[derive(Debug)]
pub struct JsonLedger {
    file: JsonLines,
}

impl JsonLedger {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            file: JsonLines::new(data_dir.join(MOVEMENTS_FILE)),
        }
    }
}

#[async_trait]
impl LedgerStore for JsonLedger {
    async fn append(&self, movement: StockMovement) -> Result<StockMovement> {
        self.file.append(movement).await
    }

    async fn movements(&self) -> Result<Vec<StockMovement>> {
        self.file.read_all().await
    }
}

/// Unmatched registry stored in `unmatched.jsonl`.
#[derive(Debug)]
pub struct JsonUnmatched {
    file: JsonLines,
}

impl JsonUnmatched {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            file: JsonLines::new(data_dir.join(UNMATCHED_FILE)),
        }
    }
}

#[async_trait]
impl UnmatchedRegistry for JsonUnmatched {
    async fn record(&self, item: UnmatchedItem) -> Result<UnmatchedItem> {
        self.file.append(item).await
    }

    async fn items(&self) -> Result<Vec<UnmatchedItem>> {
        self.file.read_all().await
    }
}
