//! Core library for supplier invoice intake.
//!
//! This crate provides:
//! - Electronic invoice parsing (FatturaPA header/body layout)
//! - Layered matching of invoice lines against a product catalog
//! - Stock reconciliation with a movement ledger and an unmatched registry
//! - A debounced drop-folder watcher and the ingestion service driving it

pub mod error;
pub mod invoice;
pub mod matching;
pub mod models;
pub mod notifier;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod watcher;

pub use error::{IntakeError, LineError, NotifyError, ParseError, Result, StoreError, WatchError};
pub use invoice::{DocumentParser, FatturaParser};
pub use matching::{LineMatcher, MatchResult};
pub use models::config::IntakeConfig;
pub use models::inventory::{CatalogEntry, MovementKind, StockMovement, UnmatchedItem, UnmatchedStatus};
pub use models::invoice::{Invoice, InvoiceLine};
pub use models::report::{IngestionStats, LineOutcome, MatchTier, ProcessingReport};
pub use notifier::{CommandNotifier, LogNotifier, Notification, Notifier, Severity};
pub use reconcile::{ReconciliationEngine, RetryPolicy};
pub use service::{FileOutcome, IngestionService, ServiceState};
pub use store::{CatalogStore, LedgerStore, Stores, UnmatchedRegistry};
pub use watcher::FolderWatcher;
