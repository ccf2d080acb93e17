//! Error types for the intake-core library.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the intake library.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// Invoice document could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Catalog, ledger or unmatched store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Operator notification failure.
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Folder watcher failure.
    #[error("watch error: {0}")]
    Watch(#[from] WatchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Document-wide parse failures. A document that fails here is never reconciled.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The document bytes are not valid UTF-8.
    #[error("document is not valid UTF-8")]
    InvalidUtf8,

    /// The XML itself is malformed.
    #[error("malformed XML: {0}")]
    Xml(String),

    /// The header block is absent.
    #[error("missing document header")]
    MissingHeader,

    /// The body block is absent.
    #[error("missing document body")]
    MissingBody,

    /// The line item container is absent.
    #[error("missing line item container")]
    MissingLines,

    /// Neither a company name nor a person name identifies the supplier.
    #[error("missing supplier name")]
    MissingSupplier,

    /// Required field is missing.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A field is present but its value cannot be interpreted.
    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },
}

/// Errors raised by the catalog, ledger and unmatched stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store cannot be reached right now. Worth retrying.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The store refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// I/O error on a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the operation may succeed if attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Failure of a single invoice line. Recorded in the report, never propagated.
#[derive(Error, Debug)]
pub enum LineError {
    /// Quantity must be strictly positive.
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    /// Unit price or line total below zero.
    #[error("{field} must not be negative, got {value}")]
    NegativeAmount { field: &'static str, value: Decimal },

    /// Persisting the outcome failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors delivering an operator notification.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The notification command could not be started.
    #[error("failed to start notifier command: {0}")]
    Spawn(std::io::Error),

    /// The notification command exited unsuccessfully.
    #[error("notifier command exited with status {code:?}")]
    Exit { code: Option<i32> },

    /// The notification command did not finish in time and was killed.
    #[error("notifier command timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// No command configured for a command notifier.
    #[error("notifier command is not configured")]
    NotConfigured,

    /// I/O error while talking to the notifier.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors setting up the folder watcher.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The OS notification backend failed.
    #[error("watcher backend error: {0}")]
    Backend(#[from] notify::Error),

    /// The watched directory could not be prepared.
    #[error("cannot prepare {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// `start()` called on a watcher that is already running.
    #[error("watcher already running")]
    AlreadyRunning,
}

/// Result type for the intake library.
pub type Result<T> = std::result::Result<T, IntakeError>;
