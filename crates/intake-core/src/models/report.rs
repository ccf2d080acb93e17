//! Per-invoice processing report and cumulative ingestion statistics.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::invoice::Invoice;

/// Which matching strategy resolved a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tier", content = "term")]
pub enum MatchTier {
    /// Exact (supplier, code) hit.
    SupplierCode,
    /// Unique substring hit for one of the description keywords.
    Keyword(String),
    /// Unique substring hit for the first word of the description.
    FirstWord(String),
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchTier::SupplierCode => write!(f, "supplier code"),
            MatchTier::Keyword(k) => write!(f, "keyword '{}'", k),
            MatchTier::FirstWord(w) => write!(f, "first word '{}'", w),
        }
    }
}

/// What happened to one invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum LineOutcome {
    /// Stock movement posted and quantity incremented.
    Matched {
        catalog_entry_id: String,
        movement_id: u64,
        tier: MatchTier,
    },
    /// Recorded for manual review.
    Unmatched { unmatched_id: u64 },
    /// Nothing persisted.
    Error { reason: String },
}

/// Summary of reconciling one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub supplier_name: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub source_file: String,
    pub total_lines: usize,
    pub matched_count: usize,
    pub unmatched_count: usize,
    pub error_count: usize,

    /// One entry per line, in document order.
    #[serde(default)]
    pub outcomes: Vec<LineOutcome>,
}

impl ProcessingReport {
    /// Empty report for an invoice about to be processed.
    pub fn for_invoice(invoice: &Invoice) -> Self {
        Self {
            supplier_name: invoice.supplier_name.clone(),
            invoice_number: invoice.invoice_number.clone(),
            invoice_date: invoice.invoice_date,
            source_file: invoice.source_file.clone(),
            total_lines: invoice.lines.len(),
            matched_count: 0,
            unmatched_count: 0,
            error_count: 0,
            outcomes: Vec::with_capacity(invoice.lines.len()),
        }
    }

    /// Record the outcome of the next line.
    pub fn record(&mut self, outcome: LineOutcome) {
        match &outcome {
            LineOutcome::Matched { .. } => self.matched_count += 1,
            LineOutcome::Unmatched { .. } => self.unmatched_count += 1,
            LineOutcome::Error { .. } => self.error_count += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Every line accounted for exactly once.
    pub fn is_consistent(&self) -> bool {
        self.matched_count + self.unmatched_count + self.error_count == self.total_lines
            && self.outcomes.len() == self.total_lines
    }
}

/// Snapshot of cumulative ingestion counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionStats {
    /// Documents reconciled successfully.
    pub documents_processed: u64,
    pub items_matched: u64,
    pub items_unmatched: u64,
    /// Document-level failures plus line-level errors.
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_at: Option<DateTime<Utc>>,
    pub is_running: bool,
}
