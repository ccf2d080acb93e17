//! Reconciliation of parsed invoices against the catalog.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{LineError, StoreError};
use crate::matching::{LineMatcher, MatchResult};
use crate::models::config::StoreConfig;
use crate::models::inventory::{CatalogEntry, StockMovement, UnmatchedItem};
use crate::models::invoice::{Invoice, InvoiceLine};
use crate::models::report::{LineOutcome, MatchTier, ProcessingReport};
use crate::store::Stores;

/// Bounded retry for transient store failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for every further one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for RetryPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Run `op`, retrying while it fails with a transient error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        let mut delay = self.backoff;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!("{} failed (attempt {}/{}): {}", what, attempt, self.max_attempts, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Posts each invoice line as a stock movement or an unmatched item.
pub struct ReconciliationEngine {
    stores: Stores,
    matcher: LineMatcher,
    retry: RetryPolicy,
}

impl ReconciliationEngine {
    pub fn new(stores: Stores, matcher: LineMatcher) -> Self {
        Self {
            stores,
            matcher,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the retry policy for store calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Reconcile every line of `invoice`, in document order.
    ///
    /// Line failures are recorded in the report and never abort the run.
    pub async fn process(&self, invoice: &Invoice) -> ProcessingReport {
        let mut report = ProcessingReport::for_invoice(invoice);

        let catalog = match self
            .retry
            .run("loading catalog", || self.stores.catalog.entries())
            .await
        {
            Ok(catalog) => catalog,
            Err(e) => {
                error!(
                    "Cannot load catalog for invoice {}: {}",
                    invoice.invoice_number, e
                );
                for _ in &invoice.lines {
                    report.record(LineOutcome::Error {
                        reason: format!("catalog unavailable: {}", e),
                    });
                }
                return report;
            }
        };

        for (index, line) in invoice.lines.iter().enumerate() {
            let outcome = match self.process_line(invoice, line, &catalog).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        "Invoice {} line {} ('{}') failed: {}",
                        invoice.invoice_number,
                        index + 1,
                        line.description,
                        e
                    );
                    LineOutcome::Error {
                        reason: e.to_string(),
                    }
                }
            };
            report.record(outcome);
        }

        info!(
            "Invoice {} from {}: {} lines, {} matched, {} unmatched, {} errors",
            report.invoice_number,
            report.supplier_name,
            report.total_lines,
            report.matched_count,
            report.unmatched_count,
            report.error_count
        );

        report
    }

    async fn process_line(
        &self,
        invoice: &Invoice,
        line: &InvoiceLine,
        catalog: &[CatalogEntry],
    ) -> Result<LineOutcome, LineError> {
        validate_line(line)?;

        match self.matcher.match_line(line, &invoice.supplier_name, catalog) {
            Some(found) => self.post_receipt(invoice, line, found).await,
            None => {
                let item = self
                    .retry
                    .run("recording unmatched item", || {
                        self.stores.unmatched.record(UnmatchedItem::pending(invoice, line))
                    })
                    .await?;
                debug!("'{}' unmatched, recorded as #{}", line.description, item.id);
                Ok(LineOutcome::Unmatched {
                    unmatched_id: item.id,
                })
            }
        }
    }

    /// Increment stock and append the movement, or leave both untouched.
    async fn post_receipt(
        &self,
        invoice: &Invoice,
        line: &InvoiceLine,
        found: MatchResult<'_>,
    ) -> Result<LineOutcome, LineError> {
        let entry = found.entry;
        let movement = StockMovement::inbound(invoice, line, entry, movement_note(invoice, line, &found.tier));

        self.retry
            .run("updating quantity", || {
                self.stores.catalog.adjust_quantity(&entry.id, line.quantity)
            })
            .await?;

        match self
            .retry
            .run("appending movement", || self.stores.ledger.append(movement.clone()))
            .await
        {
            Ok(posted) => {
                debug!(
                    "'{}' -> {} via {}, movement #{}",
                    line.description, entry.id, found.tier, posted.id
                );
                Ok(LineOutcome::Matched {
                    catalog_entry_id: entry.id.clone(),
                    movement_id: posted.id,
                    tier: found.tier,
                })
            }
            Err(e) => {
                let rollback = self
                    .retry
                    .run("reverting quantity", || {
                        self.stores.catalog.adjust_quantity(&entry.id, -line.quantity)
                    })
                    .await;
                if let Err(rollback_err) = rollback {
                    error!(
                        "Quantity of {} left incremented by {} without a movement: {}",
                        entry.id, line.quantity, rollback_err
                    );
                }
                Err(e.into())
            }
        }
    }
}

fn validate_line(line: &InvoiceLine) -> Result<(), LineError> {
    if line.quantity <= rust_decimal::Decimal::ZERO {
        return Err(LineError::InvalidQuantity(line.quantity));
    }
    if line.unit_price.is_sign_negative() && !line.unit_price.is_zero() {
        return Err(LineError::NegativeAmount {
            field: "unit price",
            value: line.unit_price,
        });
    }
    if line.line_total.is_sign_negative() && !line.line_total.is_zero() {
        return Err(LineError::NegativeAmount {
            field: "line total",
            value: line.line_total,
        });
    }
    Ok(())
}

/// Audit note for a posted movement.
fn movement_note(invoice: &Invoice, line: &InvoiceLine, tier: &MatchTier) -> String {
    let mut note = format!(
        "Automatic receipt, invoice {} from {}: {}",
        invoice.invoice_number, invoice.supplier_name, line.description
    );
    if let Some(code) = &line.supplier_code {
        note.push_str(&format!(" [code {}]", code));
    }
    note.push_str(&format!(" (matched by {})", tier));
    note
}
