//! Supplier invoice models produced by the document parser.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A parsed supplier invoice.
///
/// Transient: an invoice lives only for the duration of one processing run.
/// Its facts persist through stock movements and unmatched items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Issuer company name, or "first last" when the issuer is a person.
    pub supplier_name: String,

    /// Invoice number as printed by the supplier.
    pub invoice_number: String,

    /// Date the invoice was issued.
    pub invoice_date: NaiveDate,

    /// Name of the file the invoice was read from.
    #[serde(default)]
    pub source_file: String,

    /// Line items in document order.
    pub lines: Vec<InvoiceLine>,
}

/// A single line item on a supplier invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Product description as written by the supplier.
    pub description: String,

    /// Delivered quantity.
    pub quantity: Decimal,

    /// Price per unit.
    pub unit_price: Decimal,

    /// Line total. Informational only, quantity is never derived from it.
    pub line_total: Decimal,

    /// Supplier's own article code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_code: Option<String>,
}

impl InvoiceLine {
    /// Create a line without a supplier code.
    pub fn new(description: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price: Decimal::ZERO,
            line_total: Decimal::ZERO,
            supplier_code: None,
        }
    }

    /// Set unit price and line total.
    pub fn with_prices(mut self, unit_price: Decimal, line_total: Decimal) -> Self {
        self.unit_price = unit_price;
        self.line_total = line_total;
        self
    }

    /// Set the supplier article code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.supplier_code = Some(code.into());
        self
    }
}

impl Invoice {
    /// Sum of line quantities.
    pub fn total_quantity(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of line totals.
    pub fn total_value(&self) -> Decimal {
        self.lines.iter().map(|l| l.line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_builder() {
        let line = InvoiceLine::new("FARINA 00", Decimal::new(25, 0))
            .with_prices(Decimal::new(80, 2), Decimal::new(2000, 2))
            .with_code("F00");

        assert_eq!(line.supplier_code.as_deref(), Some("F00"));
        assert_eq!(line.line_total, Decimal::new(20, 0));
    }

    #[test]
    fn test_invoice_totals() {
        let invoice = Invoice {
            supplier_name: "Molino Rossi".to_string(),
            invoice_number: "12".to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            source_file: String::new(),
            lines: vec![
                InvoiceLine::new("A", Decimal::new(2, 0)).with_prices(Decimal::ONE, Decimal::new(2, 0)),
                InvoiceLine::new("B", Decimal::new(15, 1)).with_prices(Decimal::ONE, Decimal::new(15, 1)),
            ],
        };

        assert_eq!(invoice.total_quantity(), Decimal::new(35, 1));
        assert_eq!(invoice.total_value(), Decimal::new(35, 1));
    }

    #[test]
    fn test_missing_code_is_not_serialized() {
        let line = InvoiceLine::new("SALE FINO", Decimal::ONE);
        let json = serde_json::to_value(&line).unwrap();
        assert!(json.get("supplier_code").is_none());
    }
}
