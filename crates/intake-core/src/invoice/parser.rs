//! Electronic invoice parser.

use std::borrow::Cow;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::models::invoice::{Invoice, InvoiceLine};

use super::xml::{RawBody, RawDocument, RawHeader, RawLine};
use super::Result;

/// Trait for invoice document parsers.
pub trait DocumentParser: Send + Sync {
    /// Parse an invoice from raw document bytes.
    fn parse(&self, bytes: &[u8]) -> Result<Invoice>;

    /// Parse an invoice and record the file it came from.
    fn parse_file(&self, bytes: &[u8], source_file: &str) -> Result<Invoice> {
        let mut invoice = self.parse(bytes)?;
        invoice.source_file = source_file.to_string();
        Ok(invoice)
    }
}

/// Parser for the Italian electronic invoice layout
/// (`FatturaElettronicaHeader` / `FatturaElettronicaBody`).
#[derive(Debug, Clone, Default)]
pub struct FatturaParser;

impl FatturaParser {
    pub fn new() -> Self {
        Self
    }

    fn supplier_name(&self, header: &RawHeader) -> Result<String> {
        let registry = header
            .supplier
            .as_ref()
            .and_then(|s| s.details.as_ref())
            .and_then(|d| d.registry.as_ref())
            .ok_or(ParseError::MissingSupplier)?;

        if let Some(company) = non_empty(registry.company_name.as_deref()) {
            return Ok(company.to_string());
        }

        // Sole traders are registered by first and last name
        let person: Vec<&str> = [registry.first_name.as_deref(), registry.last_name.as_deref()]
            .into_iter()
            .filter_map(non_empty)
            .collect();

        if person.is_empty() {
            return Err(ParseError::MissingSupplier);
        }
        Ok(person.join(" "))
    }

    fn document_data(&self, body: &RawBody) -> Result<(String, NaiveDate)> {
        let document = body
            .general
            .as_ref()
            .and_then(|g| g.document.as_ref())
            .ok_or_else(|| ParseError::MissingField("DatiGeneraliDocumento".to_string()))?;

        let number = non_empty(document.number.as_deref())
            .ok_or_else(|| ParseError::MissingField("Numero".to_string()))?
            .to_string();

        let raw_date = non_empty(document.date.as_deref())
            .ok_or_else(|| ParseError::MissingField("Data".to_string()))?;
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            ParseError::InvalidValue {
                field: "Data".to_string(),
                value: raw_date.to_string(),
            }
        })?;

        Ok((number, date))
    }

    fn parse_line(&self, index: usize, raw: &RawLine) -> Result<InvoiceLine> {
        let description = non_empty(raw.description.as_deref()).unwrap_or_default();
        if description.is_empty() {
            debug!("Line {} has no description", index + 1);
        }

        // Quantity is omitted for services and flat-rate items
        let quantity = parse_amount(raw.quantity.as_deref(), "Quantita", index)?.unwrap_or(Decimal::ONE);
        let unit_price = parse_amount(raw.unit_price.as_deref(), "PrezzoUnitario", index)?.unwrap_or_default();
        let line_total = parse_amount(raw.line_total.as_deref(), "PrezzoTotale", index)?.unwrap_or_default();

        let supplier_code = raw.codes.iter().find_map(|c| {
            let value = non_empty(c.value.as_deref())?;
            debug!(
                "Line {} code {} (type {})",
                index + 1,
                value,
                c.kind.as_deref().unwrap_or("-")
            );
            Some(value.to_string())
        });

        Ok(InvoiceLine {
            description: description.to_string(),
            quantity,
            unit_price,
            line_total,
            supplier_code,
        })
    }
}

impl DocumentParser for FatturaParser {
    fn parse(&self, bytes: &[u8]) -> Result<Invoice> {
        let text = decode(bytes)?;

        let raw: RawDocument =
            quick_xml::de::from_str(&text).map_err(|e| ParseError::Xml(e.to_string()))?;

        let header = raw.header.as_ref().ok_or(ParseError::MissingHeader)?;
        let supplier_name = self.supplier_name(header)?;

        let body = raw.bodies.first().ok_or(ParseError::MissingBody)?;
        if raw.bodies.len() > 1 {
            warn!(
                "Document holds {} invoice bodies, only the first is processed",
                raw.bodies.len()
            );
        }

        let (invoice_number, invoice_date) = self.document_data(body)?;

        let goods = body.goods.as_ref().ok_or(ParseError::MissingLines)?;
        let lines = goods
            .lines
            .iter()
            .enumerate()
            .map(|(i, raw_line)| self.parse_line(i, raw_line))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Parsed invoice {} from {} with {} lines",
            invoice_number,
            supplier_name,
            lines.len()
        );

        Ok(Invoice {
            supplier_name,
            invoice_number,
            invoice_date,
            source_file: String::new(),
            lines,
        })
    }
}

/// Decode document bytes. UTF-8 is expected; documents declaring
/// ISO-8859-1 are mapped byte-for-byte.
fn decode(bytes: &[u8]) -> Result<Cow<'_, str>> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(Cow::Borrowed(text)),
        Err(_) if declares_latin1(bytes) => Ok(Cow::Owned(bytes.iter().map(|&b| b as char).collect())),
        Err(_) => Err(ParseError::InvalidUtf8),
    }
}

fn declares_latin1(bytes: &[u8]) -> bool {
    let prolog_end = bytes.iter().position(|&b| b == b'>').unwrap_or(bytes.len());
    let prolog = String::from_utf8_lossy(&bytes[..prolog_end]).to_lowercase();
    prolog.starts_with("<?xml") && (prolog.contains("iso-8859-1") || prolog.contains("latin1"))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_amount(value: Option<&str>, field: &str, index: usize) -> Result<Option<Decimal>> {
    let Some(raw) = non_empty(value) else {
        return Ok(None);
    };

    Decimal::from_str(&raw.replace(',', "."))
        .map(Some)
        .map_err(|_| ParseError::InvalidValue {
            field: format!("{} (line {})", field, index + 1),
            value: raw.to_string(),
        })
}
