//! Raw serde schema of the electronic invoice XML.
//!
//! Every element is optional here. Required structure is enforced when the
//! raw document is converted into an [`Invoice`](crate::models::invoice::Invoice),
//! so missing pieces produce a descriptive error instead of a generic
//! deserialization failure.

use serde::Deserialize;

/// `<FatturaElettronica>` root. The root tag name and its namespace prefix are ignored.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDocument {
    #[serde(rename = "FatturaElettronicaHeader")]
    pub header: Option<RawHeader>,

    #[serde(rename = "FatturaElettronicaBody", default)]
    pub bodies: Vec<RawBody>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawHeader {
    #[serde(rename = "CedentePrestatore")]
    pub supplier: Option<RawSupplier>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawSupplier {
    #[serde(rename = "DatiAnagrafici")]
    pub details: Option<RawSupplierDetails>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawSupplierDetails {
    #[serde(rename = "Anagrafica")]
    pub registry: Option<RawRegistry>,
}

/// Issuer identity: a company name or a person's first and last name.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawRegistry {
    #[serde(rename = "Denominazione")]
    pub company_name: Option<String>,

    #[serde(rename = "Nome")]
    pub first_name: Option<String>,

    #[serde(rename = "Cognome")]
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawBody {
    #[serde(rename = "DatiGenerali")]
    pub general: Option<RawGeneral>,

    #[serde(rename = "DatiBeniServizi")]
    pub goods: Option<RawGoods>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawGeneral {
    #[serde(rename = "DatiGeneraliDocumento")]
    pub document: Option<RawDocumentData>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDocumentData {
    #[serde(rename = "Numero")]
    pub number: Option<String>,

    #[serde(rename = "Data")]
    pub date: Option<String>,
}

/// `<DatiBeniServizi>`, the line item container.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawGoods {
    #[serde(rename = "DettaglioLinee", default)]
    pub lines: Vec<RawLine>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawLine {
    #[serde(rename = "Descrizione")]
    pub description: Option<String>,

    #[serde(rename = "Quantita")]
    pub quantity: Option<String>,

    #[serde(rename = "PrezzoUnitario")]
    pub unit_price: Option<String>,

    #[serde(rename = "PrezzoTotale")]
    pub line_total: Option<String>,

    #[serde(rename = "CodiceArticolo", default)]
    pub codes: Vec<RawArticleCode>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawArticleCode {
    #[serde(rename = "CodiceTipo")]
    pub kind: Option<String>,

    #[serde(rename = "CodiceValore")]
    pub value: Option<String>,
}
