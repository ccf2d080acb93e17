//! Layered resolution of invoice lines against the catalog.

use tracing::{debug, trace};

use crate::models::config::MatchingConfig;
use crate::models::inventory::CatalogEntry;
use crate::models::invoice::InvoiceLine;
use crate::models::report::MatchTier;

use super::keywords::{extract_keywords, first_word};

/// A resolved line.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a> {
    /// The catalog entry the line resolves to.
    pub entry: &'a CatalogEntry,
    /// The strategy that produced the match.
    pub tier: MatchTier,
}

/// Resolves invoice lines to catalog entries.
///
/// Strategies run in strict order and the first hit wins:
///
/// 1. supplier code, exact and case-sensitive, scoped to the supplier;
/// 2. description keywords, longest first, each accepted only when it is a
///    substring of exactly one catalog name;
/// 3. first word of the description, accepted only when unambiguous.
///
/// Matching is a pure function of the line, the supplier and the catalog
/// snapshot.
#[derive(Debug, Clone, Default)]
pub struct LineMatcher {
    config: MatchingConfig,
}

impl LineMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Resolve `line` from `supplier` against `catalog`.
    pub fn match_line<'a>(
        &self,
        line: &InvoiceLine,
        supplier: &str,
        catalog: &'a [CatalogEntry],
    ) -> Option<MatchResult<'a>> {
        if let Some(entry) = self.match_code(line, supplier, catalog) {
            return Some(MatchResult {
                entry,
                tier: MatchTier::SupplierCode,
            });
        }

        for keyword in extract_keywords(&line.description, &self.config) {
            match unique_name_hit(catalog, &keyword) {
                NameHit::One(entry) => {
                    return Some(MatchResult {
                        entry,
                        tier: MatchTier::Keyword(keyword),
                    });
                }
                NameHit::Many(n) => {
                    trace!("Keyword '{}' is ambiguous ({} entries), skipping", keyword, n);
                }
                NameHit::None => {}
            }
        }

        let word = first_word(&line.description, &self.config)?;
        match unique_name_hit(catalog, &word) {
            NameHit::One(entry) => Some(MatchResult {
                entry,
                tier: MatchTier::FirstWord(word),
            }),
            NameHit::Many(n) => {
                debug!(
                    "First word '{}' matches {} entries, leaving '{}' unmatched",
                    word, n, line.description
                );
                None
            }
            NameHit::None => None,
        }
    }

    fn match_code<'a>(
        &self,
        line: &InvoiceLine,
        supplier: &str,
        catalog: &'a [CatalogEntry],
    ) -> Option<&'a CatalogEntry> {
        let code = line.supplier_code.as_deref().filter(|c| !c.is_empty())?;
        catalog.iter().find(|e| e.has_supplier_code(supplier, code))
    }
}

enum NameHit<'a> {
    None,
    One(&'a CatalogEntry),
    Many(usize),
}

/// Case-insensitive substring search of `term` in catalog names.
fn unique_name_hit<'a>(catalog: &'a [CatalogEntry], term: &str) -> NameHit<'a> {
    let needle = term.to_lowercase();
    let mut hits = catalog
        .iter()
        .filter(|e| e.name.to_lowercase().contains(&needle));

    match (hits.next(), hits.count()) {
        (None, _) => NameHit::None,
        (Some(entry), 0) => NameHit::One(entry),
        (Some(_), rest) => NameHit::Many(rest + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    const SUPPLIER: &str = "Caseificio Bianchi";

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new("farina-00", "Farina 00", "kg"),
            CatalogEntry::new("ricotta-fresca", "Ricotta fresca", "kg"),
            CatalogEntry::new("ricotta-pecora", "Ricotta di pecora", "kg"),
            CatalogEntry::new("mozzarella", "Mozzarella fior di latte", "kg")
                .with_supplier_code(SUPPLIER, "MZ-1"),
            CatalogEntry::new("burrata", "Burrata pugliese", "pz"),
        ]
    }

    fn line(description: &str) -> InvoiceLine {
        InvoiceLine::new(description, Decimal::ONE)
    }

    #[test]
    fn test_keyword_match() {
        let catalog = catalog();
        let result = LineMatcher::default()
            .match_line(&line("FARINA TIPO 00 KG 25"), SUPPLIER, &catalog)
            .unwrap();

        assert_eq!(result.entry.id, "farina-00");
        assert_eq!(result.tier, MatchTier::Keyword("FARINA".to_string()));
    }

    #[test]
    fn test_supplier_code_has_priority() {
        let catalog = catalog();
        // The description alone would resolve to the burrata
        let line = line("BURRATA PUGLIESE 250G").with_code("MZ-1");
        let result = LineMatcher::default().match_line(&line, SUPPLIER, &catalog).unwrap();

        assert_eq!(result.entry.id, "mozzarella");
        assert_eq!(result.tier, MatchTier::SupplierCode);
    }

    #[test]
    fn test_supplier_code_scoped_to_supplier() {
        let catalog = catalog();
        let line = line("ARTICOLO").with_code("MZ-1");
        assert!(LineMatcher::default().match_line(&line, "Altro Fornitore", &catalog).is_none());
    }

    #[test]
    fn test_unknown_code_falls_through_to_keywords() {
        let catalog = catalog();
        let line = line("BURRATA PUGLIESE").with_code("BR-7");
        let result = LineMatcher::default().match_line(&line, SUPPLIER, &catalog).unwrap();

        assert_eq!(result.entry.id, "burrata");
        assert_eq!(result.tier, MatchTier::Keyword("PUGLIESE".to_string()));
    }

    #[test]
    fn test_ambiguous_keyword_skipped() {
        let catalog = catalog();
        // RICOTTA hits two entries, PECORA only one
        let result = LineMatcher::default()
            .match_line(&line("RICOTTA PECORA"), SUPPLIER, &catalog)
            .unwrap();

        assert_eq!(result.entry.id, "ricotta-pecora");
        assert_eq!(result.tier, MatchTier::Keyword("PECORA".to_string()));
    }

    #[test]
    fn test_ambiguous_everywhere_is_no_match() {
        let catalog = catalog();
        assert!(LineMatcher::default()
            .match_line(&line("RICOTTA MISTA 2KG"), SUPPLIER, &catalog)
            .is_none());
    }

    #[test]
    fn test_first_word_tier() {
        let catalog = vec![CatalogEntry::new("uova", "Uova fresche cat. A", "pz")];
        let matcher = LineMatcher::new(MatchingConfig {
            max_keywords: 0,
            ..MatchingConfig::default()
        });

        let result = matcher.match_line(&line("UOVA M"), SUPPLIER, &catalog).unwrap();
        assert_eq!(result.tier, MatchTier::FirstWord("UOVA".to_string()));
    }

    #[test]
    fn test_first_word_ignores_stop_words_list() {
        // A stop word can never be a keyword, but the first-word tier still searches it
        let catalog = vec![CatalogEntry::new("sacchi", "Sacco juta riutilizzabile", "pz")];
        let result = LineMatcher::default()
            .match_line(&line("SACCO 50X80"), SUPPLIER, &catalog)
            .unwrap();

        assert_eq!(result.tier, MatchTier::FirstWord("SACCO".to_string()));
    }

    #[test]
    fn test_no_match() {
        let catalog = catalog();
        assert!(LineMatcher::default()
            .match_line(&line("ARTICOLO VARIO XYZ").with_code("SC-99"), SUPPLIER, &catalog)
            .is_none());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let catalog = catalog();
        let matcher = LineMatcher::default();
        let lines = ["FARINA TIPO 00", "RICOTTA MISTA", "BURRATA 250G", "PANNA"];

        let first: Vec<_> = lines
            .iter()
            .map(|d| matcher.match_line(&line(d), SUPPLIER, &catalog).map(|m| m.entry.id.clone()))
            .collect();
        let second: Vec<_> = lines
            .iter()
            .map(|d| matcher.match_line(&line(d), SUPPLIER, &catalog).map(|m| m.entry.id.clone()))
            .collect();

        assert_eq!(first, second);
    }
}
