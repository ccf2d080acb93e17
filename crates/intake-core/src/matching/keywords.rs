//! Keyword extraction from free-text line descriptions.

use std::cmp::Reverse;

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::config::MatchingConfig;

lazy_static! {
    /// Token separator: any run of non-word characters.
    static ref NON_WORD: Regex = Regex::new(r"\W+").unwrap();
}

/// Extract the candidate keywords of a description, best first.
///
/// Tokens of `min_keyword_len` characters or fewer and stop words are
/// dropped, the rest are ordered by descending length (ties keep document
/// order) and truncated to `max_keywords`.
pub fn extract_keywords(description: &str, config: &MatchingConfig) -> Vec<String> {
    let mut tokens: Vec<&str> = Vec::new();

    for token in NON_WORD.split(description) {
        if token.chars().count() <= config.min_keyword_len || is_stop_word(token, config) {
            continue;
        }
        if tokens.iter().any(|t| t.to_lowercase() == token.to_lowercase()) {
            continue;
        }
        tokens.push(token);
    }

    // sort_by_key is stable
    tokens.sort_by_key(|t| Reverse(t.chars().count()));

    tokens
        .into_iter()
        .take(config.max_keywords)
        .map(str::to_string)
        .collect()
}

/// First whitespace-delimited word of a description, if it is long enough
/// to be searched on its own.
pub fn first_word(description: &str, config: &MatchingConfig) -> Option<String> {
    let word = description
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphanumeric());

    (word.chars().count() > config.min_keyword_len).then(|| word.to_string())
}

fn is_stop_word(token: &str, config: &MatchingConfig) -> bool {
    let token = token.to_lowercase();
    config.stop_words.iter().any(|s| s.to_lowercase() == token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_tokens_and_numbers_dropped() {
        let config = MatchingConfig::default();
        assert_eq!(
            extract_keywords("FARINA TIPO 00 KG 25", &config),
            vec!["FARINA".to_string(), "TIPO".to_string()]
        );
    }

    #[test]
    fn test_stop_words_dropped() {
        let config = MatchingConfig::default();
        assert_eq!(
            extract_keywords("ZUCCHERO SEMOLATO CONFEZIONE BUSTA", &config),
            vec!["ZUCCHERO".to_string(), "SEMOLATO".to_string()]
        );
    }

    #[test]
    fn test_sorted_by_length_and_truncated() {
        let config = MatchingConfig::default();
        assert_eq!(
            extract_keywords("OLIO EXTRAVERGINE OLIVA ITALIANO", &config),
            vec![
                "EXTRAVERGINE".to_string(),
                "ITALIANO".to_string(),
                "OLIVA".to_string()
            ]
        );
    }

    #[test]
    fn test_equal_length_keeps_document_order() {
        let config = MatchingConfig::default();
        assert_eq!(
            extract_keywords("MELE PERE FICHI", &config),
            vec!["FICHI".to_string(), "MELE".to_string(), "PERE".to_string()]
        );
    }

    #[test]
    fn test_punctuation_splits_tokens() {
        let config = MatchingConfig::default();
        assert_eq!(
            extract_keywords("RICOTTA/MISTA-2KG", &config),
            vec!["RICOTTA".to_string(), "MISTA".to_string()]
        );
    }

    #[test]
    fn test_duplicates_collapsed() {
        let config = MatchingConfig::default();
        assert_eq!(
            extract_keywords("BURRO burro BURRO", &config),
            vec!["BURRO".to_string()]
        );
    }

    #[test]
    fn test_first_word() {
        let config = MatchingConfig::default();
        assert_eq!(first_word("RICOTTA MISTA 2KG", &config), Some("RICOTTA".to_string()));
        assert_eq!(first_word("UOVA, categoria A", &config), Some("UOVA".to_string()));
        assert_eq!(first_word("OLI VARI", &config), None);
        assert_eq!(first_word("   ", &config), None);
    }
}
