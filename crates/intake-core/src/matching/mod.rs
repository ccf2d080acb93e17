//! Catalog matching for invoice lines.

pub mod keywords;
mod matcher;

pub use keywords::{extract_keywords, first_word};
pub use matcher::{LineMatcher, MatchResult};
