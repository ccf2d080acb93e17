//! Invoice document parsing.

mod parser;
mod xml;

pub use parser::{DocumentParser, FatturaParser};

use crate::error::ParseError;

/// Result type for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;
