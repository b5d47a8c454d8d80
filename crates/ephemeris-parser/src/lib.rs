//! Parser and dumper for the Ephemeris configuration language.
//!
//! Source text declares types, models, and instances as nested blocks;
//! this crate lexes and parses that text into a block tree, elaborates the
//! blocks into typed elements from `ephemeris-core`, and serializes
//! elements back to source. Parsing is best-effort: the caller receives
//! every element that resolved plus a list of diagnostics, rather than an
//! all-or-nothing result.
//!
//! ```
//! use ephemeris_parser::{ElaborateConfig, parse};
//!
//! let source = r#"
//!     model employee {
//!       string name {
//!       }
//!     }
//! "#;
//!
//! let outcome = parse(source, &ElaborateConfig::new("vault"));
//! assert!(!outcome.has_errors());
//! assert_eq!(outcome.elements.len(), 1);
//! ```

pub mod blocks;
pub mod error;

mod dump;
mod elaborate;
mod lexer;
mod parser;
mod span;
mod tokens;

pub use dump::dump_elements;
pub use elaborate::{BUILTIN_NAMESPACE, ElaborateConfig};
pub use error::ParseError;
pub use span::{Span, Spanned};

use ephemeris_core::element::Element;

use crate::error::Diagnostic;

/// The result of a best-effort parse: resolved elements plus diagnostics.
#[derive(Debug)]
pub struct ParseOutcome {
    /// Elements that resolved, in source order.
    pub elements: Vec<Element>,
    /// Everything the lexer, parser, and elaborator reported.
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    /// Whether any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity().is_error())
    }

    /// Convert into a strict result: elements, or every diagnostic as one
    /// [`ParseError`].
    pub fn into_result(self) -> Result<Vec<Element>, ParseError> {
        if self.has_errors() {
            Err(ParseError::new(self.diagnostics))
        } else {
            Ok(self.elements)
        }
    }
}

/// Parse source text into elements, best-effort.
///
/// Lexical errors stop the pipeline (there is no token stream to parse);
/// parser errors are recovered per block; elaboration errors are scoped to
/// the construct they occur in. In every case the outcome carries all
/// diagnostics collected along the way.
pub fn parse(source: &str, config: &ElaborateConfig) -> ParseOutcome {
    let tokens = match lexer::tokenize(source) {
        Ok(tokens) => tokens,
        Err(err) => {
            return ParseOutcome {
                elements: Vec::new(),
                diagnostics: err.into_diagnostics(),
            };
        }
    };

    let (blocks, mut diagnostics) = parser::parse_blocks(&tokens);
    let (elements, elaborate_diagnostics) = elaborate::elaborate(&blocks, config);
    diagnostics.extend(elaborate_diagnostics);

    ParseOutcome {
        elements,
        diagnostics,
    }
}

/// Parse source text, failing on any error-severity diagnostic.
///
/// # Errors
///
/// Returns [`ParseError`] wrapping every collected diagnostic.
pub fn parse_strict(source: &str, config: &ElaborateConfig) -> Result<Vec<Element>, ParseError> {
    parse(source, config).into_result()
}

/// Parse source text into the raw block tree, without elaboration.
///
/// Exposed for tooling that works on the syntactic shape (formatters,
/// linters); normal callers use [`parse`].
pub fn parse_to_blocks(source: &str) -> Result<(Vec<blocks::Block>, Vec<Diagnostic>), ParseError> {
    let tokens = lexer::tokenize(source)?;
    Ok(parser::parse_blocks(&tokens))
}
