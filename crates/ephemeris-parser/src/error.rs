//! Error and diagnostic system for the Ephemeris parser.
//!
//! This module provides an error handling system with:
//! - Error codes for documentation and searchability
//! - Multiple labeled spans for rich error context
//! - Severity levels
//! - Diagnostic collector for accumulating multiple errors
//!
//! # Overview
//!
//! The error system is built around the [`Diagnostic`] type, which represents
//! a single error or warning message with optional error code, multiple
//! source locations, and help text. Parsing is best-effort: diagnostics are
//! accumulated and returned alongside whatever elements still resolved.
//! Strict callers receive multiple diagnostics wrapped in [`ParseError`].
//!
//! # Example
//!
//! ```
//! # use ephemeris_parser::error::{Diagnostic, ErrorCode};
//! # use ephemeris_parser::Span;
//!
//! let span = Span::new(100..120);
//! let original_span = Span::new(50..70);
//!
//! let diag = Diagnostic::error("model `Employee` redeclares field `manager`")
//!     .with_code(ErrorCode::E203)
//!     .with_label(span, "redeclared here")
//!     .with_secondary_label(original_span, "first declared here")
//!     .with_help("remove the duplicate field block");
//! ```

mod collector;
mod diagnostic;
mod error_code;
mod label;
mod parse_error;
mod severity;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::Diagnostic;
pub use error_code::ErrorCode;
pub use label::Label;
pub use parse_error::ParseError;
pub use severity::Severity;
