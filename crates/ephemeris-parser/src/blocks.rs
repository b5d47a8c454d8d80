//! The intermediate block tree produced by the parser.
//!
//! A source file is a sequence of blocks. Each block has a kind keyword, an
//! ordered list of labels, an attribute map, and nested child blocks:
//!
//! ```text
//! model employee {            // kind `model`, label `employee`
//!   api_name = "Employee__c"  // attribute
//!   string name {             // child block: kind `string`, label `name`
//!     _required = true
//!   }
//! }
//! ```
//!
//! Blocks are purely syntactic; the [`elaborate`](crate::elaborate) phase
//! interprets them into typed elements.

use indexmap::IndexMap;

use crate::span::{Span, Spanned};

/// A raw attribute value, before elaboration into a typed value.
///
/// Bare dotted identifiers (`vault.Employee.alice`) are kept as unparsed
/// reference strings so that id validation can report a spanned diagnostic
/// during elaboration.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    String(String),
    Number(f64),
    Bool(bool),
    Reference(String),
    List(Vec<RawValue>),
    Map(IndexMap<String, RawValue>),
}

/// One parsed block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// The block kind keyword, possibly dotted (`model`, `vault.phone`).
    pub kind: Spanned<String>,
    /// Ordered bare-word labels between the kind and the opening brace.
    pub labels: Vec<Spanned<String>>,
    /// Attribute entries in source order; duplicate keys keep the last
    /// occurrence.
    pub attrs: IndexMap<String, Spanned<RawValue>>,
    /// Nested blocks in source order.
    pub children: Vec<Block>,
    /// The span from the kind keyword through the closing brace.
    pub span: Span,
}

impl Block {
    /// The single label, if the block has exactly one.
    pub fn single_label(&self) -> Option<&Spanned<String>> {
        match self.labels.as_slice() {
            [label] => Some(label),
            _ => None,
        }
    }
}
