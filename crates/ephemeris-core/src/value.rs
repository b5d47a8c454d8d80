//! Value trees and reference expressions.
//!
//! Element bodies and annotations are nested [`Value`] trees: scalars,
//! insertion-ordered maps, lists, and [`Reference`]s pointing at other
//! elements by id. References start unresolved; the merge step resolves
//! them against the unified registry and populates the cache.

use std::fmt;

use indexmap::IndexMap;

use crate::{element::Element, identifier::ElemId};

/// A nested configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Reference(Reference),
}

impl Value {
    /// Borrow the string content, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the boolean content, if this is a boolean scalar.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the list content, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the map content, if this is a map.
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Borrow the reference, if this is a reference expression.
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Visit every reference in this tree, depth-first.
    pub fn visit_references<'a>(&'a self, f: &mut impl FnMut(&'a Reference)) {
        match self {
            Value::Reference(reference) => f(reference),
            Value::List(items) => {
                for item in items {
                    item.visit_references(f);
                }
            }
            Value::Map(entries) => {
                for value in entries.values() {
                    value.visit_references(f);
                }
            }
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {}
        }
    }

    /// Visit every reference in this tree mutably, depth-first.
    pub fn visit_references_mut(&mut self, f: &mut impl FnMut(&mut Reference)) {
        match self {
            Value::Reference(reference) => f(reference),
            Value::List(items) => {
                for item in items {
                    item.visit_references_mut(f);
                }
            }
            Value::Map(entries) => {
                for value in entries.values_mut() {
                    value.visit_references_mut(f);
                }
            }
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {}
        }
    }
}

/// A pointer from a value or annotation position to another element.
///
/// The target id is the reference's identity; the resolved cache is
/// populated during merge-time resolution with a deep clone of the target's
/// top-level element, taken from the pre-resolution snapshot. Nested
/// references inside a cached clone stay unresolved, which keeps cyclic
/// reference webs finite.
#[derive(Clone)]
pub struct Reference {
    target: ElemId,
    resolved: Option<Box<Element>>,
}

impl Reference {
    /// Create an unresolved reference to `target`.
    pub fn new(target: ElemId) -> Self {
        Reference {
            target,
            resolved: None,
        }
    }

    /// The id this reference points at.
    pub fn target(&self) -> &ElemId {
        &self.target
    }

    /// The cached resolved element, if resolution has run and succeeded.
    pub fn resolved(&self) -> Option<&Element> {
        self.resolved.as_deref()
    }

    /// Whether the resolution cache is populated.
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Populate the resolution cache.
    pub fn resolve_to(&mut self, element: Element) {
        self.resolved = Some(Box::new(element));
    }
}

// Equality is identity of the target; the cache is transparent so that
// resolution does not change what a value tree "is".
impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("target", &self.target)
            .field("resolved", &self.resolved.is_some())
            .finish()
    }
}
