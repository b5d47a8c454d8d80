//! Session-scoped element storage.
//!
//! An [`ElementRegistry`] maps each [`ElemId`] to exactly one [`Element`].
//! A registry belongs to a single parse/merge session: it is constructed
//! explicitly and handed off, never shared process-wide, so concurrent
//! sessions cannot interfere.

use indexmap::{IndexMap, IndexSet};
use log::debug;
use thiserror::Error;

use crate::{
    element::{Element, ObjectType},
    identifier::ElemId,
};

/// Strict lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("element `{id}` not found in registry")]
pub struct NotFoundError {
    pub id: ElemId,
}

/// Bijective `ElemId -> Element` storage for one session.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    elements: IndexMap<ElemId, Element>,
    placeholders: IndexSet<ElemId>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        ElementRegistry::default()
    }

    /// Insert an element under its own id, replacing any previous entry.
    ///
    /// Inserting a real element clears a placeholder registered under the
    /// same id. Returns the replaced element, if any.
    pub fn insert(&mut self, element: Element) -> Option<Element> {
        let id = element.elem_id().clone();
        self.placeholders.shift_remove(&id);
        self.elements.insert(id, element)
    }

    /// Non-strict lookup.
    pub fn lookup(&self, id: &ElemId) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Strict lookup.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when no element is registered under `id`.
    pub fn get(&self, id: &ElemId) -> Result<&Element, NotFoundError> {
        self.elements.get(id).ok_or_else(|| NotFoundError { id: id.clone() })
    }

    /// Look up an id, creating an empty placeholder object type when it is
    /// unknown.
    ///
    /// Placeholders support incremental parsing: a field may name a type
    /// that a later source defines. Ids that are still placeholders after
    /// merging are reported as unresolved.
    pub fn get_or_placeholder(&mut self, id: &ElemId) -> &Element {
        if !self.elements.contains_key(id) {
            debug!(id = id.full_name(); "Registering placeholder for unknown type");
            self.placeholders.insert(id.clone());
            self.elements.insert(
                id.clone(),
                Element::Object(ObjectType::new(
                    id.clone(),
                    IndexMap::new(),
                    IndexMap::new(),
                )),
            );
        }
        &self.elements[id]
    }

    /// Whether `id` is registered (placeholder entries count).
    pub fn contains(&self, id: &ElemId) -> bool {
        self.elements.contains_key(id)
    }

    /// Whether `id` is registered only as a placeholder.
    pub fn is_placeholder(&self, id: &ElemId) -> bool {
        self.placeholders.contains(id)
    }

    /// Ids that were requested but never materialized.
    pub fn placeholder_ids(&self) -> impl Iterator<Item = &ElemId> {
        self.placeholders.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ElemId> {
        self.elements.keys()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// Mutable iteration, for in-session passes such as reference
    /// resolution. Ids stay frozen; only element bodies may change.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.elements.values_mut()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Consume the registry, yielding the elements in insertion order.
    pub fn into_elements(self) -> Vec<Element> {
        self.elements.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Annotations, PrimitiveKind, PrimitiveType};

    fn primitive(name: &str) -> Element {
        Element::Primitive(PrimitiveType::new(
            ElemId::new("vault", name),
            PrimitiveKind::String,
            Annotations::new(),
        ))
    }

    #[test]
    fn test_get_fails_for_unknown_id() {
        let registry = ElementRegistry::new();
        let id = ElemId::new("vault", "missing");
        assert_eq!(registry.get(&id), Err(NotFoundError { id }));
    }

    #[test]
    fn test_placeholder_is_created_once_and_tracked() {
        let mut registry = ElementRegistry::new();
        let id = ElemId::new("vault", "LaterType");

        registry.get_or_placeholder(&id);
        assert!(registry.is_placeholder(&id));
        assert_eq!(registry.len(), 1);

        registry.get_or_placeholder(&id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_real_insert_clears_placeholder() {
        let mut registry = ElementRegistry::new();
        let id = ElemId::new("vault", "phone");

        registry.get_or_placeholder(&id);
        registry.insert(Element::Primitive(PrimitiveType::new(
            id.clone(),
            PrimitiveKind::String,
            Annotations::new(),
        )));

        assert!(!registry.is_placeholder(&id));
        assert!(registry.get(&id).is_ok());
        assert_eq!(registry.placeholder_ids().count(), 0);
    }

    #[test]
    fn test_insert_replaces_and_returns_previous() {
        let mut registry = ElementRegistry::new();
        assert!(registry.insert(primitive("phone")).is_none());
        assert!(registry.insert(primitive("phone")).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_into_elements_preserves_insertion_order() {
        let mut registry = ElementRegistry::new();
        registry.insert(primitive("b"));
        registry.insert(primitive("a"));

        let names: Vec<_> = registry
            .into_elements()
            .iter()
            .map(|element| element.elem_id().full_name())
            .collect();
        assert_eq!(names, vec!["vault.b", "vault.a"]);
    }
}
