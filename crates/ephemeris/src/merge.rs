//! Merge engine: unify elements discovered across sources.
//!
//! Elements sharing an id are merged into one canonical element: object
//! annotations and fields are unioned with later sources overriding
//! earlier ones on key collision, primitive types must agree on their
//! base, and instance fragments union their value trees. Merging is also
//! the single place cross-references resolve: every reference in the
//! unified graph is looked up against the registry and its cache
//! populated; failures are recorded without aborting the batch.
//!
//! Merging is pure and deterministic. Input order is source precedence:
//! strictly last-wins, however many sources disagree.

use indexmap::IndexMap;
use log::{debug, trace};
use thiserror::Error;

use ephemeris_core::{
    element::{Element, Field, InstanceElement, ObjectType, PrimitiveType, builtins},
    identifier::{ElemId, FIELD_SEGMENT},
    registry::ElementRegistry,
    value::Value,
};

/// A merge-time problem, scoped to one element.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    /// Sources disagree in a way that cannot be unioned; the first
    /// definition is kept.
    #[error("conflicting definitions for `{id}`: {detail}")]
    Conflict { id: ElemId, detail: String },

    /// A reference target does not exist in the unified graph; the value
    /// keeps its unresolved marker.
    #[error("unresolved reference from `{id}` to `{target}`")]
    UnresolvedReference { id: ElemId, target: ElemId },
}

/// The unified graph plus everything that went wrong building it.
#[derive(Debug)]
pub struct MergeOutcome {
    registry: ElementRegistry,
    errors: Vec<MergeError>,
}

impl MergeOutcome {
    /// The unified, reference-resolved registry.
    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    /// Problems recorded while merging; never fatal to the whole batch.
    pub fn errors(&self) -> &[MergeError] {
        &self.errors
    }

    /// The merged elements in first-seen order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.registry.elements()
    }

    /// Split into registry and errors.
    pub fn into_parts(self) -> (ElementRegistry, Vec<MergeError>) {
        (self.registry, self.errors)
    }
}

/// Merge elements from any number of sources into one canonical graph.
///
/// Input order is precedence: when two sources disagree on a field or
/// annotation value, the later one wins. Merging the output of a merge
/// yields a structurally equal graph.
pub fn merge_elements(elements: impl IntoIterator<Item = Element>) -> MergeOutcome {
    let mut registry = ElementRegistry::new();
    let mut errors = Vec::new();

    for element in elements {
        let id = element.elem_id().clone();
        match registry.lookup(&id) {
            None => {
                registry.insert(element);
            }
            Some(existing) => {
                trace!(id = id.full_name(); "Merging duplicate definition");
                let merged = merge_pair(existing.clone(), element, &mut errors);
                registry.insert(merged);
            }
        }
    }

    resolve_references(&mut registry, &mut errors);

    debug!(
        elements = registry.len(),
        errors = errors.len();
        "Merge completed"
    );
    MergeOutcome { registry, errors }
}

/// Merge one incoming element into the existing definition with its id.
fn merge_pair(existing: Element, incoming: Element, errors: &mut Vec<MergeError>) -> Element {
    match (existing, incoming) {
        (Element::Primitive(a), Element::Primitive(b)) => {
            if a.kind() != b.kind() {
                errors.push(MergeError::Conflict {
                    id: a.id().clone(),
                    detail: format!(
                        "primitive base `{}` redefined as `{}`",
                        a.kind().as_keyword(),
                        b.kind().as_keyword()
                    ),
                });
                return Element::Primitive(a);
            }
            let mut annotations = a.annotations().clone();
            annotations.extend(b.annotations().clone());
            Element::Primitive(PrimitiveType::new(a.id().clone(), a.kind(), annotations))
        }
        (Element::Object(a), Element::Object(b)) => Element::Object(merge_objects(a, b, errors)),
        (Element::Instance(a), Element::Instance(b)) => {
            if a.type_ref() != b.type_ref() {
                errors.push(MergeError::Conflict {
                    id: a.id().clone(),
                    detail: format!(
                        "instance type `{}` redefined as `{}`",
                        a.type_ref(),
                        b.type_ref()
                    ),
                });
                return Element::Instance(a);
            }
            let mut value = a.value().clone();
            value.extend(b.value().clone());
            let mut annotations = a.annotations().clone();
            annotations.extend(b.annotations().clone());
            Element::Instance(InstanceElement::new(
                a.id().clone(),
                a.type_ref().clone(),
                value,
                annotations,
            ))
        }
        (a, b) => {
            errors.push(MergeError::Conflict {
                id: a.elem_id().clone(),
                detail: format!("{} redefined as {}", a.kind_name(), b.kind_name()),
            });
            a
        }
    }
}

fn merge_objects(a: ObjectType, b: ObjectType, errors: &mut Vec<MergeError>) -> ObjectType {
    let id = a.id().clone();
    let mut fields: IndexMap<String, Field> = a.fields().clone();

    for (name, incoming) in b.fields() {
        match fields.get(name) {
            None => {
                fields.insert(name.clone(), incoming.clone());
            }
            Some(current) if current.type_ref() != incoming.type_ref() => {
                errors.push(MergeError::Conflict {
                    id: current.id().clone(),
                    detail: format!(
                        "field type `{}` redefined as `{}`",
                        current.type_ref(),
                        incoming.type_ref()
                    ),
                });
            }
            Some(current) => {
                let mut annotations = current.annotations().clone();
                annotations.extend(incoming.annotations().clone());
                fields.insert(
                    name.clone(),
                    Field::new(
                        current.id().clone(),
                        current.type_ref().clone(),
                        annotations,
                    ),
                );
            }
        }
    }

    let mut annotations = a.annotations().clone();
    annotations.extend(b.annotations().clone());
    ObjectType::new(id, fields, annotations)
}

/// Resolve a reference target against the unified graph.
///
/// Exact ids (top-level types and instances) resolve directly; `field`
/// paths resolve through the owning object type, which must declare the
/// named field. Builtin primitive ids always resolve.
fn resolve_target(registry_snapshot: &IndexMap<ElemId, Element>, target: &ElemId) -> Option<Element> {
    if let Some(element) = registry_snapshot.get(target) {
        return Some(element.clone());
    }
    if let Some(builtin) = builtins::lookup(target) {
        return Some(builtin);
    }

    // Nested field path: `ns.Type.field.name[...]`.
    let top_level = target.top_level();
    let owner = registry_snapshot.get(&top_level)?;
    let path = target.path();
    if path.first().map(|segment| segment.resolve()).as_deref() == Some(FIELD_SEGMENT) {
        let field_name = path.get(1)?.resolve();
        let object = owner.as_object()?;
        object.field(&field_name)?;
        return Some(owner.clone());
    }
    None
}

/// Populate reference caches and validate type references.
///
/// Caches clone from the pre-resolution snapshot, so references inside a
/// cached element stay unresolved and cyclic webs remain finite.
fn resolve_references(registry: &mut ElementRegistry, errors: &mut Vec<MergeError>) {
    let snapshot: IndexMap<ElemId, Element> = registry
        .elements()
        .map(|element| (element.elem_id().clone(), element.clone()))
        .collect();

    for element in registry.elements_mut() {
        let owner_id = element.elem_id().clone();

        // Type references come first: a field or instance pointing at a
        // type that never materialized is reported, not dropped.
        match element {
            Element::Object(object) => {
                for field in object.fields().values() {
                    if resolve_target(&snapshot, field.type_ref()).is_none() {
                        errors.push(MergeError::UnresolvedReference {
                            id: field.id().clone(),
                            target: field.type_ref().clone(),
                        });
                    }
                }
            }
            Element::Instance(instance) => {
                if resolve_target(&snapshot, instance.type_ref()).is_none() {
                    errors.push(MergeError::UnresolvedReference {
                        id: owner_id.clone(),
                        target: instance.type_ref().clone(),
                    });
                }
            }
            Element::Primitive(_) => {}
        }

        let mut resolve_value = |value: &mut Value| {
            value.visit_references_mut(&mut |reference| {
                match resolve_target(&snapshot, reference.target()) {
                    Some(resolved) => reference.resolve_to(resolved),
                    None => errors.push(MergeError::UnresolvedReference {
                        id: owner_id.clone(),
                        target: reference.target().clone(),
                    }),
                }
            });
        };

        match element {
            Element::Primitive(primitive) => {
                for value in primitive.annotations_mut().values_mut() {
                    resolve_value(value);
                }
            }
            Element::Object(object) => {
                for value in object.annotations_mut().values_mut() {
                    resolve_value(value);
                }
                for field in object.fields_mut().values_mut() {
                    for value in field.annotations_mut().values_mut() {
                        resolve_value(value);
                    }
                }
            }
            Element::Instance(instance) => {
                for value in instance.value_mut().values_mut() {
                    resolve_value(value);
                }
                for value in instance.annotations_mut().values_mut() {
                    resolve_value(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ephemeris_core::{
        element::{Annotations, PrimitiveKind},
        value::Reference,
    };
    use ephemeris_parser::{ElaborateConfig, parse_strict};

    use super::*;

    fn parse_vault(source: &str) -> Vec<Element> {
        parse_strict(source, &ElaborateConfig::new("vault")).expect("valid source")
    }

    #[test]
    fn test_merge_unions_object_fields_across_sources() {
        let first = parse_vault("model employee {\n  string name {\n  }\n}");
        let second = parse_vault("model employee {\n  number age {\n  }\n}");

        let outcome = merge_elements(first.into_iter().chain(second));
        assert!(outcome.errors().is_empty());
        assert_eq!(outcome.registry().len(), 1);

        let merged = outcome
            .registry()
            .get(&ElemId::new("vault", "employee"))
            .expect("merged object");
        let object = merged.as_object().expect("object type");
        assert!(object.field("name").is_some());
        assert!(object.field("age").is_some());
    }

    #[test]
    fn test_later_source_overrides_annotation_values() {
        let first = parse_vault("model employee {\n  api_name = \"Old\"\n}");
        let second = parse_vault("model employee {\n  api_name = \"New\"\n}");
        let third = parse_vault("model employee {\n  api_name = \"Newest\"\n}");

        let outcome = merge_elements(first.into_iter().chain(second).chain(third));
        let object = outcome.elements().next().expect("one element");
        assert_eq!(
            object.annotations()["api_name"],
            Value::String("Newest".to_owned())
        );
    }

    #[test]
    fn test_primitive_base_conflict_keeps_first_and_reports() {
        let first = parse_vault("type phone is string {\n}");
        let second = parse_vault("type phone is number {\n}");

        let outcome = merge_elements(first.into_iter().chain(second));
        assert_eq!(outcome.errors().len(), 1);
        assert!(matches!(outcome.errors()[0], MergeError::Conflict { .. }));

        let primitive = outcome
            .elements()
            .next()
            .and_then(Element::as_primitive)
            .expect("primitive kept");
        assert_eq!(primitive.kind(), PrimitiveKind::String);
    }

    #[test]
    fn test_incompatible_field_redefinition_is_conflict() {
        let first = parse_vault("model employee {\n  string name {\n  }\n}");
        let second = parse_vault("model employee {\n  number name {\n  }\n}");

        let outcome = merge_elements(first.into_iter().chain(second));
        assert_eq!(outcome.errors().len(), 1);

        // First definition wins.
        let object = outcome
            .elements()
            .next()
            .and_then(Element::as_object)
            .expect("object");
        assert_eq!(
            object.field("name").expect("field").type_ref(),
            &ElemId::new(builtins::NAMESPACE, "string")
        );
    }

    #[test]
    fn test_references_resolve_against_unified_registry() {
        let elements = parse_vault(
            r#"
            model employee {
              string name {
              }
            }
            employee bob {
            }
            employee alice {
              manager = vault.employee.bob
            }
            "#,
        );

        let outcome = merge_elements(elements);
        assert!(outcome.errors().is_empty());

        let alice = outcome
            .registry()
            .get(&ElemId::new("vault", "employee").child_instance("alice"))
            .expect("alice");
        let manager = alice.as_instance().expect("instance").value()["manager"]
            .as_reference()
            .expect("reference");
        assert!(manager.is_resolved());
        let resolved = manager.resolved().expect("cached element");
        assert_eq!(
            resolved.elem_id(),
            &ElemId::new("vault", "employee").child_instance("bob")
        );
    }

    #[test]
    fn test_field_path_reference_resolves_through_owner() {
        let elements = parse_vault(
            r#"
            model employee {
              string name {
              }
            }
            employee alice {
              pointer = vault.employee.field.name
            }
            "#,
        );

        let outcome = merge_elements(elements);
        assert!(outcome.errors().is_empty(), "errors: {:?}", outcome.errors());
    }

    #[test]
    fn test_unresolved_reference_is_recorded_not_dropped() {
        let elements = parse_vault(
            r#"
            model employee {
            }
            employee alice {
              manager = vault.employee.ghost
            }
            "#,
        );

        let outcome = merge_elements(elements);
        assert_eq!(outcome.errors().len(), 1);
        assert!(matches!(
            &outcome.errors()[0],
            MergeError::UnresolvedReference { target, .. }
                if target.full_name() == "vault.employee.ghost"
        ));

        // The value keeps its unresolved marker.
        let alice = outcome
            .registry()
            .get(&ElemId::new("vault", "employee").child_instance("alice"))
            .expect("alice");
        let manager = alice.as_instance().expect("instance").value()["manager"]
            .as_reference()
            .expect("reference");
        assert!(!manager.is_resolved());
    }

    #[test]
    fn test_dangling_field_type_is_reported() {
        let elements = parse_vault("model employee {\n  badge id {\n  }\n}");
        let outcome = merge_elements(elements);
        assert_eq!(outcome.errors().len(), 1);
        assert!(matches!(
            &outcome.errors()[0],
            MergeError::UnresolvedReference { target, .. }
                if target.full_name() == "vault.badge"
        ));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let elements = parse_vault(
            r#"
            type phone is string {
            }
            model employee {
              phone mobile {
              }
            }
            employee alice {
              mobile = "555-0100"
            }
            model employee {
              string name {
              }
            }
            "#,
        );

        let once = merge_elements(elements.clone());
        let once_elements: Vec<Element> = once.elements().cloned().collect();
        let twice = merge_elements(once_elements.clone());
        let twice_elements: Vec<Element> = twice.elements().cloned().collect();

        assert_eq!(once_elements, twice_elements);
        assert!(twice.errors().is_empty());
    }

    #[test]
    fn test_cyclic_references_resolve_without_recursion() {
        let elements = parse_vault(
            r#"
            model employee {
            }
            employee alice {
              peer = vault.employee.bob
            }
            employee bob {
              peer = vault.employee.alice
            }
            "#,
        );

        let outcome = merge_elements(elements);
        assert!(outcome.errors().is_empty());

        let alice = outcome
            .registry()
            .get(&ElemId::new("vault", "employee").child_instance("alice"))
            .expect("alice");
        let peer = alice.as_instance().expect("instance").value()["peer"]
            .as_reference()
            .expect("reference");
        // The cache holds bob cloned from the pre-resolution snapshot, so
        // bob's own reference back to alice stays unresolved inside it.
        let cached_bob = peer.resolved().expect("resolved");
        let inner = cached_bob.as_instance().expect("instance").value()["peer"]
            .as_reference()
            .expect("reference");
        assert!(!inner.is_resolved());
    }

    #[test]
    fn test_annotation_reference_merge_uses_structural_equality() {
        let mut annotations = Annotations::new();
        annotations.insert(
            "link".to_owned(),
            Value::Reference(Reference::new(ElemId::new("vault", "employee"))),
        );
        let object = Element::Object(ObjectType::new(
            ElemId::new("vault", "team"),
            IndexMap::new(),
            annotations,
        ));
        let employee = Element::Object(ObjectType::new(
            ElemId::new("vault", "employee"),
            IndexMap::new(),
            Annotations::new(),
        ));

        let once = merge_elements([object.clone(), employee.clone()]);
        let twice = merge_elements(once.elements().cloned().collect::<Vec<_>>());
        let a: Vec<Element> = once.elements().cloned().collect();
        let b: Vec<Element> = twice.elements().cloned().collect();
        assert_eq!(a, b);
    }
}
