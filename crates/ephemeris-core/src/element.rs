//! Typed representations of configuration entities.
//!
//! The element model is a closed set of variants over [`Element`]:
//!
//! - [`PrimitiveType`]: a named scalar type (string, number, boolean)
//! - [`ObjectType`]: a named record type owning its [`Field`]s
//! - [`InstanceElement`]: a configured instance of an object type
//!
//! Elements are fully owned trees: `Clone` is a deep clone, which is what
//! guarantees deploy filters can never mutate caller-owned shared state.
//! Types are referenced by [`ElemId`], never embedded, so type graphs with
//! cycles stay representable.

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    identifier::ElemId,
    value::{Reference, Value},
};

/// Well-known annotation keys.
pub mod annotation {
    /// Ordered list of references to the elements this instance belongs to.
    pub const PARENT: &str = "_parent";
    /// The name the remote API knows this type by.
    pub const API_NAME: &str = "api_name";
    /// The underlying object kind on the remote platform.
    pub const OBJECT_KIND: &str = "object_kind";
    /// On a field: reference to the object type its string values name
    /// fields of.
    pub const LOOKUP_TARGET: &str = "lookup_target";
}

/// Named values attached to an element or field.
pub type Annotations = IndexMap<String, Value>;

/// The base of a primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
}

impl PrimitiveKind {
    /// Parse a base keyword (`string`, `number`, `boolean`).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "string" => Some(PrimitiveKind::String),
            "number" => Some(PrimitiveKind::Number),
            "boolean" => Some(PrimitiveKind::Boolean),
            _ => None,
        }
    }

    /// The source keyword for this base.
    pub fn as_keyword(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
        }
    }
}

/// A named scalar type.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveType {
    id: ElemId,
    kind: PrimitiveKind,
    annotations: Annotations,
}

impl PrimitiveType {
    pub fn new(id: ElemId, kind: PrimitiveKind, annotations: Annotations) -> Self {
        PrimitiveType {
            id,
            kind,
            annotations,
        }
    }

    pub fn id(&self) -> &ElemId {
        &self.id
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }
}

/// A field of an [`ObjectType`].
///
/// A field belongs to exactly one object type; its own id is derived from
/// the owner (`ns.Type.field.name`). The field's type is a reference by id,
/// which may point at a primitive or another object type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    id: ElemId,
    type_ref: ElemId,
    annotations: Annotations,
}

impl Field {
    pub fn new(id: ElemId, type_ref: ElemId, annotations: Annotations) -> Self {
        Field {
            id,
            type_ref,
            annotations,
        }
    }

    pub fn id(&self) -> &ElemId {
        &self.id
    }

    /// The field's own name (last id segment).
    pub fn name(&self) -> String {
        self.id
            .path()
            .last()
            .map(|segment| segment.resolve())
            .unwrap_or_default()
    }

    pub fn type_ref(&self) -> &ElemId {
        &self.type_ref
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }
}

/// A named record type owning its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    id: ElemId,
    fields: IndexMap<String, Field>,
    annotations: Annotations,
}

impl ObjectType {
    pub fn new(id: ElemId, fields: IndexMap<String, Field>, annotations: Annotations) -> Self {
        ObjectType {
            id,
            fields,
            annotations,
        }
    }

    pub fn id(&self) -> &ElemId {
        &self.id
    }

    pub fn fields(&self) -> &IndexMap<String, Field> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut IndexMap<String, Field> {
        &mut self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }
}

/// Error produced by [`InstanceElement::parents`] for a malformed parent
/// annotation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParentError {
    #[error("`_parent` annotation on `{id}` must be a list of references")]
    Malformed { id: ElemId },

    #[error("`_parent` annotation on `{id}` is present but empty")]
    Empty { id: ElemId },
}

/// A configured instance of an object type.
///
/// The type is shared (referenced by id, not owned); the value tree and
/// annotations are owned. The optional parent list lives in the
/// [`annotation::PARENT`] annotation as an ordered list of references;
/// absence means the instance is top-level.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceElement {
    id: ElemId,
    type_ref: ElemId,
    value: IndexMap<String, Value>,
    annotations: Annotations,
}

impl InstanceElement {
    pub fn new(
        id: ElemId,
        type_ref: ElemId,
        value: IndexMap<String, Value>,
        annotations: Annotations,
    ) -> Self {
        InstanceElement {
            id,
            type_ref,
            value,
            annotations,
        }
    }

    pub fn id(&self) -> &ElemId {
        &self.id
    }

    pub fn type_ref(&self) -> &ElemId {
        &self.type_ref
    }

    pub fn value(&self) -> &IndexMap<String, Value> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.value
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }

    /// The ordered parent references of this instance.
    ///
    /// Returns an empty list when the annotation is absent (a top-level
    /// instance).
    ///
    /// # Errors
    ///
    /// Returns [`ParentError`] when the annotation is present but is not a
    /// non-empty list of references.
    pub fn parents(&self) -> Result<Vec<&Reference>, ParentError> {
        let Some(value) = self.annotations.get(annotation::PARENT) else {
            return Ok(Vec::new());
        };

        let entries = value.as_list().ok_or_else(|| ParentError::Malformed {
            id: self.id.clone(),
        })?;
        if entries.is_empty() {
            return Err(ParentError::Empty {
                id: self.id.clone(),
            });
        }

        entries
            .iter()
            .map(|entry| {
                entry.as_reference().ok_or_else(|| ParentError::Malformed {
                    id: self.id.clone(),
                })
            })
            .collect()
    }
}

/// The builtin primitive types every namespace can reference.
pub mod builtins {
    use super::{Annotations, Element, PrimitiveKind, PrimitiveType};
    use crate::identifier::ElemId;

    /// Namespace of the builtin primitives (`string`, `number`, `boolean`).
    pub const NAMESPACE: &str = "ephemeris";

    /// The builtin primitive type elements.
    pub fn types() -> Vec<Element> {
        [
            PrimitiveKind::String,
            PrimitiveKind::Number,
            PrimitiveKind::Boolean,
        ]
        .into_iter()
        .map(|kind| {
            Element::Primitive(PrimitiveType::new(
                ElemId::new(NAMESPACE, kind.as_keyword()),
                kind,
                Annotations::new(),
            ))
        })
        .collect()
    }

    /// Look up a builtin by id.
    pub fn lookup(id: &ElemId) -> Option<Element> {
        types()
            .into_iter()
            .find(|element| element.elem_id() == id)
    }
}

/// Any named, typed entity in the configuration graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Primitive(PrimitiveType),
    Object(ObjectType),
    Instance(InstanceElement),
}

impl Element {
    /// The element's id, uniform across variants.
    pub fn elem_id(&self) -> &ElemId {
        match self {
            Element::Primitive(primitive) => primitive.id(),
            Element::Object(object) => object.id(),
            Element::Instance(instance) => instance.id(),
        }
    }

    /// The element's annotations, uniform across variants.
    pub fn annotations(&self) -> &Annotations {
        match self {
            Element::Primitive(primitive) => primitive.annotations(),
            Element::Object(object) => object.annotations(),
            Element::Instance(instance) => instance.annotations(),
        }
    }

    /// A short noun for log and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Element::Primitive(_) => "primitive type",
            Element::Object(_) => "object type",
            Element::Instance(_) => "instance",
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveType> {
        match self {
            Element::Primitive(primitive) => Some(primitive),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self {
            Element::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&InstanceElement> {
        match self {
            Element::Instance(instance) => Some(instance),
            _ => None,
        }
    }
}
