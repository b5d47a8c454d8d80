//! Elaboration phase: block trees into typed elements.
//!
//! This module interprets the block tree produced by the parser into the
//! core element model. It recognizes three top-level shapes:
//!
//! - `type <name> is <base>` declares a primitive type, or an object type
//!   when the base is `object`
//! - `model <name>` declares an object type with field child blocks
//! - any other kind declares an instance of the named type
//!
//! Type lookups go through a session-scoped [`ElementRegistry`] seeded with
//! the builtin primitives; unknown type ids get placeholders so that a
//! field may name a type a later source defines. Unrecognized child block
//! shapes are stored verbatim as opaque annotations, never rejected.

use indexmap::IndexMap;
use log::{debug, trace};

use ephemeris_core::{
    element::{
        Annotations, Element, Field, InstanceElement, ObjectType, PrimitiveKind, PrimitiveType,
        builtins,
    },
    identifier::ElemId,
    registry::ElementRegistry,
    value::{Reference, Value},
};

use crate::{
    blocks::{Block, RawValue},
    error::{Diagnostic, DiagnosticCollector, ErrorCode},
    span::Spanned,
};

/// Namespace of the builtin primitive types (`string`, `number`, `boolean`).
pub const BUILTIN_NAMESPACE: &str = builtins::NAMESPACE;

/// Configuration for the elaboration phase.
///
/// The namespace qualifies every unqualified name in the source: top-level
/// declarations, field type keywords, and instance type keywords.
#[derive(Debug, Clone)]
pub struct ElaborateConfig {
    namespace: String,
}

impl ElaborateConfig {
    /// Create a config for sources belonging to `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The namespace unqualified names resolve under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

struct Elaborator {
    namespace: String,
    registry: ElementRegistry,
    collector: DiagnosticCollector,
    elements: Vec<Element>,
}

impl Elaborator {
    fn new(config: &ElaborateConfig) -> Self {
        let mut registry = ElementRegistry::new();
        for builtin in builtins::types() {
            registry.insert(builtin);
        }
        Self {
            namespace: config.namespace().to_owned(),
            registry,
            collector: DiagnosticCollector::new(),
            elements: Vec::new(),
        }
    }

    fn run(mut self, blocks: &[Block]) -> (Vec<Element>, Vec<Diagnostic>) {
        for block in blocks {
            match block.kind.inner().as_str() {
                "type" => self.elaborate_type(block),
                "model" => self.elaborate_model(block),
                _ => self.elaborate_instance(block),
            }
        }
        debug!(elements = self.elements.len(); "Elaboration completed");
        (self.elements, self.collector.into_vec())
    }

    /// Record an element in source order and register it for lookups.
    ///
    /// Duplicate definitions are emitted once per occurrence; unifying them
    /// is the merge engine's job, not the parser's.
    fn emit(&mut self, element: Element) {
        trace!(id = element.elem_id().full_name(); "Elaborated element");
        self.registry.insert(element.clone());
        self.elements.push(element);
    }

    /// `type <name> is <base>` blocks.
    fn elaborate_type(&mut self, block: &Block) {
        let [name, is_word, base] = block.labels.as_slice() else {
            self.collector.push(
                Diagnostic::error("malformed type declaration")
                    .with_code(ErrorCode::E204)
                    .with_label(block.span, "declare as `type <name> is <base>`"),
            );
            return;
        };
        if is_word.inner() != "is" {
            self.collector.push(
                Diagnostic::error("malformed type declaration")
                    .with_code(ErrorCode::E204)
                    .with_label(is_word.span(), "expected `is`"),
            );
            return;
        }

        if base.inner() == "object" {
            self.elaborate_object(name, block);
            return;
        }

        let Some(kind) = PrimitiveKind::from_keyword(base.inner()) else {
            self.collector.push(
                Diagnostic::error(format!("unknown primitive base `{}`", base.inner()))
                    .with_code(ErrorCode::E200)
                    .with_label(base.span(), "not a primitive base")
                    .with_help("valid bases are `string`, `number`, `boolean`, `object`"),
            );
            return;
        };

        let id = ElemId::new(&self.namespace, name.inner());
        let mut annotations = self.convert_attrs(&block.attrs);
        self.fold_opaque_children(&mut annotations, &block.children);
        self.emit(Element::Primitive(PrimitiveType::new(id, kind, annotations)));
    }

    /// `model <name>` blocks.
    fn elaborate_model(&mut self, block: &Block) {
        let Some(name) = block.single_label() else {
            self.collector.push(
                Diagnostic::error("`model` blocks take exactly one name label")
                    .with_code(ErrorCode::E201)
                    .with_label(block.span, "expected `model <name>`"),
            );
            return;
        };
        self.elaborate_object(name, block);
    }

    /// The object-type body shared by `model` and `type ... is object`.
    fn elaborate_object(&mut self, name: &Spanned<String>, block: &Block) {
        let id = ElemId::new(&self.namespace, name.inner());
        let mut annotations = self.convert_attrs(&block.attrs);
        let mut fields: IndexMap<String, Field> = IndexMap::new();
        let mut opaque = Vec::new();

        for child in &block.children {
            let Some(field_name) = child.single_label() else {
                // Unknown block shape: keep it verbatim as an annotation.
                opaque.push(child);
                continue;
            };

            let Some(type_ref) = self.resolve_type_keyword(&child.kind) else {
                continue;
            };

            let mut field_annotations = self.convert_attrs(&child.attrs);
            self.fold_opaque_children(&mut field_annotations, &child.children);

            let field_id = id.child_field(field_name.inner());
            if fields.contains_key(field_name.inner()) {
                self.collector.push(
                    Diagnostic::warning(format!(
                        "field `{}` declared more than once on `{}`",
                        field_name.inner(),
                        id.full_name(),
                    ))
                    .with_code(ErrorCode::E203)
                    .with_label(field_name.span(), "this declaration wins"),
                );
            }
            fields.insert(
                field_name.inner().clone(),
                Field::new(field_id, type_ref, field_annotations),
            );
        }

        for child in opaque {
            let (key, value) = self.opaque_annotation(child);
            annotations.insert(key, value);
        }

        self.emit(Element::Object(ObjectType::new(id, fields, annotations)));
    }

    /// Instance declaration blocks: `<type-keyword> <name> { ... }`.
    fn elaborate_instance(&mut self, block: &Block) {
        let Some(name) = block.single_label() else {
            self.collector.push(
                Diagnostic::error("instance blocks take exactly one name label")
                    .with_code(ErrorCode::E201)
                    .with_label(block.span, "expected `<type> <name> { ... }`"),
            );
            return;
        };

        let Some(type_ref) = self.resolve_type_keyword(&block.kind) else {
            return;
        };

        let mut value = IndexMap::new();
        let mut annotations = Annotations::new();
        for (key, raw) in &block.attrs {
            let Some(converted) = self.convert_value(raw) else {
                continue;
            };
            // Leading-underscore keys are annotations, `_parent` included.
            if key.starts_with('_') {
                annotations.insert(key.clone(), converted);
            } else {
                value.insert(key.clone(), converted);
            }
        }
        self.fold_opaque_children_into_value(&mut value, &block.children);

        let id = type_ref.child_instance(name.inner());
        self.emit(Element::Instance(InstanceElement::new(
            id,
            type_ref,
            value,
            annotations,
        )));
    }

    /// Resolve a block kind keyword into a type id.
    ///
    /// Dotted keywords parse as full ids; `string`/`number`/`boolean` map
    /// to the builtins; any other single word is qualified with the source
    /// namespace. The resolved id is registered (with a placeholder when
    /// unknown) so later validation can report types that never appear.
    fn resolve_type_keyword(&mut self, keyword: &Spanned<String>) -> Option<ElemId> {
        let text = keyword.inner();
        let id = if text.contains('.') {
            match ElemId::from_full_name(text) {
                Ok(id) => id,
                Err(err) => {
                    self.collector.push(
                        Diagnostic::error(err.to_string())
                            .with_code(ErrorCode::E202)
                            .with_label(keyword.span(), "invalid element id"),
                    );
                    return None;
                }
            }
        } else if PrimitiveKind::from_keyword(text).is_some() {
            ElemId::new(BUILTIN_NAMESPACE, text)
        } else {
            ElemId::new(&self.namespace, text)
        };

        self.registry.get_or_placeholder(&id);
        Some(id)
    }

    /// Convert a raw attribute map into annotations/values.
    fn convert_attrs(&mut self, attrs: &IndexMap<String, Spanned<RawValue>>) -> Annotations {
        let mut converted = Annotations::new();
        for (key, raw) in attrs {
            if let Some(value) = self.convert_value(raw) {
                converted.insert(key.clone(), value);
            }
        }
        converted
    }

    /// Convert one raw value, reporting invalid embedded reference ids.
    ///
    /// Returns `None` when the value (or a nested part of it) named an
    /// invalid id; the attribute is dropped and the diagnostic explains
    /// why.
    fn convert_value(&mut self, raw: &Spanned<RawValue>) -> Option<Value> {
        self.convert_raw(raw.inner(), raw)
    }

    fn convert_raw(&mut self, raw: &RawValue, origin: &Spanned<RawValue>) -> Option<Value> {
        match raw {
            RawValue::String(s) => Some(Value::String(s.clone())),
            RawValue::Number(n) => Some(Value::Number(*n)),
            RawValue::Bool(b) => Some(Value::Bool(*b)),
            RawValue::Reference(name) => match ElemId::from_full_name(name) {
                Ok(id) => Some(Value::Reference(Reference::new(id))),
                Err(err) => {
                    self.collector.push(
                        Diagnostic::error(err.to_string())
                            .with_code(ErrorCode::E202)
                            .with_label(origin.span(), "invalid reference"),
                    );
                    None
                }
            },
            RawValue::List(items) => {
                let mut converted = Vec::with_capacity(items.len());
                for item in items {
                    converted.push(self.convert_raw(item, origin)?);
                }
                Some(Value::List(converted))
            }
            RawValue::Map(entries) => {
                let mut converted = IndexMap::new();
                for (key, entry) in entries {
                    converted.insert(key.clone(), self.convert_raw(entry, origin)?);
                }
                Some(Value::Map(converted))
            }
        }
    }

    /// Store unrecognized child blocks as opaque annotations.
    fn fold_opaque_children(&mut self, annotations: &mut Annotations, children: &[Block]) {
        for child in children {
            let (key, value) = self.opaque_annotation(child);
            annotations.insert(key, value);
        }
    }

    /// Same folding, into an instance value map.
    fn fold_opaque_children_into_value(
        &mut self,
        value: &mut IndexMap<String, Value>,
        children: &[Block],
    ) {
        for child in children {
            let (key, converted) = self.opaque_annotation(child);
            value.insert(key, converted);
        }
    }

    /// One unrecognized block as a `(key, value)` annotation pair.
    ///
    /// The key is the kind and labels joined with spaces; the value is the
    /// block's attribute map with nested blocks folded in recursively.
    fn opaque_annotation(&mut self, block: &Block) -> (String, Value) {
        let mut key = block.kind.inner().clone();
        for label in &block.labels {
            key.push(' ');
            key.push_str(label.inner());
        }

        let mut entries = IndexMap::new();
        for (attr_key, raw) in &block.attrs {
            if let Some(value) = self.convert_value(raw) {
                entries.insert(attr_key.clone(), value);
            }
        }
        for child in &block.children {
            let (child_key, child_value) = self.opaque_annotation(child);
            entries.insert(child_key, child_value);
        }

        (key, Value::Map(entries))
    }
}

/// Elaborate parsed blocks into elements, best-effort.
pub(crate) fn elaborate(
    blocks: &[Block],
    config: &ElaborateConfig,
) -> (Vec<Element>, Vec<Diagnostic>) {
    Elaborator::new(config).run(blocks)
}
