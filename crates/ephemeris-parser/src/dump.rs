//! Serialization of elements back into Ephemeris source text.
//!
//! Dump is the structural inverse of parsing: object types emit their
//! fields as nested single-label blocks (field annotations live only
//! there, never duplicated on the owning object), opaque annotation blobs
//! re-emit as multi-label blocks, and instances emit their annotations
//! ahead of their values. `parse(dump(elements))` reproduces the same
//! elements modulo formatting.

use ephemeris_core::{
    element::{Element, InstanceElement, ObjectType, PrimitiveType},
    identifier::{ElemId, Name},
    value::Value,
};

use crate::elaborate::BUILTIN_NAMESPACE;

const INDENT: &str = "  ";

/// Serialize elements to source text.
///
/// Unqualified names are emitted relative to each element's own namespace,
/// so the output re-parses to identical ids under an
/// [`ElaborateConfig`](crate::ElaborateConfig) with that namespace.
pub fn dump_elements(elements: &[Element]) -> String {
    let mut out = String::new();
    for (index, element) in elements.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        match element {
            Element::Primitive(primitive) => dump_primitive(&mut out, primitive),
            Element::Object(object) => dump_object(&mut out, object),
            Element::Instance(instance) => dump_instance(&mut out, instance),
        }
    }
    out
}

/// The keyword a type id is written as from inside `namespace`.
fn type_keyword(id: &ElemId, namespace: Name) -> String {
    if id.namespace() == Name::new(BUILTIN_NAMESPACE) && id.is_top_level() {
        return id.type_name().resolve();
    }
    if id.namespace() == namespace && id.is_top_level() {
        return id.type_name().resolve();
    }
    id.full_name()
}

fn dump_primitive(out: &mut String, primitive: &PrimitiveType) {
    out.push_str(&format!(
        "type {} is {} {{\n",
        primitive.id().type_name(),
        primitive.kind().as_keyword()
    ));
    dump_entries(out, primitive.annotations().iter(), 1);
    out.push_str("}\n");
}

fn dump_object(out: &mut String, object: &ObjectType) {
    out.push_str(&format!("model {} {{\n", object.id().type_name()));
    dump_entries(out, object.annotations().iter(), 1);

    for field in object.fields().values() {
        let keyword = type_keyword(field.type_ref(), object.id().namespace());
        out.push_str(&format!("{}{} {} {{\n", INDENT, keyword, field.name()));
        dump_entries(out, field.annotations().iter(), 2);
        out.push_str(INDENT);
        out.push_str("}\n");
    }

    out.push_str("}\n");
}

fn dump_instance(out: &mut String, instance: &InstanceElement) {
    let keyword = type_keyword(instance.type_ref(), instance.id().namespace());
    let name = instance
        .id()
        .path()
        .last()
        .map(|segment| segment.resolve())
        .unwrap_or_default();
    out.push_str(&format!("{} {} {{\n", keyword, name));
    dump_entries(out, instance.annotations().iter(), 1);
    dump_entries(out, instance.value().iter(), 1);
    out.push_str("}\n");
}

/// Emit `key = value` attribute lines and opaque-blob blocks.
///
/// Keys containing a space are opaque annotation blobs stored by the
/// elaborator; they re-emit as multi-label nested blocks.
fn dump_entries<'a>(
    out: &mut String,
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
    depth: usize,
) {
    for (key, value) in entries {
        if key.contains(' ') {
            dump_opaque_block(out, key, value, depth);
        } else {
            out.push_str(&INDENT.repeat(depth));
            out.push_str(&format!("{} = ", key));
            dump_value(out, value, depth);
            out.push('\n');
        }
    }
}

fn dump_opaque_block(out: &mut String, key: &str, value: &Value, depth: usize) {
    out.push_str(&INDENT.repeat(depth));
    out.push_str(key);
    out.push_str(" {\n");
    if let Value::Map(entries) = value {
        dump_entries(out, entries.iter(), depth + 1);
    }
    out.push_str(&INDENT.repeat(depth));
    out.push_str("}\n");
}

fn dump_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::String(s) => {
            out.push('"');
            out.push_str(&escape_string(s));
            out.push('"');
        }
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Reference(reference) => out.push_str(&reference.target().full_name()),
        Value::List(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                dump_value(out, item, depth);
            }
            out.push(']');
        }
        Value::Map(entries) => {
            out.push_str("{\n");
            for (key, entry) in entries {
                out.push_str(&INDENT.repeat(depth + 1));
                out.push_str(&format!("{} = ", key));
                dump_value(out, entry, depth + 1);
                out.push('\n');
            }
            out.push_str(&INDENT.repeat(depth));
            out.push('}');
        }
    }
}

pub(crate) fn escape_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            other => escaped.push(other),
        }
    }
    escaped
}
