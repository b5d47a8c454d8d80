//! String-interned names and hierarchical element identifiers.
//!
//! Every element and nested field/value in a configuration graph is
//! addressed by an [`ElemId`]: a namespace (the adapter or source name), a
//! top-level type name, and an optional nested path. Segments are interned
//! [`Name`]s so that ids are cheap to copy and compare even though the same
//! namespace and type names repeat across thousands of elements.

use std::{
    cmp::Ordering,
    fmt,
    sync::{LazyLock, RwLock},
};

use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};
use thiserror::Error;

/// The separator between id segments in a full name.
pub const ID_SEPARATOR: &str = ".";

/// Marker path segment for field ids (`ns.Type.field.name`).
pub const FIELD_SEGMENT: &str = "field";

static INTERNER: LazyLock<RwLock<StringInterner<DefaultBackend>>> =
    LazyLock::new(|| RwLock::new(StringInterner::new()));

/// An interned string segment.
///
/// `Name` is `Copy`; equality and hashing compare interner symbols, which is
/// equivalent to comparing the underlying strings. Ordering resolves the
/// strings so that sorted output is alphabetical, not insertion-ordered.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Name(DefaultSymbol);

impl Name {
    /// Intern `name` and return its handle.
    pub fn new(name: &str) -> Self {
        let mut interner = INTERNER.write().expect("name interner lock poisoned");
        Name(interner.get_or_intern(name))
    }

    /// Resolve the interned string.
    pub fn resolve(&self) -> String {
        let interner = INTERNER.read().expect("name interner lock poisoned");
        interner
            .resolve(self.0)
            .expect("interned symbol always resolves")
            .to_owned()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resolve())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.resolve())
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            Ordering::Equal
        } else {
            self.resolve().cmp(&other.resolve())
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Name::new(name)
    }
}

/// Error produced when a full name cannot be parsed into an [`ElemId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("element id `{input}` must have at least a namespace and a name segment")]
pub struct ElemIdError {
    /// The rejected input string.
    pub input: String,
}

/// Hierarchical identifier for an element or nested field/value.
///
/// An id is `(namespace, type name, nested path...)`. Two ids are equal iff
/// every segment matches. The full name joins all segments with
/// [`ID_SEPARATOR`]:
///
/// - object type: `vault.Employee`
/// - field: `vault.Employee.field.manager`
/// - instance: `vault.Employee.alice`
///
/// Ids are immutable once constructed; the navigation methods
/// ([`create_nested`](Self::create_nested), [`parent`](Self::parent),
/// [`top_level`](Self::top_level)) return new ids.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElemId {
    namespace: Name,
    type_name: Name,
    path: Vec<Name>,
}

impl ElemId {
    /// Create a top-level id from a namespace and type name.
    pub fn new(namespace: &str, type_name: &str) -> Self {
        ElemId {
            namespace: Name::new(namespace),
            type_name: Name::new(type_name),
            path: Vec::new(),
        }
    }

    /// Parse an id from its full-name form (`namespace.name[.path...]`).
    ///
    /// # Errors
    ///
    /// Returns [`ElemIdError`] if the input has fewer than two segments or
    /// any segment is empty.
    pub fn from_full_name(full_name: &str) -> Result<Self, ElemIdError> {
        let mut segments = full_name.split(ID_SEPARATOR);
        let reject = || ElemIdError {
            input: full_name.to_owned(),
        };

        let namespace = segments.next().filter(|s| !s.is_empty()).ok_or_else(reject)?;
        let type_name = segments.next().filter(|s| !s.is_empty()).ok_or_else(reject)?;

        let mut path = Vec::new();
        for segment in segments {
            if segment.is_empty() {
                return Err(reject());
            }
            path.push(Name::new(segment));
        }

        Ok(ElemId {
            namespace: Name::new(namespace),
            type_name: Name::new(type_name),
            path,
        })
    }

    /// The namespace segment (adapter or source name).
    pub fn namespace(&self) -> Name {
        self.namespace
    }

    /// The top-level type name segment.
    pub fn type_name(&self) -> Name {
        self.type_name
    }

    /// The nested path segments, empty for top-level ids.
    pub fn path(&self) -> &[Name] {
        &self.path
    }

    /// Whether this id addresses a top-level element.
    pub fn is_top_level(&self) -> bool {
        self.path.is_empty()
    }

    /// Append a path segment, producing the id of a nested value.
    pub fn create_nested(&self, segment: &str) -> Self {
        let mut path = self.path.clone();
        path.push(Name::new(segment));
        ElemId {
            namespace: self.namespace,
            type_name: self.type_name,
            path,
        }
    }

    /// The id of the field `name` on this type id.
    pub fn child_field(&self, name: &str) -> Self {
        self.create_nested(FIELD_SEGMENT).create_nested(name)
    }

    /// The id of the instance `name` of this type id.
    pub fn child_instance(&self, name: &str) -> Self {
        self.create_nested(name)
    }

    /// The id one level up, or `None` for top-level ids.
    pub fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            return None;
        }
        let mut path = self.path.clone();
        path.pop();
        Some(ElemId {
            namespace: self.namespace,
            type_name: self.type_name,
            path,
        })
    }

    /// The top-level id containing this id (itself when already top-level).
    pub fn top_level(&self) -> Self {
        ElemId {
            namespace: self.namespace,
            type_name: self.type_name,
            path: Vec::new(),
        }
    }

    /// The full dotted name of this id.
    pub fn full_name(&self) -> String {
        let mut name = format!("{}{}{}", self.namespace, ID_SEPARATOR, self.type_name);
        for segment in &self.path {
            name.push_str(ID_SEPARATOR);
            name.push_str(&segment.resolve());
        }
        name
    }
}

impl fmt::Display for ElemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

impl fmt::Debug for ElemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElemId({})", self.full_name())
    }
}
