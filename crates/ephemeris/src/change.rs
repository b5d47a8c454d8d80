//! Change computation between two merged graphs.
//!
//! A [`Change`] is a before/after pair (or a one-sided addition/removal)
//! describing how one element differs between two graph snapshots. The
//! diff is keyed by element full name and is deterministic: removals and
//! modifications follow the before-graph order, additions follow the
//! after-graph order.

use indexmap::IndexMap;

use ephemeris_core::{element::Element, identifier::ElemId, registry::ElementRegistry};

/// What happened to an element between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Addition,
    Modification,
    Removal,
}

/// One element's difference between the before and after graphs.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Add { after: Element },
    Modify { before: Element, after: Element },
    Remove { before: Element },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Add { .. } => ChangeKind::Addition,
            Change::Modify { .. } => ChangeKind::Modification,
            Change::Remove { .. } => ChangeKind::Removal,
        }
    }

    /// The element this change is about: the after state when one exists,
    /// otherwise the removed before state.
    pub fn data(&self) -> &Element {
        match self {
            Change::Add { after } | Change::Modify { after, .. } => after,
            Change::Remove { before } => before,
        }
    }

    /// The before state, absent for additions.
    pub fn before(&self) -> Option<&Element> {
        match self {
            Change::Add { .. } => None,
            Change::Modify { before, .. } | Change::Remove { before } => Some(before),
        }
    }

    /// The after state, absent for removals.
    pub fn after(&self) -> Option<&Element> {
        match self {
            Change::Add { after } | Change::Modify { after, .. } => Some(after),
            Change::Remove { .. } => None,
        }
    }

    pub fn elem_id(&self) -> &ElemId {
        self.data().elem_id()
    }

    /// The change key: the element's full name.
    pub fn full_name(&self) -> String {
        self.elem_id().full_name()
    }
}

/// Changes keyed by element full name.
pub type ChangeMap = IndexMap<String, Change>;

/// Diff two merged graphs into a change map.
///
/// Elements equal in both graphs produce no change. Comparison is
/// structural; reference resolution caches do not participate, so a graph
/// diffed before and after resolution yields the same changes.
pub fn diff(before: &ElementRegistry, after: &ElementRegistry) -> ChangeMap {
    let mut changes = ChangeMap::new();

    for element in before.elements() {
        let id = element.elem_id();
        match after.lookup(id) {
            Some(next) if next == element => {}
            Some(next) => {
                changes.insert(
                    id.full_name(),
                    Change::Modify {
                        before: element.clone(),
                        after: next.clone(),
                    },
                );
            }
            None => {
                changes.insert(
                    id.full_name(),
                    Change::Remove {
                        before: element.clone(),
                    },
                );
            }
        }
    }

    for element in after.elements() {
        let id = element.elem_id();
        if before.lookup(id).is_none() {
            changes.insert(
                id.full_name(),
                Change::Add {
                    after: element.clone(),
                },
            );
        }
    }

    changes
}
