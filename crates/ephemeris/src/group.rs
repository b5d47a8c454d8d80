//! Change grouping: partition a diff into atomically-deployable units.
//!
//! Every change is assigned an opaque group id. Changes sharing a group id
//! must be deployed together against the remote API. Strategies are keyed
//! by element type name; a type without a strategy groups each change
//! under its own full name (deployed independently).
//!
//! Grouping is pure and deterministic: the same change map always yields
//! the same assignment, so it is safe to re-run for dry-run previews and
//! real deploys alike. Violated structural invariants (a missing or
//! ambiguous parent where a strategy demands one) reject the entire call:
//! misgrouping risks deploying unrelated changes together or dropping
//! one, which is worse than stopping.

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use ephemeris_core::{
    element::{Element, ParentError},
    identifier::ElemId,
};

use crate::change::{Change, ChangeKind, ChangeMap};

/// An opaque deployment group identifier.
pub type GroupId = String;

/// How changes of one type name map to group ids.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStrategy {
    /// Modifications of this type collapse into the one named group;
    /// additions and removals keep their own full name.
    BatchModifications { group: String },

    /// Group id derives from the instance's sole parent reference,
    /// optionally suffixed with a role tag (`"<parent> <suffix>"`). Also
    /// forces both ends of a bidirectional relation into the parent
    /// element's own group when the parent side uses default grouping.
    ByParent {
        #[serde(default)]
        suffix: Option<String>,
    },

    /// Pure additions group as `"<label> of <parent-full-name>"`; other
    /// change kinds fall back to per-change default groups.
    AdditionsByParent { label: String },
}

/// A grouping invariant violation; rejects the whole grouping call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GroupError {
    #[error("`{id}` requires a parent for grouping but has none")]
    MissingParent { id: ElemId },

    #[error("`{id}` requires exactly one parent for grouping, found {count}")]
    AmbiguousParent { id: ElemId, count: usize },

    #[error(transparent)]
    MalformedParent(#[from] ParentError),
}

/// One atomically-deployable unit of changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeGroup {
    pub id: GroupId,
    /// Changes in the order they appeared in the input map.
    pub changes: Vec<Change>,
}

/// The grouping result: per-change group ids plus the partition.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeGroupIds {
    /// Change key (element full name) to group id.
    pub change_group_id_map: IndexMap<String, GroupId>,
    /// Groups in order of first appearance.
    pub groups: Vec<ChangeGroup>,
}

/// Assigns group ids according to a per-type-name strategy table.
#[derive(Debug, Clone, Default)]
pub struct Grouper {
    rules: IndexMap<String, GroupStrategy>,
}

impl Grouper {
    pub fn new(rules: IndexMap<String, GroupStrategy>) -> Self {
        Self { rules }
    }

    /// Compute group ids for every change and partition the map.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError`] when any change's strategy requires a parent
    /// and the instance does not carry exactly one resolvable parent
    /// reference. No partial assignment is returned.
    pub fn group_changes(&self, changes: &ChangeMap) -> Result<ChangeGroupIds, GroupError> {
        let mut change_group_id_map = IndexMap::new();
        let mut partition: IndexMap<GroupId, Vec<Change>> = IndexMap::new();

        for (key, change) in changes {
            let group_id = self.group_id_for(change)?;
            change_group_id_map.insert(key.clone(), group_id.clone());
            partition.entry(group_id).or_default().push(change.clone());
        }

        let groups = partition
            .into_iter()
            .map(|(id, changes)| ChangeGroup { id, changes })
            .collect();

        Ok(ChangeGroupIds {
            change_group_id_map,
            groups,
        })
    }

    fn group_id_for(&self, change: &Change) -> Result<GroupId, GroupError> {
        let data = change.data();
        let type_name = data.elem_id().type_name().resolve();
        let own_group = || data.elem_id().full_name();

        let Some(strategy) = self.rules.get(&type_name) else {
            return Ok(own_group());
        };

        match strategy {
            GroupStrategy::BatchModifications { group } => {
                if change.kind() == ChangeKind::Modification {
                    Ok(group.clone())
                } else {
                    Ok(own_group())
                }
            }
            GroupStrategy::ByParent { suffix } => {
                let parent = sole_parent(data)?;
                Ok(match suffix {
                    Some(suffix) => format!("{parent} {suffix}"),
                    None => parent,
                })
            }
            GroupStrategy::AdditionsByParent { label } => {
                if change.kind() == ChangeKind::Addition {
                    let parent = sole_parent(data)?;
                    Ok(format!("{label} of {parent}"))
                } else {
                    Ok(own_group())
                }
            }
        }
    }
}

/// The full name of the element's single parent.
///
/// Fails fast when the element is not an instance, carries no parent, or
/// carries more than one.
fn sole_parent(element: &Element) -> Result<String, GroupError> {
    let Some(instance) = element.as_instance() else {
        return Err(GroupError::MissingParent {
            id: element.elem_id().clone(),
        });
    };

    let parents = instance.parents()?;
    match parents.as_slice() {
        [] => Err(GroupError::MissingParent {
            id: instance.id().clone(),
        }),
        [parent] => Ok(parent.target().full_name()),
        many => Err(GroupError::AmbiguousParent {
            id: instance.id().clone(),
            count: many.len(),
        }),
    }
}
