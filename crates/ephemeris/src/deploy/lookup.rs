//! Built-in enrichment filter: field reference substitution.
//!
//! Lookup fields carry a `lookup_target` annotation naming a related
//! object type. When a fetched instance stores a plain string in such a
//! field and that string names a field on the target type, the literal is
//! replaced with a reference to the field's id. Literals that match
//! nothing are left untouched; guessing would corrupt real data.

use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, trace};

use ephemeris_core::{
    element::{Element, ObjectType, annotation},
    identifier::ElemId,
    value::{Reference, Value},
};

use crate::{
    change::Change,
    config::DeployConfig,
    deploy::filter::{DeployFilter, FetchError, FilterDeployResult},
};

/// Replaces field-name literals in lookup fields with references.
///
/// The filter is gated on the [`Self::FLAG`] feature flag; when the flag
/// is off both hooks are pass-through no-ops.
pub struct LookupReferenceFilter {
    enabled: bool,
}

impl LookupReferenceFilter {
    /// The feature flag gating this filter.
    pub const FLAG: &'static str = "lookup_references";

    pub fn new(enabled: bool) -> Self {
        LookupReferenceFilter { enabled }
    }

    /// Construct from the deploy configuration, honoring the flag.
    pub fn from_config(config: &DeployConfig) -> Self {
        LookupReferenceFilter::new(config.is_flag_enabled(Self::FLAG))
    }
}

#[async_trait]
impl DeployFilter for LookupReferenceFilter {
    fn name(&self) -> &str {
        Self::FLAG
    }

    fn on_fetch(&self, elements: &mut Vec<Element>) -> Result<(), Vec<FetchError>> {
        if !self.enabled {
            return Ok(());
        }

        let types: IndexMap<ElemId, ObjectType> = elements
            .iter()
            .filter_map(|element| element.as_object().cloned())
            .map(|object| (object.id().clone(), object))
            .collect();

        let mut substituted = 0usize;
        for element in elements.iter_mut() {
            let Element::Instance(instance) = element else {
                continue;
            };
            let Some(object) = types.get(instance.type_ref()) else {
                continue;
            };

            let mut replacements: Vec<(String, ElemId)> = Vec::new();
            for (field_name, value) in instance.value() {
                let Some(field) = object.field(field_name) else {
                    continue;
                };
                let Some(target) = field
                    .annotations()
                    .get(annotation::LOOKUP_TARGET)
                    .and_then(Value::as_reference)
                else {
                    continue;
                };
                let Some(target_object) = types.get(target.target()) else {
                    continue;
                };
                let Some(literal) = value.as_str() else {
                    continue;
                };
                if target_object.field(literal).is_some() {
                    replacements.push((
                        field_name.clone(),
                        target_object.id().child_field(literal),
                    ));
                }
            }

            for (field_name, target) in replacements {
                trace!(
                    instance = instance.id().full_name(),
                    field = field_name,
                    target = target.full_name();
                    "Substituting field reference for literal"
                );
                instance
                    .value_mut()
                    .insert(field_name, Value::Reference(Reference::new(target)));
                substituted += 1;
            }
        }

        debug!(substituted; "Lookup reference substitution finished");
        Ok(())
    }

    /// This filter only enriches; deployment belongs to platform
    /// adapters further down the pipeline.
    async fn deploy(&self, changes: Vec<Change>) -> FilterDeployResult {
        FilterDeployResult::pass_through(changes)
    }
}
