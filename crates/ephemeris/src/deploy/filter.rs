//! The adapter filter contract.

use async_trait::async_trait;
use thiserror::Error;

use ephemeris_core::{element::Element, identifier::ElemId};

use crate::change::Change;

/// A fetch-time enrichment failure, attributed to its filter.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("filter `{filter}` failed during fetch enrichment: {message}")]
pub struct FetchError {
    pub filter: String,
    pub message: String,
}

/// A deploy failure, attributed to the change being processed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("deploy of `{elem_id}` failed: {message}")]
pub struct DeployError {
    pub elem_id: ElemId,
    pub message: String,
}

/// What one filter invocation accomplished.
#[derive(Debug, Default)]
pub struct DeployResult {
    pub applied_changes: Vec<Change>,
    pub errors: Vec<DeployError>,
}

/// A filter's answer to a deploy request.
///
/// `leftover_changes` must be a (possibly equal) subset of the input in
/// the input's relative order, disjoint from `applied_changes`. The
/// orchestrator verifies both.
#[derive(Debug, Default)]
pub struct FilterDeployResult {
    pub leftover_changes: Vec<Change>,
    pub deploy_result: DeployResult,
}

impl FilterDeployResult {
    /// Decline every change: the untouched pass-through result.
    ///
    /// This is also the required behavior of a filter whose feature flag
    /// is off: pass everything through, never throw.
    pub fn pass_through(changes: Vec<Change>) -> Self {
        Self {
            leftover_changes: changes,
            deploy_result: DeployResult::default(),
        }
    }

    /// Report every change as successfully applied.
    pub fn applied(changes: Vec<Change>) -> Self {
        Self {
            leftover_changes: Vec::new(),
            deploy_result: DeployResult {
                applied_changes: changes,
                errors: Vec::new(),
            },
        }
    }
}

/// The capability set a platform adapter implements.
///
/// Filters are composed into an ordered pipeline owned by the
/// orchestrator; each filter receives the previous filter's leftovers.
/// Implementations gated behind a feature flag must return
/// [`FilterDeployResult::pass_through`] when the flag is off.
#[async_trait]
pub trait DeployFilter: Send + Sync {
    /// A stable name for logs and error attribution.
    fn name(&self) -> &str;

    /// Post-parse enrichment: adjust fetched elements in place (for
    /// example, replacing raw literal values with resolved references).
    ///
    /// The default is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the enrichment failures; elements already adjusted stay
    /// adjusted (best-effort, like parsing).
    fn on_fetch(&self, _elements: &mut Vec<Element>) -> Result<(), Vec<FetchError>> {
        Ok(())
    }

    /// Deploy the changes this filter understands; return the rest as
    /// leftovers for the next filter in the pipeline.
    ///
    /// Remote transport failures are reported as [`DeployError`]s
    /// attributed to the change in progress, never panics.
    async fn deploy(&self, changes: Vec<Change>) -> FilterDeployResult;
}

/// Run every filter's fetch enrichment over the elements, in order.
///
/// Failures are collected and returned; enrichment is best-effort.
pub fn run_on_fetch(
    filters: &[Box<dyn DeployFilter>],
    elements: &mut Vec<Element>,
) -> Vec<FetchError> {
    let mut errors = Vec::new();
    for filter in filters {
        if let Err(mut filter_errors) = filter.on_fetch(elements) {
            errors.append(&mut filter_errors);
        }
    }
    errors
}
