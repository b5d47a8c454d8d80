//! Deployment pipeline: adapter filters and the group orchestrator.
//!
//! Platform adapters plug in through the [`DeployFilter`] capability set:
//! fetch-time enrichment plus deploy-time translation for the change types
//! they understand. The [`DeployOrchestrator`] drives every change group
//! through the ordered filter pipeline, tolerating partial failure: one
//! group's errors never block unrelated groups, and every input change is
//! accounted for in the aggregated summary.

mod filter;
mod lookup;
mod orchestrator;

pub use filter::{
    DeployError, DeployFilter, DeployResult, FetchError, FilterDeployResult, run_on_fetch,
};
pub use lookup::LookupReferenceFilter;
pub use orchestrator::{
    DeployOrchestrator, DeploySummary, GroupDeployResult, GroupState, ShutdownSignal,
};
