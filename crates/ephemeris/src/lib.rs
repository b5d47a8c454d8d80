//! Ephemeris - configuration-as-code for third-party SaaS platforms.
//!
//! Parsing, merging, change planning, and deployment orchestration for
//! declarative platform configuration. Sources are parsed into a typed
//! element graph, merged into one canonical model, diffed against an
//! observed state, grouped into atomically-deployable units, and driven
//! through platform-specific deploy filters.

pub mod config;

pub mod change;
pub mod deploy;
pub mod group;
pub mod merge;

mod error;

pub use ephemeris_core::{element, identifier, registry, value};

pub use error::EphemerisError;

use log::{debug, info};

use ephemeris_core::{element::Element, registry::ElementRegistry};
use ephemeris_parser::ElaborateConfig;

use change::ChangeMap;
use config::AppConfig;
use deploy::{DeployFilter, DeployOrchestrator, DeploySummary, FetchError, run_on_fetch};
use group::{ChangeGroup, ChangeGroupIds, Grouper};
use merge::MergeOutcome;

/// A computed deployment plan: the diff plus its group assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    changes: ChangeMap,
    group_ids: ChangeGroupIds,
}

impl Plan {
    /// The underlying diff, keyed by element full name.
    pub fn changes(&self) -> &ChangeMap {
        &self.changes
    }

    /// Per-change group ids plus the partitioned groups.
    pub fn group_ids(&self) -> &ChangeGroupIds {
        &self.group_ids
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Consume the plan, yielding its deployable groups in order.
    pub fn into_groups(self) -> Vec<ChangeGroup> {
        self.group_ids.groups
    }
}

/// Builder for planning and deploying Ephemeris configuration.
///
/// This provides an API for driving configuration through the parse,
/// merge, plan, and deploy stages.
///
/// # Examples
///
/// ```
/// use ephemeris::{PlanBuilder, config::AppConfig, registry::ElementRegistry};
///
/// let desired = "model employee {\n  string name {\n  }\n}\n";
///
/// let builder = PlanBuilder::new(AppConfig::default());
///
/// // Parse source into elements and merge them into a graph
/// let elements = builder.parse(desired, "vault").expect("failed to parse");
/// let (after, errors) = builder.merge(elements).into_parts();
/// assert!(errors.is_empty());
///
/// // Plan against an empty observed state: everything is an addition
/// let before = ElementRegistry::new();
/// let plan = builder.plan(&before, &after).expect("failed to plan");
/// assert_eq!(plan.changes().len(), 1);
/// ```
#[derive(Default)]
pub struct PlanBuilder {
    config: AppConfig,
}

impl PlanBuilder {
    /// Create a new plan builder with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Parse source text into elements belonging to `namespace`.
    ///
    /// # Errors
    ///
    /// Returns `EphemerisError::Parse` carrying every diagnostic the
    /// parse produced alongside the offending source.
    pub fn parse(&self, source: &str, namespace: &str) -> Result<Vec<Element>, EphemerisError> {
        info!(namespace; "Parsing configuration source");

        let elements = ephemeris_parser::parse_strict(source, &ElaborateConfig::new(namespace))
            .map_err(|err| EphemerisError::new_parse_error(err, source))?;

        debug!(elements = elements.len(); "Source parsed successfully");
        Ok(elements)
    }

    /// Run every filter's fetch enrichment over the elements, in order.
    ///
    /// Enrichment is best-effort: failures are returned, elements already
    /// adjusted stay adjusted.
    pub fn enrich(
        &self,
        filters: &[Box<dyn DeployFilter>],
        elements: &mut Vec<Element>,
    ) -> Vec<FetchError> {
        run_on_fetch(filters, elements)
    }

    /// Merge elements from any number of sources into one canonical
    /// graph, resolving references. Input order is source precedence.
    pub fn merge(&self, elements: Vec<Element>) -> MergeOutcome {
        info!(elements = elements.len(); "Merging elements");
        merge::merge_elements(elements)
    }

    /// Diff the observed graph against the desired graph and group the
    /// changes into deployable units.
    ///
    /// # Errors
    ///
    /// Returns `EphemerisError::Group` when a grouping strategy's
    /// structural invariant is violated; no partial plan is produced.
    pub fn plan(
        &self,
        before: &ElementRegistry,
        after: &ElementRegistry,
    ) -> Result<Plan, EphemerisError> {
        info!("Computing deployment plan");

        let changes = change::diff(before, after);
        let grouper = Grouper::new(self.config.grouping().rules().clone());
        let group_ids = grouper.group_changes(&changes)?;

        debug!(
            changes = changes.len(),
            groups = group_ids.groups.len();
            "Plan computed"
        );
        Ok(Plan { changes, group_ids })
    }

    /// Deploy a plan's groups through the ordered filter pipeline.
    ///
    /// Deploy errors never propagate out of this call; partial failure is
    /// reported in the returned summary.
    pub async fn deploy(
        &self,
        plan: Plan,
        filters: Vec<Box<dyn DeployFilter>>,
    ) -> DeploySummary {
        let orchestrator = DeployOrchestrator::new(filters, self.config.deploy().clone());
        orchestrator.deploy(plan.into_groups()).await
    }
}
