//! Group deployment orchestration.
//!
//! The orchestrator drives each change group through the ordered filter
//! pipeline: every filter receives the previous filter's leftovers, and
//! what survives the last filter is the group's leftover set. Groups are
//! independent units of work and deploy concurrently up to a configured
//! bound, with at most one deployment in flight per group (each group is
//! owned by exactly one future). Partial failure is an expected outcome:
//! one group's errors never block unrelated groups.
//!
//! Each filter invocation's result is validated against the contract
//! before it is trusted: leftovers must be a subset of the input in the
//! input's relative order, applied and leftover sets must be disjoint,
//! and every input change must be accounted for. Violations surface as
//! deploy errors attributed to the offending change, never as silent
//! loss.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::{StreamExt, stream};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};

use crate::{
    change::{Change, ChangeKind},
    config::DeployConfig,
    deploy::filter::{DeployError, DeployFilter, FilterDeployResult},
    group::{ChangeGroup, GroupId},
};

/// Cooperative stop request shared between the host and the orchestrator.
///
/// When a shutdown is requested, groups that have not started deploying
/// are abandoned and reported as [`GroupState::Skipped`]; in-flight groups
/// run to completion so no partial remote write is left dangling.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        ShutdownSignal::default()
    }

    /// Ask the orchestrator to stop starting new groups.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Where a group's deployment ended up.
///
/// Groups move `Pending -> Deploying -> {Succeeded | PartiallyFailed |
/// Failed}`; `Skipped` is the terminal state of a group abandoned after a
/// shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Pending,
    Deploying,
    Succeeded,
    PartiallyFailed,
    Failed,
    Skipped,
}

/// The outcome of deploying one change group.
#[derive(Debug)]
pub struct GroupDeployResult {
    pub group_id: GroupId,
    pub state: GroupState,
    pub applied_changes: Vec<Change>,
    pub errors: Vec<DeployError>,
    /// Changes no filter in the pipeline handled.
    pub leftover_changes: Vec<Change>,
    /// Removals recognized as remote no-ops; neither applied nor errored.
    pub skipped_changes: Vec<Change>,
}

/// Aggregated results across every group of one deployment run.
#[derive(Debug, Default)]
pub struct DeploySummary {
    groups: Vec<GroupDeployResult>,
}

impl DeploySummary {
    /// Per-group results, in the input group order.
    pub fn groups(&self) -> &[GroupDeployResult] {
        &self.groups
    }

    pub fn applied_changes(&self) -> impl Iterator<Item = &Change> {
        self.groups.iter().flat_map(|group| &group.applied_changes)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DeployError> {
        self.groups.iter().flat_map(|group| &group.errors)
    }

    pub fn leftover_changes(&self) -> impl Iterator<Item = &Change> {
        self.groups.iter().flat_map(|group| &group.leftover_changes)
    }

    pub fn skipped_changes(&self) -> impl Iterator<Item = &Change> {
        self.groups.iter().flat_map(|group| &group.skipped_changes)
    }

    /// Whether any group ended in `Failed` or `PartiallyFailed`.
    pub fn has_failures(&self) -> bool {
        self.groups.iter().any(|group| {
            matches!(
                group.state,
                GroupState::Failed | GroupState::PartiallyFailed
            )
        })
    }
}

/// Drives change groups through an ordered filter pipeline.
pub struct DeployOrchestrator {
    filters: Vec<Box<dyn DeployFilter>>,
    config: DeployConfig,
    shutdown: ShutdownSignal,
}

impl DeployOrchestrator {
    pub fn new(filters: Vec<Box<dyn DeployFilter>>, config: DeployConfig) -> Self {
        DeployOrchestrator {
            filters,
            config,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Attach an externally owned shutdown signal.
    pub fn with_shutdown_signal(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = signal;
        self
    }

    /// The signal this orchestrator observes; clone it to request a stop.
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub fn filters(&self) -> &[Box<dyn DeployFilter>] {
        &self.filters
    }

    /// Deploy every group, concurrently up to the configured bound.
    ///
    /// The summary lists groups in input order regardless of completion
    /// order. Deploy errors are aggregated per group and never propagate
    /// out of this call.
    pub async fn deploy(&self, groups: Vec<ChangeGroup>) -> DeploySummary {
        let concurrency = self.config.max_concurrent_groups().max(1);
        info!(
            groups = groups.len(),
            max_concurrent = concurrency;
            "Deploying change groups"
        );

        let mut results: Vec<(usize, GroupDeployResult)> =
            stream::iter(groups.into_iter().enumerate())
                .map(|(index, group)| async move { (index, self.deploy_group(group).await) })
                .buffer_unordered(concurrency)
                .collect()
                .await;
        results.sort_by_key(|(index, _)| *index);

        let summary = DeploySummary {
            groups: results.into_iter().map(|(_, result)| result).collect(),
        };
        info!(
            applied = summary.applied_changes().count(),
            errors = summary.errors().count(),
            leftover = summary.leftover_changes().count();
            "Deployment run finished"
        );
        summary
    }

    async fn deploy_group(&self, group: ChangeGroup) -> GroupDeployResult {
        let ChangeGroup { id, changes } = group;

        // Pending -> Skipped: a group that has not started when shutdown
        // is requested is abandoned, not errored.
        if self.shutdown.is_requested() {
            debug!(group = id; "Shutdown requested; skipping group");
            return GroupDeployResult {
                group_id: id,
                state: GroupState::Skipped,
                applied_changes: Vec::new(),
                errors: Vec::new(),
                leftover_changes: changes,
                skipped_changes: Vec::new(),
            };
        }

        // Pending -> Deploying.
        debug!(group = id, changes = changes.len(); "Deploying group");

        let mut skipped_changes = Vec::new();
        let mut pending = Vec::new();
        for change in changes {
            let type_name = change.elem_id().type_name().resolve();
            if change.kind() == ChangeKind::Removal && self.config.skips_removal_of(&type_name) {
                debug!(
                    group = id,
                    change = change.full_name();
                    "Removal is a remote no-op; skipping"
                );
                skipped_changes.push(change);
            } else {
                pending.push(change);
            }
        }

        let mut applied_changes = Vec::new();
        let mut errors = Vec::new();

        for filter in &self.filters {
            if pending.is_empty() {
                break;
            }
            let input = pending.clone();
            let result = filter.deploy(pending).await;
            let validated = validate_filter_result(filter.name(), &input, result);
            applied_changes.extend(validated.applied);
            errors.extend(validated.errors);
            pending = validated.leftovers;
        }

        let state = if errors.is_empty() {
            GroupState::Succeeded
        } else if applied_changes.is_empty() {
            GroupState::Failed
        } else {
            GroupState::PartiallyFailed
        };
        if !errors.is_empty() {
            warn!(group = id, errors = errors.len(); "Group deployment had errors");
        }
        info!(
            group = id,
            state:? = state,
            applied = applied_changes.len(),
            leftover = pending.len();
            "Group deployment finished"
        );

        GroupDeployResult {
            group_id: id,
            state,
            applied_changes,
            errors,
            leftover_changes: pending,
            skipped_changes,
        }
    }
}

struct ValidatedResult {
    applied: Vec<Change>,
    leftovers: Vec<Change>,
    errors: Vec<DeployError>,
}

/// Enforce the filter contract on one invocation's result.
///
/// Returns the sanitized applied/leftover sets plus the filter's own
/// errors and one error per contract violation. After this call every
/// input change is applied, left over, or named by an error.
fn validate_filter_result(
    filter: &str,
    input: &[Change],
    result: FilterDeployResult,
) -> ValidatedResult {
    let FilterDeployResult {
        leftover_changes,
        deploy_result,
    } = result;
    let mut errors = deploy_result.errors;

    let input_index: IndexMap<String, usize> = input
        .iter()
        .enumerate()
        .map(|(index, change)| (change.full_name(), index))
        .collect();

    let mut applied = Vec::new();
    let mut applied_keys: IndexSet<String> = IndexSet::new();
    for change in deploy_result.applied_changes {
        let key = change.full_name();
        if !input_index.contains_key(&key) {
            errors.push(DeployError {
                elem_id: change.elem_id().clone(),
                message: format!(
                    "filter `{filter}` reported applying a change that was not part of its input"
                ),
            });
            continue;
        }
        if !applied_keys.insert(key) {
            errors.push(DeployError {
                elem_id: change.elem_id().clone(),
                message: format!("filter `{filter}` reported a change as applied twice"),
            });
            continue;
        }
        applied.push(change);
    }

    let mut leftovers = Vec::new();
    let mut leftover_keys: IndexSet<String> = IndexSet::new();
    for change in leftover_changes {
        let key = change.full_name();
        if !input_index.contains_key(&key) {
            errors.push(DeployError {
                elem_id: change.elem_id().clone(),
                message: format!(
                    "filter `{filter}` returned a leftover change that was not part of its input"
                ),
            });
            continue;
        }
        if applied_keys.contains(&key) {
            errors.push(DeployError {
                elem_id: change.elem_id().clone(),
                message: format!(
                    "filter `{filter}` reported a change as both applied and leftover"
                ),
            });
            continue;
        }
        if !leftover_keys.insert(key) {
            errors.push(DeployError {
                elem_id: change.elem_id().clone(),
                message: format!("filter `{filter}` returned a duplicate leftover change"),
            });
            continue;
        }
        leftovers.push(change);
    }

    // Leftovers must keep the input's relative order. A scrambled result
    // is repaired to input order and reported.
    let scrambled = leftovers
        .windows(2)
        .find(|pair| input_index[&pair[0].full_name()] > input_index[&pair[1].full_name()]);
    if let Some(pair) = scrambled {
        errors.push(DeployError {
            elem_id: pair[1].elem_id().clone(),
            message: format!("filter `{filter}` reordered its leftover changes"),
        });
        leftovers.sort_by_key(|change| input_index[&change.full_name()]);
    }

    // Every input change must be applied, left over, or errored.
    let errored: IndexSet<String> = errors
        .iter()
        .map(|error| error.elem_id.full_name())
        .collect();
    for change in input {
        let key = change.full_name();
        if !applied_keys.contains(&key) && !leftover_keys.contains(&key) && !errored.contains(&key)
        {
            errors.push(DeployError {
                elem_id: change.elem_id().clone(),
                message: format!(
                    "filter `{filter}` dropped a change without applying or declining it"
                ),
            });
        }
    }

    ValidatedResult {
        applied,
        leftovers,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use indexmap::IndexMap;

    use ephemeris_core::{
        element::{Annotations, Element, InstanceElement},
        identifier::ElemId,
    };

    use crate::deploy::filter::DeployResult;

    use super::*;

    fn instance(type_name: &str, name: &str) -> Element {
        let type_id = ElemId::new("vault", type_name);
        Element::Instance(InstanceElement::new(
            type_id.child_instance(name),
            type_id,
            IndexMap::new(),
            Annotations::new(),
        ))
    }

    fn addition(type_name: &str, name: &str) -> Change {
        Change::Add {
            after: instance(type_name, name),
        }
    }

    fn removal(type_name: &str, name: &str) -> Change {
        Change::Remove {
            before: instance(type_name, name),
        }
    }

    fn group(id: &str, changes: Vec<Change>) -> ChangeGroup {
        ChangeGroup {
            id: id.to_owned(),
            changes,
        }
    }

    /// Applies changes of `handle_types`, errors changes of `fail_types`,
    /// declines the rest.
    struct ScriptedFilter {
        name: &'static str,
        handle_types: BTreeSet<String>,
        fail_types: BTreeSet<String>,
    }

    impl ScriptedFilter {
        fn handling(name: &'static str, types: &[&str]) -> Self {
            ScriptedFilter {
                name,
                handle_types: types.iter().map(|t| (*t).to_owned()).collect(),
                fail_types: BTreeSet::new(),
            }
        }

        fn failing(name: &'static str, types: &[&str]) -> Self {
            ScriptedFilter {
                name,
                handle_types: BTreeSet::new(),
                fail_types: types.iter().map(|t| (*t).to_owned()).collect(),
            }
        }
    }

    #[async_trait]
    impl DeployFilter for ScriptedFilter {
        fn name(&self) -> &str {
            self.name
        }

        async fn deploy(&self, changes: Vec<Change>) -> FilterDeployResult {
            let mut result = FilterDeployResult::default();
            for change in changes {
                let type_name = change.elem_id().type_name().resolve();
                if self.fail_types.contains(&type_name) {
                    result.deploy_result.errors.push(DeployError {
                        elem_id: change.elem_id().clone(),
                        message: "remote rejected the write".to_owned(),
                    });
                } else if self.handle_types.contains(&type_name) {
                    result.deploy_result.applied_changes.push(change);
                } else {
                    result.leftover_changes.push(change);
                }
            }
            result
        }
    }

    /// Contract violator: claims nothing, returns nothing.
    struct LossyFilter;

    #[async_trait]
    impl DeployFilter for LossyFilter {
        fn name(&self) -> &str {
            "lossy"
        }

        async fn deploy(&self, _changes: Vec<Change>) -> FilterDeployResult {
            FilterDeployResult::default()
        }
    }

    /// Requests shutdown while deploying whatever it is given.
    struct ShutdownRequestingFilter {
        signal: ShutdownSignal,
    }

    #[async_trait]
    impl DeployFilter for ShutdownRequestingFilter {
        fn name(&self) -> &str {
            "shutdown_requester"
        }

        async fn deploy(&self, changes: Vec<Change>) -> FilterDeployResult {
            self.signal.request();
            FilterDeployResult::applied(changes)
        }
    }

    #[tokio::test]
    async fn test_partial_failure_across_groups() {
        let orchestrator = DeployOrchestrator::new(
            vec![
                Box::new(ScriptedFilter::handling("workflows", &["Workflow"])),
                Box::new(ScriptedFilter::failing("dashboards", &["Dashboard"])),
            ],
            DeployConfig::default(),
        );

        let summary = orchestrator
            .deploy(vec![
                group("vault.Workflow.w1", vec![addition("Workflow", "w1")]),
                group("vault.Dashboard.d1", vec![addition("Dashboard", "d1")]),
            ])
            .await;

        assert_eq!(summary.applied_changes().count(), 1);
        assert_eq!(summary.errors().count(), 1);
        assert_eq!(summary.leftover_changes().count(), 0);
        assert!(summary.has_failures());

        assert_eq!(summary.groups()[0].state, GroupState::Succeeded);
        assert_eq!(summary.groups()[1].state, GroupState::Failed);
    }

    #[tokio::test]
    async fn test_pipeline_feeds_leftovers_to_next_filter() {
        let orchestrator = DeployOrchestrator::new(
            vec![
                Box::new(ScriptedFilter::handling("workflows", &["Workflow"])),
                Box::new(ScriptedFilter::handling("dashboards", &["Dashboard"])),
            ],
            DeployConfig::default(),
        );

        let summary = orchestrator
            .deploy(vec![group(
                "mixed",
                vec![
                    addition("Workflow", "w1"),
                    addition("Dashboard", "d1"),
                    addition("Screen", "s1"),
                ],
            )])
            .await;

        let result = &summary.groups()[0];
        assert_eq!(result.state, GroupState::Succeeded);
        assert_eq!(result.applied_changes.len(), 2);
        // The screen change survived every filter untouched.
        assert_eq!(result.leftover_changes.len(), 1);
        assert_eq!(
            result.leftover_changes[0].full_name(),
            "vault.Screen.s1"
        );
    }

    #[tokio::test]
    async fn test_no_change_lost_or_duplicated() {
        let orchestrator = DeployOrchestrator::new(
            vec![Box::new(ScriptedFilter::handling("all", &["Workflow"]))],
            DeployConfig::default(),
        );

        let summary = orchestrator
            .deploy(vec![group(
                "mixed",
                vec![addition("Workflow", "w1"), addition("Screen", "s1")],
            )])
            .await;

        let mut seen: Vec<String> = summary
            .applied_changes()
            .chain(summary.leftover_changes())
            .map(Change::full_name)
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["vault.Screen.s1", "vault.Workflow.w1"]);
    }

    #[tokio::test]
    async fn test_noop_removal_is_skipped_not_errored() {
        let orchestrator = DeployOrchestrator::new(
            vec![Box::new(ScriptedFilter::failing("strict", &["BoardOrder"]))],
            DeployConfig::default().with_skip_removal_type("BoardOrder"),
        );

        let summary = orchestrator
            .deploy(vec![group(
                "vault.BoardOrder.b1",
                vec![removal("BoardOrder", "b1")],
            )])
            .await;

        let result = &summary.groups()[0];
        assert_eq!(result.state, GroupState::Succeeded);
        assert!(result.errors.is_empty());
        assert_eq!(result.skipped_changes.len(), 1);
        // Additions of the same type still reach the filter.
        let summary = orchestrator
            .deploy(vec![group(
                "vault.BoardOrder.b2",
                vec![addition("BoardOrder", "b2")],
            )])
            .await;
        assert_eq!(summary.errors().count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_change_is_a_contract_violation() {
        let orchestrator =
            DeployOrchestrator::new(vec![Box::new(LossyFilter)], DeployConfig::default());

        let summary = orchestrator
            .deploy(vec![group("lost", vec![addition("Workflow", "w1")])])
            .await;

        let result = &summary.groups()[0];
        assert_eq!(result.state, GroupState::Failed);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("dropped a change"));
    }

    #[tokio::test]
    async fn test_overlapping_applied_and_leftover_is_reported() {
        struct OverlappingFilter;

        #[async_trait]
        impl DeployFilter for OverlappingFilter {
            fn name(&self) -> &str {
                "overlapping"
            }

            async fn deploy(&self, changes: Vec<Change>) -> FilterDeployResult {
                FilterDeployResult {
                    leftover_changes: changes.clone(),
                    deploy_result: DeployResult {
                        applied_changes: changes,
                        errors: Vec::new(),
                    },
                }
            }
        }

        let orchestrator =
            DeployOrchestrator::new(vec![Box::new(OverlappingFilter)], DeployConfig::default());

        let summary = orchestrator
            .deploy(vec![group("overlap", vec![addition("Workflow", "w1")])])
            .await;

        let result = &summary.groups()[0];
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("both applied and leftover"));
        // The applied claim is kept; the change is not duplicated.
        assert_eq!(result.applied_changes.len(), 1);
        assert!(result.leftover_changes.is_empty());
    }

    #[tokio::test]
    async fn test_reordered_leftovers_are_repaired_and_reported() {
        struct ReversingFilter;

        #[async_trait]
        impl DeployFilter for ReversingFilter {
            fn name(&self) -> &str {
                "reversing"
            }

            async fn deploy(&self, mut changes: Vec<Change>) -> FilterDeployResult {
                changes.reverse();
                FilterDeployResult::pass_through(changes)
            }
        }

        let orchestrator =
            DeployOrchestrator::new(vec![Box::new(ReversingFilter)], DeployConfig::default());

        let summary = orchestrator
            .deploy(vec![group(
                "ordered",
                vec![addition("Workflow", "w1"), addition("Workflow", "w2")],
            )])
            .await;

        let result = &summary.groups()[0];
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("reordered"));
        let names: Vec<String> = result
            .leftover_changes
            .iter()
            .map(Change::full_name)
            .collect();
        assert_eq!(names, vec!["vault.Workflow.w1", "vault.Workflow.w2"]);
    }

    #[tokio::test]
    async fn test_shutdown_skips_not_yet_started_groups() {
        let signal = ShutdownSignal::new();
        let orchestrator = DeployOrchestrator::new(
            vec![Box::new(ShutdownRequestingFilter {
                signal: signal.clone(),
            })],
            DeployConfig::default().with_max_concurrent_groups(1),
        )
        .with_shutdown_signal(signal);

        let summary = orchestrator
            .deploy(vec![
                group("first", vec![addition("Workflow", "w1")]),
                group("second", vec![addition("Workflow", "w2")]),
            ])
            .await;

        // The in-flight group ran to completion; the queued one was
        // abandoned and reported as skipped, not as an error.
        assert_eq!(summary.groups()[0].state, GroupState::Succeeded);
        assert_eq!(summary.groups()[0].applied_changes.len(), 1);
        assert_eq!(summary.groups()[1].state, GroupState::Skipped);
        assert!(summary.groups()[1].errors.is_empty());
        assert_eq!(summary.groups()[1].leftover_changes.len(), 1);
    }

    #[tokio::test]
    async fn test_summary_keeps_input_group_order() {
        let orchestrator = DeployOrchestrator::new(
            vec![Box::new(ScriptedFilter::handling("all", &["Workflow"]))],
            DeployConfig::default().with_max_concurrent_groups(4),
        );

        let groups: Vec<ChangeGroup> = (0..8)
            .map(|index| {
                let name = format!("w{index}");
                group(
                    &format!("vault.Workflow.{name}"),
                    vec![addition("Workflow", &name)],
                )
            })
            .collect();
        let expected: Vec<String> = groups.iter().map(|g| g.id.clone()).collect();

        let summary = orchestrator.deploy(groups).await;
        let order: Vec<String> = summary
            .groups()
            .iter()
            .map(|result| result.group_id.clone())
            .collect();
        assert_eq!(order, expected);
    }
}
