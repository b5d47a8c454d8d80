//! CLI logic for the Ephemeris configuration tool.
//!
//! This module contains the core CLI logic for the Ephemeris
//! configuration tool.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;

use std::fs;

use log::{debug, info, warn};

use ephemeris::{
    EphemerisError, Plan, PlanBuilder,
    change::ChangeKind,
    merge::MergeError,
    registry::ElementRegistry,
};

/// Run the Ephemeris CLI application
///
/// This function parses and merges the input sources, diffs them against
/// the baseline sources (or an empty observed state), groups the diff,
/// and renders the plan as text. With `--check` it validates the sources
/// without planning.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `EphemerisError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Parsing errors
/// - Grouping errors
pub fn run(args: &Args) -> Result<String, EphemerisError> {
    info!(
        inputs = args.inputs.len(),
        baseline = args.baseline.len();
        "Planning configuration changes"
    );

    // Load configuration
    let app_config = config::load_config(args.config.as_ref())?;
    let builder = PlanBuilder::new(app_config);

    let (after, merge_errors) = merge_sources(&builder, &args.inputs, &args.namespace)?;

    if args.check {
        info!(elements = after.len(); "Sources validated");
        return Ok(render_check(&after, &merge_errors));
    }

    let before = if args.baseline.is_empty() {
        ElementRegistry::new()
    } else {
        let (registry, _) = merge_sources(&builder, &args.baseline, &args.namespace)?;
        registry
    };

    let plan = builder.plan(&before, &after)?;
    info!(changes = plan.changes().len(); "Plan computed");

    Ok(render_plan(&plan))
}

/// Parse every file and merge the elements into one graph.
///
/// Merge problems are logged and returned; they do not abort the run.
fn merge_sources(
    builder: &PlanBuilder,
    paths: &[String],
    namespace: &str,
) -> Result<(ElementRegistry, Vec<MergeError>), EphemerisError> {
    let mut elements = Vec::new();
    for path in paths {
        debug!(path; "Reading source file");
        let source = fs::read_to_string(path)?;
        elements.extend(builder.parse(&source, namespace)?);
    }

    let (registry, errors) = builder.merge(elements).into_parts();
    for error in &errors {
        warn!("{error}");
    }
    Ok((registry, errors))
}

fn render_check(registry: &ElementRegistry, merge_errors: &[MergeError]) -> String {
    let mut out = format!("Checked {} element(s)\n", registry.len());
    for error in merge_errors {
        out.push_str(&format!("warning: {error}\n"));
    }
    out
}

fn render_plan(plan: &Plan) -> String {
    if plan.is_empty() {
        return "No changes. Desired state matches the observed state.\n".to_owned();
    }

    let groups = &plan.group_ids().groups;
    let mut out = format!(
        "Plan: {} change(s) in {} group(s)\n",
        plan.changes().len(),
        groups.len()
    );
    for group in groups {
        out.push_str(&format!("\ngroup {}\n", group.id));
        for change in &group.changes {
            let marker = match change.kind() {
                ChangeKind::Addition => '+',
                ChangeKind::Modification => '~',
                ChangeKind::Removal => '-',
            };
            out.push_str(&format!("  {marker} {}\n", change.full_name()));
        }
    }
    out
}
