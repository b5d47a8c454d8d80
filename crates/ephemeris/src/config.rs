//! Configuration types for the Ephemeris engine.
//!
//! This module provides configuration structures that control grouping and
//! deployment. All types implement [`serde::Deserialize`] for flexible
//! loading from external sources.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining grouping and deploy
//!   settings.
//! - [`GroupingConfig`] - Per-type-name change grouping strategies.
//! - [`DeployConfig`] - Concurrency bound, feature flags, and removal
//!   no-op types for the orchestrator.
//!
//! # Example
//!
//! ```
//! # use ephemeris::config::AppConfig;
//! // Use default configuration
//! let config = AppConfig::default();
//! assert!(config.grouping().rules().is_empty());
//! assert_eq!(config.deploy().max_concurrent_groups(), 4);
//! ```

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::group::GroupStrategy;

/// Top-level configuration combining grouping and deploy settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Grouping configuration section.
    #[serde(default)]
    grouping: GroupingConfig,

    /// Deploy configuration section.
    #[serde(default)]
    deploy: DeployConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] with the specified sections.
    pub fn new(grouping: GroupingConfig, deploy: DeployConfig) -> Self {
        Self { grouping, deploy }
    }

    /// Returns the grouping configuration.
    pub fn grouping(&self) -> &GroupingConfig {
        &self.grouping
    }

    /// Returns the deploy configuration.
    pub fn deploy(&self) -> &DeployConfig {
        &self.deploy
    }
}

/// Change grouping strategies, keyed by element type name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupingConfig {
    /// Strategy per type name; types without an entry group per change.
    #[serde(default)]
    rules: IndexMap<String, GroupStrategy>,
}

impl GroupingConfig {
    /// Creates a grouping config from a strategy table.
    pub fn new(rules: IndexMap<String, GroupStrategy>) -> Self {
        Self { rules }
    }

    /// The strategy table.
    pub fn rules(&self) -> &IndexMap<String, GroupStrategy> {
        &self.rules
    }
}

/// Deployment orchestration settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    /// How many groups may deploy concurrently.
    #[serde(default = "default_max_concurrent_groups")]
    max_concurrent_groups: usize,

    /// Feature flags gating optional filters.
    #[serde(default)]
    flags: BTreeSet<String>,

    /// Type names whose removal changes are remote no-ops and are skipped
    /// without being counted as errors.
    #[serde(default)]
    skip_removal_types: BTreeSet<String>,
}

fn default_max_concurrent_groups() -> usize {
    4
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            max_concurrent_groups: default_max_concurrent_groups(),
            flags: BTreeSet::new(),
            skip_removal_types: BTreeSet::new(),
        }
    }
}

impl DeployConfig {
    pub fn max_concurrent_groups(&self) -> usize {
        self.max_concurrent_groups
    }

    /// Whether the named feature flag is on.
    pub fn is_flag_enabled(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Whether removals of this type name are remote no-ops.
    pub fn skips_removal_of(&self, type_name: &str) -> bool {
        self.skip_removal_types.contains(type_name)
    }

    /// Builder-style setter for the concurrency bound.
    pub fn with_max_concurrent_groups(mut self, max: usize) -> Self {
        self.max_concurrent_groups = max;
        self
    }

    /// Builder-style setter turning a feature flag on.
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    /// Builder-style setter marking a type's removals as no-ops.
    pub fn with_skip_removal_type(mut self, type_name: impl Into<String>) -> Self {
        self.skip_removal_types.insert(type_name.into());
        self
    }
}
