//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};

/// How a digest treats cycles in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Fail the digest with `CyclicDependency` when a cycle is reachable.
    #[default]
    Detect,

    /// Skip already-visited nodes and keep going. Terminates, but the order
    /// inside a cycle is unspecified.
    Unchecked,
}

/// Settings for an [`Engine`](crate::digest::Engine).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cycle_policy: CyclePolicy,
}

impl EngineConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(ReactiveError::Config)
    }

    pub fn with_cycle_policy(mut self, cycle_policy: CyclePolicy) -> Self {
        self.cycle_policy = cycle_policy;
        self
    }
}
