//! Deployment reports

use crate::descriptor::{DescriptorId, Outputs};
use crate::types::{ApplyResult, ExecuteSummary};
use naming::ResourceKind;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Reason recorded for an output whose cell was still pending at the end
pub const NEVER_RESOLVED: &str = "never resolved";

/// What happened to one descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceOutcome {
    pub id: DescriptorId,
    pub kind: ResourceKind,
    pub name: String,
    pub result: ApplyResult,
    /// Backend-assigned fields; empty unless realized
    pub outputs: Outputs,
}

/// The first descriptor the backend rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureContext {
    pub kind: ResourceKind,
    pub name: String,
    pub cause: String,
}

impl std::fmt::Display for FailureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}': {}", self.kind.description(), self.name, self.cause)
    }
}

/// Result of one preview or apply run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeploymentReport {
    /// Whether the backend was only asked what it would do
    pub preview: bool,
    /// Exported values that resolved
    pub outputs: BTreeMap<String, Value>,
    /// Exported values that failed or never resolved, with the reason
    pub unresolved_outputs: BTreeMap<String, String>,
    /// Every settled descriptor, in declaration order
    pub resources: Vec<ResourceOutcome>,
    pub summary: ExecuteSummary,
    pub failure: Option<FailureContext>,
}

impl DeploymentReport {
    /// Nothing failed or was skipped and every export resolved
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.summary.is_success() && self.unresolved_outputs.is_empty()
    }

    /// Outcomes grouped by resource kind, for display
    pub fn group_by_kind(&self) -> BTreeMap<ResourceKind, Vec<&ResourceOutcome>> {
        let mut groups: BTreeMap<ResourceKind, Vec<&ResourceOutcome>> = BTreeMap::new();
        for outcome in &self.resources {
            groups.entry(outcome.kind).or_default().push(outcome);
        }
        groups
    }

    pub fn outcome(&self, name: &str) -> Option<&ResourceOutcome> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }
}
