//! Execution planner - orders descriptors into dependency waves

use crate::descriptor::{DescriptorId, Resource};
use crate::error::ConstructionError;
use std::collections::{BTreeMap, BTreeSet};

/// Descriptors grouped into waves.
///
/// Every descriptor in a wave depends only on descriptors in earlier waves
/// (or outside the plan). Within a wave, declaration order is kept.
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    waves: Vec<Vec<Resource>>,
}

impl ExecutionPlan {
    /// Order `resources` by their dependencies.
    ///
    /// Edges to descriptors outside the slice are ignored; the caller
    /// decides whether those are already settled. Descriptors that can
    /// never be ordered are reported as a [`ConstructionError::Cycle`].
    pub fn from_descriptors(resources: &[Resource]) -> Result<Self, ConstructionError> {
        let members: BTreeMap<DescriptorId, &Resource> =
            resources.iter().map(|r| (r.id(), r)).collect();

        let mut blocking: BTreeMap<DescriptorId, BTreeSet<DescriptorId>> = members
            .iter()
            .map(|(&id, r)| {
                let deps = r
                    .depends_on()
                    .into_iter()
                    .filter(|dep| members.contains_key(dep))
                    .collect();
                (id, deps)
            })
            .collect();

        let mut waves = Vec::new();
        while !blocking.is_empty() {
            let ready: Vec<DescriptorId> = blocking
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(&id, _)| id)
                .collect();

            if ready.is_empty() {
                let members = blocking
                    .keys()
                    .filter_map(|id| members.get(id))
                    .map(|r| r.name().to_string())
                    .collect();
                return Err(ConstructionError::Cycle { members });
            }

            for id in &ready {
                blocking.remove(id);
            }
            for deps in blocking.values_mut() {
                for id in &ready {
                    deps.remove(id);
                }
            }

            waves.push(
                ready
                    .iter()
                    .filter_map(|id| members.get(id).map(|r| Resource::clone(r)))
                    .collect(),
            );
        }

        Ok(Self { waves })
    }

    pub fn waves(&self) -> &[Vec<Resource>] {
        &self.waves
    }

    /// Descriptors with no unsettled dependency inside the plan
    pub fn first_wave(&self) -> &[Resource] {
        self.waves.first().map_or(&[], Vec::as_slice)
    }

    /// Total number of descriptors in the plan
    pub fn total_resources(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }
}

/// Keep descriptors matching a target pattern plus everything they need.
///
/// Target format: "kind" or "kind.name", where kind is a type tag such as
/// `sa` and name is a substring of the derived name.
pub fn filter_by_target(resources: &[Resource], target: Option<&str>) -> Vec<Resource> {
    let Some(target) = target else {
        return resources.to_vec();
    };
    let (kind, name) = parse_target(target);

    let by_id: BTreeMap<DescriptorId, &Resource> =
        resources.iter().map(|r| (r.id(), r)).collect();
    let mut selected = BTreeSet::new();
    let mut stack: Vec<DescriptorId> = resources
        .iter()
        .filter(|r| matches_filter(r, kind.as_deref(), name.as_deref()))
        .map(|r| r.id())
        .collect();

    while let Some(id) = stack.pop() {
        if !selected.insert(id) {
            continue;
        }
        if let Some(resource) = by_id.get(&id) {
            stack.extend(resource.depends_on());
        }
    }

    resources
        .iter()
        .filter(|r| selected.contains(&r.id()))
        .cloned()
        .collect()
}

/// Parse a target string like "kind.name" into (kind, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if a descriptor matches the filter criteria
fn matches_filter(resource: &Resource, kind: Option<&str>, name: Option<&str>) -> bool {
    if let Some(k) = kind
        && !k.is_empty()
        && resource.kind().tag() != k
    {
        return false;
    }

    if let Some(n) = name
        && !resource.name().contains(n)
    {
        return false;
    }

    true
}
