//! Dependency-ordered apply planning.
//!
//! Descriptors reference each other: a deployment binds env vars against
//! the release's config map and secret, and a service selects a
//! deployment's pods. Applying out of order would leave a window where a
//! workload starts without its configuration, so the planner sorts the
//! descriptor set topologically before anything touches an orchestrator.
//!
//! Ties are broken by resource kind (config maps first, services last)
//! and then by declaration order, which keeps the plan deterministic for
//! identical input.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use indexmap::{IndexMap, IndexSet};

use caravel_core::{BoundValue, ResourceDescriptor, ResourceId, ResourceKind};

use crate::error::{RenderError, Result};

/// Deterministic, dependency-respecting apply order for one release.
#[derive(Debug, Clone)]
pub struct ApplyPlan {
    descriptors: Vec<ResourceDescriptor>,
}

impl ApplyPlan {
    /// Descriptors in the order they must be applied.
    pub fn descriptors(&self) -> &[ResourceDescriptor] {
        &self.descriptors
    }

    /// Descriptors in the order they must be deleted (reverse apply order).
    pub fn teardown_order(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.iter().rev()
    }

    pub fn into_descriptors(self) -> Vec<ResourceDescriptor> {
        self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Rank used for tie-breaking between resources with no dependency
/// relation. Lower applies first.
fn kind_rank(kind: ResourceKind) -> u8 {
    match kind {
        ResourceKind::ConfigMap => 0,
        ResourceKind::Secret => 1,
        ResourceKind::Deployment => 2,
        ResourceKind::Service => 3,
    }
}

/// Sort descriptors into apply order.
///
/// Fails with `DuplicateIdentity` when two descriptors share a
/// kind/name pair and with `DependencyCycle` when the reference graph
/// loops. Neither can come from a well-formed configuration; the builder
/// only emits acyclic sets with unique identities.
pub fn plan(descriptors: Vec<ResourceDescriptor>) -> Result<ApplyPlan> {
    let mut ids: IndexSet<ResourceId> = IndexSet::new();
    for descriptor in &descriptors {
        if !ids.insert(descriptor.id()) {
            return Err(RenderError::DuplicateIdentity {
                id: descriptor.id(),
            });
        }
    }

    // Edges point from a dependency to its dependents.
    let mut dependents: IndexMap<usize, Vec<usize>> = IndexMap::new();
    let mut indegree = vec![0usize; descriptors.len()];
    for (idx, descriptor) in descriptors.iter().enumerate() {
        for dep in dependencies_of(descriptor, &descriptors) {
            dependents.entry(dep).or_default().push(idx);
            indegree[idx] += 1;
        }
    }

    // Kahn's algorithm with a priority queue so that independent
    // resources come out in (kind rank, declaration order).
    let mut ready: BinaryHeap<Reverse<(u8, usize)>> = descriptors
        .iter()
        .enumerate()
        .filter(|(idx, _)| indegree[*idx] == 0)
        .map(|(idx, d)| Reverse((kind_rank(d.id().kind), idx)))
        .collect();

    let mut ordered = Vec::with_capacity(descriptors.len());
    let mut order_of = vec![usize::MAX; descriptors.len()];
    while let Some(Reverse((_, idx))) = ready.pop() {
        order_of[idx] = ordered.len();
        ordered.push(idx);
        if let Some(deps) = dependents.get(&idx) {
            for &dependent in deps {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    let rank = kind_rank(descriptors[dependent].id().kind);
                    ready.push(Reverse((rank, dependent)));
                }
            }
        }
    }

    if ordered.len() != descriptors.len() {
        for (idx, descriptor) in descriptors.iter().enumerate() {
            if order_of[idx] == usize::MAX {
                return Err(RenderError::DependencyCycle {
                    id: descriptor.id(),
                });
            }
        }
    }

    let mut paired: Vec<(usize, ResourceDescriptor)> = descriptors
        .into_iter()
        .enumerate()
        .map(|(idx, descriptor)| (order_of[idx], descriptor))
        .collect();
    paired.sort_by_key(|(position, _)| *position);
    let descriptors = paired.into_iter().map(|(_, descriptor)| descriptor).collect();

    Ok(ApplyPlan { descriptors })
}

/// Indices of the descriptors `descriptor` depends on.
fn dependencies_of(descriptor: &ResourceDescriptor, all: &[ResourceDescriptor]) -> Vec<usize> {
    let mut deps = Vec::new();
    match descriptor {
        ResourceDescriptor::Deployment(deployment) => {
            let mut wanted: IndexSet<ResourceId> = IndexSet::new();
            for binding in &deployment.env {
                match &binding.value {
                    BoundValue::ConfigMapRef { resource, .. } => {
                        wanted.insert(ResourceId::new(ResourceKind::ConfigMap, resource.clone()));
                    }
                    BoundValue::SecretRef { resource, .. } => {
                        wanted.insert(ResourceId::new(ResourceKind::Secret, resource.clone()));
                    }
                    BoundValue::Literal(_) => {}
                }
            }
            for (idx, candidate) in all.iter().enumerate() {
                if wanted.contains(&candidate.id()) {
                    deps.push(idx);
                }
            }
        }
        ResourceDescriptor::Service(service) => {
            for (idx, candidate) in all.iter().enumerate() {
                if let ResourceDescriptor::Deployment(deployment) = candidate {
                    if deployment.labels == service.selector {
                        deps.push(idx);
                    }
                }
            }
        }
        ResourceDescriptor::ConfigMap(_) | ResourceDescriptor::Secret(_) => {}
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DescriptorBuilder;
    use crate::testutil::two_tier_config;
    use caravel_core::resolve;

    fn rendered() -> Vec<ResourceDescriptor> {
        let config = two_tier_config();
        let (mut config_partition, secret_partition) = caravel_core::partition(&config).unwrap();
        let topology = resolve(&config).unwrap();
        for (key, value) in &topology.derived_config {
            config_partition.insert(key.clone(), value.clone());
        }
        DescriptorBuilder::new("demo", &config, &topology, config_partition, secret_partition)
            .build()
            .unwrap()
    }

    fn ids(plan: &ApplyPlan) -> Vec<String> {
        plan.descriptors().iter().map(|d| d.id().to_string()).collect()
    }

    #[test]
    fn test_plan_orders_configuration_before_workloads() {
        let plan = plan(rendered()).unwrap();
        assert_eq!(
            ids(&plan),
            vec![
                "ConfigMap/demo-config",
                "Secret/demo-secrets",
                "Deployment/frontend",
                "Deployment/backend",
                "Service/frontend",
                "Service/backend",
            ]
        );
    }

    #[test]
    fn test_plan_respects_dependencies_for_any_input_order() {
        let mut shuffled = rendered();
        shuffled.reverse();
        let plan = plan(shuffled).unwrap();
        let position = |wanted: &str| {
            ids(&plan)
                .iter()
                .position(|id| id == wanted)
                .unwrap_or_else(|| panic!("missing {wanted}"))
        };
        assert!(position("ConfigMap/demo-config") < position("Deployment/frontend"));
        assert!(position("Secret/demo-secrets") < position("Deployment/backend"));
        assert!(position("Deployment/frontend") < position("Service/frontend"));
        assert!(position("Deployment/backend") < position("Service/backend"));
    }

    #[test]
    fn test_plan_rejects_duplicate_identity() {
        let mut descriptors = rendered();
        let dup = descriptors[0].clone();
        descriptors.push(dup);
        let err = plan(descriptors).unwrap_err();
        assert!(
            matches!(err, RenderError::DuplicateIdentity { ref id } if id.to_string() == "ConfigMap/demo-config")
        );
    }

    #[test]
    fn test_teardown_order_is_reverse_of_apply_order() {
        let plan = plan(rendered()).unwrap();
        let forward: Vec<String> = ids(&plan);
        let backward: Vec<String> = plan
            .teardown_order()
            .map(|d| d.id().to_string())
            .collect();
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(backward, reversed);
    }
}
