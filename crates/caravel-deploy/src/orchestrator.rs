//! Orchestrator collaborator interface.
//!
//! The lifecycle manager never touches infrastructure directly; it hands
//! each descriptor to an `Orchestrator` and waits for durable acceptance
//! before moving to the next one. That sequential-blocking discipline is
//! what makes "halt and mark Degraded" well-defined: at any failure the
//! set of applied resources is exactly a prefix of the apply order.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;

use caravel_core::{ResourceDescriptor, ResourceId};

/// Rejection reported by an orchestrator for a single resource.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct OrchestrationFailure {
    pub reason: String,
}

impl OrchestrationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// External runtime that accepts descriptors for apply and delete.
///
/// `apply` must be idempotent: re-applying an identical descriptor is a
/// no-op success. `apply` returns only once the resource is durably
/// accepted; the caller treats return as the commit point.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn apply(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> std::result::Result<(), OrchestrationFailure>;

    async fn delete(&self, id: &ResourceId) -> std::result::Result<(), OrchestrationFailure>;
}

#[derive(Default)]
struct MockState {
    /// Currently live resources, keyed by identity
    resources: IndexMap<ResourceId, ResourceDescriptor>,
    /// Every apply in invocation order
    apply_log: Vec<ResourceId>,
    /// Every delete in invocation order
    delete_log: Vec<ResourceId>,
    /// Identities that fail on the next apply attempt
    fail_on_apply: HashSet<String>,
    /// Identities that fail on the next delete attempt
    fail_on_delete: HashSet<String>,
}

/// In-memory orchestrator for tests.
///
/// Records every call and can be scripted to reject specific resources,
/// which is how the Degraded/resume paths are exercised without a real
/// runtime.
#[derive(Clone, Default)]
pub struct MockOrchestrator {
    state: Arc<RwLock<MockState>>,
}

impl MockOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next apply of the resource with this identity
    /// (formatted as `Kind/name`). Cleared by `clear_failures`.
    pub fn fail_apply(&self, id: &str) {
        self.write().fail_on_apply.insert(id.to_string());
    }

    /// Reject the next delete of the resource with this identity.
    pub fn fail_delete(&self, id: &str) {
        self.write().fail_on_delete.insert(id.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.write();
        state.fail_on_apply.clear();
        state.fail_on_delete.clear();
    }

    /// Identities applied so far, in invocation order.
    pub fn apply_log(&self) -> Vec<ResourceId> {
        self.read().apply_log.clone()
    }

    /// Identities deleted so far, in invocation order.
    pub fn delete_log(&self) -> Vec<ResourceId> {
        self.read().delete_log.clone()
    }

    /// Number of apply calls for one identity.
    pub fn apply_count(&self, id: &str) -> usize {
        self.read()
            .apply_log
            .iter()
            .filter(|r| r.to_string() == id)
            .count()
    }

    /// Whether the resource is currently live.
    pub fn is_live(&self, id: &str) -> bool {
        self.read()
            .resources
            .keys()
            .any(|r| r.to_string() == id)
    }

    pub fn live_count(&self) -> usize {
        self.read().resources.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    async fn apply(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> std::result::Result<(), OrchestrationFailure> {
        let id = descriptor.id();
        let mut state = self.write();
        if state.fail_on_apply.contains(&id.to_string()) {
            return Err(OrchestrationFailure::new(format!(
                "scripted rejection of {id}"
            )));
        }
        state.apply_log.push(id.clone());
        state.resources.insert(id, descriptor.clone());
        Ok(())
    }

    async fn delete(&self, id: &ResourceId) -> std::result::Result<(), OrchestrationFailure> {
        let mut state = self.write();
        if state.fail_on_delete.contains(&id.to_string()) {
            return Err(OrchestrationFailure::new(format!(
                "scripted rejection of {id}"
            )));
        }
        state.delete_log.push(id.clone());
        state.resources.shift_remove(id);
        Ok(())
    }
}

/// Orchestrator that materializes descriptors as YAML files.
///
/// One file per resource under the target directory, named
/// `<kind>-<name>.yaml`. Files carry the full wire form including secret
/// values, same as any real orchestrator would receive.
pub struct DirOrchestrator {
    target_dir: PathBuf,
}

impl DirOrchestrator {
    pub fn new(target_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let target_dir = target_dir.into();
        std::fs::create_dir_all(&target_dir)?;
        Ok(Self { target_dir })
    }

    fn resource_path(&self, id: &ResourceId) -> PathBuf {
        self.target_dir
            .join(format!("{}-{}.yaml", id.kind.to_string().to_lowercase(), id.name))
    }
}

#[async_trait]
impl Orchestrator for DirOrchestrator {
    async fn apply(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> std::result::Result<(), OrchestrationFailure> {
        let yaml = descriptor
            .to_yaml()
            .map_err(|e| OrchestrationFailure::new(e.to_string()))?;
        let path = self.resource_path(&descriptor.id());
        tokio::fs::write(&path, yaml)
            .await
            .map_err(|e| OrchestrationFailure::new(format!("{}: {e}", path.display())))?;
        Ok(())
    }

    async fn delete(&self, id: &ResourceId) -> std::result::Result<(), OrchestrationFailure> {
        let path = self.resource_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone counts as deleted; delete must be idempotent too.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OrchestrationFailure::new(format!(
                "{}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::two_tier_config;
    use caravel_render::{render, RenderOptions};

    fn descriptors() -> Vec<ResourceDescriptor> {
        render("demo", &two_tier_config(), &RenderOptions::default())
            .unwrap()
            .into_descriptors()
    }

    #[tokio::test]
    async fn test_mock_records_applies_and_deletes() {
        let mock = MockOrchestrator::new();
        for descriptor in &descriptors() {
            mock.apply(descriptor).await.unwrap();
        }
        assert_eq!(mock.live_count(), 6);
        assert_eq!(mock.apply_count("ConfigMap/demo-config"), 1);

        mock.delete(&caravel_core::ResourceId::new(
            caravel_core::ResourceKind::Service,
            "backend",
        ))
        .await
        .unwrap();
        assert_eq!(mock.live_count(), 5);
        assert!(!mock.is_live("Service/backend"));
    }

    #[tokio::test]
    async fn test_mock_scripted_failure() {
        let mock = MockOrchestrator::new();
        let all = descriptors();
        mock.fail_apply("Deployment/backend");

        let deployment = all
            .iter()
            .find(|d| d.id().to_string() == "Deployment/backend")
            .unwrap();
        assert!(mock.apply(deployment).await.is_err());
        assert_eq!(mock.live_count(), 0);

        mock.clear_failures();
        mock.apply(deployment).await.unwrap();
        assert!(mock.is_live("Deployment/backend"));
    }

    #[tokio::test]
    async fn test_dir_orchestrator_writes_and_removes_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let orchestrator = DirOrchestrator::new(tmp.path().join("out")).unwrap();

        let all = descriptors();
        for descriptor in &all {
            orchestrator.apply(descriptor).await.unwrap();
        }
        let config_map = tmp.path().join("out").join("configmap-demo-config.yaml");
        assert!(config_map.exists());

        orchestrator
            .delete(&caravel_core::ResourceId::new(
                caravel_core::ResourceKind::ConfigMap,
                "demo-config",
            ))
            .await
            .unwrap();
        assert!(!config_map.exists());

        // Deleting again is a no-op.
        orchestrator
            .delete(&caravel_core::ResourceId::new(
                caravel_core::ResourceKind::ConfigMap,
                "demo-config",
            ))
            .await
            .unwrap();
    }
}
