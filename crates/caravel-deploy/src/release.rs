//! Release model and lifecycle state machine.
//!
//! A release is the atomic unit of deployment: one configuration rendered
//! into one ordered descriptor set, applied as a whole. Every lifecycle
//! operation (install, upgrade, rollback, uninstall) moves the release
//! through the state machine below and records a per-resource condition
//! trail, so a crashed or interrupted operation can always be diagnosed
//! and resumed from durable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caravel_core::{ReleaseConfiguration, ResourceDescriptor, ResourceId};

/// A versioned release snapshot.
///
/// Versions are 1-indexed and only ever grow; a rollback creates a new
/// version whose content matches the target rather than rewinding history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Release name (DNS-1123 label)
    pub name: String,

    /// Revision number, increments with each upgrade or rollback
    pub version: u32,

    /// Current lifecycle state
    pub state: ReleaseState,

    /// The configuration this version was rendered from
    ///
    /// Kept verbatim so rollback can re-render instead of trusting a
    /// possibly stale descriptor snapshot.
    pub config: ReleaseConfiguration,

    /// Rendered descriptors in apply order
    pub descriptors: Vec<ResourceDescriptor>,

    /// Per-resource condition trail for this version
    #[serde(default)]
    pub conditions: Vec<ResourceCondition>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Release {
    /// First version of a new release.
    pub fn for_install(
        name: String,
        config: ReleaseConfiguration,
        descriptors: Vec<ResourceDescriptor>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name,
            version: 1,
            state: ReleaseState::Installing,
            config,
            descriptors,
            conditions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Next version of an existing release.
    pub fn for_upgrade(
        previous: &Release,
        config: ReleaseConfiguration,
        descriptors: Vec<ResourceDescriptor>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: previous.name.clone(),
            version: previous.version + 1,
            state: ReleaseState::Upgrading {
                previous_version: previous.version,
            },
            config,
            descriptors,
            conditions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// New version whose content is re-rendered from a historical one.
    pub fn for_rollback(
        previous: &Release,
        target_version: u32,
        config: ReleaseConfiguration,
        descriptors: Vec<ResourceDescriptor>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: previous.name.clone(),
            version: previous.version + 1,
            state: ReleaseState::RollingBack { target_version },
            config,
            descriptors,
            conditions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_active(&mut self) {
        self.state = ReleaseState::Active;
        self.updated_at = Utc::now();
    }

    /// Halt after a mid-sequence failure.
    ///
    /// `last_applied_index` is the position of the last resource the
    /// orchestrator durably accepted, `None` when nothing was applied.
    pub fn mark_degraded(&mut self, last_applied_index: Option<usize>, reason: String) {
        self.state = ReleaseState::Degraded {
            last_applied_index,
            reason,
        };
        self.updated_at = Utc::now();
    }

    pub fn mark_uninstalling(&mut self) {
        self.state = ReleaseState::Uninstalling;
        self.updated_at = Utc::now();
    }

    pub fn mark_superseded(&mut self) {
        self.state = ReleaseState::Superseded;
        self.updated_at = Utc::now();
    }

    pub fn mark_absent(&mut self) {
        self.state = ReleaseState::Absent;
        self.updated_at = Utc::now();
    }

    /// Index to resume applying from after a `Degraded` halt.
    pub fn resume_index(&self) -> Option<usize> {
        match &self.state {
            ReleaseState::Degraded {
                last_applied_index, ..
            } => Some(last_applied_index.map(|i| i + 1).unwrap_or(0)),
            _ => None,
        }
    }

    /// Record the outcome of one resource's apply or delete.
    pub fn record_condition(
        &mut self,
        resource: ResourceId,
        status: ConditionStatus,
        message: Option<String>,
    ) {
        let now = Utc::now();
        // One condition per resource per version; later outcomes replace
        // earlier ones (e.g. Failed then Applied after a resume).
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.resource == resource) {
            existing.status = status;
            existing.message = message;
            existing.timestamp = now;
        } else {
            self.conditions.push(ResourceCondition {
                resource,
                status,
                message,
                timestamp: now,
            });
        }
        self.updated_at = now;
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.is_in_flight()
    }

    /// Whether a retried transition should resume this version instead
    /// of creating a new one.
    ///
    /// `Degraded` is the recorded halt; a persisted in-flight state is
    /// the same situation without the marker, left behind by a process
    /// that died between saves.
    pub fn needs_resume(&self) -> bool {
        matches!(self.state, ReleaseState::Degraded { .. }) || self.state.is_in_flight()
    }

    /// Longest already-settled prefix of the apply order, read from the
    /// condition trail. Returns the index of the last descriptor whose
    /// condition is `Applied` or `Unchanged` before the first gap, or
    /// `None` when the trail shows no progress.
    pub fn applied_prefix(&self) -> Option<usize> {
        let mut last = None;
        for (index, descriptor) in self.descriptors.iter().enumerate() {
            let settled = self.conditions.iter().any(|c| {
                c.resource == descriptor.id()
                    && matches!(c.status, ConditionStatus::Applied | ConditionStatus::Unchanged)
            });
            if !settled {
                break;
            }
            last = Some(index);
        }
        last
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ReleaseState::Active | ReleaseState::Superseded | ReleaseState::Absent
        )
    }
}

/// Lifecycle state of a release version.
///
/// Transitions: `Pending → Installing → Active`, `Active → Upgrading →
/// Active`, `Active → RollingBack → Active`, `Active → Uninstalling →
/// Absent`. A failed apply drops any in-flight state into `Degraded`,
/// which only an explicit retry or rollback leaves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "kebab-case", rename_all_fields = "camelCase")]
#[non_exhaustive]
pub enum ReleaseState {
    /// Accepted but not yet applying
    Pending,

    /// Initial apply sequence in progress
    Installing,

    /// All resources applied and accepted
    Active,

    /// New version's apply sequence in progress
    Upgrading { previous_version: u32 },

    /// Re-render of a historical version in progress
    RollingBack { target_version: u32 },

    /// Teardown in progress
    Uninstalling,

    /// Apply halted partway through the ordered sequence
    Degraded {
        /// Position of the last durably applied resource, if any
        last_applied_index: Option<usize>,
        reason: String,
    },

    /// Replaced by a newer version
    Superseded,

    /// Uninstalled
    Absent,
}

impl ReleaseState {
    /// Whether a lifecycle transition is currently executing.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Pending
                | Self::Installing
                | Self::Upgrading { .. }
                | Self::RollingBack { .. }
                | Self::Uninstalling
        )
    }

    pub fn status_name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Installing => "installing",
            Self::Active => "active",
            Self::Upgrading { .. } => "upgrading",
            Self::RollingBack { .. } => "rolling-back",
            Self::Uninstalling => "uninstalling",
            Self::Degraded { .. } => "degraded",
            Self::Superseded => "superseded",
            Self::Absent => "absent",
        }
    }
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Degraded {
                last_applied_index,
                reason,
            } => match last_applied_index {
                Some(i) => write!(f, "degraded after resource {i}: {reason}"),
                None => write!(f, "degraded before any resource applied: {reason}"),
            },
            Self::Upgrading { previous_version } => {
                write!(f, "upgrading from v{previous_version}")
            }
            Self::RollingBack { target_version } => {
                write!(f, "rolling back to v{target_version}")
            }
            other => write!(f, "{}", other.status_name()),
        }
    }
}

impl Default for ReleaseState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Recorded outcome of one resource within one release version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCondition {
    pub resource: ResourceId,
    pub status: ConditionStatus,
    #[serde(default)]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Status of one resource's condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionStatus {
    /// Not yet attempted in this version
    Pending,

    /// Durably accepted by the orchestrator
    Applied,

    /// Identical to the previous version, apply skipped
    Unchanged,

    /// Rejected by the orchestrator
    Failed,

    /// Deleted during upgrade or uninstall
    Deleted,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caravel_core::ResourceKind;

    fn sample_config() -> ReleaseConfiguration {
        ReleaseConfiguration::from_yaml(crate::testutil::TWO_TIER_YAML).unwrap()
    }

    #[test]
    fn test_install_starts_at_version_one() {
        let release = Release::for_install("demo".to_string(), sample_config(), Vec::new());
        assert_eq!(release.version, 1);
        assert_eq!(release.state, ReleaseState::Installing);
        assert!(release.is_in_flight());
    }

    #[test]
    fn test_upgrade_increments_version() {
        let mut first = Release::for_install("demo".to_string(), sample_config(), Vec::new());
        first.mark_active();
        let second = Release::for_upgrade(&first, sample_config(), Vec::new());
        assert_eq!(second.version, 2);
        assert_eq!(
            second.state,
            ReleaseState::Upgrading {
                previous_version: 1
            }
        );
    }

    #[test]
    fn test_degraded_resume_index() {
        let mut release = Release::for_install("demo".to_string(), sample_config(), Vec::new());
        release.mark_degraded(Some(2), "orchestrator rejected".to_string());
        assert_eq!(release.resume_index(), Some(3));

        release.mark_degraded(None, "nothing applied".to_string());
        assert_eq!(release.resume_index(), Some(0));

        release.mark_active();
        assert_eq!(release.resume_index(), None);
    }

    #[test]
    fn test_condition_replaced_on_retry() {
        let mut release = Release::for_install("demo".to_string(), sample_config(), Vec::new());
        let id = ResourceId::new(ResourceKind::Deployment, "backend");

        release.record_condition(id.clone(), ConditionStatus::Failed, Some("boom".to_string()));
        release.record_condition(id.clone(), ConditionStatus::Applied, None);

        assert_eq!(release.conditions.len(), 1);
        assert_eq!(release.conditions[0].status, ConditionStatus::Applied);
        assert_eq!(release.conditions[0].message, None);
    }

    #[test]
    fn test_applied_prefix_reads_condition_trail() {
        let config = sample_config();
        let descriptors =
            caravel_render::render("demo", &config, &caravel_render::RenderOptions::default())
                .unwrap()
                .into_descriptors();
        let mut release = Release::for_install("demo".to_string(), config, descriptors);
        assert_eq!(release.applied_prefix(), None);

        release.record_condition(release.descriptors[0].id(), ConditionStatus::Applied, None);
        release.record_condition(release.descriptors[1].id(), ConditionStatus::Unchanged, None);
        assert_eq!(release.applied_prefix(), Some(1));

        // A settled resource past a gap does not extend the prefix.
        release.record_condition(release.descriptors[3].id(), ConditionStatus::Applied, None);
        assert_eq!(release.applied_prefix(), Some(1));
    }

    #[test]
    fn test_state_serialization_is_tagged() {
        let state = ReleaseState::Degraded {
            last_applied_index: Some(1),
            reason: "apply failed".to_string(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains(r#""status":"degraded""#), "{json}");
        assert!(json.contains(r#""lastAppliedIndex":1"#), "{json}");

        let back: ReleaseState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
