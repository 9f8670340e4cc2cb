//! Release lifecycle manager.
//!
//! One entry point per lifecycle transition: install, upgrade, rollback,
//! uninstall, plus the read-only status/history/list calls. Each
//! transition renders, persists the new release version, then walks the
//! apply order one resource at a time, saving progress after every
//! orchestrator acknowledgment. A mid-sequence rejection halts the walk
//! and leaves the release `Degraded` with the last applied index;
//! re-invoking the same call resumes from the next resource instead of
//! starting over. Nothing here rolls back implicitly.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::{info, warn};

use caravel_core::{ReleaseConfiguration, ResourceDescriptor, ResourceId};
use caravel_render::{render, ChangeType, DiffEngine, RenderOptions};

use crate::error::{DeployError, Result};
use crate::orchestrator::Orchestrator;
use crate::release::{ConditionStatus, Release, ReleaseState};
use crate::store::StateStore;

pub struct ReleaseManager<S, O> {
    store: S,
    orchestrator: O,
    options: RenderOptions,
    // Mutual exclusion scope keyed by release name: only one lifecycle
    // transition may be in flight per name at a time.
    in_flight: Mutex<HashSet<String>>,
}

/// Removes the release name from the in-flight set when the operation
/// ends, including on error and cancellation.
struct OperationGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.name);
    }
}

impl<S: StateStore, O: Orchestrator> ReleaseManager<S, O> {
    pub fn new(store: S, orchestrator: O, options: RenderOptions) -> Self {
        Self {
            store,
            orchestrator,
            options,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn begin(&self, name: &str) -> Result<OperationGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(name.to_string()) {
            return Err(DeployError::ReleaseBusy {
                name: name.to_string(),
            });
        }
        Ok(OperationGuard {
            in_flight: &self.in_flight,
            name: name.to_string(),
        })
    }

    /// Install a new release, or resume a degraded install of the same
    /// content.
    pub async fn install(&self, name: &str, config: &ReleaseConfiguration) -> Result<Release> {
        let _guard = self.begin(name)?;
        let descriptors = render(name, config, &self.options)?.into_descriptors();

        let mut release = match self.store.get_latest(name).await {
            Err(DeployError::ReleaseNotFound { .. }) => {
                Release::for_install(name.to_string(), config.clone(), descriptors)
            }
            Ok(latest) if matches!(latest.state, ReleaseState::Absent) => {
                // Reinstall after uninstall keeps the version counter
                // monotonic so history stays unambiguous.
                let mut release =
                    Release::for_install(name.to_string(), config.clone(), descriptors);
                release.version = latest.version + 1;
                release
            }
            Ok(latest) if latest.needs_resume() => self.resume(latest, config, descriptors),
            Ok(latest) => {
                return Err(DeployError::ReleaseAlreadyExists {
                    name: name.to_string(),
                    version: latest.version,
                });
            }
            Err(e) => return Err(e),
        };

        let start = release.resume_index().unwrap_or(0);
        release.state = ReleaseState::Installing;
        self.store.save(&release).await?;

        info!(release = name, version = release.version, "installing");
        self.apply_sequence(&mut release, start, &HashSet::new())
            .await?;
        self.retire_previous(&mut release).await?;

        release.mark_active();
        self.store.save(&release).await?;
        Ok(release)
    }

    /// Upgrade an existing release to a newly rendered version.
    ///
    /// Unchanged descriptors are skipped, changed and added ones are
    /// applied in dependency order, and descriptors absent from the new
    /// render are deleted in reverse dependency order.
    pub async fn upgrade(&self, name: &str, config: &ReleaseConfiguration) -> Result<Release> {
        let _guard = self.begin(name)?;
        let latest = self.store.get_latest(name).await?;
        let descriptors = render(name, config, &self.options)?.into_descriptors();

        if latest.needs_resume() {
            let mut release = self.resume(latest, config, descriptors);
            let start = release.resume_index().unwrap_or(0);
            release.state = if release.version == 1 {
                ReleaseState::Installing
            } else {
                ReleaseState::Upgrading {
                    previous_version: release.version - 1,
                }
            };
            self.store.save(&release).await?;

            info!(release = name, version = release.version, start, "resuming");
            self.apply_sequence(&mut release, start, &HashSet::new())
                .await?;
            self.retire_previous(&mut release).await?;

            release.mark_active();
            self.store.save(&release).await?;
            return Ok(release);
        }

        let diff = DiffEngine::new().diff(&latest.descriptors, &descriptors)?;
        let changed: HashSet<ResourceId> = diff
            .changes
            .iter()
            .filter(|c| c.change_type != ChangeType::Removed)
            .map(|c| c.id.clone())
            .collect();
        let removed: HashSet<ResourceId> = diff
            .changes_by_type(ChangeType::Removed)
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let unchanged: HashSet<ResourceId> = descriptors
            .iter()
            .map(|d| d.id())
            .filter(|id| !changed.contains(id))
            .collect();

        let mut release = Release::for_upgrade(&latest, config.clone(), descriptors);
        self.store.save(&release).await?;

        info!(
            release = name,
            version = release.version,
            changes = %diff.summary(),
            "upgrading"
        );
        self.apply_sequence(&mut release, 0, &unchanged).await?;
        self.delete_removed(&mut release, &latest.descriptors, &removed)
            .await?;

        release.mark_active();
        self.store.save(&release).await?;

        let mut previous = latest;
        previous.mark_superseded();
        self.store.save(&previous).await?;
        Ok(release)
    }

    /// Roll back to a historical version by re-rendering its stored
    /// configuration as a new version.
    pub async fn rollback(&self, name: &str, target_version: u32) -> Result<Release> {
        let _guard = self.begin(name)?;
        let latest = self.store.get_latest(name).await?;
        let target = self.store.get(name, target_version).await?;

        // Re-render rather than replaying the stored descriptor snapshot;
        // the stored config is the source of truth.
        let descriptors = render(name, &target.config, &self.options)?.into_descriptors();

        if latest.needs_resume() {
            // A degraded release was never fully applied, so its descriptor
            // set is not a valid diff base. Resume (or restart) the apply
            // sequence with the rollback content instead.
            let mut release = self.resume(latest, &target.config, descriptors);
            let start = release.resume_index().unwrap_or(0);
            release.state = ReleaseState::RollingBack { target_version };
            self.store.save(&release).await?;

            info!(
                release = name,
                version = release.version,
                target = target_version,
                start,
                "resuming rollback"
            );
            self.apply_sequence(&mut release, start, &HashSet::new())
                .await?;
            self.retire_previous(&mut release).await?;

            release.mark_active();
            self.store.save(&release).await?;
            return Ok(release);
        }

        let diff = DiffEngine::new().diff(&latest.descriptors, &descriptors)?;
        let changed: HashSet<ResourceId> = diff
            .changes
            .iter()
            .filter(|c| c.change_type != ChangeType::Removed)
            .map(|c| c.id.clone())
            .collect();
        let removed: HashSet<ResourceId> = diff
            .changes_by_type(ChangeType::Removed)
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let unchanged: HashSet<ResourceId> = descriptors
            .iter()
            .map(|d| d.id())
            .filter(|id| !changed.contains(id))
            .collect();

        let mut release =
            Release::for_rollback(&latest, target_version, target.config.clone(), descriptors);
        self.store.save(&release).await?;

        info!(
            release = name,
            version = release.version,
            target = target_version,
            "rolling back"
        );
        self.apply_sequence(&mut release, 0, &unchanged).await?;
        self.delete_removed(&mut release, &latest.descriptors, &removed)
            .await?;

        release.mark_active();
        self.store.save(&release).await?;

        let mut previous = latest;
        previous.mark_superseded();
        self.store.save(&previous).await?;
        Ok(release)
    }

    /// Tear down a release, deleting resources in reverse apply order.
    ///
    /// With `keep_history` the version trail stays in the store with the
    /// final version marked `Absent`; otherwise all state is removed.
    pub async fn uninstall(&self, name: &str, keep_history: bool) -> Result<()> {
        let _guard = self.begin(name)?;
        let mut release = self.store.get_latest(name).await?;

        if release.state == ReleaseState::Absent {
            if !keep_history {
                self.store.delete_all(name).await?;
            }
            return Ok(());
        }

        release.mark_uninstalling();
        self.store.save(&release).await?;

        info!(release = name, version = release.version, "uninstalling");
        let descriptors = release.descriptors.clone();
        for descriptor in descriptors.iter().rev() {
            let id = descriptor.id();
            if let Err(failure) = self.orchestrator.delete(&id).await {
                warn!(release = name, resource = %id, "delete rejected");
                release.record_condition(
                    id.clone(),
                    ConditionStatus::Failed,
                    Some(failure.reason.clone()),
                );
                release.mark_degraded(None, format!("delete of {id} failed: {failure}"));
                self.store.save(&release).await?;
                return Err(DeployError::DeleteFailure {
                    resource: id,
                    reason: failure.reason,
                });
            }
            release.record_condition(id, ConditionStatus::Deleted, None);
            self.store.save(&release).await?;
        }

        release.mark_absent();
        self.store.save(&release).await?;
        if !keep_history {
            self.store.delete_all(name).await?;
        }
        Ok(())
    }

    /// Latest version snapshot of a release.
    pub async fn status(&self, name: &str) -> Result<Release> {
        self.store.get_latest(name).await
    }

    /// All versions of a release, newest first.
    pub async fn history(&self, name: &str) -> Result<Vec<Release>> {
        self.store.history(name).await
    }

    /// Latest version of every known release.
    pub async fn list(&self) -> Result<Vec<Release>> {
        self.store.list().await
    }

    /// Prepare a degraded or interrupted release for another attempt.
    ///
    /// A persisted in-flight state means a previous process died
    /// mid-transition; the condition trail recovers how far it got. If
    /// the re-rendered content still matches what the stalled version
    /// recorded, the retry resumes where it stopped. If the operator
    /// changed the configuration in between, the attempt restarts from
    /// the beginning with the new content (applies are idempotent, so
    /// re-applying the prefix is safe).
    fn resume(
        &self,
        mut degraded: Release,
        config: &ReleaseConfiguration,
        descriptors: Vec<ResourceDescriptor>,
    ) -> Release {
        if degraded.is_in_flight() {
            let last_applied = degraded.applied_prefix();
            degraded.mark_degraded(last_applied, "interrupted mid-apply".to_string());
        }
        if degraded.descriptors == descriptors {
            return degraded;
        }
        warn!(
            release = %degraded.name,
            version = degraded.version,
            "configuration changed since failure, restarting apply sequence"
        );
        degraded.config = config.clone();
        degraded.descriptors = descriptors;
        degraded.conditions.clear();
        degraded.mark_degraded(None, "restarted with new content".to_string());
        degraded
    }

    /// Retire the last fully applied version after a resumed apply.
    ///
    /// A transition that degraded partway never deleted the resources
    /// its new render dropped and never superseded the version it was
    /// replacing. Once the resumed apply completes, diff against that
    /// still-`Active` predecessor, delete what the new set no longer
    /// names, and mark it superseded.
    async fn retire_previous(&self, release: &mut Release) -> Result<()> {
        let history = self.store.history(&release.name).await?;
        let Some(mut previous) = history
            .into_iter()
            .filter(|r| r.version < release.version)
            .find(|r| r.state == ReleaseState::Active)
        else {
            return Ok(());
        };

        let current: HashSet<ResourceId> = release.descriptors.iter().map(|d| d.id()).collect();
        let removed: HashSet<ResourceId> = previous
            .descriptors
            .iter()
            .map(|d| d.id())
            .filter(|id| !current.contains(id))
            .collect();
        self.delete_removed(release, &previous.descriptors, &removed)
            .await?;

        previous.mark_superseded();
        self.store.save(&previous).await?;
        Ok(())
    }

    /// Walk the apply order from `start`, skipping identities in `skip`.
    ///
    /// Progress is saved after every resource so a crash leaves a
    /// resumable trail. On rejection the release is marked `Degraded`
    /// with the index of the last resource the orchestrator accepted.
    async fn apply_sequence(
        &self,
        release: &mut Release,
        start: usize,
        skip: &HashSet<ResourceId>,
    ) -> Result<()> {
        let descriptors = release.descriptors.clone();
        for (index, descriptor) in descriptors.iter().enumerate().skip(start) {
            let id = descriptor.id();
            if skip.contains(&id) {
                release.record_condition(id, ConditionStatus::Unchanged, None);
                self.store.save(release).await?;
                continue;
            }

            if let Err(failure) = self.orchestrator.apply(descriptor).await {
                warn!(release = %release.name, resource = %id, index, "apply rejected");
                let last_applied = if index == 0 { None } else { Some(index - 1) };
                release.record_condition(
                    id.clone(),
                    ConditionStatus::Failed,
                    Some(failure.reason.clone()),
                );
                release.mark_degraded(last_applied, format!("apply of {id} failed: {failure}"));
                self.store.save(release).await?;
                return Err(DeployError::ApplyFailure {
                    index,
                    resource: id,
                    reason: failure.reason,
                });
            }

            release.record_condition(id, ConditionStatus::Applied, None);
            self.store.save(release).await?;
        }
        Ok(())
    }

    /// Delete descriptors dropped by an upgrade, in reverse dependency
    /// order of the previous version's apply sequence.
    async fn delete_removed(
        &self,
        release: &mut Release,
        previous: &[ResourceDescriptor],
        removed: &HashSet<ResourceId>,
    ) -> Result<()> {
        for descriptor in previous.iter().rev() {
            let id = descriptor.id();
            if !removed.contains(&id) {
                continue;
            }
            if let Err(failure) = self.orchestrator.delete(&id).await {
                warn!(release = %release.name, resource = %id, "delete rejected");
                release.record_condition(
                    id.clone(),
                    ConditionStatus::Failed,
                    Some(failure.reason.clone()),
                );
                let last = release.descriptors.len().checked_sub(1);
                release.mark_degraded(last, format!("delete of {id} failed: {failure}"));
                self.store.save(release).await?;
                return Err(DeployError::DeleteFailure {
                    resource: id,
                    reason: failure.reason,
                });
            }
            release.record_condition(id, ConditionStatus::Deleted, None);
            self.store.save(release).await?;
        }
        Ok(())
    }
}
