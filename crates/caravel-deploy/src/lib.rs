//! Caravel Deploy - Release lifecycle management
//!
//! Drives rendered descriptor sets through their lifecycle:
//! - `ReleaseManager`: install / upgrade / rollback / uninstall with
//!   halt-and-resume semantics
//! - `Orchestrator`: the collaborator interface that applies resources
//! - `StateStore`: durable release state (`FileStore`, `MemoryStore`)
//! - `InstanceTracker`: probe-driven workload health interpretation

pub mod error;
pub mod health;
pub mod manager;
pub mod orchestrator;
pub mod release;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{DeployError, Result};
pub use health::{InstanceHealth, InstanceTracker, ProbeKind, ProbeOutcome, ProbeResult};
pub use manager::ReleaseManager;
pub use orchestrator::{DirOrchestrator, MockOrchestrator, OrchestrationFailure, Orchestrator};
pub use release::{ConditionStatus, Release, ReleaseState, ResourceCondition};
pub use store::{FileStore, MemoryStore, StateStore};
