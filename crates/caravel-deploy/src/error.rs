//! Error types for release lifecycle management

use caravel_core::ResourceId;
use caravel_render::RenderError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeployError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeployError {
    /// Rendering the configuration failed before anything was applied
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The orchestrator rejected a resource mid-sequence
    ///
    /// The release is left `Degraded`; re-invoking the same lifecycle
    /// call resumes from the resource after the last applied index.
    #[error("failed to apply {resource} (position {index} in apply order): {reason}")]
    ApplyFailure {
        index: usize,
        resource: ResourceId,
        reason: String,
    },

    /// The orchestrator rejected a resource deletion
    #[error("failed to delete {resource}: {reason}")]
    DeleteFailure { resource: ResourceId, reason: String },

    /// Another lifecycle transition is already in flight for this release
    #[error("release '{name}' has an operation in progress, try again later")]
    ReleaseBusy { name: String },

    #[error("release '{name}' not found")]
    ReleaseNotFound { name: String },

    #[error("release '{name}' already exists (version {version}); use upgrade instead")]
    ReleaseAlreadyExists { name: String, version: u32 },

    #[error("release '{name}' has no version {version}")]
    VersionNotFound { name: String, version: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
