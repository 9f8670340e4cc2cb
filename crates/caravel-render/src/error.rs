//! Error types for rendering

use caravel_core::{CoreError, ResourceId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenderError {
    /// Validation, resolution or reference errors from the core model
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The dependency graph contains a cycle
    ///
    /// The fixed schema cannot express a cycle, so this is a builder
    /// defect, not a user input error. Fatal.
    #[error("internal error: dependency cycle in apply graph involving {id}")]
    DependencyCycle { id: ResourceId },

    /// Two descriptors were built with the same identity
    #[error("internal error: duplicate descriptor identity {id}")]
    DuplicateIdentity { id: ResourceId },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}
