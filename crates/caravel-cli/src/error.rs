//! CLI error type with exit code mapping.

use miette::Diagnostic;
use thiserror::Error;

use caravel_core::CoreError;
use caravel_deploy::DeployError;
use caravel_render::RenderError;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// The configuration failed schema validation
    #[error("Validation failed: {message}")]
    #[diagnostic(code(caravel::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Rendering failed after validation (resolution, building, ordering)
    #[error("Render error: {message}")]
    #[diagnostic(code(caravel::cli::render))]
    Render { message: String },

    /// A lifecycle transition halted mid-sequence
    #[error("Apply failed: {message}")]
    #[diagnostic(code(caravel::cli::apply))]
    Apply {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The named release or version does not exist
    #[error("{message}")]
    #[diagnostic(code(caravel::cli::not_found))]
    NotFound { message: String },

    /// Another operation on the release is in flight
    #[error("{message}")]
    #[diagnostic(code(caravel::cli::busy))]
    Busy { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(caravel::cli::io))]
    Io { message: String },

    /// Wrapped error for passthrough
    #[error("{message}")]
    #[diagnostic(code(caravel::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Render { .. } => exit_codes::RENDER_ERROR,
            CliError::Apply { .. } => exit_codes::APPLY_ERROR,
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Busy { .. } => exit_codes::BUSY,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Schema { .. } => CliError::Validation {
                message: err.to_string(),
                help: Some("fix the reported fields in the configuration file".to_string()),
            },
            CoreError::UnresolvedReference { .. } | CoreError::CrossReferenceConflict { .. } => {
                CliError::Render {
                    message: err.to_string(),
                }
            }
            CoreError::YamlParse(e) => CliError::Validation {
                message: format!("configuration is not valid YAML: {e}"),
                help: None,
            },
            CoreError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            other => CliError::other(other.to_string()),
        }
    }
}

impl From<RenderError> for CliError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Core(core) => core.into(),
            other => CliError::Render {
                message: other.to_string(),
            },
        }
    }
}

impl From<DeployError> for CliError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Render(render) => render.into(),
            DeployError::ApplyFailure { .. } | DeployError::DeleteFailure { .. } => {
                CliError::Apply {
                    message: err.to_string(),
                    help: Some(
                        "the release is degraded; re-run the same command to resume".to_string(),
                    ),
                }
            }
            DeployError::ReleaseBusy { .. } => CliError::Busy {
                message: err.to_string(),
            },
            DeployError::ReleaseNotFound { .. } | DeployError::VersionNotFound { .. } => {
                CliError::NotFound {
                    message: err.to_string(),
                }
            }
            DeployError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            other => CliError::other(other.to_string()),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
