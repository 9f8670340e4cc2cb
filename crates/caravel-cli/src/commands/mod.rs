//! Command implementations

pub mod history;
pub mod install;
pub mod list;
pub mod render;
pub mod rollback;
pub mod status;
pub mod uninstall;
pub mod upgrade;

use std::path::{Path, PathBuf};

use caravel_core::ReleaseConfiguration;
use caravel_deploy::{DirOrchestrator, FileStore, ReleaseManager};
use caravel_render::RenderOptions;

use crate::error::{CliError, Result};

/// Paths and options shared by every command invocation.
pub struct Environment {
    /// Directory holding durable release state
    pub state_dir: PathBuf,

    /// Directory the orchestrator materializes resources into
    pub target_dir: PathBuf,

    /// Host substituted into externally-exposed workload URLs
    pub external_host: String,
}

impl Environment {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            external_host: self.external_host.clone(),
            ..Default::default()
        }
    }

    pub fn manager(&self) -> Result<ReleaseManager<FileStore, DirOrchestrator>> {
        let store = FileStore::new(&self.state_dir)?;
        let orchestrator = DirOrchestrator::new(&self.target_dir)?;
        Ok(ReleaseManager::new(store, orchestrator, self.render_options()))
    }
}

/// Load and parse a release configuration file.
pub fn load_config(path: &Path) -> Result<ReleaseConfiguration> {
    let raw = std::fs::read_to_string(path).map_err(|e| CliError::Io {
        message: format!("{}: {e}", path.display()),
    })?;
    Ok(ReleaseConfiguration::from_yaml(&raw)?)
}
