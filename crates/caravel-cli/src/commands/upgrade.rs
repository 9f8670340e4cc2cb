//! Upgrade command

use std::path::Path;

use console::style;

use crate::commands::{load_config, Environment};
use crate::display;
use crate::error::Result;

pub async fn run(name: &str, config_path: &Path, env: &Environment) -> Result<()> {
    let config = load_config(config_path)?;
    let manager = env.manager()?;

    let release = manager.upgrade(name, &config).await?;

    println!(
        "{} upgraded release {} to version {}",
        style("✓").green(),
        style(&release.name).bold(),
        release.version
    );
    display::print_release(&release);
    Ok(())
}
