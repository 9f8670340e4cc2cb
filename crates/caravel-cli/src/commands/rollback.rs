//! Rollback command

use console::style;

use crate::commands::Environment;
use crate::display;
use crate::error::Result;

pub async fn run(name: &str, target_version: u32, env: &Environment) -> Result<()> {
    let manager = env.manager()?;
    let release = manager.rollback(name, target_version).await?;

    println!(
        "{} rolled back release {} to the content of version {} (now version {})",
        style("✓").green(),
        style(&release.name).bold(),
        target_version,
        release.version
    );
    display::print_release(&release);
    Ok(())
}
