//! Uninstall command

use console::style;

use crate::commands::Environment;
use crate::error::Result;

pub async fn run(name: &str, keep_history: bool, env: &Environment) -> Result<()> {
    let manager = env.manager()?;
    manager.uninstall(name, keep_history).await?;

    println!(
        "{} uninstalled release {}",
        style("✓").green(),
        style(name).bold()
    );
    if keep_history {
        println!(
            "  {}",
            style("release history kept, reinstall will continue the version sequence").dim()
        );
    }
    Ok(())
}
