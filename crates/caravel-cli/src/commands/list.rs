//! List command

use console::style;

use crate::commands::Environment;
use crate::display;
use crate::error::Result;

pub async fn run(env: &Environment) -> Result<()> {
    let manager = env.manager()?;
    let releases = manager.list().await?;
    if releases.is_empty() {
        println!("{}", style("no releases installed").dim());
        return Ok(());
    }
    display::print_release_table(&releases);
    Ok(())
}
