//! History command

use console::style;

use crate::commands::Environment;
use crate::display;
use crate::error::Result;

pub async fn run(name: &str, env: &Environment) -> Result<()> {
    let manager = env.manager()?;
    let releases = manager.history(name).await?;
    println!("History of {}:", style(name).bold());
    display::print_history(&releases);
    Ok(())
}
