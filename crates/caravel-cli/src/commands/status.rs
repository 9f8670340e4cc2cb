//! Status command

use crate::commands::Environment;
use crate::display;
use crate::error::Result;

pub async fn run(name: &str, env: &Environment) -> Result<()> {
    let manager = env.manager()?;
    let release = manager.status(name).await?;
    display::print_release(&release);
    Ok(())
}
