//! Render command - produce the descriptor set without applying it

use std::fs;
use std::path::Path;

use console::style;

use caravel_render::render;

use crate::commands::{load_config, Environment};
use crate::error::Result;

pub fn run(
    name: &str,
    config_path: &Path,
    output_dir: Option<&Path>,
    env: &Environment,
) -> Result<()> {
    let config = load_config(config_path)?;
    let output = render(name, &config, &env.render_options())?;

    match output_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            for descriptor in output.descriptors() {
                let id = descriptor.id();
                let file = dir.join(format!(
                    "{}-{}.yaml",
                    id.kind.to_string().to_lowercase(),
                    id.name
                ));
                fs::write(&file, descriptor.to_redacted_yaml()?)?;
            }
            eprintln!(
                "{} wrote {} descriptors to {}",
                style("✓").green(),
                output.descriptors().len(),
                dir.display()
            );
        }
        None => {
            // Secret values are redacted; the wire form only ever goes
            // to an orchestrator, never to a terminal.
            print!("{}", output.to_multidoc_yaml()?);
        }
    }
    Ok(())
}
