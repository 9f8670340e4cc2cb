//! Caravel CLI - typed release configuration rendering and deployment

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod display;
mod error;
mod exit_codes;

use commands::Environment;

#[derive(Parser)]
#[command(name = "caravel")]
#[command(author = "Caravel Contributors")]
#[command(version)]
#[command(about = "Typed configuration rendering and release lifecycle manager", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding durable release state
    #[arg(long, global = true, env = "CARAVEL_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Directory applied resources are materialized into
    #[arg(long, global = true, env = "CARAVEL_TARGET_DIR")]
    target_dir: Option<PathBuf>,

    /// Host substituted into externally-exposed workload URLs
    #[arg(long, global = true, env = "CARAVEL_EXTERNAL_HOST", default_value = "localhost")]
    external_host: String,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the descriptor set for a configuration without applying it
    Render {
        /// Release name
        name: String,

        /// Release configuration file
        #[arg(short = 'f', long = "config")]
        config: PathBuf,

        /// Output directory (if not set, outputs to stdout)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Install a new release
    Install {
        /// Release name
        name: String,

        /// Release configuration file
        #[arg(short = 'f', long = "config")]
        config: PathBuf,
    },

    /// Upgrade an existing release to a new configuration
    Upgrade {
        /// Release name
        name: String,

        /// Release configuration file
        #[arg(short = 'f', long = "config")]
        config: PathBuf,
    },

    /// Roll a release back to the content of an earlier version
    Rollback {
        /// Release name
        name: String,

        /// Version to roll back to
        version: u32,
    },

    /// Uninstall a release
    Uninstall {
        /// Release name
        name: String,

        /// Keep recorded history after removal
        #[arg(long)]
        keep_history: bool,
    },

    /// Show the current state of a release
    Status {
        /// Release name
        name: String,
    },

    /// Show the version history of a release
    History {
        /// Release name
        name: String,
    },

    /// List all releases
    List,
}

fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("caravel")
        .join("releases")
}

fn default_target_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("caravel")
        .join("resources")
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    if cli.debug {
        // SAFETY: We're the only thread at this point (start of main)
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }

    let env = Environment {
        state_dir: cli.state_dir.unwrap_or_else(default_state_dir),
        target_dir: cli.target_dir.unwrap_or_else(default_target_dir),
        external_host: cli.external_host,
    };

    let result = match cli.command {
        Commands::Render {
            name,
            config,
            output_dir,
        } => commands::render::run(&name, &config, output_dir.as_deref(), &env),

        Commands::Install { name, config } => commands::install::run(&name, &config, &env).await,

        Commands::Upgrade { name, config } => commands::upgrade::run(&name, &config, &env).await,

        Commands::Rollback { name, version } => {
            commands::rollback::run(&name, version, &env).await
        }

        Commands::Uninstall { name, keep_history } => {
            commands::uninstall::run(&name, keep_history, &env).await
        }

        Commands::Status { name } => commands::status::run(&name, &env).await,

        Commands::History { name } => commands::history::run(&name, &env).await,

        Commands::List => commands::list::run(&env).await,
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
