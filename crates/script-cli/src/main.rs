//! `script-run`: run shell scripts under supervision and stream their output

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use script_executor::config::{self, Config};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "script-run")]
#[command(about = "Run shell scripts and stream their output piece by piece")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace). Defaults to RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an inline command
    Exec(commands::exec::ExecArgs),

    /// Run a named script from a configuration file
    Run {
        /// Script name
        name: String,

        /// Configuration file path
        #[arg(short, long, default_value = "scripts.yaml")]
        config: PathBuf,
    },

    /// List the scripts of a configuration file
    List {
        /// Configuration file path
        #[arg(short, long, default_value = "scripts.yaml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let Cli { log_level, command } = Cli::parse();
    let log_level = log_level.as_deref();

    let code = smol::block_on(async {
        match command {
            Commands::Exec(args) => {
                init_logging(log_level, None);
                commands::exec::run(args).await
            }
            Commands::Run { name, config } => {
                let config = load_config(&config)?;
                init_logging(log_level, config.settings.log_level.as_deref());
                commands::run::run(&config, &name).await
            }
            Commands::List { config } => {
                let config = load_config(&config)?;
                init_logging(log_level, config.settings.log_level.as_deref());
                commands::list::run(&config);
                Ok(0)
            }
        }
    })?;

    std::process::exit(code)
}

fn load_config(path: &Path) -> Result<Config> {
    config::parse_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Logs go to stderr so they never mix with streamed stdout pieces.
///
/// The flag wins over `RUST_LOG`, which wins over the configured level.
fn init_logging(flag: Option<&str>, configured: Option<&str>) {
    let filter = match flag {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or("warn"))),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
