///! Swarmvet CLI
///!
///! Command-line interface for cluster health checks and convergence
///! verification

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Control plane API address (overrides config file)
    #[arg(short, long)]
    server: Option<String>,

    /// Config file path (defaults to ~/.config/swarmvet/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format (text, table, json, yaml)
    #[arg(short, long, default_value = "text")]
    output: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cluster health check pipeline and exit 0/1/2 by severity
    Check,
    /// Verify that an entity has converged on its desired state
    Verify {
        /// Entity kind (node, service, network, volume, probe)
        kind: String,
        /// Entity identifier
        id: String,
        /// Maximum verification attempts (overrides config)
        #[arg(long)]
        attempts: Option<u32>,
        /// Base backoff delay in seconds (overrides config)
        #[arg(long)]
        base_delay: Option<u64>,
        /// Maximum backoff delay in seconds (overrides config)
        #[arg(long)]
        max_delay: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            output::print_error(&format!("{:#}", err));
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let mut health_config = config::load(cli.config.as_deref())?;
    if let Some(server) = &cli.server {
        health_config.endpoint = server.clone();
    }
    let format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Check => commands::check::handle_check_command(&health_config, format).await,
        Commands::Verify {
            kind,
            id,
            attempts,
            base_delay,
            max_delay,
        } => {
            commands::verify::handle_verify_command(
                &health_config,
                &kind,
                &id,
                attempts,
                base_delay,
                max_delay,
            )
            .await
        }
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
