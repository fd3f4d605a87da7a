//! tracedrop CLI - Command-line front end for the crash reporter
//!
//! Provides commands for:
//! - Submitting crash traces left by earlier runs
//! - Crashing on purpose to produce a trace
//! - Inspecting and editing the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracedrop_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod observer;
mod output;

use commands::{config::ConfigCommand, crash::CrashCommand, submit::SubmitCommand};
use output::OutputFormat;

/// Package name crash files are written under
pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, Parser)]
#[command(name = "tracedrop", version, about = "Record crashes and deliver them on the next run")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send crash traces left by earlier runs
    Submit(SubmitCommand),
    /// Crash on purpose so the next submit has something to send
    Crash(CrashCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let level = match cli.verbose {
        0 => Config::load_or_default(&config_path).logging.level,
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = GlobalArgs {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        quiet: cli.quiet,
        config_path,
    };

    match cli.command {
        Commands::Submit(cmd) => cmd.execute(&args).await,
        Commands::Crash(cmd) => cmd.execute(&args).await,
        Commands::Config(cmd) => cmd.execute(&args).await,
    }
}
