//! Bolty CLI, the main entry point.
//!
//! Commands:
//! - `init`      Create the config file and workspace directory
//! - `generate`  Run one prompt through the generation pipeline
//! - `models`    List models the backend currently advertises
//! - `history`   Show a project's stored conversation
//! - `config`    Show, locate or validate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "bolty",
    about = "Bolty: turn a prompt into project files and commands",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Use this config file instead of ~/.bolty/config.toml
    #[arg(short, long, global = true, env = "BOLTY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file and workspace directory
    Init,

    /// Generate project files from a prompt
    Generate {
        /// What to build
        prompt: String,

        /// Project the conversation and files belong to
        #[arg(short, long, default_value = "default")]
        project: String,

        /// Model to try before the configured list (repeatable)
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// react, nextjs or react-native
        #[arg(short = 't', long)]
        project_type: Option<String>,

        /// Print the full model response
        #[arg(long)]
        print: bool,
    },

    /// List models the backend currently advertises
    Models,

    /// Show a project's conversation history
    History {
        /// Project id
        #[arg(default_value = "default")]
        project: String,

        /// Print turns as JSON lines
        #[arg(long)]
        json: bool,

        /// Show full turn text instead of a preview
        #[arg(long)]
        full: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Check the configuration for errors
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init => commands::init::run(config_path).await?,
        Commands::Generate {
            prompt,
            project,
            models,
            project_type,
            print,
        } => {
            let args = commands::generate::GenerateArgs {
                prompt,
                project,
                models,
                project_type,
                print,
            };
            commands::generate::run(config_path, args).await?
        }
        Commands::Models => commands::models::run(config_path).await?,
        Commands::History {
            project,
            json,
            full,
        } => commands::history::run(config_path, &project, json, full).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
        },
    }

    Ok(())
}
