//! Main entry point for the Writescape CLI.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{Writescape, tracer::initialize_tracing};
use dotenv::dotenv;
use shared::config::ClientConfig;
use url::Url;

mod commands;
mod output;

/// Writescape CLI
#[derive(Parser)]
#[command(name = "writescape", version)]
#[command(about = "Command-line client for the Writescape social blogging platform", long_about = None)]
struct Cli {
    /// Path to the configuration file (optional)
    #[arg(
        long,
        short,
        global = true,
        help = "Path to the configuration file (e.g., writescape.yaml, .json or .toml). If not provided, defaults will be used."
    )]
    config: Option<PathBuf>,

    /// Backend base URL overriding the configuration
    #[arg(
        long,
        global = true,
        help = "Backend base URL overriding the configuration (e.g., http://localhost:8080)"
    )]
    backend: Option<Url>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the Writescape CLI
#[derive(Subcommand)]
enum Commands {
    /// Log in, log out, register or show the current user
    #[command(subcommand)]
    Session(commands::session::SessionCommand),

    /// Create, show, edit or delete posts
    #[command(subcommand)]
    Post(commands::post::PostCommand),

    /// Show profiles and manage follows
    #[command(subcommand)]
    Profile(commands::profile::ProfileCommand),

    /// Show posts from the users you follow
    Feed,

    /// Search posts by title and body
    Search {
        /// Search term
        #[arg(required = true, num_args = 1.., help = "Words to search for")]
        term: Vec<String>,
    },

    /// Join the live chat; type messages and press enter, `/quit` to leave
    Chat,

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate
        #[arg(
            long,
            short,
            default_value = "yaml",
            help = "Format of the configuration file to generate (yaml, json or toml)."
        )]
        format: String,

        /// Write to this path instead of stdout
        #[arg(long, short, help = "Write the configuration to this path instead of stdout")]
        output: Option<PathBuf>,
    },

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script
        #[arg(
            long,
            short,
            help = "The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)"
        )]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { format, output } => {
            commands::config::generate_config(&format, output.as_deref())
        }
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
            Ok(())
        }
        command => {
            let config = ClientConfig::load_config(cli.config.as_deref(), cli.backend)
                .context("failed to load configuration")?;
            initialize_tracing(&config.logging);
            let app = Writescape::from_config(&config)
                .context("failed to start the Writescape client")?;

            let result = run(&app, command).await;
            output::print_flash_messages(app.session());
            app.shutdown().await;
            result
        }
    }
}

async fn run(app: &Writescape, command: Commands) -> Result<()> {
    match command {
        Commands::Session(command) => commands::session::run(app, command).await,
        Commands::Post(command) => commands::post::run(app, command).await,
        Commands::Profile(command) => commands::profile::run(app, command).await,
        Commands::Feed => commands::browse::feed(app).await,
        Commands::Search { term } => commands::browse::search(app, &term.join(" ")).await,
        Commands::Chat => commands::chat::run(app).await,
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}
