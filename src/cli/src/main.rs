//! Housing CLI - command-line client for the housing portal identity API.
//!
//! Provides commands for registration, login, student profiles, health, and
//! configuration management.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{auth, config, health, student};
use output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "housing",
    version,
    about = "Housing portal identity and access CLI",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "HOUSING_API_URL")]
    api_url: Option<String>,

    /// Bearer token; defaults to the one stored by `auth login`
    #[arg(long, global = true, env = "HOUSING_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Registration, login and session
    #[command(subcommand)]
    Auth(auth::AuthCommands),

    /// Student profiles
    #[command(subcommand)]
    Student(student::StudentCommands),

    /// Check server health
    Health(health::HealthArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .or_else(config::load_api_url)
        .unwrap_or_else(|| "http://localhost:8080".to_string());
    let token = cli.token.clone().or_else(config::load_token);

    let client = client::ApiClient::new(&api_url, token)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Auth(cmd) => auth::execute(cmd, &client, format).await,
        Commands::Student(cmd) => student::execute(cmd, &client, format).await,
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        let code = e
            .downcast_ref::<client::ClientError>()
            .and_then(|err| err.code());
        if matches!(code, Some("MISSING_CREDENTIALS" | "INVALID_TOKEN")) {
            output::print_info("Run `housing auth login <username>` to start a new session.");
        }
        std::process::exit(1);
    }

    Ok(())
}
