//! Fewshot CLI
//!
//! Main entry point for the fewshot command-line tool.
//! Steers a chat model with few-shot examples and reusable prompt templates.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{
    AskCommand, ChatCommand, ComposeCommand, ExamplesCommand, InitCommand, StatusCommand,
    TemplatesCommand,
};
use fewshot_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// Fewshot - steer a chat model with examples instead of instructions
#[derive(Parser, Debug)]
#[command(name = "fewshot")]
#[command(about = "Steer a chat model with few-shot examples and prompt templates", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "FEWSHOT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "FEWSHOT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Model provider (gemini, ollama, scripted)
    #[arg(short, long, global = true, env = "FEWSHOT_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "FEWSHOT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage few-shot examples
    Examples(ExamplesCommand),

    /// Manage prompt templates
    Templates(TemplatesCommand),

    /// Preview the composed message list
    Compose(ComposeCommand),

    /// Send one message and print the reply
    Ask(AskCommand),

    /// Chat interactively with the model
    Chat(ChatCommand),

    /// Show collection counts and storage details
    Status(StatusCommand),

    /// Prepare the workspace and write the default style file
    Init(InitCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load configuration from the workspace the flags point at
    let config = AppConfig::load_with(cli.workspace.clone(), cli.config.clone())
        .context("Failed to load configuration")?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)
        .context("Failed to initialize logging")?;

    tracing::info!("Fewshot CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Examples(_) => "examples",
        Commands::Templates(_) => "templates",
        Commands::Compose(_) => "compose",
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Status(_) => "status",
        Commands::Init(_) => "init",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Examples(cmd) => cmd.execute(&config).await,
        Commands::Templates(cmd) => cmd.execute(&config).await,
        Commands::Compose(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Status(cmd) => cmd.execute(&config).await,
        Commands::Init(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result.with_context(|| format!("fewshot {} failed", command_name))
}
