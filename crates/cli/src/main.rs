// Agentchat CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Logs go to stderr so the transcript on stdout stays clean.

mod commands;
mod output;
mod render;
mod script;

use std::path::PathBuf;

use agentchat_core::{init_logging, ChatConfig, LoggingConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agentchat")]
#[command(about = "Agentchat CLI - Chat with an agent and replay recorded response streams")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    /// Tool titles TOML file (overrides AGENTCHAT_TOOL_TITLES)
    #[arg(long)]
    pub titles: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat (type /exit to quit, /reset for a new conversation)
    Chat {
        /// Answer from a recorded script instead of echoing input
        #[arg(long, short)]
        script: Option<PathBuf>,
    },

    /// Feed a recorded script through a session and print the transcript
    Replay {
        /// Script file (.json, .yaml or .yml)
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if cli.quiet {
        logging = logging.with_filter("error");
    }
    init_logging(logging);

    let mut config = ChatConfig::from_env()?;
    if cli.titles.is_some() {
        config.tool_titles_path = cli.titles.clone();
    }

    let output_format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Chat { script } => {
            commands::chat::run(&config, output_format, cli.quiet, script).await
        }
        Commands::Replay { file } => {
            commands::replay::run(&config, output_format, cli.quiet, &file).await
        }
    }
}
