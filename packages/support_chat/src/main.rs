use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::prelude::*;

use support_chat::cli;
use support_chat::config::SupportChatConfig;

#[derive(Parser)]
#[command(name = "support-chat")]
#[command(about = "Chat with a support agent from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom data directory (defaults to ~/.support-chat)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current chat session
    Status(OutputArgs),

    /// Print the messages of the current chat session
    History(OutputArgs),

    /// End the current chat session
    End,
}

#[derive(Parser)]
struct OutputArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SupportChatConfig::new(cli.data_dir.clone())?;
    // The interactive chat owns stdout, so its logs go to a file.
    init_logging(&config, cli.debug, cli.command.is_none())?;

    let fc = config.file_config()?;
    debug!(?fc.service, "loaded configuration");

    match cli.command {
        None => cli::chat_command(&fc).await,
        Some(Commands::Status(args)) => cli::status_command(&fc, args.json).await,
        Some(Commands::History(args)) => cli::history_command(&fc, args.json).await,
        Some(Commands::End) => cli::end_command(&fc).await,
    }
}

fn init_logging(config: &SupportChatConfig, debug: bool, to_file: bool) -> Result<()> {
    let default_directive = if debug {
        "support_chat=debug,chat_sync=debug,info"
    } else {
        "support_chat=info,chat_sync=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if to_file {
        let path = config.chat_log_path();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    }
    Ok(())
}
