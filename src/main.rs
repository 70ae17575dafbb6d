use std::path::PathBuf;

use clap::{Parser, Subcommand};
use manual_qa::Result;
use manual_qa::commands::{ask_question, chat, discard_manual, load_manual, show_status};
use manual_qa::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "manual-qa")]
#[command(about = "Ask questions about a PDF product manual, answered from its own pages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index a PDF manual and make it the active one
    Load {
        /// Path to the PDF file
        path: PathBuf,
    },
    /// Ask a single question about the active manual
    Ask {
        /// The question to answer
        question: String,
    },
    /// Start an interactive question loop
    Chat,
    /// Show the active manual and index details
    Status,
    /// Remove the active manual, its upload and its index
    Discard,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Load { path } => {
            load_manual(&path).await?;
        }
        Commands::Ask { question } => {
            ask_question(&question).await?;
        }
        Commands::Chat => {
            chat().await?;
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Discard => {
            discard_manual()?;
        }
    }

    Ok(())
}
