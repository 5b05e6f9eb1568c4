use anyhow::Result;
use clap::{Parser, Subcommand};
use textserve_cli::{exit_code, run_tokenize, TokenizeArgs};
use tracing::info;

#[derive(Parser)]
#[command(name = "textserve-cli")]
#[command(about = "Batch tokenization with the textserve serving core")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Tokenize input texts into fixed-length id sequences
    Tokenize(TokenizeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tokenize(args) => {
            if args.debug {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::WARN)
                    .init();
            }

            if args.debug {
                info!("Starting textserve-cli tokenize");
                info!("Vocabulary: {}", args.vocabulary);
                info!("Input: {:?}", args.input);
                info!("Output: {:?}", args.output);
                info!("Max length: {}", args.max_length);
            }

            match run_tokenize(args).await {
                Ok(_summary) => std::process::exit(0),
                Err(e) => {
                    let code = exit_code(&e);
                    match code {
                        2 => eprintln!("Error: {}", e),
                        3 => eprintln!("Vocabulary Error: {}", e),
                        _ => eprintln!("Runtime Error: {}", e),
                    }
                    std::process::exit(code);
                }
            }
        }
    }
}
