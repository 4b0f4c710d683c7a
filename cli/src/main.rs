//! Subword CLI - train and apply BPE subword models.

mod commands;

use clap::{Parser, Subcommand};
use commands::{EncodeCommand, TrainCommand};

#[derive(Parser)]
#[command(name = "subword")]
#[command(about = "BPE subword tokenization for machine translation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn a subword model from parallel corpora
    Train(TrainCommand),
    /// Encode text into subword units with a trained model
    Encode(EncodeCommand),
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train(cmd) => commands::train::run(cmd)?,
        Commands::Encode(cmd) => commands::encode::run(cmd)?,
    }

    Ok(())
}
