mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vault-agent",
    version,
    about = "Read-only question answering over a Markdown vault"
)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the semantic index from scratch.
    Index,
    /// Re-index new and modified documents only.
    Sync,
    /// Ask a single question and print the answer.
    Ask(AskOpts),
    /// Interactive conversation; `/reset` starts over, `/quit` leaves.
    Chat(ChatOpts),
    /// Keep the index up to date while the vault changes.
    Watch,
    /// Print index statistics.
    Stats,
    Config(ConfigOpts),
    Version,
}

#[derive(clap::Args)]
pub struct AskOpts {
    pub message: String,
    /// Let the model ask for approval on the terminal.
    #[arg(long)]
    pub approve: bool,
}

#[derive(clap::Args)]
pub struct ChatOpts {
    #[arg(long)]
    pub approve: bool,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}
