use clap::Parser;
use tracing::debug;
use vault_agent::cli::{self, Cli, Commands};
use vault_agent::config::Config;
use vault_agent::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    if let Commands::Version = cli.command {
        println!("vault-agent {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(config_path)?;
    logging::init(&config.logging);
    debug!(vault = %config.vault_root().display(), "configuration loaded");

    match cli.command {
        Commands::Index => cli::run_index(config).await?,
        Commands::Sync => cli::run_sync(config).await?,
        Commands::Ask(opts) => cli::run_ask(config, &opts.message, opts.approve).await?,
        Commands::Chat(opts) => cli::run_chat(config, opts.approve).await?,
        Commands::Watch => cli::run_watch(config).await?,
        Commands::Stats => cli::run_stats(config).await?,
        Commands::Config(opts) => cli::run_config(&config, config_path, &opts.action)?,
        Commands::Version => {}
    }

    Ok(())
}
