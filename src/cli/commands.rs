use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::agents::{embedding_cost, ConsoleApproval, TurnOutcome, TurnReport};
use crate::collection::{watch, FsCollection};
use crate::config::{validate_config, validate_config_object, validate_credentials, Config};
use crate::hooks::{HookEvent, HookRegistry, TOOL_CALL_STARTED};
use crate::memory::{
    read_snapshot, DocumentOutcome, IndexSettings, IndexWatcher, LoadOutcome,
    OpenAiEmbeddingProvider, VectorIndex,
};
use crate::sessions::AgentSession;

use super::ConfigAction;

// ============================================================================
// Runtime
// ============================================================================

/// The vault, its index, and the configuration they came from.
pub struct Runtime {
    pub config: Config,
    pub collection: Arc<FsCollection>,
    pub index: Arc<VectorIndex>,
}

impl Runtime {
    /// Wire up the collection and an empty index. Credentials are checked
    /// here, before anything touches the network.
    pub fn new(config: Config) -> Result<Self> {
        validate_config_object(&config)?;
        let api_key = validate_credentials(&config).context("invalid OpenAI credentials")?;
        let collection = Arc::new(FsCollection::new(config.vault_root())?);
        let embedder = Arc::new(OpenAiEmbeddingProvider::new(
            api_key,
            Some(config.openai.base_url.clone()),
            Some(config.embedding.model.clone()),
        ));
        let settings = IndexSettings {
            chunk_size: config.index.chunk_size,
            chunk_overlap: config.index.chunk_overlap,
            batch_size: config.embedding.batch_size,
            snapshot_path: Some(config.snapshot_path()),
        };
        let index = Arc::new(VectorIndex::new(collection.clone(), embedder, settings));

        Ok(Self {
            config,
            collection,
            index,
        })
    }

    /// Like [`Runtime::new`], then restore the last snapshot if there is one.
    pub async fn load(config: Config) -> Result<Self> {
        let runtime = Self::new(config)?;
        match runtime.index.load_snapshot().await {
            LoadOutcome::Loaded { documents, chunks } => {
                info!(documents, chunks, "using saved index");
            }
            LoadOutcome::Missing => {
                warn!("no saved index; run `vault-agent index` to enable semantic search");
            }
            LoadOutcome::Failed(reason) => {
                warn!(error = %reason, "saved index unusable; run `vault-agent index` to rebuild it");
            }
        }
        Ok(runtime)
    }

    pub fn session(&self, approve: bool) -> Result<AgentSession> {
        let session = AgentSession::from_config(&self.config, self.index.clone())?
            .with_hooks(progress_hooks());
        Ok(if approve {
            session.with_approval(Arc::new(ConsoleApproval))
        } else {
            session
        })
    }
}

/// Hooks that narrate tool calls on stderr.
fn progress_hooks() -> HookRegistry {
    let mut hooks = HookRegistry::new();
    hooks.on(
        TOOL_CALL_STARTED,
        Arc::new(|event| {
            if let HookEvent::ToolCallStarted {
                name, arguments, ..
            } = event
            {
                eprintln!("  -> {name} {arguments}");
            }
        }),
    );
    hooks
}

// ============================================================================
// Commands
// ============================================================================

pub async fn run_index(config: Config) -> Result<()> {
    let runtime = Runtime::new(config)?;
    let total_chars = std::sync::atomic::AtomicUsize::new(0);

    let report = runtime
        .index
        .rebuild_with_progress(|progress| {
            let status = match &progress.outcome {
                DocumentOutcome::Indexed { chunks } => format!("{chunks} chunks"),
                DocumentOutcome::Skipped { .. } => "empty".to_string(),
                DocumentOutcome::Failed(reason) => format!("failed: {reason}"),
            };
            eprintln!(
                "[{}/{}] {} ({status})",
                progress.completed, progress.total, progress.path
            );
            if let Some(entry) = runtime.index.entry(&progress.path) {
                let chars: usize = entry.chunks.iter().map(|c| c.text.chars().count()).sum();
                total_chars.fetch_add(chars, std::sync::atomic::Ordering::Relaxed);
            }
        })
        .await?;

    let cost = embedding_cost(
        total_chars.into_inner(),
        &runtime.config.agent.pricing,
    );
    println!(
        "Indexed {} of {} documents ({} empty, {} failed, {} removed). Estimated embedding cost: ${cost:.4}",
        report.succeeded, report.total, report.skipped, report.failed, report.removed
    );
    if report.succeeded == 0 && report.total > 0 {
        bail!("no document could be indexed; see the log for details");
    }
    Ok(())
}

pub async fn run_sync(config: Config) -> Result<()> {
    let runtime = Runtime::load(config).await?;
    let report = runtime.index.sync().await?;
    println!(
        "Sync: {} indexed, {} removed, {} failed, {} unchanged",
        report.indexed, report.removed, report.failed, report.unchanged
    );
    Ok(())
}

pub async fn run_ask(config: Config, message: &str, approve: bool) -> Result<()> {
    let runtime = Runtime::load(config).await?;
    let mut session = runtime.session(approve)?;
    let report = session.run_turn(message).await;
    print_report(&runtime.config, &report)
}

pub async fn run_chat(config: Config, approve: bool) -> Result<()> {
    let runtime = Runtime::load(config).await?;
    let mut session = runtime.session(approve)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                println!("(conversation reset)");
                continue;
            }
            _ => {}
        }

        let report = session.run_turn(line).await;
        if let Err(e) = print_report(&runtime.config, &report) {
            eprintln!("{e:#}");
        }
    }
    Ok(())
}

pub async fn run_watch(config: Config) -> Result<()> {
    let runtime = Runtime::load(config).await?;
    let report = runtime.index.sync().await?;
    info!(
        indexed = report.indexed,
        removed = report.removed,
        "index caught up with the vault"
    );

    let delay = Duration::from_millis(runtime.config.index.debounce_ms);
    let (_watcher, events) = watch::watch_directory(&runtime.collection, 256)?;
    let index_watcher = IndexWatcher::new(runtime.index.clone(), delay);
    let task = index_watcher.clone().spawn(events);

    println!(
        "Watching {} (updates applied after {}s of quiet). Ctrl-C to stop.",
        runtime.collection.root().display(),
        delay.as_secs()
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    task.abort();
    if let Some(report) = index_watcher.flush().await {
        println!("Applied {} pending updates before exit", report.indexed);
    }
    Ok(())
}

pub async fn run_stats(config: Config) -> Result<()> {
    let path = config.snapshot_path();
    let snapshot = read_snapshot(&path)
        .await
        .map_err(|reason| anyhow::anyhow!(reason))
        .with_context(|| format!("cannot read index snapshot {}", path.display()))?;

    let Some(snapshot) = snapshot else {
        println!("No index at {}; run `vault-agent index`.", path.display());
        return Ok(());
    };

    let documents = snapshot.embeddings.len();
    let chunks: usize = snapshot.embeddings.iter().map(|e| e.chunks.len()).sum();
    let indexed_at = chrono::DateTime::from_timestamp_millis(snapshot.indexed_at)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| snapshot.indexed_at.to_string());

    println!("Snapshot:   {}", path.display());
    println!("Documents:  {documents}");
    println!("Chunks:     {chunks}");
    println!("Indexed at: {indexed_at}");
    println!("Embeddings: {}", config.embedding.model);
    Ok(())
}

pub fn run_config(config: &Config, path: Option<&str>, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.openai.api_key.is_some() {
                shown.openai.api_key = Some("<redacted>".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigAction::Validate => {
            let errors = validate_config(config);
            if let Err(e) = validate_credentials(config) {
                println!("openai: {e}");
            }
            for error in &errors {
                println!("{error}");
            }
            if !errors.is_empty() {
                bail!("configuration has {} problem(s)", errors.len());
            }
            println!("Configuration is valid");
        }
        ConfigAction::Init => {
            let path = path.unwrap_or("vault-agent.json");
            Config::write_default(path)?;
            println!("Wrote default configuration to {path}");
        }
    }
    Ok(())
}

fn print_report(config: &Config, report: &TurnReport) -> Result<()> {
    let cost = report.usage.estimated_cost(&config.agent.pricing);
    eprintln!(
        "({} iterations, {} tokens, ~${cost:.4})",
        report.iterations,
        report.usage.total_tokens()
    );

    match &report.outcome {
        TurnOutcome::Completed { final_output, .. } => {
            println!("{final_output}");
            Ok(())
        }
        TurnOutcome::Failed { error } => {
            bail!("{error}\nhint: {}", error.hint())
        }
    }
}
