//! Live change notifications for a filesystem vault.

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CollectionEvent, FsCollection};

/// Start watching the vault root recursively.
///
/// The returned watcher must be kept alive for events to keep flowing; the
/// receiver yields one [`CollectionEvent`] per affected Markdown document.
pub fn watch_directory(
    collection: &FsCollection,
    buffer: usize,
) -> Result<(RecommendedWatcher, mpsc::Receiver<CollectionEvent>)> {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let translator = collection.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in translate(&translator, &event) {
                    if tx.blocking_send(change).is_err() {
                        debug!("collection event receiver dropped");
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "filesystem watch error"),
        },
        notify::Config::default(),
    )
    .context("failed to initialise filesystem watcher")?;

    watcher
        .watch(collection.root(), RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch '{}'", collection.root().display()))?;

    Ok((watcher, rx))
}

/// Map a raw filesystem event onto document-level changes.
pub fn translate(collection: &FsCollection, event: &Event) -> Vec<CollectionEvent> {
    let keys = || event.paths.iter().filter_map(|p| collection.key_for(p));

    match &event.kind {
        EventKind::Create(_) => keys().map(CollectionEvent::Created).collect(),
        EventKind::Remove(_) => keys().map(CollectionEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let from = event.paths.first().and_then(|p| collection.key_for(p));
            let to = event.paths.get(1).and_then(|p| collection.key_for(p));
            match (from, to) {
                (Some(from), Some(to)) => vec![CollectionEvent::Renamed { from, to }],
                (Some(from), None) => vec![CollectionEvent::Deleted(from)],
                (None, Some(to)) => vec![CollectionEvent::Created(to)],
                (None, None) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            keys().map(CollectionEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            keys().map(CollectionEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => keys().map(CollectionEvent::Modified).collect(),
        _ => Vec::new(),
    }
}
