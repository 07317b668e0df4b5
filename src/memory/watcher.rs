use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collection::CollectionEvent;

use super::manager::{SyncReport, VectorIndex};

/// Turns collection change events into debounced index updates.
///
/// Creations and modifications are queued and flushed together once no new
/// event has arrived for `delay`. Deletions and renames are applied at once.
/// Cloning yields another handle to the same queue and timer.
#[derive(Clone)]
pub struct IndexWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    index: Arc<VectorIndex>,
    delay: Duration,
    pending: Mutex<BTreeSet<String>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl IndexWatcher {
    pub fn new(index: Arc<VectorIndex>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                index,
                delay,
                pending: Mutex::new(BTreeSet::new()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Paths waiting for the next flush.
    pub fn pending(&self) -> Vec<String> {
        self.inner.pending.lock().iter().cloned().collect()
    }

    pub async fn handle_event(&self, event: CollectionEvent) {
        match event {
            CollectionEvent::Created(path) | CollectionEvent::Modified(path) => {
                debug!(path = %path, "queueing document update");
                self.inner.pending.lock().insert(path);
                self.reschedule();
            }
            CollectionEvent::Deleted(path) => {
                self.inner.pending.lock().remove(&path);
                if self.inner.index.remove_document(&path) {
                    info!(path = %path, "document removed from index");
                    self.persist().await;
                }
            }
            CollectionEvent::Renamed { from, to } => {
                let was_pending = self.inner.pending.lock().remove(&from);
                if self.inner.index.rename_document(&from, &to) {
                    info!(from = %from, to = %to, "index entry renamed");
                    self.persist().await;
                    if was_pending {
                        self.inner.pending.lock().insert(to);
                        self.reschedule();
                    }
                } else {
                    self.inner.pending.lock().insert(to);
                    self.reschedule();
                }
            }
        }
    }

    /// Cancel the running timer, if any, and start a fresh one.
    fn reschedule(&self) {
        let watcher = self.clone();
        let delay = self.inner.delay;
        let mut timer = self.inner.timer.lock();
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Run detached so a new event cannot abort a flush half-way.
            tokio::spawn(async move {
                watcher.flush().await;
            });
        }));
    }

    /// Index everything queued so far.
    ///
    /// Queued updates are discarded when the index has never been built,
    /// since a full rebuild will pick them up anyway.
    pub async fn flush(&self) -> Option<SyncReport> {
        let paths: Vec<String> = std::mem::take(&mut *self.inner.pending.lock())
            .into_iter()
            .collect();
        if paths.is_empty() {
            return None;
        }

        if !self.inner.index.is_indexed() {
            info!(discarded = paths.len(), "index not built yet; dropping queued updates");
            return None;
        }

        match self.inner.index.index_paths(&paths).await {
            Ok(report) => {
                info!(
                    indexed = report.indexed,
                    removed = report.removed,
                    failed = report.failed,
                    "queued document updates applied"
                );
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "failed to apply queued document updates");
                None
            }
        }
    }

    /// Consume events from `events` until the sender side closes.
    pub async fn run(&self, mut events: mpsc::Receiver<CollectionEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("collection event stream closed");
    }

    /// [`IndexWatcher::run`] on its own task.
    pub fn spawn(self, events: mpsc::Receiver<CollectionEvent>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(events).await })
    }

    async fn persist(&self) {
        if let Err(e) = self.inner.index.persist().await {
            warn!(error = %e, "failed to persist index snapshot");
        }
    }
}
