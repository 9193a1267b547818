pub mod settle;

pub use settle::FileSettleTracker;

use crate::batch::{BatchConverter, Item, ItemStatus};
use crate::codec::{Codec, SourceRef};
use crate::config::{expand_path, WatchConfig};
use crate::output::write_artifact;
use anyhow::{Context, Result};
use heicforge_common::paths::{has_extension, is_hidden};
use heicforge_common::ItemId;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Whether a filesystem event for `path` should be tracked.
pub fn should_track(path: &Path, extensions: &[String]) -> bool {
    !is_hidden(path) && has_extension(path, extensions)
}

/// A filesystem change the settle tracker cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    Changed(PathBuf),
    Removed(PathBuf),
}

/// Tracked changes carried by one watcher event.
pub fn tracked_changes(event: Event, extensions: &[String]) -> Vec<FsChange> {
    let removed = event.kind.is_remove();
    if !removed && !event.kind.is_create() && !event.kind.is_modify() {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter(|path| should_track(path, extensions))
        .map(|path| {
            if removed {
                FsChange::Removed(path)
            } else {
                FsChange::Changed(path)
            }
        })
        .collect()
}

/// A file version the handler has already taken in.
struct SeenFile {
    modified: Option<SystemTime>,
    /// `None` while the enqueue is in flight
    item: Option<ItemId>,
}

/// Feeds settled files into the batch.
pub struct SettledFileHandler {
    batch: Arc<BatchConverter>,
    codec: Arc<dyn Codec>,
    output_dir: PathBuf,
    auto_convert: bool,
    seen: Mutex<HashMap<PathBuf, SeenFile>>,
}

impl SettledFileHandler {
    pub fn new(
        batch: Arc<BatchConverter>,
        codec: Arc<dyn Codec>,
        output_dir: PathBuf,
        auto_convert: bool,
    ) -> Self {
        Self {
            batch,
            codec,
            output_dir,
            auto_convert,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Claim `path` unless its current version is already in the working set
    /// or was already handled.
    fn claim(&self, path: &Path, modified: Option<SystemTime>) -> bool {
        let mut seen = self.seen.lock();
        if let Some(prev) = seen.get(path) {
            let in_batch = match prev.item {
                Some(id) => self.batch.get(id).is_some(),
                None => true,
            };
            if in_batch || prev.modified == modified {
                return false;
            }
        }
        seen.insert(path.to_path_buf(), SeenFile { modified, item: None });
        true
    }

    /// Enqueue a settled file, converting it right away when `auto_convert`
    /// is set. Returns `None` for files that are gone or already enqueued.
    ///
    /// Auto-converted items are removed from the working set once handled, so
    /// a long-running watcher never fills it.
    pub async fn handle(&self, path: PathBuf) -> Option<Item> {
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                tracing::debug!("Settled path is not a file anymore: {:?}", path);
                return None;
            }
        };

        if !self.claim(&path, metadata.modified().ok()) {
            tracing::debug!("Already enqueued: {:?}", path);
            return None;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let item = match self.batch.enqueue(name, SourceRef::Path(path.clone())) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Failed to queue {:?}: {}", path, e);
                self.seen.lock().remove(&path);
                return None;
            }
        };
        if let Some(entry) = self.seen.lock().get_mut(&path) {
            entry.item = Some(item.id);
        }
        tracing::info!("Queued {} for: {:?}", item.id, path);

        if !self.auto_convert {
            return Some(item);
        }

        let item = match self.batch.convert_one(item.id, self.codec.as_ref()).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Conversion of {:?} skipped: {}", path, e);
                return None;
            }
        };

        match (item.status, item.result.as_ref()) {
            (ItemStatus::Done, Some(result)) => match write_artifact(&self.output_dir, result).await {
                Ok(written) => tracing::info!("Saved {:?}", written),
                Err(e) => tracing::error!("Failed to save output for {:?}: {:#}", path, e),
            },
            _ => tracing::warn!(
                "Conversion of {:?} failed: {}",
                path,
                item.error.as_deref().unwrap_or("unknown error")
            ),
        }

        if let Err(e) = self.batch.remove(item.id) {
            tracing::debug!("Handled item already gone: {}", e);
        }

        Some(item)
    }
}

/// File watcher that monitors directories for new HEIC/HEIF files
pub struct FileWatcher {
    config: WatchConfig,
    handler: Arc<SettledFileHandler>,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl FileWatcher {
    pub fn new(config: WatchConfig, handler: Arc<SettledFileHandler>) -> Self {
        Self {
            config,
            handler,
            watcher: None,
            task: None,
        }
    }

    /// Start watching configured directories
    pub fn start(&mut self) -> Result<()> {
        if self.config.paths.is_empty() {
            tracing::warn!("No watch paths configured");
            return Ok(());
        }

        let (event_tx, mut event_rx) = mpsc::channel::<FsChange>(100);
        let (settled_tx, mut settled_rx) = mpsc::channel::<PathBuf>(100);

        let mut settle_tracker = FileSettleTracker::new(
            Duration::from_secs(self.config.settle_time_secs),
            settled_tx,
        );

        let extensions = self.config.extensions.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in tracked_changes(event, &extensions) {
                        let _ = event_tx.blocking_send(change);
                    }
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        for path in &self.config.paths {
            let path = expand_path(path);
            if path.is_dir() {
                watcher
                    .watch(&path, RecursiveMode::NonRecursive)
                    .with_context(|| format!("Failed to watch path: {:?}", path))?;
                tracing::info!("Watching directory: {:?}", path);
            } else {
                tracing::warn!("Watch path is not a directory: {:?}", path);
            }
        }

        self.watcher = Some(watcher);

        let handler = Arc::clone(&self.handler);
        self.task = Some(tokio::spawn(async move {
            let mut check_interval = tokio::time::interval(CHECK_INTERVAL);

            loop {
                tokio::select! {
                    Some(change) = event_rx.recv() => {
                        tracing::trace!("File event: {:?}", change);
                        match change {
                            FsChange::Changed(path) => settle_tracker.file_changed(path),
                            FsChange::Removed(path) => settle_tracker.remove(&path),
                        }
                    }

                    Some(path) = settled_rx.recv() => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            handler.handle(path).await;
                        });
                    }

                    _ = check_interval.tick() => {
                        settle_tracker.check_settled().await;
                    }
                }
            }
        }));

        Ok(())
    }

    /// Stop watching
    pub fn stop(&mut self) {
        self.watcher = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        tracing::info!("File watcher stopped");
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
