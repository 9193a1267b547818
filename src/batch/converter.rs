//! Bounded-concurrency batch coordinator.

use super::events::BatchEvent;
use super::types::{BatchSummary, ConversionResult, Item, ItemStatus, StatusCounts};
use crate::codec::{Codec, ProgressReporter, SourceRef};
use crate::config::Config;
use futures::future::join_all;
use heicforge_common::paths::{default_source_extensions, derive_output_name, DEFAULT_TARGET_EXTENSION};
use heicforge_common::ItemId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default working-set size.
pub const DEFAULT_CAPACITY: usize = 200;

/// Worker count used when the caller has no preference.
pub const DEFAULT_CONCURRENCY: usize = 3;

const EVENT_CHANNEL_SIZE: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Batch is full ({capacity} items)")]
    CapacityExceeded { capacity: usize },

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,
}

/// How converted files are named.
#[derive(Debug, Clone)]
pub struct NamingRule {
    pub source_extensions: Vec<String>,
    pub target_extension: String,
}

impl NamingRule {
    pub fn output_name(&self, source_name: &str) -> String {
        derive_output_name(source_name, &self.source_extensions, &self.target_extension)
    }
}

impl Default for NamingRule {
    fn default() -> Self {
        Self {
            source_extensions: default_source_extensions()
                .iter()
                .map(|e| e.to_string())
                .collect(),
            target_extension: DEFAULT_TARGET_EXTENSION.to_string(),
        }
    }
}

/// Items in enqueue order.
#[derive(Default)]
struct WorkingSet {
    order: Vec<ItemId>,
    items: HashMap<ItemId, Item>,
}

impl WorkingSet {
    fn len(&self) -> usize {
        self.order.len()
    }

    fn get_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    fn iter(&self) -> impl Iterator<Item = &Item> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    fn push(&mut self, item: Item) {
        self.order.push(item.id);
        self.items.insert(item.id, item);
    }

    fn remove(&mut self, id: &ItemId) -> Option<Item> {
        let item = self.items.remove(id)?;
        self.order.retain(|other| other != id);
        Some(item)
    }

    fn drain(&mut self) -> Vec<Item> {
        let mut items = std::mem::take(&mut self.items);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|id| items.remove(&id))
            .collect()
    }
}

/// Coordinates conversion of a working set of items through a bounded pool
/// of concurrent workers.
///
/// The working set lock is never held across a codec call.
pub struct BatchConverter {
    items: Arc<RwLock<WorkingSet>>,
    capacity: usize,
    naming: NamingRule,
    codec_timeout: Option<Duration>,
    event_tx: broadcast::Sender<BatchEvent>,
}

impl BatchConverter {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            items: Arc::new(RwLock::new(WorkingSet::default())),
            capacity,
            naming: NamingRule::default(),
            codec_timeout: None,
            event_tx,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut batch = Self::new(config.batch.capacity).with_naming(NamingRule {
            source_extensions: config.output.source_extensions.clone(),
            target_extension: config.output.extension.clone(),
        });
        if let Some(secs) = config.batch.codec_timeout_secs {
            batch = batch.with_codec_timeout(Duration::from_secs(secs));
        }
        batch
    }

    pub fn with_naming(mut self, naming: NamingRule) -> Self {
        self.naming = naming;
        self
    }

    /// Fail any codec call that runs longer than `limit`.
    pub fn with_codec_timeout(mut self, limit: Duration) -> Self {
        self.codec_timeout = Some(limit);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn naming(&self) -> &NamingRule {
        &self.naming
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_tx.subscribe()
    }

    fn broadcast(&self, event: BatchEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("No subscribers for batch event");
        }
    }

    /// Add a file to the working set without starting a conversion.
    pub fn enqueue(
        &self,
        source_name: impl Into<String>,
        source_ref: SourceRef,
    ) -> Result<Item, BatchError> {
        let item = Item::new(source_name.into(), source_ref);
        {
            let mut set = self.items.write();
            if set.len() >= self.capacity {
                return Err(BatchError::CapacityExceeded {
                    capacity: self.capacity,
                });
            }
            set.push(item.clone());
        }

        debug!(item = %item.id, "Queued {}", item.source_name);
        self.broadcast(BatchEvent::item_queued(item.clone()));
        Ok(item)
    }

    /// Convert a single item and return its final state.
    ///
    /// Codec failures are recorded on the item, not returned as `Err`. An item
    /// that is already converting is returned as-is without a second codec call.
    pub async fn convert_one(&self, id: ItemId, codec: &dyn Codec) -> Result<Item, BatchError> {
        let (source_ref, source_name, attempt) = {
            let mut set = self.items.write();
            let item = set.get_mut(&id).ok_or(BatchError::ItemNotFound(id))?;
            if item.status == ItemStatus::Converting {
                debug!(item = %id, "Conversion already in flight");
                return Ok(item.clone());
            }
            item.start();
            (item.source_ref.clone(), item.source_name.clone(), item.attempt)
        };

        info!(item = %id, codec = codec.name(), attempt, "Converting {}", source_name);
        self.broadcast(BatchEvent::item_started(id, attempt));

        let reporter = self.progress_reporter(id, attempt);
        let outcome = match self.codec_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, codec.convert(&source_ref, &reporter)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(anyhow::anyhow!(
                        "Conversion timed out after {:?}",
                        limit
                    )),
                }
            }
            None => codec.convert(&source_ref, &reporter).await,
        };

        let (item, event) = {
            let mut set = self.items.write();
            let Some(item) = set.get_mut(&id) else {
                warn!(item = %id, "Item removed while converting, discarding result");
                return Err(BatchError::ItemNotFound(id));
            };

            match outcome {
                Ok(artifact) => {
                    let output_name = self.naming.output_name(&source_name);
                    info!(item = %id, bytes = artifact.len(), "Converted {} -> {}", source_name, output_name);
                    item.complete(ConversionResult::new(output_name, artifact));
                    (item.clone(), BatchEvent::item_converted(item.clone()))
                }
                Err(e) => {
                    let detail = format!("{:#}", e);
                    warn!(item = %id, "Conversion of {} failed: {}", source_name, detail);
                    item.fail(detail.clone());
                    (item.clone(), BatchEvent::item_failed(id, detail))
                }
            }
        };

        self.broadcast(event);
        Ok(item)
    }

    /// Convert every item not yet `Done` with at most `concurrency` workers.
    ///
    /// Returns once every worker has run out of items. An item another caller
    /// is already converting is not waited for: it is left to that caller and
    /// counted as `skipped` in the summary, so it may still be `Converting`
    /// when this returns.
    pub async fn convert_all(
        &self,
        codec: &dyn Codec,
        concurrency: usize,
    ) -> Result<BatchSummary, BatchError> {
        self.convert_all_with_cancel(codec, concurrency, &CancellationToken::new())
            .await
    }

    /// Like [`convert_all`](Self::convert_all), but workers stop claiming new
    /// items once `cancel` fires. In-flight conversions run to completion.
    pub async fn convert_all_with_cancel(
        &self,
        codec: &dyn Codec,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, BatchError> {
        if concurrency == 0 {
            return Err(BatchError::InvalidConcurrency);
        }

        // Snapshot: items enqueued after this point are not picked up.
        let queue: Vec<ItemId> = self
            .items
            .read()
            .iter()
            .filter(|item| item.status != ItemStatus::Done)
            .map(|item| item.id)
            .collect();

        if queue.is_empty() {
            debug!("Nothing to convert");
            return Ok(BatchSummary::default());
        }

        let workers = concurrency.min(queue.len());
        info!("Converting {} items with {} workers", queue.len(), workers);

        let cursor = AtomicUsize::new(0);
        let queue_ref = &queue;
        let cursor_ref = &cursor;
        let tasks = (0..workers).map(|worker| async move {
            loop {
                if cancel.is_cancelled() {
                    debug!(worker, "Cancelled, not claiming further items");
                    break;
                }
                let index = cursor_ref.fetch_add(1, Ordering::SeqCst);
                let Some(&id) = queue_ref.get(index) else {
                    break;
                };
                if let Err(e) = self.convert_one(id, codec).await {
                    warn!(worker, item = %id, "Skipping item: {}", e);
                }
            }
        });
        join_all(tasks).await;

        let summary = self.summarize(&queue);
        info!(
            "Batch settled: {} converted, {} failed, {} skipped",
            summary.succeeded, summary.failed, summary.skipped
        );
        Ok(summary)
    }

    fn summarize(&self, queue: &[ItemId]) -> BatchSummary {
        let set = self.items.read();
        let mut summary = BatchSummary {
            queued: queue.len(),
            ..BatchSummary::default()
        };
        for id in queue {
            match set.items.get(id).map(|item| item.status) {
                Some(ItemStatus::Done) => summary.succeeded += 1,
                Some(ItemStatus::Error) => summary.failed += 1,
                _ => summary.skipped += 1,
            }
        }
        summary
    }

    fn progress_reporter(&self, id: ItemId, attempt: u32) -> ProgressReporter {
        let items = Arc::clone(&self.items);
        let event_tx = self.event_tx.clone();
        ProgressReporter::new(move |percent| {
            let progress = {
                let mut set = items.write();
                match set.get_mut(&id) {
                    // Reports from an earlier attempt are stale.
                    Some(item) if item.attempt == attempt => {
                        if !item.update_progress(percent) {
                            return;
                        }
                        item.progress
                    }
                    _ => return,
                }
            };
            let _ = event_tx.send(BatchEvent::item_progress(id, progress));
        })
    }

    /// Discard one item, releasing its artifact.
    pub fn remove(&self, id: ItemId) -> Result<Item, BatchError> {
        let mut item = self
            .items
            .write()
            .remove(&id)
            .ok_or(BatchError::ItemNotFound(id))?;
        item.release();
        self.broadcast(BatchEvent::item_removed(id));
        Ok(item)
    }

    /// Clear the working set, releasing every held artifact.
    ///
    /// Returns the number of items removed.
    pub fn reset(&self) -> usize {
        let mut removed = self.items.write().drain();
        let mut released = 0;
        for item in removed.iter_mut() {
            if item.status == ItemStatus::Done && item.release() {
                released += 1;
            }
        }

        info!("Batch reset: {} items removed, {} artifacts released", removed.len(), released);
        self.broadcast(BatchEvent::batch_reset(removed.len(), released));
        removed.len()
    }

    /// Snapshot of the working set in enqueue order.
    pub fn items(&self) -> Vec<Item> {
        self.items.read().iter().cloned().collect()
    }

    pub fn get(&self, id: ItemId) -> Option<Item> {
        self.items.read().items.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for item in self.items.read().iter() {
            counts.record(item.status);
        }
        counts
    }
}

impl Default for BatchConverter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
