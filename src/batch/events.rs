use super::Item;
use heicforge_common::ItemId;
use serde::Serialize;

/// State change broadcast by the batch coordinator.
///
/// Consumers get an append-only stream of these and never need to lock the
/// working set to follow along.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// A file was added to the working set.
    ItemQueued {
        #[serde(flatten)]
        item: Item,
    },
    /// A conversion attempt has started.
    ItemStarted { id: ItemId, attempt: u32 },
    /// The codec reported progress.
    ItemProgress { id: ItemId, progress: u8 },
    /// A conversion finished successfully.
    ItemConverted {
        #[serde(flatten)]
        item: Item,
    },
    /// A conversion failed.
    ItemFailed { id: ItemId, error: String },
    /// An item was discarded from the working set.
    ItemRemoved { id: ItemId },
    /// The whole working set was cleared.
    BatchReset { removed: usize, released: usize },
}

impl BatchEvent {
    pub fn item_queued(item: Item) -> Self {
        BatchEvent::ItemQueued { item }
    }

    pub fn item_started(id: ItemId, attempt: u32) -> Self {
        BatchEvent::ItemStarted { id, attempt }
    }

    pub fn item_progress(id: ItemId, progress: u8) -> Self {
        BatchEvent::ItemProgress { id, progress }
    }

    pub fn item_converted(item: Item) -> Self {
        BatchEvent::ItemConverted { item }
    }

    pub fn item_failed(id: ItemId, error: String) -> Self {
        BatchEvent::ItemFailed { id, error }
    }

    pub fn item_removed(id: ItemId) -> Self {
        BatchEvent::ItemRemoved { id }
    }

    pub fn batch_reset(removed: usize, released: usize) -> Self {
        BatchEvent::BatchReset { removed, released }
    }

    /// The item this event concerns, if any.
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            BatchEvent::ItemQueued { item } | BatchEvent::ItemConverted { item } => Some(item.id),
            BatchEvent::ItemStarted { id, .. }
            | BatchEvent::ItemProgress { id, .. }
            | BatchEvent::ItemFailed { id, .. }
            | BatchEvent::ItemRemoved { id } => Some(*id),
            BatchEvent::BatchReset { .. } => None,
        }
    }
}
