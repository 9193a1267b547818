use crate::codec::{Artifact, SourceRef};
use chrono::{DateTime, Utc};
use heicforge_common::ItemId;
use serde::Serialize;

/// Initial progress hint distinguishing "started" from "queued".
pub const STARTED_PROGRESS: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Idle,
    Converting,
    Done,
    Error,
}

/// Output of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub output_name: String,
    pub size_bytes: u64,
    #[serde(skip)]
    pub artifact: Artifact,
}

impl ConversionResult {
    pub fn new(output_name: String, artifact: Artifact) -> Self {
        Self {
            output_name,
            size_bytes: artifact.len() as u64,
            artifact,
        }
    }
}

/// One file queued for conversion.
///
/// `result` is set only while `Done` and `error` only while `Error`.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub source_name: String,
    #[serde(skip)]
    pub source_ref: SourceRef,
    pub status: ItemStatus,
    pub progress: u8,
    pub result: Option<ConversionResult>,
    pub error: Option<String>,
    /// Number of conversions started for this item.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(source_name: String, source_ref: SourceRef) -> Self {
        Self {
            id: ItemId::new(),
            source_name,
            source_ref,
            status: ItemStatus::Idle,
            progress: 0,
            result: None,
            error: None,
            attempt: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = ItemStatus::Converting;
        self.progress = STARTED_PROGRESS;
        self.result = None;
        self.error = None;
        self.attempt += 1;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
    }

    /// Raise progress while converting. Returns whether the value changed.
    pub fn update_progress(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if self.status != ItemStatus::Converting || percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    pub fn complete(&mut self, result: ConversionResult) {
        self.status = ItemStatus::Done;
        self.progress = 100;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String) {
        self.status = ItemStatus::Error;
        self.progress = 0;
        self.result = None;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }

    /// Drop the converted artifact. Returns whether one was held.
    pub fn release(&mut self) -> bool {
        self.result.take().is_some()
    }
}

/// Aggregate outcome of a `convert_all` run, over its snapshot queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub queued: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items that did not settle: unclaimed after cancellation, removed, or
    /// still converting under another caller.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub idle: usize,
    pub converting: usize,
    pub done: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Idle => self.idle += 1,
            ItemStatus::Converting => self.converting += 1,
            ItemStatus::Done => self.done += 1,
            ItemStatus::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.idle + self.converting + self.done + self.error
    }
}
