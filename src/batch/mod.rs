//! Batch conversion.
//!
//! [`BatchConverter`] owns an in-memory working set of [`Item`]s and drives
//! them through a [`Codec`](crate::codec::Codec) with a bounded number of
//! concurrent workers:
//!
//! - `enqueue` adds an `Idle` item (up to the configured capacity)
//! - `convert_one` runs a single item, recording failure on the item itself
//! - `convert_all` snapshots every item not yet `Done` and hands them to
//!   `min(concurrency, len)` workers claiming from a shared atomic cursor
//! - `reset` clears the set and releases converted artifacts
//!
//! Every state change is broadcast as a [`BatchEvent`].
//!
//! # Item lifecycle
//!
//! ```text
//! Idle -> Converting -> Done
//!             |
//!             +-------> Error
//! Done | Error -> Converting (re-convert / retry)
//! ```

mod converter;
mod events;
mod types;

pub use converter::{BatchConverter, BatchError, NamingRule, DEFAULT_CAPACITY, DEFAULT_CONCURRENCY};
pub use events::BatchEvent;
pub use types::{BatchSummary, ConversionResult, Item, ItemStatus, StatusCounts, STARTED_PROGRESS};
