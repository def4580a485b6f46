//! Port traits at the store and queue boundaries.
//!
//! The orchestrator consumes these; `shopwatch-state` and `shopwatch-queue`
//! implement them. Both boundaries are deliberately narrow: the index is a
//! partitioned range-query capability returning projected entries, the
//! queue is an at-least-once batch send plus a worker-side receive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::OperationType;

// ── Eligibility index ──────────────────────────────────────────────

/// A projected index entry as returned by a range scan.
///
/// `state_key` is the scanned operation's own encoded lifecycle key;
/// `crawl_key` and `scrape_key` are projections of both operations'
/// completion keys so the scrape refinement needs no secondary read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub domain: String,
    pub country: String,
    pub state_key: String,
    pub crawl_key: String,
    pub scrape_key: String,
}

/// One page of a range scan. `next` is an opaque continuation token;
/// `None` means the range is exhausted.
#[derive(Debug, Clone, Default)]
pub struct IndexPage {
    pub entries: Vec<IndexEntry>,
    pub next: Option<String>,
}

/// Errors surfaced by the index boundary. Any of these is fatal for the
/// invocation that issued the query.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index storage error: {0}")]
    Storage(String),

    #[error("index entry could not be deserialized: {0}")]
    Deserialize(String),
}

/// Partitioned range queries over per-operation lifecycle indexes.
///
/// Queries are always scoped to one country partition and one operation's
/// index. Results come back in ascending key order, which within a state
/// region is ascending chronological order.
#[async_trait]
pub trait EligibilityIndex: Send + Sync {
    /// Scan the never-run region of the operation's index.
    async fn scan_never_run(
        &self,
        operation: OperationType,
        country: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<IndexPage, IndexError>;

    /// Scan completed entries with `finished_at <= cutoff` (inclusive).
    async fn scan_completed_until(
        &self,
        operation: OperationType,
        country: &str,
        cutoff: DateTime<Utc>,
        after: Option<&str>,
        limit: usize,
    ) -> Result<IndexPage, IndexError>;
}

// ── Work queue ─────────────────────────────────────────────────────

/// Hard ceiling on messages per batch send. Imposed by the queue's batch
/// contract, not a tuning knob; larger batches fail the send outright.
pub const MAX_BATCH_MESSAGES: usize = 10;

/// A queue message: caller-assigned id (unique within one batch) plus a
/// serialized payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkMessage {
    pub id: String,
    pub body: String,
}

/// The payload downstream workers receive: the bare shop identifier plus
/// the operation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPayload {
    pub domain: String,
    pub operation: OperationType,
}

/// A message rejected within an otherwise accepted batch send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedMessage {
    pub id: String,
    pub reason: String,
}

/// Per-message outcome of one batch send.
#[derive(Debug, Clone, Default)]
pub struct BatchReceipt {
    /// Ids of accepted messages.
    pub accepted: Vec<String>,
    /// Messages the queue rejected individually.
    pub rejected: Vec<RejectedMessage>,
}

/// Errors at the queue boundary. A `Transport` error means the whole
/// batch call failed; per-message rejections travel in [`BatchReceipt`].
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("batch of {len} messages exceeds the {max}-message send limit")]
    BatchTooLarge { len: usize, max: usize },

    #[error("queue transport error: {0}")]
    Transport(String),
}

/// At-least-once, FIFO-ish message queue with batch send.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Queue name, for logging and routing.
    fn name(&self) -> &str;

    /// Send up to [`MAX_BATCH_MESSAGES`] messages in one call. The receipt
    /// reports per-message accept/reject; retry policy is the caller's
    /// concern.
    async fn send_batch(&self, messages: Vec<WorkMessage>) -> Result<BatchReceipt, QueueError>;

    /// Receive up to `max` messages (worker pull). Delivery is
    /// at-least-once; a received message is considered consumed.
    async fn receive(&self, max: usize) -> Result<Vec<WorkMessage>, QueueError>;
}
