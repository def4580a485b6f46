//! shopwatch-core — shared types for the shopwatch orchestration service.
//!
//! Defines the closed set of tracked operations (`crawl`, `scrape`), the
//! per-shop lifecycle model, the orchestration request/summary types, and
//! the two port traits consumed by the orchestrator:
//!
//! - [`EligibilityIndex`] — partitioned, paginated range queries over
//!   lifecycle index entries (implemented by `shopwatch-state`)
//! - [`WorkQueue`] — batch send / worker receive with per-message status
//!   (implemented by `shopwatch-queue`)

pub mod domain_name;
pub mod ports;
pub mod types;

pub use domain_name::core_domain_name;
pub use ports::{
    BatchReceipt, EligibilityIndex, IndexEntry, IndexError, IndexPage, QueueError,
    RejectedMessage, WorkMessage, WorkPayload, WorkQueue, MAX_BATCH_MESSAGES,
};
pub use types::*;
