//! shopwatch-state — embedded shop state store for shopwatch.
//!
//! Backed by [redb](https://docs.rs/redb), holds the registry of tracked
//! shops and two derived lifecycle indexes (crawl, scrape) that make
//! eligibility a pair of range scans.
//!
//! # Architecture
//!
//! Shop records are JSON-serialized into redb's `&[u8]` value columns,
//! keyed by domain. Each lifecycle mutation regenerates the derived index
//! rows in the same write transaction, so an index entry can never outlive
//! the state it encodes. Index keys are composite strings
//! `{country}#{state-key}#{domain}`; the state-key segment comes from
//! [`codec`] and sorts never-run, completed, and in-progress shops into
//! disjoint, independently scannable regions.
//!
//! The `ShopStateStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod codec;
pub mod error;
pub mod store;
pub mod tables;

pub use codec::{CodecError, StateSnapshot, StateTag};
pub use error::{StateError, StateResult};
pub use store::ShopStateStore;
