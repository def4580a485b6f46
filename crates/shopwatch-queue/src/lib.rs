//! shopwatch-queue — in-process implementation of the [`WorkQueue`] port.
//!
//! One [`InMemoryWorkQueue`] instance backs one operation's work stream.
//! The queue enforces the batch-send contract (at most
//! [`MAX_BATCH_MESSAGES`](shopwatch_core::MAX_BATCH_MESSAGES) messages per
//! call) and reports per-message acceptance, matching the shape external
//! queue services expose.

pub mod memory;

pub use memory::InMemoryWorkQueue;
