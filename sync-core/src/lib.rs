//! # sync-core
//!
//! Pure logic for itemsync (no I/O, instant tests).
//!
//! This crate implements the state machines and algorithms for the sync
//! engine without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (remote store calls, identifier persistence) is performed
//! by `sync-client`, which interprets the actions produced by these state
//! machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod item_list;
pub mod merge;
pub mod ready;
pub mod retry;

pub use bootstrap::{
    Action, BootstrapEvent, BootstrapPhase, BootstrapState, BootstrapStep, Event, ReadyContext,
};
pub use item_list::ItemList;
pub use merge::{merge_batches, sort_items, DroppedRecord, MergeOutcome, ScopedBatch};
pub use ready::ReadyQueue;
pub use retry::RetryPolicy;
