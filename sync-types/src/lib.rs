//! # sync-types
//!
//! Data model for itemsync, a record synchronization and sharing engine.
//!
//! This crate provides the foundational types used across all itemsync crates:
//! - [`ZoneId`], [`RecordId`] - Identity types
//! - [`Record`], [`Share`], [`Zone`], [`StoredObject`] - Remote store objects
//! - [`Item`] - The user item and its record encoding
//! - [`Topic`], [`RemoteChangeSignal`] - Change notification types
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod item;
mod record;
mod signal;

pub use error::SyncError;
pub use ids::{RecordId, ZoneId, DEFAULT_OWNER};
pub use item::{Item, FIELD_IS_SHARE, FIELD_NAME, FIELD_TIMESTAMP, ITEM_RECORD_TYPE};
pub use record::{FieldValue, Permission, Predicate, Record, Scope, Share, StoredObject, Zone};
pub use signal::{RemoteChangeSignal, SignalKind, Topic};
