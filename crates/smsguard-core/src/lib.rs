//! # smsguard-core
//!
//! Core logic for the `SMSGuard` incoming-message filter.
//!
//! This crate provides:
//! - **Retention Store** - durable `SQLite` table of blocked identifiers
//! - **Blocklist Engine** - block, scheduled unblock, immediate unblock, expiry sweeps
//! - **Interception Gate** - the allow/suppress decision for inbound messages
//! - **Snapshot Codec** - JSON backup and restore of the blocked set
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use smsguard_core::{BlocklistEngine, InterceptionGate, SqliteRetentionStore, SystemClock};
//!
//! let store = SqliteRetentionStore::new("smsguard.db").await?;
//! let engine = Arc::new(BlocklistEngine::new(store, SystemClock));
//! engine.block("+15551230000").await?;
//!
//! let gate = InterceptionGate::new(Arc::clone(&engine));
//! assert!(gate.should_suppress("+15551230000").await);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod blocklist;
mod error;
pub mod gate;
pub mod snapshot;
pub mod time;

pub use blocklist::{
    BlockOutcome, BlockRecord, BlocklistEngine, RetentionStore, ScheduledUnblock,
    SqliteRetentionStore, Sweeper, days_remaining, retention_days,
};
pub use error::{Error, Result};
pub use gate::{InboundMessage, InterceptionGate, MessagePart, Verdict};
pub use snapshot::{DecodedSnapshot, ImportReport, SnapshotEntry};
pub use time::{Clock, MockClock, SystemClock};
