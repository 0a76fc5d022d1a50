//! Blocked identifiers and their retention state machine.
//!
//! Each identifier moves through these states:
//!
//! ```text
//!            block                 schedule_unblock
//! Absent ────────────▶ Indefinite ──────────────────▶ PendingRetention
//!   ▲                                                     │
//!   │            now >= unblock_at (lazy or swept)        │
//!   └─────────────────────────────────────────────────────┘
//!   ▲
//!   └── unblock_now (from any state)
//! ```
//!
//! A pending retention window cannot be replaced until it lapses. Expired
//! records are never reported as active and are removed opportunistically by
//! `is_blocked`, `list_active`, or the background [`Sweeper`].

mod engine;
mod model;
mod repository;

pub use engine::{BlocklistEngine, Sweeper};
pub use model::{BlockOutcome, BlockRecord, ScheduledUnblock, days_remaining, retention_days};
pub use repository::{RetentionStore, SqliteRetentionStore};
