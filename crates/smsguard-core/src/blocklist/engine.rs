//! Blocklist engine: retention policy on top of a [`RetentionStore`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::model::{BlockOutcome, BlockRecord, ScheduledUnblock, days_remaining};
use super::repository::RetentionStore;
use crate::time::{Clock, SystemClock};
use crate::{Error, Result};

/// The single writer of block state.
///
/// Every operation on one identifier runs under that identifier's lock, so a
/// gate read never observes a half-applied schedule. Operations on different
/// identifiers never wait on each other.
pub struct BlocklistEngine<S, C = SystemClock> {
    store: S,
    clock: C,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: RetentionStore> BlocklistEngine<S> {
    /// Creates an engine reading the system clock.
    #[must_use]
    pub fn with_system_clock(store: S) -> Self {
        Self::new(store, SystemClock)
    }
}

impl<S: RetentionStore, C: Clock> BlocklistEngine<S, C> {
    /// Creates an engine over `store`, reading time from `clock`.
    #[must_use]
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            locks: DashMap::new(),
        }
    }

    /// Current instant according to the engine's clock, at storage precision.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        truncate_to_millis(self.clock.now())
    }

    /// Block an identifier indefinitely.
    ///
    /// Blocking an identifier that is already active changes nothing, including
    /// any pending retention window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty identifier, or a storage error.
    pub async fn block(&self, identifier: &str) -> Result<BlockOutcome> {
        validate_identifier(identifier)?;
        let _guard = self.lock(identifier).await;
        let now = self.now();

        match self.store.get(identifier).await? {
            Some(record) if record.is_active(now) => {
                debug!("Already blocked: {identifier}");
                return Ok(BlockOutcome::AlreadyBlocked);
            }
            // Lapsed but not yet swept
            Some(_) => {
                self.store
                    .replace(&BlockRecord::new(identifier, now))
                    .await?;
            }
            None => self.store.put(identifier, now).await?,
        }

        info!("Blocked: {identifier}");
        Ok(BlockOutcome::Blocked)
    }

    /// Schedule an identifier to be unblocked after `retention`.
    ///
    /// An absent identifier is blocked first, so it stays blocked until the
    /// window lapses. A window that is still counting down is never replaced.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty identifier or a non-positive
    /// duration, `RetentionAlreadySet` while a previous window is pending, or a
    /// storage error.
    pub async fn schedule_unblock(
        &self,
        identifier: &str,
        retention: Duration,
    ) -> Result<ScheduledUnblock> {
        validate_identifier(identifier)?;
        // Anything under a millisecond would lapse on storage
        if retention < Duration::milliseconds(1) {
            return Err(Error::InvalidArgument(format!(
                "retention period must be positive, got {retention}"
            )));
        }

        let _guard = self.lock(identifier).await;
        let now = self.now();
        let unblock_at = now
            .checked_add_signed(retention)
            .map(truncate_to_millis)
            .ok_or_else(|| Error::InvalidArgument("retention period is too long".into()))?;

        match self.store.get(identifier).await? {
            Some(record) if record.has_pending_retention(now) => {
                warn!("Retention period already active for {identifier}, not updating");
                return Err(Error::RetentionAlreadySet {
                    identifier: identifier.to_string(),
                    unblock_at: record.unblock_at.unwrap_or(unblock_at),
                });
            }
            Some(record) if record.is_active(now) => {
                if self.store.set_retention(identifier, unblock_at).await? == 0 {
                    return Err(Error::Storage(sqlx::Error::RowNotFound));
                }
            }
            // Absent or lapsed: the block and its window are written together
            _ => {
                let record = BlockRecord {
                    unblock_at: Some(unblock_at),
                    retention_armed: true,
                    ..BlockRecord::new(identifier, now)
                };
                self.store.replace(&record).await?;
            }
        }

        let scheduled = ScheduledUnblock {
            identifier: identifier.to_string(),
            unblock_at,
            days_remaining: days_remaining(unblock_at - now),
        };
        info!(
            "Scheduled unblock of {identifier} at {unblock_at} ({} days)",
            scheduled.days_remaining
        );
        Ok(scheduled)
    }

    /// Remove an identifier's block immediately.
    ///
    /// Returns `false` if nothing was stored; that is not an error.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty identifier, or a storage error.
    pub async fn unblock_now(&self, identifier: &str) -> Result<bool> {
        validate_identifier(identifier)?;
        let _guard = self.lock(identifier).await;

        let removed = self.store.delete(identifier).await? > 0;
        if removed {
            info!("Unblocked: {identifier}");
        } else {
            debug!("Unblock requested for {identifier}, which was not blocked");
        }
        Ok(removed)
    }

    /// Check whether an identifier is currently blocked.
    ///
    /// A lapsed record is deleted on the way out. This is one primary-key
    /// lookup plus at most one delete.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty identifier, or a storage error.
    pub async fn is_blocked(&self, identifier: &str) -> Result<bool> {
        Ok(self.status(identifier).await?.is_some())
    }

    /// Get the active record for an identifier, sweeping it if lapsed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty identifier, or a storage error.
    pub async fn status(&self, identifier: &str) -> Result<Option<BlockRecord>> {
        validate_identifier(identifier)?;
        let _guard = self.lock(identifier).await;
        let now = self.now();

        match self.store.get(identifier).await? {
            Some(record) if record.is_expired(now) => {
                self.store.delete(identifier).await?;
                debug!("Retention lapsed for {identifier}, record removed");
                Ok(None)
            }
            record => Ok(record),
        }
    }

    /// Identifiers that are currently blocked, after sweeping lapsed records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_active(&self) -> Result<Vec<String>> {
        let now = self.sweep_at(self.now()).await?;
        self.store.list_active(now).await
    }

    /// Active records, oldest block first, after sweeping lapsed records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn list_active_records(&self) -> Result<Vec<BlockRecord>> {
        let now = self.sweep_at(self.now()).await?;
        self.store.list_active_records(now).await
    }

    /// Physically remove every lapsed record. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let now = self.now();
        let removed = self.store.delete_expired(now).await?;
        if removed > 0 {
            info!("Swept {removed} expired blocks");
        }
        Ok(removed)
    }

    async fn sweep_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let removed = self.store.delete_expired(now).await?;
        if removed > 0 {
            debug!("Swept {removed} expired blocks");
        }
        Ok(now)
    }

    /// Acquire the lock for one identifier.
    async fn lock(&self, identifier: &str) -> IdentifierGuard<'_> {
        let mutex = self
            .locks
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;

        IdentifierGuard {
            locks: &self.locks,
            identifier: identifier.to_string(),
            guard: Some(guard),
        }
    }
}

/// Holds one identifier's lock and drops its map entry once nobody needs it.
struct IdentifierGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    identifier: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdentifierGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters clone the Arc under the shard lock, so a count of one means
        // only the map still holds it.
        self.locks
            .remove_if(&self.identifier, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.trim().is_empty() {
        return Err(Error::InvalidArgument("identifier must not be empty".into()));
    }
    Ok(())
}

fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}

/// Background task that sweeps lapsed blocks on a fixed interval.
pub struct Sweeper {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl Sweeper {
    /// Spawn a sweeper for `engine`. The first sweep runs immediately.
    #[must_use]
    pub fn spawn<S, C>(engine: Arc<BlocklistEngine<S, C>>, period: std::time::Duration) -> Self
    where
        S: RetentionStore + 'static,
        C: Clock + 'static,
    {
        let (shutdown, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        if let Err(e) = engine.sweep_expired().await {
                            error!("Background sweep failed: {e}");
                        }
                    }
                }
            }
            debug!("Sweeper stopped");
        });

        Self { handle, shutdown }
    }

    /// Stop the sweeper and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            warn!("Sweeper task ended abnormally: {e}");
        }
    }
}
